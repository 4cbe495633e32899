//! Operational dashboards
//!
//! A dashboard is an ordered list of graph panels. Panels are only ever
//! appended; [`Dashboard::extends`] checks that an augmented dashboard kept
//! every panel of the one it was built from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Namespace of the container platform's built-in service metrics
pub const SERVICE_METRICS_NAMESPACE: &str = "AWS/ECS";

const DEFAULT_PERIOD: Duration = Duration::from_secs(60);
const PANEL_WIDTH: u32 = 12;
const PANEL_HEIGHT: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: BTreeMap<String, String>,
    pub statistic: String,
    #[serde(with = "humantime_duration")]
    pub period: Duration,
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

impl Metric {
    pub fn new(namespace: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            metric_name: metric_name.into(),
            dimensions: BTreeMap::new(),
            statistic: "Average".to_string(),
            period: DEFAULT_PERIOD,
        }
    }

    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(name.into(), value.into());
        self
    }

    pub fn with_statistic(mut self, statistic: impl Into<String>) -> Self {
        self.statistic = statistic.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YAxis {
    pub min: f64,
    pub max: Option<f64>,
}

impl YAxis {
    pub fn percent() -> Self {
        Self {
            min: 0.0,
            max: Some(100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPanel {
    pub title: String,
    pub left: Vec<Metric>,
    pub right: Vec<Metric>,
    pub left_axis: Option<YAxis>,
    pub width: u32,
    pub height: u32,
}

impl GraphPanel {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            left: Vec::new(),
            right: Vec::new(),
            left_axis: None,
            width: PANEL_WIDTH,
            height: PANEL_HEIGHT,
        }
    }

    pub fn with_left(mut self, metric: Metric) -> Self {
        self.left.push(metric);
        self
    }

    pub fn with_right(mut self, metric: Metric) -> Self {
        self.right.push(metric);
        self
    }

    pub fn with_left_axis(mut self, axis: YAxis) -> Self {
        self.left_axis = Some(axis);
        self
    }

    /// Every metric charted by the panel, left axis first
    pub fn metrics(&self) -> impl Iterator<Item = &Metric> {
        self.left.iter().chain(self.right.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub name: String,
    panels: Vec<GraphPanel>,
}

impl Dashboard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            panels: Vec::new(),
        }
    }

    pub fn with_panel(mut self, panel: GraphPanel) -> Self {
        self.panels.push(panel);
        self
    }

    pub fn panels(&self) -> &[GraphPanel] {
        &self.panels
    }

    pub fn panel(&self, title: &str) -> Option<&GraphPanel> {
        self.panels.iter().find(|p| p.title == title)
    }

    /// Whether `base`'s panels are still the leading panels of `self`
    pub fn extends(&self, base: &Dashboard) -> bool {
        self.name == base.name
            && self.panels.len() >= base.panels.len()
            && base.panels.iter().zip(self.panels.iter()).all(|(a, b)| a == b)
    }
}

/// Built-in utilization metric of a running service
pub fn service_metric(metric_name: &str, service: &str, cluster: &str) -> Metric {
    Metric::new(SERVICE_METRICS_NAMESPACE, metric_name)
        .with_dimension("ServiceName", service)
        .with_dimension("ClusterName", cluster)
}

/// CPU and memory utilization panels every composition starts with
pub fn base_dashboard(name: &str, service: &str, cluster: &str) -> Dashboard {
    Dashboard::new(name)
        .with_panel(
            GraphPanel::new("CPU Utilization")
                .with_left(service_metric("CPUUtilization", service, cluster))
                .with_left_axis(YAxis::percent()),
        )
        .with_panel(
            GraphPanel::new("Memory Utilization")
                .with_left(service_metric("MemoryUtilization", service, cluster))
                .with_left_axis(YAxis::percent()),
        )
}
