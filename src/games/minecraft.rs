//! Minecraft: world-persisting server built from the internal repository

use std::time::Duration;

use super::{GameKind, Specialization};
use crate::composition::{MetricsScope, StepOverrides};
use crate::domain::container::{ContainerOverrides, HealthProbe};
use crate::domain::dashboard::{service_metric, Dashboard, GraphPanel, Metric};
use crate::domain::identity::{Capability, ResourceScope};
use crate::domain::image::{ImageRef, RepositoryHandle};
use crate::domain::service::SizingOverride;
use crate::domain::traffic::{Protocol, TrafficProfile};

pub const GAME_PORT: u16 = 25565;
pub const HEALTH_CHECK_PORT: u16 = 8443;

/// Namespace the server's metrics sidecar publishes to
pub const METRICS_NAMESPACE: &str = "Minecraft";

/// World boot is slow; probes fail until the world is loaded
pub const PROBE_GRACE: Duration = Duration::from_secs(5 * 60);

/// The server looks up its own task address and publishes a DNS record
pub const TASK_ACTIONS: &[&str] = &[
    "ec2:DescribeNetworkInterfaces",
    "ecs:DescribeTasks",
    "route53:ChangeResourceRecordSets",
    "route53:ListHostedZonesByName",
];

const WORLDS: &[&str] = &["overworld", "the_nether", "the_end"];

pub fn specialization(repository: &RepositoryHandle) -> Specialization {
    Specialization {
        kind: GameKind::Minecraft,
        image: ImageRef::repository(repository.clone(), None),
        sizing: SizingOverride::new(4096, 10240),
        traffic: TrafficProfile::new(GAME_PORT, Protocol::Tcp)
            .with_health_check(HEALTH_CHECK_PORT, Protocol::Tcp)
            .with_load_balancer(true),
        mount_paths: Vec::new(),
        container: ContainerOverrides::default().with_health_check(
            HealthProbe::http(HEALTH_CHECK_PORT).with_start_period(PROBE_GRACE),
        ),
        overrides: StepOverrides::new()
            .with_task_capability(Capability::new(TASK_ACTIONS, ResourceScope::Any))
            .with_metrics(add_panels),
    }
}

fn game_metric(name: &str, scope: &MetricsScope) -> Metric {
    Metric::new(METRICS_NAMESPACE, name).with_dimension("Server", &scope.server)
}

fn add_panels(dashboard: Dashboard, scope: &MetricsScope) -> Dashboard {
    let load = GraphPanel::new("CPU & Memory VS Player Count")
        .with_left(service_metric("CPUUtilization", &scope.service_name, &scope.cluster_name))
        .with_left(service_metric("MemoryUtilization", &scope.service_name, &scope.cluster_name))
        .with_right(game_metric("PlayerCount", scope).with_statistic("Maximum"));

    let tick = GraphPanel::new("Tick Time").with_left(game_metric("TickTime", scope));

    let entities = WORLDS.iter().fold(GraphPanel::new("Entities per World"), |panel, world| {
        panel.with_left(game_metric("EntityCount", scope).with_dimension("World", *world))
    });

    dashboard.with_panel(load).with_panel(tick).with_panel(entities)
}
