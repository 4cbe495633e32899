//! Specialization hooks into the pipeline
//!
//! Hooks are plain functions over values: each receives what the base step
//! produced and returns the augmented value. The composer checks that a
//! hook only added to the base (rules and panels are append-only).

use std::fmt;
use std::sync::Arc;

use crate::domain::container::ContainerDefinition;
use crate::domain::dashboard::Dashboard;
use crate::domain::identity::Capability;
use crate::domain::security::SecurityPolicy;

pub type PolicyHook = Arc<dyn Fn(SecurityPolicy) -> SecurityPolicy + Send + Sync>;
pub type ContainerHook = Arc<dyn Fn(ContainerDefinition) -> ContainerDefinition + Send + Sync>;
pub type MetricsHook = Arc<dyn Fn(Dashboard, &MetricsScope) -> Dashboard + Send + Sync>;

/// Names a metrics hook needs to build panels for one composition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsScope {
    pub server: String,
    pub service_name: String,
    pub cluster_name: String,
}

/// Per-step overrides supplied by a specialization
#[derive(Clone, Default)]
pub struct StepOverrides {
    /// Appends rules after the base security policy is built
    pub security_policy: Option<PolicyHook>,
    /// Extra capabilities for the telemetry principal
    pub task_capabilities: Vec<Capability>,
    /// Runs after the container overrides are merged
    pub container: Option<ContainerHook>,
    /// Appends dashboard panels
    pub metrics: Option<MetricsHook>,
}

impl StepOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_security_policy(
        mut self,
        hook: impl Fn(SecurityPolicy) -> SecurityPolicy + Send + Sync + 'static,
    ) -> Self {
        self.security_policy = Some(Arc::new(hook));
        self
    }

    pub fn with_task_capability(mut self, capability: Capability) -> Self {
        self.task_capabilities.push(capability);
        self
    }

    pub fn with_container(
        mut self,
        hook: impl Fn(ContainerDefinition) -> ContainerDefinition + Send + Sync + 'static,
    ) -> Self {
        self.container = Some(Arc::new(hook));
        self
    }

    pub fn with_metrics(
        mut self,
        hook: impl Fn(Dashboard, &MetricsScope) -> Dashboard + Send + Sync + 'static,
    ) -> Self {
        self.metrics = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for StepOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepOverrides")
            .field("security_policy", &self.security_policy.is_some())
            .field("task_capabilities", &self.task_capabilities)
            .field("container", &self.container.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::ResourceScope;

    #[test]
    fn test_debug_shows_hook_presence() {
        let overrides = StepOverrides::new()
            .with_security_policy(|policy| policy)
            .with_task_capability(Capability::new(&["ecs:DescribeTasks"], ResourceScope::Any));
        let debug = format!("{:?}", overrides);
        assert!(debug.contains("security_policy: true"));
        assert!(debug.contains("metrics: false"));
    }
}
