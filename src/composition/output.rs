//! Result of a finished composition

use serde::Serialize;

use super::step::{Step, StepResult, StepStatus};
use crate::domain::container::ContainerDefinition;
use crate::domain::dashboard::Dashboard;
use crate::domain::identity::IdentityRoles;
use crate::domain::load_balancer::{LoadBalancer, LoadBalancerEndpoint};
use crate::domain::network::SubnetSelection;
use crate::domain::security::SecurityPolicy;
use crate::domain::service::{Cluster, LogDestination, ServiceDescriptor, TaskTemplate};

/// Everything one server composition declared
#[derive(Debug, Clone, Serialize)]
pub struct Composition {
    pub server: String,
    pub subnets: SubnetSelection,
    pub security_policy: SecurityPolicy,
    pub log_destination: LogDestination,
    pub roles: IdentityRoles,
    pub cluster: Cluster,
    pub task: TaskTemplate,
    pub service: ServiceDescriptor,
    pub load_balancer: Option<LoadBalancer>,
    pub dashboard: Dashboard,
    pub steps: Vec<StepResult>,
}

/// Handles a composition hands back to its caller
#[derive(Debug, Clone, Copy)]
pub struct CompositionOutputs<'a> {
    pub service: &'a ServiceDescriptor,
    pub dashboard: &'a Dashboard,
    pub security_policy: &'a SecurityPolicy,
    /// Present only when a load balancer was requested
    pub endpoint: Option<LoadBalancerEndpoint>,
}

impl Composition {
    pub fn outputs(&self) -> CompositionOutputs<'_> {
        CompositionOutputs {
            service: &self.service,
            dashboard: &self.dashboard,
            security_policy: &self.security_policy,
            endpoint: self.load_balancer.as_ref().and_then(LoadBalancer::endpoint),
        }
    }

    /// The game container
    pub fn container(&self) -> Option<&ContainerDefinition> {
        self.task.container()
    }

    pub fn step_status(&self, step: Step) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|result| result.step == step)
            .map(|result| result.status)
    }

    pub fn skipped_steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.steps
            .iter()
            .filter(|result| result.status == StepStatus::Skipped)
            .map(|result| result.step)
    }
}
