//! Pipeline steps
//!
//! A composition is a fixed sequence of steps. Each step only reads state
//! produced by steps before it.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Individual steps of a server composition, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Select the public game-traffic subnets
    ResolveSubnet,
    /// Base security rules, plus specialization rules
    BuildSecurityPolicy,
    /// One log destination per deployment
    ProvisionLogging,
    /// Telemetry and execution principals
    DeriveIdentity,
    CreateCluster,
    /// Task template with validated sizing
    CreateTaskTemplate,
    /// Game container with specialization overrides
    AttachContainer,
    BindPorts,
    /// Only when a volume is referenced
    AttachVolume,
    /// Only when the container reads an environment file
    AttachEnvironmentFile,
    CreateService,
    /// Only when the traffic profile asks for one
    CreateLoadBalancer,
    CreateDashboard,
    /// Specialization panels
    AddMetrics,
}

impl Step {
    /// Every step in pipeline order
    pub const ALL: [Step; 14] = [
        Step::ResolveSubnet,
        Step::BuildSecurityPolicy,
        Step::ProvisionLogging,
        Step::DeriveIdentity,
        Step::CreateCluster,
        Step::CreateTaskTemplate,
        Step::AttachContainer,
        Step::BindPorts,
        Step::AttachVolume,
        Step::AttachEnvironmentFile,
        Step::CreateService,
        Step::CreateLoadBalancer,
        Step::CreateDashboard,
        Step::AddMetrics,
    ];

    /// Get human-readable name for the step
    pub fn name(&self) -> &'static str {
        match self {
            Self::ResolveSubnet => "Resolve subnet",
            Self::BuildSecurityPolicy => "Build security policy",
            Self::ProvisionLogging => "Provision logging destination",
            Self::DeriveIdentity => "Derive identity principals",
            Self::CreateCluster => "Create scheduling cluster",
            Self::CreateTaskTemplate => "Create task template",
            Self::AttachContainer => "Attach container definition",
            Self::BindPorts => "Bind ports",
            Self::AttachVolume => "Attach persistent volume",
            Self::AttachEnvironmentFile => "Attach environment-file permissions",
            Self::CreateService => "Create service",
            Self::CreateLoadBalancer => "Create load balancer",
            Self::CreateDashboard => "Create dashboard",
            Self::AddMetrics => "Add metrics",
        }
    }

    /// 1-based position in the pipeline
    pub fn number(&self) -> usize {
        *self as usize + 1
    }

    /// Steps a specialization can hook into
    pub fn is_override_point(&self) -> bool {
        matches!(
            self,
            Self::BuildSecurityPolicy
                | Self::DeriveIdentity
                | Self::AttachContainer
                | Self::AddMetrics
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    /// Conditional step whose condition did not hold
    Skipped,
    Failed,
}

/// Result of a step execution
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: Step,
    pub status: StepStatus,
    pub duration: Duration,
    pub message: Option<String>,
}

impl StepResult {
    pub fn success(step: Step, duration: Duration) -> Self {
        Self {
            step,
            status: StepStatus::Success,
            duration,
            message: None,
        }
    }

    pub fn skipped(step: Step, duration: Duration, reason: impl Into<String>) -> Self {
        Self {
            step,
            status: StepStatus::Skipped,
            duration,
            message: Some(reason.into()),
        }
    }

    pub fn failure(step: Step, duration: Duration, message: impl Into<String>) -> Self {
        Self {
            step,
            status: StepStatus::Failed,
            duration,
            message: Some(message.into()),
        }
    }
}

/// Current phase of a composition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionPhase {
    Pending,
    InProgress(Step),
    Completed,
    Failed(Step),
}
