//! Identity principal domain types
//!
//! Two principals back every composition:
//! - the telemetry principal, assumed by the running game container
//! - the execution principal, used by the platform to pull the image and
//!   ship logs
//!
//! Capabilities are append-only. There is no revocation; a narrower scope
//! means building a fresh principal.

use serde::{Deserialize, Serialize};

use super::platform::TASK_SERVICE_PRINCIPAL;

pub const PUT_METRIC_DATA: &str = "cloudwatch:PutMetricData";
pub const CREATE_LOG_STREAM: &str = "logs:CreateLogStream";
pub const PUT_LOG_EVENTS: &str = "logs:PutLogEvents";
pub const IMAGE_READ_ACTIONS: &[&str] = &[
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
];
pub const REGISTRY_AUTH: &str = "ecr:GetAuthorizationToken";
pub const READ_OBJECT: &str = "s3:GetObject";

/// Resource a capability applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ResourceScope {
    /// `*`
    Any,
    Arn(String),
}

impl ResourceScope {
    pub fn arn(arn: impl Into<String>) -> Self {
        Self::Arn(arn.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => "*",
            Self::Arn(arn) => arn,
        }
    }

    pub fn covers(&self, resource: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Arn(arn) => arn == resource,
        }
    }
}

impl From<ResourceScope> for String {
    fn from(scope: ResourceScope) -> Self {
        scope.as_str().to_string()
    }
}

impl From<String> for ResourceScope {
    fn from(value: String) -> Self {
        if value == "*" {
            Self::Any
        } else {
            Self::Arn(value)
        }
    }
}

/// A set of allowed actions over a set of resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub actions: Vec<String>,
    pub resources: Vec<ResourceScope>,
}

impl Capability {
    pub fn new(actions: &[&str], resource: ResourceScope) -> Self {
        Self {
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources: vec![resource],
        }
    }

    pub fn allows(&self, action: &str, resource: &str) -> bool {
        self.actions.iter().any(|a| a == action)
            && self.resources.iter().any(|scope| scope.covers(resource))
    }
}

/// A named permission holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPrincipal {
    pub name: String,
    pub description: String,
    pub assumed_by: String,
    grants: Vec<Capability>,
}

impl IdentityPrincipal {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            assumed_by: TASK_SERVICE_PRINCIPAL.to_string(),
            grants: Vec::new(),
        }
    }

    /// Add a capability. Identical grants are recorded once.
    pub fn grant(mut self, capability: Capability) -> Self {
        if !self.grants.contains(&capability) {
            self.grants.push(capability);
        }
        self
    }

    pub fn grants(&self) -> &[Capability] {
        &self.grants
    }

    pub fn can(&self, action: &str, resource: &str) -> bool {
        self.grants.iter().any(|grant| grant.allows(action, resource))
    }

    /// Every scope under which `action` is granted
    pub fn scopes_for(&self, action: &str) -> Vec<&ResourceScope> {
        self.grants
            .iter()
            .filter(|grant| grant.actions.iter().any(|a| a == action))
            .flat_map(|grant| grant.resources.iter())
            .collect()
    }

    /// Whether every grant of `base` is still held
    pub fn extends(&self, base: &IdentityPrincipal) -> bool {
        self.name == base.name && base.grants.iter().all(|grant| self.grants.contains(grant))
    }
}

/// The two principals of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRoles {
    pub telemetry: IdentityPrincipal,
    pub execution: IdentityPrincipal,
}

impl IdentityRoles {
    /// Derive both principals for a deployment.
    ///
    /// `repository_arn` is set only when the image lives in an internal
    /// repository; external registries get an unscoped image-read grant.
    pub fn derive(deployment: &str, log_destination_arn: &str, repository_arn: Option<&str>) -> Self {
        Self {
            telemetry: telemetry_principal(deployment),
            execution: execution_principal(deployment, log_destination_arn, repository_arn),
        }
    }
}

/// Principal allowed to publish custom metrics
pub fn telemetry_principal(deployment: &str) -> IdentityPrincipal {
    IdentityPrincipal::new(format!("{}TaskRole", deployment), "Write metrics").grant(
        Capability::new(&[PUT_METRIC_DATA], ResourceScope::Any),
    )
}

/// Principal allowed to pull the image and write logs
pub fn execution_principal(
    deployment: &str,
    log_destination_arn: &str,
    repository_arn: Option<&str>,
) -> IdentityPrincipal {
    let image_scope = repository_arn
        .map(ResourceScope::arn)
        .unwrap_or(ResourceScope::Any);

    IdentityPrincipal::new(
        format!("{}TaskExecutionRole", deployment),
        "Read container images and write logs",
    )
    .grant(Capability::new(
        &[CREATE_LOG_STREAM, PUT_LOG_EVENTS],
        ResourceScope::arn(log_destination_arn),
    ))
    .grant(Capability::new(IMAGE_READ_ACTIONS, image_scope))
    // Registry auth tokens cannot be scoped to a resource
    .grant(Capability::new(&[REGISTRY_AUTH], ResourceScope::Any))
}
