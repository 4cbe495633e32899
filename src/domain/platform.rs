//! Account/region context and identifier helpers
//!
//! All ARN-like identifiers declared by a composition are derived here so
//! that every module formats them the same way.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Principal the container platform assumes when running tasks
pub const TASK_SERVICE_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Account and region a stack is declared into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformContext {
    pub account: String,
    pub region: String,
}

impl PlatformContext {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    /// Log destination ARN, covering every stream in the group
    pub fn log_destination_arn(&self, name: &str) -> String {
        format!(
            "arn:aws:logs:{}:{}:log-group:{}:*",
            self.region, self.account, name
        )
    }

    /// Image repository ARN
    pub fn repository_arn(&self, name: &str) -> String {
        format!(
            "arn:aws:ecr:{}:{}:repository/{}",
            self.region, self.account, name
        )
    }

    /// Image repository URI used in container definitions
    pub fn repository_uri(&self, name: &str) -> String {
        format!("{}.dkr.ecr.{}.amazonaws.com/{}", self.account, self.region, name)
    }

    /// Availability zone name for a zero-based index (a, b, c, ...)
    pub fn availability_zone(&self, index: u8) -> String {
        let letter = (b'a' + index) as char;
        format!("{}{}", self.region, letter)
    }
}

/// What happens to a resource when its stack is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

/// First 8 hex digits of the SHA-256 of `input`.
/// Stable across runs, used for declared ids and logical ids.
pub fn short_hash(input: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(input.as_bytes()));
    digest[..8].to_uppercase()
}
