//! Container definition domain types
//!
//! The base pipeline builds a default definition (image, log binding,
//! essential flag) and merges specialization overrides on top of it.
//! On conflict the override wins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::traffic::{PortBinding, Protocol};
use crate::error::SpecError;

/// Name of the single container in every task template
pub const CONTAINER_NAME: &str = "Container";

/// Prefix of mount paths derived from the service name
pub const MOUNT_ROOT: &str = "/mnt";

/// Serialize durations as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

mod option_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

/// Container health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthProbe {
    pub command: Vec<String>,
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub retries: u32,
    /// Grace period before failed probes count against the container
    #[serde(with = "duration_secs")]
    pub start_period: Duration,
}

impl HealthProbe {
    /// Probe running `command` through the container shell
    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            command: vec!["CMD-SHELL".to_string(), command.into()],
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            retries: 3,
            start_period: Duration::ZERO,
        }
    }

    /// Default HTTP probe against a local port
    pub fn http(port: u16) -> Self {
        Self::shell(format!("curl -f http://localhost:{}", port))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_start_period(mut self, start_period: Duration) -> Self {
        self.start_period = start_period;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: Protocol,
}

impl From<PortBinding> for PortMapping {
    fn from(binding: PortBinding) -> Self {
        Self {
            container_port: binding.port,
            host_port: binding.port,
            protocol: binding.protocol,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPoint {
    pub source_volume: String,
    pub container_path: String,
    pub read_only: bool,
}

/// Where the container ships its logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBinding {
    pub log_destination: String,
    pub stream_prefix: String,
}

/// External object holding environment data for the container
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentSource {
    pub bucket: String,
    pub key: String,
}

impl EnvironmentSource {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse `s3://bucket/key`
    pub fn parse(location: &str) -> Result<Self, SpecError> {
        let invalid = || SpecError::InvalidEnvironmentSource {
            source_ref: location.to_string(),
        };

        let rest = location.strip_prefix("s3://").ok_or_else(invalid)?;
        let (bucket, key) = rest.split_once('/').ok_or_else(invalid)?;
        if bucket.is_empty() || key.is_empty() || key.ends_with('/') {
            return Err(invalid());
        }

        Ok(Self::new(bucket, key))
    }

    /// ARN of exactly this object
    pub fn object_arn(&self) -> String {
        format!("arn:aws:s3:::{}/{}", self.bucket, self.key)
    }
}

/// Fields a specialization (or the caller) sets on top of the defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerOverrides {
    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub health_check: Option<HealthProbe>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    #[serde(default)]
    pub environment_file: Option<EnvironmentSource>,

    #[serde(default, with = "option_duration_secs")]
    pub stop_timeout: Option<Duration>,

    #[serde(default)]
    pub essential: Option<bool>,

    /// Any other container-definition field, by name
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ContainerOverrides {
    pub fn with_health_check(mut self, probe: HealthProbe) -> Self {
        self.health_check = Some(probe);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }

    pub fn with_extra(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(field.into(), value);
        self
    }

    /// Layer `other` on top of `self`; `other` wins on conflict
    pub fn merge(mut self, other: ContainerOverrides) -> Self {
        if other.image.is_some() {
            self.image = other.image;
        }
        if other.health_check.is_some() {
            self.health_check = other.health_check;
        }
        self.environment.extend(other.environment);
        if other.environment_file.is_some() {
            self.environment_file = other.environment_file;
        }
        if other.stop_timeout.is_some() {
            self.stop_timeout = other.stop_timeout;
        }
        if other.essential.is_some() {
            self.essential = other.essential;
        }
        self.extra.extend(other.extra);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub logging: LogBinding,
    pub essential: bool,
    pub environment: BTreeMap<String, String>,
    pub environment_files: Vec<EnvironmentSource>,
    pub health_check: Option<HealthProbe>,
    pub port_mappings: Vec<PortMapping>,
    pub mount_points: Vec<MountPoint>,
    #[serde(with = "option_duration_secs")]
    pub stop_timeout: Option<Duration>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ContainerDefinition {
    pub fn new(image: impl Into<String>, logging: LogBinding) -> Self {
        Self {
            name: CONTAINER_NAME.to_string(),
            image: image.into(),
            logging,
            essential: true,
            environment: BTreeMap::new(),
            environment_files: Vec::new(),
            health_check: None,
            port_mappings: Vec::new(),
            mount_points: Vec::new(),
            stop_timeout: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_environment_file(mut self, source: EnvironmentSource) -> Self {
        if !self.environment_files.contains(&source) {
            self.environment_files.push(source);
        }
        self
    }

    /// Merge overrides on top of the current values
    pub fn apply_overrides(mut self, overrides: &ContainerOverrides) -> Self {
        if let Some(image) = &overrides.image {
            self.image = image.clone();
        }
        if let Some(probe) = &overrides.health_check {
            self.health_check = Some(probe.clone());
        }
        self.environment.extend(
            overrides
                .environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        if let Some(source) = &overrides.environment_file {
            self = self.with_environment_file(source.clone());
        }
        if let Some(timeout) = overrides.stop_timeout {
            self.stop_timeout = Some(timeout);
        }
        if let Some(essential) = overrides.essential {
            self.essential = essential;
        }
        self.extra.extend(
            overrides
                .extra
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        self
    }

    /// Add a port mapping unless the same port/protocol is already mapped
    pub fn with_port_mapping(mut self, mapping: PortMapping) -> Self {
        let exists = self.port_mappings.iter().any(|m| {
            m.container_port == mapping.container_port && m.protocol == mapping.protocol
        });
        if !exists {
            self.port_mappings.push(mapping);
        }
        self
    }

    /// Mount a task volume, once per container path
    pub fn with_mount_point(mut self, mount: MountPoint) -> Self {
        if !self
            .mount_points
            .iter()
            .any(|m| m.container_path == mount.container_path)
        {
            self.mount_points.push(mount);
        }
        self
    }

    pub fn references_environment_file(&self) -> bool {
        !self.environment_files.is_empty()
    }
}

/// Mount path derived from a service name: `/mnt/<name lower-cased>`
pub fn service_mount_path(service_name: &str) -> String {
    format!("{}/{}", MOUNT_ROOT, service_name.to_lowercase())
}
