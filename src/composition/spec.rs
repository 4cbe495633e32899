//! Server composition input
//!
//! [`ServerSpec`] is what a caller or a game specialization hands to the
//! composer. It is validated once, at composition entry, into a
//! [`ValidatedSpec`]; pipeline steps only ever see the validated form.

use std::sync::Arc;

use crate::domain::container::{ContainerOverrides, EnvironmentSource};
use crate::domain::image::ImageRef;
use crate::domain::network::Network;
use crate::domain::service::{SizingOverride, StartMode};
use crate::domain::traffic::{ResolvedTraffic, TrafficProfile};
use crate::domain::volume::VolumeRef;
use crate::error::SpecError;

/// Longest accepted server name
pub const MAX_NAME_LENGTH: usize = 32;

/// Declarative input to a server composition
#[derive(Debug, Clone)]
pub struct ServerSpec {
    pub name: String,
    pub network: Arc<Network>,
    pub image: ImageRef,
    pub traffic: TrafficProfile,
    pub sizing: SizingOverride,
    pub volume: Option<VolumeRef>,
    pub environment_file: Option<EnvironmentSource>,
    pub container: ContainerOverrides,
    /// Extra container paths backed by the volume
    pub mount_paths: Vec<String>,
    pub start_mode: StartMode,
}

impl ServerSpec {
    pub fn new(
        name: impl Into<String>,
        network: Arc<Network>,
        image: ImageRef,
        traffic: TrafficProfile,
    ) -> Self {
        Self {
            name: name.into(),
            network,
            image,
            traffic,
            sizing: SizingOverride::default(),
            volume: None,
            environment_file: None,
            container: ContainerOverrides::default(),
            mount_paths: Vec::new(),
            start_mode: StartMode::default(),
        }
    }

    pub fn with_sizing(mut self, sizing: SizingOverride) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn with_volume(mut self, volume: VolumeRef) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_environment_file(mut self, source: EnvironmentSource) -> Self {
        self.environment_file = Some(source);
        self
    }

    /// Layer container overrides on top of any already set
    pub fn with_container(mut self, overrides: ContainerOverrides) -> Self {
        self.container = self.container.merge(overrides);
        self
    }

    pub fn with_mount_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !self.mount_paths.contains(&path) {
            self.mount_paths.push(path);
        }
        self
    }

    pub fn with_start_mode(mut self, start_mode: StartMode) -> Self {
        self.start_mode = start_mode;
        self
    }

    /// Check the server spec for inconsistencies before any step runs
    pub fn validate(&self) -> Result<ValidatedSpec, SpecError> {
        validate_server_name(&self.name)?;
        let traffic = self.traffic.resolve()?;

        for path in &self.mount_paths {
            if !path.starts_with('/') {
                return Err(SpecError::RelativeMountPath { path: path.clone() });
            }
            if self.volume.is_none() {
                return Err(SpecError::MountWithoutVolume { path: path.clone() });
            }
        }

        Ok(ValidatedSpec {
            name: self.name.clone(),
            lower_name: self.name.to_lowercase(),
            network: Arc::clone(&self.network),
            image: self.image.clone(),
            traffic,
            sizing: self.sizing,
            volume: self.volume.clone(),
            environment_file: self.environment_file.clone(),
            container: self.container.clone(),
            mount_paths: self.mount_paths.clone(),
            start_mode: self.start_mode,
        })
    }
}

/// A spec that passed entry validation
#[derive(Debug, Clone)]
pub struct ValidatedSpec {
    pub name: String,
    pub lower_name: String,
    pub network: Arc<Network>,
    pub image: ImageRef,
    pub traffic: ResolvedTraffic,
    /// Checked against platform limits by the task-template step
    pub sizing: SizingOverride,
    pub volume: Option<VolumeRef>,
    pub environment_file: Option<EnvironmentSource>,
    pub container: ContainerOverrides,
    pub mount_paths: Vec<String>,
    pub start_mode: StartMode,
}

/// Validate a server name
///
/// Server names become resource names, so they must:
/// - Not be empty
/// - Not exceed 32 characters
/// - Start with a letter
/// - Contain only alphanumerics and hyphens
pub fn validate_server_name(name: &str) -> Result<(), SpecError> {
    let invalid = |reason: String| SpecError::InvalidName {
        name: name.to_string(),
        reason,
    };

    let first = name.chars().next().ok_or(SpecError::EmptyName)?;

    if name.len() > MAX_NAME_LENGTH {
        return Err(invalid(format!(
            "exceeds maximum length ({} > {})",
            name.len(),
            MAX_NAME_LENGTH
        )));
    }

    if !first.is_ascii_alphabetic() {
        return Err(invalid(format!("must start with a letter, got: '{}'", first)));
    }

    let invalid_chars: Vec<char> = name
        .chars()
        .filter(|c| !c.is_ascii_alphanumeric() && *c != '-')
        .collect();
    if !invalid_chars.is_empty() {
        return Err(invalid(format!(
            "contains invalid characters: {:?} (allowed: a-z, A-Z, 0-9, -)",
            invalid_chars
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::network::NetworkLayout;
    use crate::domain::platform::PlatformContext;
    use crate::domain::traffic::{HealthCheckDecl, Protocol};

    fn network() -> Arc<Network> {
        let ctx = PlatformContext::new("123456789012", "us-east-1");
        Arc::new(Network::build("Games", &NetworkLayout::default(), &ctx).unwrap())
    }

    fn spec() -> ServerSpec {
        ServerSpec::new(
            "CrewLink",
            network(),
            ImageRef::registry("ottomated/crewlink-server"),
            TrafficProfile::new(9736, Protocol::Tcp),
        )
    }

    #[test]
    fn test_valid_spec() {
        let validated = spec().validate().unwrap();
        assert_eq!(validated.lower_name, "crewlink");
        assert_eq!(validated.traffic.health_check_port(), 9736);
    }

    #[test]
    fn test_name_validation() {
        assert_eq!(validate_server_name(""), Err(SpecError::EmptyName));
        assert!(validate_server_name("Minecraft").is_ok());
        assert!(validate_server_name("among-us-2").is_ok());
        assert!(validate_server_name("2fast").is_err());
        assert!(validate_server_name("has space").is_err());
        assert!(validate_server_name(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_health_check_without_protocol_rejected() {
        let mut spec = spec();
        spec.traffic.health_check = Some(HealthCheckDecl {
            port: 8443,
            protocol: None,
        });
        assert_eq!(
            spec.validate().unwrap_err(),
            SpecError::HealthCheckProtocolMissing { port: 8443 }
        );
    }

    #[test]
    fn test_mount_path_requires_volume() {
        let err = spec().with_mount_path("/config").validate().unwrap_err();
        assert_eq!(
            err,
            SpecError::MountWithoutVolume {
                path: "/config".to_string()
            }
        );
    }

    #[test]
    fn test_mount_path_must_be_absolute() {
        let err = spec()
            .with_volume(VolumeRef::new("Valheim", "fs-1", "ValheimFileSystem"))
            .with_mount_path("config")
            .validate()
            .unwrap_err();
        assert!(matches!(err, SpecError::RelativeMountPath { .. }));
    }

    #[test]
    fn test_container_overrides_layer() {
        let spec = spec()
            .with_container(ContainerOverrides::default().with_env("A", "1").with_env("B", "1"))
            .with_container(ContainerOverrides::default().with_env("B", "2"));
        assert_eq!(spec.container.environment["A"], "1");
        assert_eq!(spec.container.environment["B"], "2");
    }
}
