//! Per-server configuration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::composition::spec::validate_server_name;
use crate::domain::container::{ContainerOverrides, EnvironmentSource};
use crate::domain::service::{SizingOverride, StartMode};
use crate::error::ConfigError;
use crate::games::{GameKind, ValheimSettings};

/// Where a server's image comes from, overriding the game default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageConfig {
    /// Public registry image, e.g. `itzg/minecraft-server`
    Registry(String),
    /// The stack's internal repository
    Repository {
        #[serde(default)]
        tag: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,

    pub game: GameKind,

    #[serde(default)]
    pub image: Option<ImageConfig>,

    #[serde(default)]
    pub sizing: Option<SizingOverride>,

    /// Name of a volume declared under `volumes`
    #[serde(default)]
    pub volume: Option<String>,

    /// `s3://bucket/key` holding extra environment data
    #[serde(default)]
    pub environment_file: Option<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Overrides the game's load balancer default
    #[serde(default)]
    pub create_load_balancer: Option<bool>,

    #[serde(default)]
    pub start_mode: StartMode,

    /// Grace period before health probes count, e.g. "5m"
    #[serde(default)]
    pub health_check_grace: Option<String>,

    /// Time the container gets to stop cleanly, e.g. "2m"
    #[serde(default)]
    pub stop_timeout: Option<String>,

    /// Required for `game: valheim`
    #[serde(default)]
    pub valheim: Option<ValheimSettings>,
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: format!("{} ({})", value, e),
    })
}

impl ServerConfig {
    /// Field path used in error messages
    fn field(&self, name: &str) -> String {
        format!("servers.{}.{}", self.name, name)
    }

    pub fn health_check_grace(&self) -> Result<Option<Duration>, ConfigError> {
        self.health_check_grace
            .as_deref()
            .map(|v| parse_duration(&self.field("health_check_grace"), v))
            .transpose()
    }

    pub fn stop_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        self.stop_timeout
            .as_deref()
            .map(|v| parse_duration(&self.field("stop_timeout"), v))
            .transpose()
    }

    pub fn environment_source(&self) -> Result<Option<EnvironmentSource>, ConfigError> {
        self.environment_file
            .as_deref()
            .map(|location| {
                EnvironmentSource::parse(location).map_err(|e| ConfigError::InvalidValue {
                    field: self.field("environment_file"),
                    value: e.to_string(),
                })
            })
            .transpose()
    }

    /// Container fields set directly in the file; the probe grace only
    /// takes effect on top of the game's probe
    pub fn container_overrides(&self) -> Result<ContainerOverrides, ConfigError> {
        let mut overrides = ContainerOverrides {
            environment: self.environment.clone(),
            ..ContainerOverrides::default()
        };
        if let Some(timeout) = self.stop_timeout()? {
            overrides = overrides.with_stop_timeout(timeout);
        }
        Ok(overrides)
    }

    pub fn validate(&self, volumes: &BTreeSet<&str>) -> Result<(), ConfigError> {
        validate_server_name(&self.name).map_err(|e| ConfigError::InvalidValue {
            field: "servers.name".to_string(),
            value: e.to_string(),
        })?;

        match &self.volume {
            Some(volume) if !volumes.contains(volume.as_str()) => {
                return Err(ConfigError::InvalidValue {
                    field: self.field("volume"),
                    value: format!("'{}' is not declared under volumes", volume),
                });
            }
            None if self.game.requires_volume() => {
                return Err(ConfigError::MissingField {
                    field: self.field("volume"),
                });
            }
            _ => {}
        }

        if let Some(sizing) = &self.sizing {
            sizing.resolve().map_err(|e| ConfigError::InvalidValue {
                field: self.field("sizing"),
                value: e.to_string(),
            })?;
        }

        self.environment_source()?;
        self.health_check_grace()?;
        self.stop_timeout()?;

        match (self.game, &self.valheim) {
            (GameKind::Valheim, None) => Err(ConfigError::MissingField {
                field: self.field("valheim"),
            }),
            (GameKind::Valheim, Some(settings)) => {
                settings.validate().map_err(|e| ConfigError::InvalidValue {
                    field: self.field("valheim"),
                    value: e.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ServerConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn volumes() -> BTreeSet<&'static str> {
        ["Minecraft", "Valheim"].into_iter().collect()
    }

    #[test]
    fn test_image_config() {
        let server = parse("name: Minecraft\ngame: minecraft\nimage:\n  registry: itzg/minecraft-server\n");
        assert_eq!(
            server.image,
            Some(ImageConfig::Registry("itzg/minecraft-server".to_string()))
        );

        let server = parse("name: Minecraft\ngame: minecraft\nimage:\n  repository:\n    tag: \"1.20\"\n");
        assert_eq!(
            server.image,
            Some(ImageConfig::Repository {
                tag: Some("1.20".to_string())
            })
        );
    }

    #[test]
    fn test_durations() {
        let server = parse("name: Minecraft\ngame: minecraft\nhealth_check_grace: 10m\nstop_timeout: 90s\n");
        assert_eq!(server.health_check_grace().unwrap(), Some(Duration::from_secs(600)));
        assert_eq!(
            server.container_overrides().unwrap().stop_timeout,
            Some(Duration::from_secs(90))
        );

        let server = parse("name: Minecraft\ngame: minecraft\nstop_timeout: soon\n");
        assert!(server.validate(&volumes()).is_err());
    }

    #[test]
    fn test_unknown_volume_rejected() {
        let server = parse("name: Minecraft\ngame: minecraft\nvolume: Missing\n");
        assert!(matches!(
            server.validate(&volumes()),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "servers.Minecraft.volume"
        ));
    }

    #[test]
    fn test_valheim_requires_settings() {
        let server = parse("name: Valheim\ngame: valheim\nvolume: Valheim\n");
        assert!(matches!(server.validate(&volumes()), Err(ConfigError::MissingField { .. })));

        let server = parse(
            "name: Valheim\ngame: valheim\nvolume: Valheim\nvalheim:\n  server_name: Vikings\n  world_name: Midgard\n  server_pass: abc\n",
        );
        assert!(server.validate(&volumes()).is_err());
    }

    #[test]
    fn test_valheim_requires_volume() {
        let server = parse(
            "name: Valheim\ngame: valheim\nvalheim:\n  server_name: Vikings\n  world_name: Midgard\n  server_pass: secret123\n",
        );
        assert!(matches!(
            server.validate(&volumes()),
            Err(ConfigError::MissingField { ref field }) if field == "servers.Valheim.volume"
        ));

        let server = parse("name: CrewLink\ngame: crewlink\n");
        assert!(server.validate(&volumes()).is_ok());
    }

    #[test]
    fn test_environment_file() {
        let server = parse("name: CrewLink\ngame: crewlink\nenvironment_file: s3://config/crewlink.env\n");
        let source = server.environment_source().unwrap().unwrap();
        assert_eq!(source.bucket, "config");
        assert_eq!(source.key, "crewlink.env");

        let server = parse("name: CrewLink\ngame: crewlink\nenvironment_file: config/crewlink.env\n");
        assert!(server.validate(&volumes()).is_err());
    }

    #[test]
    fn test_invalid_sizing_rejected() {
        let server = parse("name: CrewLink\ngame: crewlink\nsizing:\n  cpu: 300\n");
        assert!(server.validate(&volumes()).is_err());
    }

    #[test]
    fn test_start_mode() {
        let server = parse("name: CrewLink\ngame: crewlink\nstart_mode: parked\n");
        assert_eq!(server.start_mode, StartMode::Parked);
        assert_eq!(parse("name: CrewLink\ngame: crewlink\n").start_mode, StartMode::Running);
    }
}
