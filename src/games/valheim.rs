//! Valheim: UDP game server with an HTTP status endpoint

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GameKind, Specialization};
use crate::composition::StepOverrides;
use crate::domain::container::{ContainerOverrides, HealthProbe};
use crate::domain::image::ImageRef;
use crate::domain::security::{Peer, PortRange, SecurityPolicy};
use crate::domain::service::SizingOverride;
use crate::domain::traffic::{Protocol, TrafficProfile};
use crate::error::SpecError;

pub const IMAGE: &str = "lloesche/valheim-server";
pub const GAME_PORT: u16 = 2456;
pub const STATUS_PORT: u16 = 80;
pub const MIN_PASSWORD_LENGTH: usize = 5;
pub const STOP_TIMEOUT: Duration = Duration::from_secs(120);
pub const MOUNT_PATHS: &[&str] = &["/config", "/opt/valheim"];

/// Server browser and world settings passed to the image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValheimSettings {
    pub server_name: String,
    pub world_name: String,
    pub server_pass: String,

    #[serde(default = "default_server_public")]
    pub server_public: bool,
}

fn default_server_public() -> bool {
    true
}

impl ValheimSettings {
    pub fn validate(&self) -> Result<(), SpecError> {
        let invalid = |field: &str, reason: &str| SpecError::InvalidGameSetting {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if self.server_name.trim().is_empty() {
            return Err(invalid("server_name", "cannot be empty"));
        }
        if self.world_name.trim().is_empty() {
            return Err(invalid("world_name", "cannot be empty"));
        }
        if self.server_pass.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(invalid("server_pass", "must be at least 5 characters"));
        }
        Ok(())
    }
}

pub fn specialization(settings: &ValheimSettings) -> Result<Specialization, SpecError> {
    settings.validate()?;

    let probe = HealthProbe::shell("curl -f http://localhost/status.json")
        .with_interval(Duration::from_secs(60));

    let container = ContainerOverrides::default()
        .with_health_check(probe)
        .with_stop_timeout(STOP_TIMEOUT)
        .with_env("SERVER_NAME", &settings.server_name)
        .with_env("WORLD_NAME", &settings.world_name)
        .with_env("SERVER_PASS", &settings.server_pass)
        .with_env("SERVER_PUBLIC", settings.server_public.to_string())
        .with_env("STATUS_HTTP", "true");

    Ok(Specialization {
        kind: GameKind::Valheim,
        image: ImageRef::registry(IMAGE),
        sizing: SizingOverride::new(2048, 4096),
        traffic: TrafficProfile::new(GAME_PORT, Protocol::Udp)
            .with_health_check(STATUS_PORT, Protocol::Tcp),
        mount_paths: MOUNT_PATHS.iter().map(|p| p.to_string()).collect(),
        container,
        overrides: StepOverrides::new().with_security_policy(extra_rules),
    })
}

fn extra_rules(policy: SecurityPolicy) -> SecurityPolicy {
    policy
        .with_ingress(
            Peer::AnyIpv4,
            Protocol::Udp,
            PortRange::range(GAME_PORT, GAME_PORT + 1),
            "Valheim query ports",
        )
        .with_egress(
            Peer::AnyIpv4,
            Protocol::Tcp,
            PortRange::single(80),
            "Steam downloads during container startup",
        )
}
