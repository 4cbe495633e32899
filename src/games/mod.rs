//! Game specializations
//!
//! A specialization is a configuration value, not a pipeline of its own: it
//! parameterizes the server spec (image, sizing, traffic, probe, mounts,
//! environment) and hooks into individual steps through [`StepOverrides`].

pub mod crewlink;
pub mod minecraft;
pub mod valheim;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::composition::{Composer, ServerSpec, StepOverrides};
use crate::domain::container::ContainerOverrides;
use crate::domain::image::ImageRef;
use crate::domain::network::Network;
use crate::domain::platform::PlatformContext;
use crate::domain::service::SizingOverride;
use crate::domain::traffic::TrafficProfile;

pub use valheim::ValheimSettings;

/// Supported game types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Minecraft,
    Valheim,
    CrewLink,
}

impl GameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minecraft => "minecraft",
            Self::Valheim => "valheim",
            Self::CrewLink => "crewlink",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "minecraft" => Some(Self::Minecraft),
            "valheim" => Some(Self::Valheim),
            "crewlink" => Some(Self::CrewLink),
            _ => None,
        }
    }

    /// The image keeps state under extra paths that need a volume
    pub fn requires_volume(&self) -> bool {
        matches!(self, Self::Valheim)
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Game-specific defaults and step hooks
#[derive(Debug, Clone)]
pub struct Specialization {
    pub kind: GameKind,
    pub image: ImageRef,
    pub sizing: SizingOverride,
    pub traffic: TrafficProfile,
    /// Container paths backed by the server's volume, besides `/mnt/<name>`
    pub mount_paths: Vec<String>,
    /// Health probe, environment and other container fields
    pub container: ContainerOverrides,
    pub overrides: StepOverrides,
}

impl Specialization {
    /// Builder: replace the image source
    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.image = image;
        self
    }

    /// Builder: layer a sizing request over the game default
    pub fn with_sizing(mut self, sizing: SizingOverride) -> Self {
        self.sizing = self.sizing.merge(sizing);
        self
    }

    pub fn with_load_balancer(mut self, enabled: bool) -> Self {
        self.traffic = self.traffic.with_load_balancer(enabled);
        self
    }

    /// Builder: layer container overrides over the game defaults
    pub fn with_container(mut self, overrides: ContainerOverrides) -> Self {
        self.container = self.container.merge(overrides);
        self
    }

    /// Builder: delay health probes by `grace` after start
    pub fn with_probe_grace(mut self, grace: Duration) -> Self {
        self.container.health_check = self
            .container
            .health_check
            .take()
            .map(|probe| probe.with_start_period(grace));
        self
    }

    /// Server spec carrying this game's defaults
    pub fn server_spec(&self, name: impl Into<String>, network: Arc<Network>) -> ServerSpec {
        self.mount_paths.iter().fold(
            ServerSpec::new(name, network, self.image.clone(), self.traffic.clone())
                .with_sizing(self.sizing)
                .with_container(self.container.clone()),
            |spec, path| spec.with_mount_path(path.clone()),
        )
    }

    /// Composer wired with this game's step hooks
    pub fn composer(&self, ctx: &PlatformContext) -> Composer {
        Composer::new(ctx).with_overrides(self.overrides.clone())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::domain::network::NetworkLayout;

    pub fn ctx() -> PlatformContext {
        PlatformContext::new("123456789012", "us-east-1")
    }

    pub fn network() -> Arc<Network> {
        Arc::new(Network::build("GamesNetwork", &NetworkLayout::default(), &ctx()).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_kind_parsing() {
        assert_eq!(GameKind::from_str("CrewLink"), Some(GameKind::CrewLink));
        assert_eq!(GameKind::from_str("valheim"), Some(GameKind::Valheim));
        assert_eq!(GameKind::from_str("factorio"), None);
    }

    #[test]
    fn test_game_kind_serde() {
        let kind: GameKind = serde_yaml::from_str("crewlink").unwrap();
        assert_eq!(kind, GameKind::CrewLink);
        assert_eq!(serde_yaml::to_string(&GameKind::Minecraft).unwrap().trim(), "minecraft");
    }

    #[test]
    fn test_probe_grace_applies_to_game_probe() {
        let spec = crewlink::specialization().with_probe_grace(Duration::from_secs(90));
        let probe = spec.container.health_check.unwrap();
        assert_eq!(probe.start_period, Duration::from_secs(90));
        assert_eq!(probe.command.last().unwrap(), "curl --fail http://localhost:9736");
    }
}
