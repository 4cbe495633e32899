//! # Deployment Configuration
//!
//! One YAML file describes a whole deployment: the stack's account and
//! region, network layout, internal repository, shared volumes and every
//! game server.
//!
//! ## Example
//!
//! ```yaml
//! name: Games
//! account: "123456789012"
//! region: us-east-1
//! volumes: [Minecraft]
//! servers:
//!   - name: Minecraft
//!     game: minecraft
//!     volume: Minecraft
//!   - name: CrewLink
//!     game: crewlink
//!     start_mode: parked
//! ```
//!
//! `GAMESTACK_ACCOUNT` and `GAMESTACK_REGION` (or `AWS_REGION`) override
//! the file.

mod deployment;
mod server;

pub use deployment::{DeploymentConfig, NetworkConfig, RepositoryConfig};
pub use server::{ImageConfig, ServerConfig};

use anyhow::{Context, Result};
use std::path::Path;

use crate::error::ConfigError;

/// Load, override from the environment and validate a deployment file
pub fn load_config(path: &Path) -> Result<DeploymentConfig> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut config = DeploymentConfig::from_yaml(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config.apply_env_overrides(|key| std::env::var(key).ok());

    config
        .validate()
        .with_context(|| format!("Invalid deployment config {}", path.display()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: Games\naccount: \"123456789012\"\nvolumes: [Minecraft]").unwrap();
        writeln!(file, "servers:\n  - name: Minecraft\n    game: minecraft\n    volume: Minecraft").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.name, "Games");
        assert_eq!(config.servers[0].volume.as_deref(), Some("Minecraft"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/deploy.yaml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: Games\naccount: \"123456789012\"\nservers:\n  - name: X\n    game: factorio").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }
}
