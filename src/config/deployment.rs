//! Top-level deployment file: account, network, shared resources, servers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::server::ServerConfig;
use crate::composition::spec::validate_server_name;
use crate::domain::network::NetworkLayout;
use crate::domain::platform::PlatformContext;
use crate::error::ConfigError;

/// Network address layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_cidr")]
    pub cidr: String,

    /// Availability zones to spread subnets over
    #[serde(default = "default_max_azs")]
    pub max_azs: u8,

    /// Prefix length of every subnet
    #[serde(default = "default_subnet_mask")]
    pub subnet_mask: u8,
}

fn default_cidr() -> String {
    "10.0.1.0/24".to_string()
}

fn default_max_azs() -> u8 {
    1
}

fn default_subnet_mask() -> u8 {
    28
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: default_cidr(),
            max_azs: default_max_azs(),
            subnet_mask: default_subnet_mask(),
        }
    }
}

impl NetworkConfig {
    pub fn layout(&self) -> NetworkLayout {
        NetworkLayout {
            cidr: self.cidr.clone(),
            max_azs: self.max_azs,
            subnet_mask: self.subnet_mask,
        }
    }
}

/// Internal image repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_repository_name")]
    pub name: String,

    #[serde(default = "default_scan_on_push")]
    pub scan_on_push: bool,
}

fn default_repository_name() -> String {
    "minecraft".to_string()
}

fn default_scan_on_push() -> bool {
    true
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            name: default_repository_name(),
            scan_on_push: default_scan_on_push(),
        }
    }
}

/// Complete deployment file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Stack name; prefixes shared resources
    pub name: String,

    /// Account id, may come from `GAMESTACK_ACCOUNT` instead
    #[serde(default)]
    pub account: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Shared file systems to provision, by name
    #[serde(default)]
    pub volumes: Vec<String>,

    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl DeploymentConfig {
    /// Parse a deployment file without validating it
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// `GAMESTACK_ACCOUNT` replaces the account; `GAMESTACK_REGION`, falling
    /// back to `AWS_REGION`, replaces the region.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(account) = lookup("GAMESTACK_ACCOUNT").filter(|v| !v.is_empty()) {
            self.account = Some(account);
        }
        if let Some(region) = lookup("GAMESTACK_REGION")
            .or_else(|| lookup("AWS_REGION"))
            .filter(|v| !v.is_empty())
        {
            self.region = region;
        }
    }

    /// Platform context for the configured account and region
    pub fn platform_context(&self) -> Result<PlatformContext, ConfigError> {
        let account = self
            .account
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField {
                field: "account".to_string(),
            })?;
        Ok(PlatformContext::new(account, &self.region))
    }

    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Validate the whole file
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server_name(&self.name).map_err(|e| ConfigError::InvalidValue {
            field: "name".to_string(),
            value: e.to_string(),
        })?;

        match self.account.as_deref() {
            None => {
                return Err(ConfigError::MissingField {
                    field: "account".to_string(),
                })
            }
            Some(account) if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) => {
                return Err(ConfigError::InvalidValue {
                    field: "account".to_string(),
                    value: account.to_string(),
                });
            }
            Some(_) => {}
        }

        if self.region.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "region".to_string(),
            });
        }

        if self.repository.name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "repository.name".to_string(),
            });
        }

        let mut volumes = BTreeSet::new();
        for volume in &self.volumes {
            if !volumes.insert(volume.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "volumes".to_string(),
                    value: format!("duplicate volume '{}'", volume),
                });
            }
        }

        let mut names = BTreeSet::new();
        for server in &self.servers {
            if !names.insert(server.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "servers".to_string(),
                    value: format!("duplicate server '{}'", server.name),
                });
            }
            server.validate(&volumes)?;
        }

        Ok(())
    }
}
