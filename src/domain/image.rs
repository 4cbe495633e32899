//! Container image sources

use serde::{Deserialize, Serialize};

use super::platform::{PlatformContext, RemovalPolicy};

/// Tag used when a repository image is referenced without one
pub const DEFAULT_TAG: &str = "latest";

/// An internally managed image repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryHandle {
    pub name: String,
    pub arn: String,
    pub uri: String,
    pub scan_on_push: bool,
    pub removal: RemovalPolicy,
}

impl RepositoryHandle {
    pub fn new(name: impl Into<String>, ctx: &PlatformContext) -> Self {
        let name = name.into();
        Self {
            arn: ctx.repository_arn(&name),
            uri: ctx.repository_uri(&name),
            name,
            scan_on_push: true,
            removal: RemovalPolicy::Destroy,
        }
    }

    /// Builder: toggle image scanning on push
    pub fn with_scan_on_push(mut self, enabled: bool) -> Self {
        self.scan_on_push = enabled;
        self
    }
}

/// Where the container image comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ImageRef {
    /// Public or third-party registry image, resolved at deploy time
    Registry { image: String },
    /// Internal repository plus optional tag
    Repository {
        repository: RepositoryHandle,
        tag: Option<String>,
    },
}

impl ImageRef {
    pub fn registry(image: impl Into<String>) -> Self {
        Self::Registry {
            image: image.into(),
        }
    }

    pub fn repository(repository: RepositoryHandle, tag: Option<String>) -> Self {
        Self::Repository { repository, tag }
    }

    /// Image string placed in the container definition
    pub fn image_uri(&self) -> String {
        match self {
            Self::Registry { image } => image.clone(),
            Self::Repository { repository, tag } => format!(
                "{}:{}",
                repository.uri,
                tag.as_deref().unwrap_or(DEFAULT_TAG)
            ),
        }
    }

    /// Repository ARN for internal images; external registries have none
    pub fn repository_arn(&self) -> Option<&str> {
        match self {
            Self::Registry { .. } => None,
            Self::Repository { repository, .. } => Some(&repository.arn),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Repository { .. })
    }
}
