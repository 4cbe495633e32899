//! Provisioning platforms
//!
//! A platform takes a resource graph and makes it real. The only one shipped
//! here writes the graph as a JSON manifest, for a deployment engine to pick
//! up.

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::graph::ResourceGraph;
use crate::error::PlatformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    Created,
    Updated,
    Unchanged,
}

impl ApplyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for ApplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub stack: String,
    pub location: PathBuf,
    pub digest: String,
    pub resources: usize,
    pub status: ApplyStatus,
}

/// Makes a resource graph real
#[async_trait]
pub trait ProvisioningPlatform: Send + Sync {
    /// Apply `graph`; applying an unchanged graph again is a no-op
    async fn apply(&self, graph: &ResourceGraph) -> Result<ApplyReport, PlatformError>;
}

/// Writes `{stack}.json` into an output directory
pub struct ManifestPlatform {
    out_dir: PathBuf,
}

impl ManifestPlatform {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn manifest_path(&self, stack: &str) -> PathBuf {
        self.out_dir.join(format!("{}.json", stack))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PlatformError {
    PlatformError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl ProvisioningPlatform for ManifestPlatform {
    async fn apply(&self, graph: &ResourceGraph) -> Result<ApplyReport, PlatformError> {
        let path = self.manifest_path(&graph.stack);
        let manifest = graph.to_json()?;
        let digest = format!("{:x}", Sha256::digest(&manifest));

        let previous = match tokio::fs::read(&path).await {
            Ok(bytes) => Some(format!("{:x}", Sha256::digest(&bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(io_error(&path, e)),
        };

        let status = match previous {
            Some(existing) if existing == digest => {
                debug!("{} unchanged ({})", path.display(), &digest[..12]);
                ApplyStatus::Unchanged
            }
            previous => {
                tokio::fs::create_dir_all(&self.out_dir)
                    .await
                    .map_err(|e| io_error(&self.out_dir, e))?;
                tokio::fs::write(&path, &manifest)
                    .await
                    .map_err(|e| io_error(&path, e))?;
                if previous.is_some() {
                    ApplyStatus::Updated
                } else {
                    ApplyStatus::Created
                }
            }
        };

        info!(
            "Applied {} ({} resources): {}",
            graph.stack,
            graph.len(),
            status
        );

        Ok(ApplyReport {
            stack: graph.stack.clone(),
            location: path,
            digest,
            resources: graph.len(),
            status,
        })
    }
}
