//! Shared top-level resources
//!
//! One base stack per deployment: the network boundary, the internal image
//! repository and every named shared volume. Server compositions borrow
//! from it; they never own these resources.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::image::RepositoryHandle;
use super::network::{Network, NetworkLayout};
use super::platform::PlatformContext;
use super::volume::{FileSystemVolume, VolumeRef};
use crate::error::NetworkError;

#[derive(Debug, Clone)]
pub struct BaseStack {
    pub name: String,
    pub context: PlatformContext,
    pub network: Arc<Network>,
    pub repository: RepositoryHandle,
    pub volumes: BTreeMap<String, FileSystemVolume>,
}

impl BaseStack {
    pub fn build(
        name: &str,
        ctx: &PlatformContext,
        layout: &NetworkLayout,
        repository: RepositoryHandle,
        volume_names: &[String],
    ) -> Result<Self, NetworkError> {
        let network = Network::build(&format!("{}Network", name), layout, ctx)?;

        let mut volumes = BTreeMap::new();
        for volume_name in volume_names {
            let volume = network.provision_volume(volume_name)?;
            volumes.insert(volume.name.clone(), volume);
        }

        Ok(Self {
            name: name.to_string(),
            context: ctx.clone(),
            network: Arc::new(network),
            repository,
            volumes,
        })
    }

    pub fn volume(&self, name: &str) -> Option<VolumeRef> {
        self.volumes.get(name).map(FileSystemVolume::reference)
    }

    /// Stack outputs, by name
    pub fn outputs(&self) -> BTreeMap<String, String> {
        let mut outputs = BTreeMap::new();
        outputs.insert("RepositoryUri".to_string(), self.repository.uri.clone());
        for volume in self.volumes.values() {
            outputs.insert(
                format!("{}FileSystemId", volume.name),
                volume.file_system_id.clone(),
            );
        }
        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(volumes: &[&str]) -> Result<BaseStack, NetworkError> {
        let ctx = PlatformContext::new("123456789012", "us-east-1");
        let repository = RepositoryHandle::new("minecraft", &ctx);
        let names: Vec<String> = volumes.iter().map(|v| v.to_string()).collect();
        BaseStack::build("Games", &ctx, &NetworkLayout::default(), repository, &names)
    }

    #[test]
    fn test_base_stack() {
        let stack = build(&["Minecraft", "Valheim"]).unwrap();
        assert_eq!(stack.network.name, "GamesNetwork");
        assert_eq!(stack.volumes.len(), 2);

        let volume = stack.volume("Minecraft").unwrap();
        assert_eq!(volume.security_scope, "MinecraftFileSystem");
        assert!(stack.volume("Missing").is_none());
    }

    #[test]
    fn test_outputs_expose_repository_uri() {
        let stack = build(&[]).unwrap();
        assert_eq!(
            stack.outputs()["RepositoryUri"],
            "123456789012.dkr.ecr.us-east-1.amazonaws.com/minecraft"
        );
    }

    #[test]
    fn test_empty_volume_name_rejected() {
        assert_eq!(build(&[" "]).unwrap_err(), NetworkError::EmptyVolumeName);
    }
}
