//! Persistent volume domain types

use serde::{Deserialize, Serialize};

use super::platform::RemovalPolicy;
use super::security::{Peer, SecurityPolicy};

/// Days before files move to infrequent-access storage
pub const INFREQUENT_ACCESS_AFTER_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub name: String,
}

/// A shared network file system plus the policy restricting who may mount it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemVolume {
    pub name: String,
    /// Declared file-system id, resolved by the provisioning platform
    pub file_system_id: String,
    pub network: String,
    pub automatic_backups: bool,
    pub infrequent_access_after_days: u32,
    pub removal: RemovalPolicy,
    pub access_points: Vec<AccessPoint>,
    pub security_policy: SecurityPolicy,
}

impl FileSystemVolume {
    /// Reference handed to server specs
    pub fn reference(&self) -> VolumeRef {
        VolumeRef {
            name: self.name.clone(),
            file_system_id: self.file_system_id.clone(),
            security_scope: self.security_policy.name.clone(),
        }
    }
}

/// What a composition needs to know about an external volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRef {
    pub name: String,
    pub file_system_id: String,
    /// Name of the security policy guarding the volume
    pub security_scope: String,
}

impl VolumeRef {
    pub fn new(
        name: impl Into<String>,
        file_system_id: impl Into<String>,
        security_scope: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            file_system_id: file_system_id.into(),
            security_scope: security_scope.into(),
        }
    }

    /// Peer to use in security rules targeting the volume
    pub fn peer(&self) -> Peer {
        Peer::Policy(self.security_scope.clone())
    }
}
