//! Infrastructure layer - resource graph and provisioning adapters
//!
//! Everything that leaves the process goes through here:
//! - Resource graph flattening and logical ids
//! - Provisioning platforms (manifest output)

pub mod graph;
pub mod platform;

pub use graph::{DeclaredResource, ResourceGraph, ResourceKind};
pub use platform::{ApplyReport, ApplyStatus, ManifestPlatform, ProvisioningPlatform};
