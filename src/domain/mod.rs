//! Domain layer for gamestack
//!
//! Pure declaration types with no I/O. Every value here is built once by
//! the composition pipeline and never mutated afterwards; builders return
//! augmented copies.

pub mod container;
pub mod dashboard;
pub mod identity;
pub mod image;
pub mod load_balancer;
pub mod network;
pub mod platform;
pub mod security;
pub mod service;
pub mod stack;
pub mod traffic;
pub mod volume;

pub use container::{
    ContainerDefinition, ContainerOverrides, EnvironmentSource, HealthProbe, LogBinding,
    MountPoint, PortMapping,
};
pub use dashboard::{Dashboard, GraphPanel, Metric, YAxis};
pub use identity::{Capability, IdentityPrincipal, IdentityRoles, ResourceScope};
pub use image::{ImageRef, RepositoryHandle};
pub use load_balancer::{LoadBalancer, LoadBalancerEndpoint, Listener, TargetGroup};
pub use network::{Network, NetworkLayout, SubnetSelection};
pub use platform::{PlatformContext, RemovalPolicy};
pub use security::{Direction, Peer, PortRange, SecurityPolicy, SecurityRule};
pub use service::{
    Cluster, DeploymentPolicy, LogDestination, ServiceDescriptor, Sizing, SizingOverride,
    StartMode, TaskTemplate, TaskVolume,
};
pub use stack::BaseStack;
pub use traffic::{PortBinding, Protocol, ResolvedTraffic, TrafficProfile};
pub use volume::{FileSystemVolume, VolumeRef};
