//! Centralized error types for gamestack
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.

use thiserror::Error;

use crate::composition::Step;

/// Top-level error type for gamestack operations
#[derive(Error, Debug)]
pub enum GamestackError {
    #[error("Spec error: {0}")]
    Spec(#[from] SpecError),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// Inconsistent server specs, detected before any resource is declared
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("Server name cannot be empty")]
    EmptyName,

    #[error("Invalid server name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Port {port} is not a valid {field}")]
    InvalidPort { field: String, port: u16 },

    #[error("Health check on port {port} declared without a protocol")]
    HealthCheckProtocolMissing { port: u16 },

    #[error("Health check on {port}/{protocol} duplicates the primary port")]
    RedundantHealthCheck { port: u16, protocol: String },

    #[error("Mount path {path} requires a persistent volume")]
    MountWithoutVolume { path: String },

    #[error("Mount path must be absolute, got: {path}")]
    RelativeMountPath { path: String },

    #[error("Invalid environment source '{source_ref}': expected s3://bucket/key")]
    InvalidEnvironmentSource { source_ref: String },

    #[error("Invalid game setting {field}: {reason}")]
    InvalidGameSetting { field: String, reason: String },
}

/// Task sizing rejected by the container platform
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizingError {
    #[error("Unsupported CPU value {cpu} (allowed: 256, 512, 1024, 2048, 4096)")]
    UnsupportedCpu { cpu: u32 },

    #[error("Memory {memory_mib} MiB is not supported with {cpu} CPU units")]
    UnsupportedMemory { cpu: u32, memory_mib: u32 },
}

/// Security policy or dashboard overrides that broke an invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Override removed base rules from security policy {policy}")]
    RulesRemoved { policy: String },

    #[error("Security policy {policy} is missing a required path: {path}")]
    MissingRequiredPath { policy: String, path: String },

    #[error("Override removed base panels from dashboard {dashboard}")]
    PanelsRemoved { dashboard: String },
}

/// Pipeline failures. Every variant names the step that failed.
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("{server}: invalid spec: {source}")]
    InvalidSpec {
        server: String,
        #[source]
        source: SpecError,
    },

    #[error("{server}: step '{step}' failed: {source}")]
    Sizing {
        server: String,
        step: Step,
        #[source]
        source: SizingError,
    },

    #[error("{server}: step '{step}' failed: {source}")]
    Policy {
        server: String,
        step: Step,
        #[source]
        source: PolicyError,
    },

    #[error("{server}: step '{step}' failed: {source}")]
    Network {
        server: String,
        step: Step,
        #[source]
        source: NetworkError,
    },

    #[error("{server}: step '{step}' ran before '{needs}' produced its output")]
    OutOfOrder { server: String, step: Step, needs: Step },
}

impl CompositionError {
    /// The step that failed, if the failure happened inside the pipeline
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::InvalidSpec { .. } => None,
            Self::Sizing { step, .. }
            | Self::Policy { step, .. }
            | Self::Network { step, .. }
            | Self::OutOfOrder { step, .. } => Some(*step),
        }
    }
}

/// Network layout errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid CIDR block: {cidr}")]
    InvalidCidr { cidr: String },

    #[error("Subnet mask /{mask} does not fit inside {cidr}")]
    MaskOutOfRange { cidr: String, mask: u8 },

    #[error("{needed} subnets of /{mask} do not fit inside {cidr}")]
    AddressSpaceExhausted { cidr: String, mask: u8, needed: u32 },

    #[error("Availability zone count must be between 1 and {max}, got: {count}")]
    InvalidZoneCount { count: u8, max: u8 },

    #[error("Subnet group {group} not found in network {network}")]
    SubnetGroupNotFound { network: String, group: String },

    #[error("Volume name cannot be empty")]
    EmptyVolumeName,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required configuration missing: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },
}

/// Provisioning platform errors
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Failed to serialize resource graph for {stack}: {source}")]
    Serialize {
        stack: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
