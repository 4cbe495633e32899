//! Services layer - orchestration logic
//!
//! Coordinates configuration, game specializations, the composition
//! pipeline and the provisioning platform.

pub mod synth_service;

pub use synth_service::{ServerOutcome, Synthesis, SynthService};
