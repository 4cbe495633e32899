//! Server composition
//!
//! Turns a [`ServerSpec`] into a fully wired service, dashboard and security
//! policy through a fixed, ordered pipeline. Specializations parameterize the
//! spec and hook into individual steps through [`StepOverrides`]; they never
//! reorder or skip steps.

pub mod output;
pub mod overrides;
pub mod pipeline;
pub mod spec;
pub mod step;

pub use output::{Composition, CompositionOutputs};
pub use overrides::{MetricsScope, StepOverrides};
pub use pipeline::Composer;
pub use spec::{ServerSpec, ValidatedSpec};
pub use step::{CompositionPhase, Step, StepResult, StepStatus};
