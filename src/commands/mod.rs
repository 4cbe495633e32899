pub mod plan;
pub mod synth;
