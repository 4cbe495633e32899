//! # gamestack
//!
//! Composes game-server container stacks from a small server spec: a network
//! boundary, identity roles, an optional persistent volume, a single-replica
//! service with an optional load balancer, and a metrics dashboard.
//!
//! Every server goes through the same fixed pipeline
//! ([`composition::Step::ALL`]); game specializations in [`games`] plug into
//! it through step overrides instead of re-implementing it.

pub mod composition;
pub mod config;
pub mod domain;
pub mod error;
pub mod games;
pub mod infrastructure;
pub mod observability;
pub mod services;
pub mod ui;

pub use composition::{Composer, Composition, ServerSpec, Step};
pub use error::GamestackError;
