//! Shared resource pool and merge protocol for the Consortium engine.
//!
//! This crate models the well-mixed environment every agent draws from:
//! a single volume holding substrate and biomass counts, with
//! concentrations kept consistent on every write.
//!
//! # Modules
//!
//! - [`error`] -- Error types for pool writes.
//! - [`pool`] -- [`ResourcePool`] with the `concentration = count / volume`
//!   invariant and the [`PoolUpdate`] write type.
//! - [`merge`] -- The [`Reducer`]: seeded permutation merge of per-agent
//!   deltas, plus the lifecycle mass-transfer writes.

pub mod error;
pub mod merge;
pub mod pool;

// Re-export primary types at crate root.
pub use error::EnvironmentError;
pub use merge::{MergeReport, OverwrittenContribution, Reducer};
pub use pool::{EPSILON, PoolUpdate, ResourcePool};
