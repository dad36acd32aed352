//! Shared type definitions for the Consortium community dFBA engine.
//!
//! This crate is the single source of truth for the plain data exchanged
//! between the environment, agent, and core crates. Everything here is
//! serde-serializable so it can be read straight out of the YAML
//! configuration and written into run history.
//!
//! # Modules
//!
//! - [`enums`] -- Rule directions, merge strategies, forcing contracts
//! - [`structs`] -- Kinetics, reaction bounds, model changes, threshold rules,
//!   and the per-tick [`AgentDelta`]
//! - [`specs`] -- Agent specifications (metabolic and forcing) as configured

pub mod enums;
pub mod specs;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{DeltaContract, Direction, MergeStrategy, TargetUnit};
pub use specs::{AgentSpec, MetabolicSpec, OscillatorySpec, PulsedSpec, SetpointSpec, Wave};
pub use structs::{AgentDelta, Bounds, Kinetics, ModelChanges, ThresholdRange, ThresholdSpec};
