//! Agents and their collaborators for the Consortium engine.
//!
//! An agent reads a frozen snapshot of the shared pool and proposes one
//! [`AgentDelta`](consortium_types::AgentDelta) per tick. Metabolic agents
//! bound their exchange reactions with Michaelis--Menten kinetics and ask a
//! [`MetabolicModel`] for a flux solution; forcing agents hold, drive, or
//! pulse substrates without a solver.
//!
//! # Modules
//!
//! - [`error`] -- Model, solver, and agent error types.
//! - [`model`] -- The [`MetabolicModel`] and [`ModelLoader`] seams.
//! - [`linear`] -- [`LinearYieldModel`], a small yield-based reference model,
//!   and the [`ModelLibrary`] loader.
//! - [`metabolic`] -- [`MetabolicAgent`].
//! - [`forcing`] -- [`ForcingAgent`]: setpoint, oscillatory, pulsed.
//! - [`agent`] -- The [`Agent`] dispatch enum and the compute context.
//! - [`registry`] -- [`AgentRegistry`]: live agents, retired names, result
//!   stores, and lifecycle directives.

pub mod agent;
pub mod error;
pub mod forcing;
pub mod linear;
pub mod metabolic;
pub mod model;
pub mod registry;

pub use agent::{Agent, AgentFailure, AgentOutput, ComputeContext};
pub use error::{AgentError, ModelError, SolveError};
pub use forcing::ForcingAgent;
pub use linear::{LinearYieldModel, ModelLibrary, ReactionDef};
pub use metabolic::MetabolicAgent;
pub use model::{FluxSolution, MetabolicModel, ModelLoader};
pub use registry::{
    AgentRegistry, LifecycleDirective, LifecycleEvent, PreparedAction, PreparedLifecycle,
    PreparedSpawn,
};
