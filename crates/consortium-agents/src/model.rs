//! Seams to the flux solver and the model loader.
//!
//! The engine never inspects a model's internals. It sets bounds, applies
//! knockouts, and asks for an optimum; everything else stays behind
//! [`MetabolicModel`]. Models are produced by a [`ModelLoader`] so the core
//! can spawn offspring at runtime without knowing where models come from.

use std::collections::BTreeMap;
use std::fmt;

use consortium_types::{Bounds, ModelChanges};
use serde::Serialize;

use crate::error::{ModelError, SolveError};

/// Result of one optimization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FluxSolution {
    /// Value of the objective (growth) reaction.
    pub objective_value: f64,
    /// Flux per reaction.
    pub fluxes: BTreeMap<String, f64>,
}

impl FluxSolution {
    /// Flux through `reaction`, zero when absent.
    pub fn flux(&self, reaction: &str) -> f64 {
        self.fluxes.get(reaction).copied().unwrap_or(0.0)
    }
}

/// A mutable handle to one agent's metabolic model.
///
/// Each agent owns its handle exclusively, so implementations need `Send`
/// but no interior synchronization.
pub trait MetabolicModel: Send + fmt::Debug {
    /// Model identifier, used in errors and logs.
    fn id(&self) -> &str;

    /// Whether the model has `reaction`.
    fn has_reaction(&self, reaction: &str) -> bool;

    /// Current bounds of `reaction`, both sides set.
    fn bounds(&self, reaction: &str) -> Result<Bounds, ModelError>;

    /// Overwrite the sides of `bounds` that are set.
    fn set_bounds(&mut self, reaction: &str, bounds: Bounds) -> Result<(), ModelError>;

    /// Disable every reaction associated with `gene`.
    fn knock_out_gene(&mut self, gene: &str) -> Result<(), ModelError>;

    /// Fix `reaction` at zero flux.
    fn knock_out_reaction(&mut self, reaction: &str) -> Result<(), ModelError>;

    /// Identifiers of the exchange reactions.
    fn exchange_reactions(&self) -> Vec<String>;

    /// Identifier of the objective reaction.
    fn objective_reaction(&self) -> &str;

    /// Solve for the flux distribution maximizing the objective.
    fn optimize(&mut self) -> Result<FluxSolution, SolveError>;

    /// Apply a change set: knockouts first, then bound overrides.
    ///
    /// Kinetic overrides are agent-level and ignored here.
    fn apply_changes(&mut self, changes: &ModelChanges) -> Result<(), ModelError> {
        for gene in &changes.gene_knockouts {
            self.knock_out_gene(gene)?;
        }
        for reaction in &changes.reaction_knockouts {
            self.knock_out_reaction(reaction)?;
        }
        for (reaction, bounds) in &changes.bounds {
            self.set_bounds(reaction, *bounds)?;
        }
        Ok(())
    }
}

/// Resolves a model reference to a fresh model handle.
pub trait ModelLoader: Send + Sync + fmt::Debug {
    /// Load a new, independent copy of the model named `model_ref`.
    fn load(&self, model_ref: &str) -> Result<Box<dyn MetabolicModel>, ModelError>;
}
