//! Flux-balance agents.
//!
//! Each tick a [`MetabolicAgent`] converts the snapshot concentration of
//! every mapped substrate into a Michaelis--Menten uptake limit, writes it
//! as the lower bound of the matching exchange reaction, and optimizes its
//! model. The solution is scaled by the agent's own biomass and the tick
//! interval:
//!
//! - `delta[name] = growth * biomass * interval`
//! - `delta[substrate] = exchange_flux * biomass * interval`
//!
//! A failed solve yields an empty delta and an [`AgentFailure`] so the
//! tick can carry on. An empty delta writes nothing to the pool, so under
//! last-write-wins it cannot displace another agent's contribution.

use std::collections::BTreeMap;

use consortium_types::{AgentDelta, Bounds, Kinetics, MetabolicSpec};
use tracing::{trace, warn};

use crate::agent::{AgentFailure, AgentOutput, ComputeContext};
use crate::error::{AgentError, ModelError};
use crate::model::{MetabolicModel, ModelLoader};

/// An agent backed by its own copy of a metabolic model.
#[derive(Debug)]
pub struct MetabolicAgent {
    spec: MetabolicSpec,
    /// Spec kinetics with change-set overrides applied.
    kinetics: BTreeMap<String, Kinetics>,
    model: Box<dyn MetabolicModel>,
}

impl MetabolicAgent {
    /// Load the model and apply the spec's bounds and changes.
    ///
    /// # Errors
    ///
    /// Fails when the model reference is unknown, a mapped substrate has no
    /// kinetics, a kinetic parameter is negative or not finite, or a bound
    /// or knockout names something the model does not have.
    pub fn new(spec: MetabolicSpec, loader: &dyn ModelLoader) -> Result<Self, AgentError> {
        let mut model = loader.load(&spec.model)?;

        let mut kinetics = spec.kinetics.clone();
        kinetics.extend(spec.changes.kinetics.iter().map(|(k, v)| (k.clone(), *v)));

        for (substrate, reaction) in &spec.reaction_map {
            let params = kinetics
                .get(substrate)
                .ok_or_else(|| AgentError::MissingKinetics {
                    agent: spec.name.clone(),
                    substrate: substrate.clone(),
                })?;
            check_parameter(&spec.name, "km", params.km)?;
            check_parameter(&spec.name, "vmax", params.vmax)?;
            if !model.has_reaction(reaction) {
                return Err(ModelError::UnknownReaction {
                    model: spec.model.clone(),
                    reaction: reaction.clone(),
                }
                .into());
            }
        }

        for (reaction, bounds) in &spec.bounds {
            model.set_bounds(reaction, *bounds)?;
        }
        model.apply_changes(&spec.changes)?;

        Ok(Self {
            spec,
            kinetics,
            model,
        })
    }

    /// Agent name, also its biomass key.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// The configuration this agent was built from.
    pub const fn spec(&self) -> &MetabolicSpec {
        &self.spec
    }

    /// Keys written every tick: mapped substrates plus the agent name.
    pub fn tracked_keys(&self) -> Vec<String> {
        self.spec.tracked_keys()
    }

    /// Effective kinetics per substrate.
    pub const fn kinetics(&self) -> &BTreeMap<String, Kinetics> {
        &self.kinetics
    }

    /// Compute this tick's delta.
    pub fn compute(&mut self, ctx: &ComputeContext<'_>) -> AgentOutput {
        match self.solve(ctx) {
            Ok(delta) => AgentOutput::ok(delta),
            Err(reason) => {
                warn!(
                    agent = %self.spec.name,
                    tick = ctx.tick,
                    reason = %reason,
                    "Solve failed, emitting empty delta"
                );
                AgentOutput {
                    delta: AgentDelta::new(),
                    failure: Some(AgentFailure {
                        agent: self.spec.name.clone(),
                        reason,
                    }),
                }
            }
        }
    }

    fn solve(&mut self, ctx: &ComputeContext<'_>) -> Result<AgentDelta, String> {
        for (substrate, reaction) in &self.spec.reaction_map {
            let uptake = self
                .kinetics
                .get(substrate)
                .map_or(0.0, |k| k.uptake_rate(ctx.snapshot.concentration(substrate)));
            self.model
                .set_bounds(reaction, Bounds {
                    lower: Some(-uptake),
                    upper: None,
                })
                .map_err(|e| e.to_string())?;
        }

        let solution = self.model.optimize().map_err(|e| e.to_string())?;
        let scale = ctx.snapshot.count(&self.spec.name) * ctx.interval;

        let mut delta = AgentDelta::new();
        delta.set(self.spec.name.clone(), solution.objective_value * scale);
        for (substrate, reaction) in &self.spec.reaction_map {
            delta.set(substrate.clone(), solution.flux(reaction) * scale);
        }
        trace!(agent = %self.spec.name, growth = solution.objective_value, "Solved");
        Ok(delta)
    }
}

fn check_parameter(agent: &str, field: &str, value: f64) -> Result<(), AgentError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AgentError::InvalidParameter {
            agent: agent.to_owned(),
            field: field.to_owned(),
            value,
        })
    }
}
