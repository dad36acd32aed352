//! The agent registry and lifecycle controller.
//!
//! The [`AgentRegistry`] owns every live agent, remembers every retired
//! name, and keeps one result store per metabolic agent holding its most
//! recent delta. Names are unique across the whole run: an agent moves
//! `Unborn -> Live -> Retired` and a retired name is never reused.
//!
//! Lifecycle changes arrive as [`LifecycleDirective`]s and are applied in
//! two steps. [`AgentRegistry::prepare`] builds every offspring (loading
//! models can fail) without touching the registry; [`AgentRegistry::commit`]
//! then applies the prepared batch and cannot fail. Pool writes for the
//! same batch happen between the two steps, in the core crate.

use std::collections::{BTreeMap, BTreeSet};

use consortium_types::MetabolicSpec;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::agent::{Agent, AgentOutput, ComputeContext};
use crate::error::AgentError;
use crate::metabolic::MetabolicAgent;
use crate::model::ModelLoader;

/// A requested change to the population.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleDirective {
    /// Create a metabolic agent cloned from a parent.
    Spawn {
        /// Offspring configuration (parent spec, renamed, with changes).
        spec: MetabolicSpec,
        /// Agent donating biomass.
        parent: String,
        /// Biomass moved from parent to offspring.
        transfer_mass: f64,
        /// Keys tracked in the offspring's result store.
        tracked: Vec<String>,
    },
    /// Retire a live agent.
    Retire {
        /// Agent to retire.
        name: String,
    },
}

/// An offspring that has been built but not yet registered.
#[derive(Debug)]
pub struct PreparedSpawn {
    /// The new agent.
    pub agent: Agent,
    /// Agent donating biomass.
    pub parent: String,
    /// Biomass moved from parent to offspring.
    pub transfer_mass: f64,
    /// Keys tracked in the offspring's result store.
    pub tracked: Vec<String>,
}

/// One step of a prepared lifecycle batch.
#[derive(Debug)]
pub enum PreparedAction {
    /// Register an offspring.
    Spawn(PreparedSpawn),
    /// Retire a live agent.
    Retire(String),
}

/// A lifecycle batch ready to commit, in directive order.
#[derive(Debug, Default)]
pub struct PreparedLifecycle {
    /// Actions in the order they were requested.
    pub actions: Vec<PreparedAction>,
}

impl PreparedLifecycle {
    /// Whether the batch does nothing.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// A committed population change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// An offspring joined the population.
    Spawned {
        /// Offspring name.
        name: String,
        /// Donating parent.
        parent: String,
        /// Biomass transferred.
        transfer_mass: f64,
    },
    /// An agent was retired.
    Retired {
        /// Retired agent.
        name: String,
    },
}

/// Live agents, retired names, and per-agent result stores.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    live: BTreeMap<String, Agent>,
    retired: BTreeSet<String>,
    results: BTreeMap<String, BTreeMap<String, f64>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            live: BTreeMap::new(),
            retired: BTreeSet::new(),
            results: BTreeMap::new(),
        }
    }

    /// Register a seed agent.
    ///
    /// Metabolic agents get a zeroed result store over their tracked keys.
    ///
    /// # Errors
    ///
    /// Fails if the name is live or was retired.
    pub fn insert(&mut self, agent: Agent) -> Result<(), AgentError> {
        self.check_name_free(agent.name())?;
        if let Some(metabolic) = agent.as_metabolic() {
            let tracked = metabolic.tracked_keys();
            self.results
                .insert(agent.name().to_owned(), zeroed_store(&tracked));
        }
        self.live.insert(agent.name().to_owned(), agent);
        Ok(())
    }

    fn check_name_free(&self, name: &str) -> Result<(), AgentError> {
        if self.live.contains_key(name) {
            return Err(AgentError::DuplicateName(name.to_owned()));
        }
        if self.retired.contains(name) {
            return Err(AgentError::NameRetired(name.to_owned()));
        }
        Ok(())
    }

    /// A live agent by name.
    pub fn get(&self, name: &str) -> Option<&Agent> {
        self.live.get(name)
    }

    /// Whether `name` is live.
    pub fn is_live(&self, name: &str) -> bool {
        self.live.contains_key(name)
    }

    /// Whether `name` was retired.
    pub fn is_retired(&self, name: &str) -> bool {
        self.retired.contains(name)
    }

    /// Names of live agents, in order.
    pub fn live_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.live.keys().map(String::as_str)
    }

    /// Names of retired agents, in order.
    pub fn retired_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.retired.iter().map(String::as_str)
    }

    /// Number of live agents.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no agent is live.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of live metabolic agents.
    pub fn metabolic_count(&self) -> usize {
        self.live.values().filter(|a| a.is_metabolic()).count()
    }

    /// A live metabolic agent by name.
    pub fn metabolic(&self, name: &str) -> Option<&MetabolicAgent> {
        self.live.get(name).and_then(Agent::as_metabolic)
    }

    /// An agent's result store: its most recent delta per tracked key.
    pub fn result_store(&self, name: &str) -> Option<&BTreeMap<String, f64>> {
        self.results.get(name)
    }

    /// Run every live agent against the same context, in parallel.
    ///
    /// Each agent touches only its own model, and results are collected
    /// into an ordered map, so the output does not depend on scheduling.
    pub fn compute_all(&mut self, ctx: &ComputeContext<'_>) -> BTreeMap<String, AgentOutput> {
        self.live
            .par_iter_mut()
            .map(|(name, agent)| (name.clone(), agent.compute(ctx)))
            .collect()
    }

    /// Copy each agent's delta into its result store.
    ///
    /// A failed agent's store is zeroed over every tracked key.
    pub fn record_results(&mut self, outputs: &BTreeMap<String, AgentOutput>) {
        for (name, output) in outputs {
            if let Some(store) = self.results.get_mut(name) {
                if output.failure.is_some() {
                    store.values_mut().for_each(|v| *v = 0.0);
                    continue;
                }
                for (key, value) in output.delta.iter() {
                    store.insert(key.to_owned(), value);
                }
            }
        }
    }

    /// Build every offspring in `directives` without changing the registry.
    ///
    /// # Errors
    ///
    /// Fails if an offspring name is taken (live, retired, or spawned
    /// earlier in the batch) or its model cannot be built.
    pub fn prepare(
        &self,
        directives: Vec<LifecycleDirective>,
        loader: &dyn ModelLoader,
    ) -> Result<PreparedLifecycle, AgentError> {
        let mut prepared = PreparedLifecycle::default();
        let mut spawned: BTreeSet<String> = BTreeSet::new();
        for directive in directives {
            match directive {
                LifecycleDirective::Spawn {
                    spec,
                    parent,
                    transfer_mass,
                    tracked,
                } => {
                    self.check_name_free(&spec.name)?;
                    if !spawned.insert(spec.name.clone()) {
                        return Err(AgentError::DuplicateName(spec.name));
                    }
                    let agent = Agent::Metabolic(MetabolicAgent::new(spec, loader)?);
                    prepared.actions.push(PreparedAction::Spawn(PreparedSpawn {
                        agent,
                        parent,
                        transfer_mass,
                        tracked,
                    }));
                }
                LifecycleDirective::Retire { name } => {
                    prepared.actions.push(PreparedAction::Retire(name));
                }
            }
        }
        Ok(prepared)
    }

    /// Apply a prepared batch, returning what changed.
    ///
    /// Retiring a name that is not live is a no-op.
    pub fn commit(&mut self, prepared: PreparedLifecycle) -> Vec<LifecycleEvent> {
        let mut events = Vec::with_capacity(prepared.actions.len());
        for action in prepared.actions {
            match action {
                PreparedAction::Spawn(spawn) => {
                    let name = spawn.agent.name().to_owned();
                    self.results.insert(name.clone(), zeroed_store(&spawn.tracked));
                    self.live.insert(name.clone(), spawn.agent);
                    info!(agent = %name, parent = %spawn.parent, mass = spawn.transfer_mass, "Agent spawned");
                    events.push(LifecycleEvent::Spawned {
                        name,
                        parent: spawn.parent,
                        transfer_mass: spawn.transfer_mass,
                    });
                }
                PreparedAction::Retire(name) => {
                    if self.live.remove(&name).is_none() {
                        debug!(agent = %name, "Retire skipped, agent not live");
                        continue;
                    }
                    self.results.remove(&name);
                    self.retired.insert(name.clone());
                    info!(agent = %name, "Agent retired");
                    events.push(LifecycleEvent::Retired { name });
                }
            }
        }
        events
    }
}

fn zeroed_store(keys: &[String]) -> BTreeMap<String, f64> {
    keys.iter().map(|k| (k.clone(), 0.0)).collect()
}
