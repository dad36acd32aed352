//! Tick cycle: the five-phase loop that advances the community.
//!
//! Each tick runs through these phases:
//!
//! 1. **Snapshot** -- freeze the pool. Every agent reads the same copy.
//! 2. **Compute** -- run all live agents in parallel against the snapshot.
//!    A failed solve becomes an empty delta plus a failure record.
//! 3. **Merge** -- the reducer folds every delta into the next pool in a
//!    freshly drawn seeded order.
//! 4. **Monitor** -- threshold rules are checked against the merged pool
//!    and produce lifecycle directives.
//! 5. **Lifecycle** -- offspring are built, biomass is transferred, retired
//!    entries are removed, and the registry is updated.
//!
//! The tick is transactional. Everything fallible runs against scratch
//! copies (pool, reducer RNG, clock), and the simulation state is only
//! written once all phases have succeeded. Agents spawned in tick `n`
//! first compute in tick `n + 1`.

use std::collections::BTreeMap;
use std::sync::Arc;

use consortium_agents::{
    AgentError, AgentFailure, AgentRegistry, ComputeContext, LifecycleEvent, ModelLoader,
    PreparedAction,
};
use consortium_environment::{EnvironmentError, MergeReport, Reducer, ResourcePool};
use consortium_types::AgentDelta;
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{ClockError, SimClock};
use crate::monitor::{PopulationMonitor, SkippedFiring};

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// The merge rejected the tick's deltas.
    #[error("merge error: {source}")]
    Merge {
        /// The underlying pool error.
        #[from]
        source: EnvironmentError,
    },

    /// An offspring could not be built.
    #[error("lifecycle error: {source}")]
    Lifecycle {
        /// The underlying agent error.
        #[from]
        source: AgentError,
    },

    /// A planned biomass transfer was rejected.
    #[error("biomass transfer to {offspring} failed: {source}")]
    Transfer {
        /// Offspring receiving the biomass.
        offspring: String,
        /// The underlying pool error.
        source: EnvironmentError,
    },
}

/// A biomass transfer performed during the lifecycle phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MassTransfer {
    /// Donating agent.
    pub parent: String,
    /// Receiving offspring.
    pub offspring: String,
    /// Biomass moved.
    pub mass: f64,
    /// Parent biomass after the merge, before the transfer.
    pub parent_before: f64,
    /// Parent biomass after the transfer.
    pub parent_after: f64,
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, Serialize)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Simulation time at the start of the tick.
    pub global_time: f64,
    /// Pool at the end of the tick.
    pub pool: ResourcePool,
    /// Agents whose solve failed this tick.
    pub solve_failures: Vec<AgentFailure>,
    /// What the merge did.
    pub merge: MergeReport,
    /// Population changes committed this tick.
    pub lifecycle: Vec<LifecycleEvent>,
    /// Biomass transfers performed this tick.
    pub transfers: Vec<MassTransfer>,
    /// Add rules that fired but could not spawn.
    pub skipped: Vec<SkippedFiring>,
    /// Number of live agents at end of tick.
    pub agents_live: usize,
}

/// The mutable simulation state passed through the tick cycle.
#[derive(Debug)]
pub struct SimulationState {
    /// The simulation clock.
    pub clock: SimClock,
    /// The shared pool.
    pub pool: ResourcePool,
    /// Live agents, retired names, and result stores.
    pub registry: AgentRegistry,
    /// Merge protocol and sole pool writer.
    pub reducer: Reducer,
    /// Threshold rules.
    pub monitor: PopulationMonitor,
    /// Loads models for offspring.
    pub loader: Arc<dyn ModelLoader>,
}

/// Execute one complete tick of the simulation.
///
/// # Errors
///
/// Returns [`TickError`] when the merge rejects a delta, an offspring
/// cannot be built, or a transfer fails. The state is left as it was
/// before the call.
pub fn run_tick(state: &mut SimulationState) -> Result<TickSummary, TickError> {
    let tick = state.clock.tick();
    let global_time = state.clock.global_time();
    let mut clock = state.clock.clone();
    clock.advance()?;

    // --- Phase 1: Snapshot ---
    let snapshot = state.pool.clone();

    // --- Phase 2: Compute ---
    let ctx = ComputeContext {
        snapshot: &snapshot,
        tick,
        global_time,
        interval: state.clock.interval(),
    };
    let outputs = state.registry.compute_all(&ctx);
    let solve_failures: Vec<AgentFailure> = outputs
        .values()
        .filter_map(|output| output.failure.clone())
        .collect();
    debug!(tick, agents = outputs.len(), failures = solve_failures.len(), "Compute phase complete");

    // --- Phase 3: Merge ---
    let deltas: BTreeMap<String, AgentDelta> = outputs
        .iter()
        .map(|(name, output)| (name.clone(), output.delta.clone()))
        .collect();
    let mut reducer = state.reducer.clone();
    let (mut next, merge) = reducer.merge(&snapshot, &deltas)?;

    // --- Phase 4: Monitor ---
    let outcome = state.monitor.evaluate(&next, &state.registry);

    // --- Phase 5: Lifecycle ---
    let prepared = state
        .registry
        .prepare(outcome.directives, state.loader.as_ref())?;
    let mut transfers = Vec::new();
    for action in &prepared.actions {
        match action {
            PreparedAction::Spawn(spawn) => {
                let offspring = spawn.agent.name();
                let parent_before = next.count(&spawn.parent);
                Reducer::transfer_mass(&mut next, &spawn.parent, offspring, spawn.transfer_mass)
                    .map_err(|source| TickError::Transfer {
                        offspring: offspring.to_owned(),
                        source,
                    })?;
                transfers.push(MassTransfer {
                    parent: spawn.parent.clone(),
                    offspring: offspring.to_owned(),
                    mass: spawn.transfer_mass,
                    parent_before,
                    parent_after: next.count(&spawn.parent),
                });
            }
            PreparedAction::Retire(name) => {
                if state.registry.metabolic(name).is_some() {
                    Reducer::retire_entry(&mut next, name);
                }
            }
        }
    }

    // --- Commit ---
    state.registry.record_results(&outputs);
    let lifecycle = state.registry.commit(prepared);
    state.pool = next;
    state.reducer = reducer;
    state.clock = clock;

    info!(
        tick,
        agents = state.registry.len(),
        failures = solve_failures.len(),
        lifecycle = lifecycle.len(),
        "Tick complete"
    );

    Ok(TickSummary {
        tick,
        global_time,
        pool: state.pool.clone(),
        solve_failures,
        merge,
        lifecycle,
        transfers,
        skipped: outcome.skipped,
        agents_live: state.registry.len(),
    })
}
