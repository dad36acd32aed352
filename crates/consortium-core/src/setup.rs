//! Simulation assembly from configuration.
//!
//! Every configuration error is caught here, before the first tick runs:
//! unknown models, reactions, or genes; missing kinetics; agents without a
//! biomass entry; malformed threshold rules; bad volume or interval.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use consortium_agents::{Agent, AgentError, AgentRegistry, ModelError, ModelLibrary, ModelLoader};
use consortium_environment::{EnvironmentError, Reducer, ResourcePool};
use tracing::info;

use crate::clock::{ClockError, SimClock};
use crate::config::{EnvironmentConfig, ModelSource, SimulationConfig};
use crate::monitor::{PopulationMonitor, RuleError};
use crate::tick::SimulationState;

/// Errors that stop a run before any tick executes.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The tick interval is invalid.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// The initial pool is invalid.
    #[error("environment error: {source}")]
    Environment {
        /// The underlying pool error.
        #[from]
        source: EnvironmentError,
    },

    /// Both `counts` and `concentrations` were given.
    #[error("environment sets both counts and concentrations")]
    AmbiguousEnvironment,

    /// A model could not be loaded.
    #[error("model error: {source}")]
    Model {
        /// The underlying model error.
        #[from]
        source: ModelError,
    },

    /// A seed agent could not be built or registered.
    #[error("agent {agent}: {source}")]
    Agent {
        /// Agent name.
        agent: String,
        /// The underlying agent error.
        source: AgentError,
    },

    /// A metabolic agent has no biomass entry in the initial pool.
    #[error("agent {0} has no biomass entry in the environment")]
    MissingBiomass(String),

    /// A threshold rule is malformed.
    #[error("threshold rule {index}: {source}")]
    Rule {
        /// Position of the rule in configuration order.
        index: usize,
        /// The underlying rule error.
        source: RuleError,
    },
}

/// Build the model library from the `models` section.
///
/// Relative paths resolve against `base`, usually the config file's
/// directory.
pub fn build_library(config: &SimulationConfig, base: &Path) -> Result<ModelLibrary, SetupError> {
    let mut library = ModelLibrary::new();
    for (reference, source) in &config.models {
        match source {
            ModelSource::Path(path) => {
                let resolved = if path.is_absolute() {
                    path.clone()
                } else {
                    base.join(path)
                };
                library.load_file(reference.clone(), &resolved)?;
            }
            ModelSource::Inline(model) => {
                library.register(reference.clone(), (**model).clone())?;
            }
        }
    }
    Ok(library)
}

/// Build the initial pool.
pub fn build_pool(environment: &EnvironmentConfig) -> Result<ResourcePool, SetupError> {
    match (&environment.counts, &environment.concentrations) {
        (Some(_), Some(_)) => Err(SetupError::AmbiguousEnvironment),
        (Some(counts), None) => Ok(ResourcePool::from_counts(environment.volume, counts.clone())?),
        (None, Some(concentrations)) => Ok(ResourcePool::from_concentrations(
            environment.volume,
            concentrations.clone(),
        )?),
        (None, None) => Ok(ResourcePool::from_counts(environment.volume, BTreeMap::new())?),
    }
}

/// Assemble a ready-to-run simulation using `loader` for every model.
pub fn build_simulation(
    config: &SimulationConfig,
    loader: Arc<dyn ModelLoader>,
) -> Result<SimulationState, SetupError> {
    let clock = SimClock::new(config.simulation.interval)?;
    let pool = build_pool(&config.environment)?;

    let mut registry = AgentRegistry::new();
    for spec in &config.agents {
        let name = spec.name().to_owned();
        let agent = Agent::from_spec(spec.clone(), loader.as_ref()).map_err(|source| {
            SetupError::Agent {
                agent: name.clone(),
                source,
            }
        })?;
        if agent.is_metabolic() && !pool.contains(&name) {
            return Err(SetupError::MissingBiomass(name));
        }
        registry
            .insert(agent)
            .map_err(|source| SetupError::Agent { agent: name, source })?;
    }

    let monitor = PopulationMonitor::from_specs(&config.thresholds)
        .map_err(|(index, source)| SetupError::Rule { index, source })?;

    info!(
        name = %config.simulation.name,
        seed = config.simulation.seed,
        strategy = ?config.simulation.merge_strategy,
        agents = registry.len(),
        rules = monitor.rules().len(),
        entries = pool.len(),
        "Simulation assembled"
    );

    Ok(SimulationState {
        clock,
        pool,
        registry,
        reducer: Reducer::new(config.simulation.merge_strategy, config.simulation.seed),
        monitor,
        loader,
    })
}

/// Build the model library, then the simulation.
pub fn build_from_config(
    config: &SimulationConfig,
    base: &Path,
) -> Result<SimulationState, SetupError> {
    let library = build_library(config, base)?;
    build_simulation(config, Arc::new(library))
}
