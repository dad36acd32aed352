//! The agent dispatch enum and per-tick compute types.
//!
//! All agents share one output contract: given a [`ComputeContext`], emit an
//! [`AgentOutput`] holding a signed [`AgentDelta`] relative to the snapshot.
//! [`Agent`] dispatches with a `match`, so adding an agent kind is a
//! compile-time change.

use consortium_environment::ResourcePool;
use consortium_types::{AgentDelta, AgentSpec};
use serde::Serialize;

use crate::error::AgentError;
use crate::forcing::ForcingAgent;
use crate::metabolic::MetabolicAgent;
use crate::model::ModelLoader;

/// Read-only inputs for one tick of computation.
#[derive(Debug, Clone, Copy)]
pub struct ComputeContext<'a> {
    /// Pool as it stood at the start of the tick.
    pub snapshot: &'a ResourcePool,
    /// 0-indexed tick number.
    pub tick: u64,
    /// Simulation time at the start of the tick (`tick * interval`).
    pub global_time: f64,
    /// Length of one tick in simulation time.
    pub interval: f64,
}

/// A recoverable failure of one agent during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentFailure {
    /// Agent that failed.
    pub agent: String,
    /// Human-readable cause.
    pub reason: String,
}

/// What an agent produced for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOutput {
    /// Proposed change to the pool.
    pub delta: AgentDelta,
    /// Set when the agent fell back to an empty delta.
    pub failure: Option<AgentFailure>,
}

impl AgentOutput {
    /// A successful output.
    pub const fn ok(delta: AgentDelta) -> Self {
        Self {
            delta,
            failure: None,
        }
    }
}

/// Any live agent.
#[derive(Debug)]
pub enum Agent {
    /// Flux-balance agent.
    Metabolic(MetabolicAgent),
    /// Solver-free forcing agent.
    Forcing(ForcingAgent),
}

impl Agent {
    /// Build an agent from its spec, loading a model when needed.
    pub fn from_spec(spec: AgentSpec, loader: &dyn ModelLoader) -> Result<Self, AgentError> {
        match spec {
            AgentSpec::Metabolic(spec) => Ok(Self::Metabolic(MetabolicAgent::new(spec, loader)?)),
            AgentSpec::Setpoint(spec) => Ok(Self::Forcing(ForcingAgent::setpoint(spec)?)),
            AgentSpec::Oscillatory(spec) => Ok(Self::Forcing(ForcingAgent::oscillatory(spec)?)),
            AgentSpec::Pulsed(spec) => Ok(Self::Forcing(ForcingAgent::pulsed(spec)?)),
        }
    }

    /// Agent name.
    pub fn name(&self) -> &str {
        match self {
            Self::Metabolic(agent) => agent.name(),
            Self::Forcing(agent) => agent.name(),
        }
    }

    /// The metabolic agent, if this is one.
    pub const fn as_metabolic(&self) -> Option<&MetabolicAgent> {
        match self {
            Self::Metabolic(agent) => Some(agent),
            Self::Forcing(_) => None,
        }
    }

    /// Whether this agent holds biomass in the pool.
    pub const fn is_metabolic(&self) -> bool {
        matches!(self, Self::Metabolic(_))
    }

    /// Compute this tick's delta.
    pub fn compute(&mut self, ctx: &ComputeContext<'_>) -> AgentOutput {
        match self {
            Self::Metabolic(agent) => agent.compute(ctx),
            Self::Forcing(agent) => AgentOutput::ok(agent.compute(ctx)),
        }
    }
}
