//! Error types for the `consortium-agents` crate.
//!
//! [`ModelError`] covers loading and editing models, [`SolveError`] covers a
//! single optimization, and [`AgentError`] covers agent construction and
//! registry bookkeeping. Solve errors never escape a tick: the agent turns
//! them into an empty delta and a failure record.

use std::path::PathBuf;

/// Errors raised while loading or modifying a metabolic model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// No model is registered under this reference.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// The model has no reaction with this identifier.
    #[error("model {model} has no reaction {reaction}")]
    UnknownReaction {
        /// Model identifier.
        model: String,
        /// Missing reaction.
        reaction: String,
    },

    /// No reaction in the model is associated with this gene.
    #[error("model {model} has no gene {gene}")]
    UnknownGene {
        /// Model identifier.
        model: String,
        /// Missing gene.
        gene: String,
    },

    /// Failed to read a model file.
    #[error("failed to read model file {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Failed to parse a model file.
    #[error("failed to parse model file {path}: {reason}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The file extension is not a supported model format.
    #[error("unsupported model format: {0}")]
    UnsupportedFormat(PathBuf),

    /// The model definition is inconsistent.
    #[error("invalid model {model}: {reason}")]
    Invalid {
        /// Model identifier.
        model: String,
        /// What is wrong.
        reason: String,
    },
}

/// Errors raised by a single optimization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolveError {
    /// No flux distribution satisfies the bounds.
    #[error("infeasible: {0}")]
    Infeasible(String),

    /// The objective can grow without limit.
    #[error("unbounded: {0}")]
    Unbounded(String),
}

/// Errors raised when building agents or updating the registry.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A model could not be loaded or modified.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A substrate in the reaction map has no kinetic parameters.
    #[error("agent {agent} has no kinetics for mapped substrate {substrate}")]
    MissingKinetics {
        /// Agent name.
        agent: String,
        /// Substrate without kinetics.
        substrate: String,
    },

    /// A numeric parameter is negative or not finite.
    #[error("agent {agent} has invalid parameter {field}: {value}")]
    InvalidParameter {
        /// Agent name.
        agent: String,
        /// Offending field.
        field: String,
        /// Offending value.
        value: f64,
    },

    /// A pulsed agent was configured with a zero period.
    #[error("pulsed agent {0} has period 0")]
    ZeroPeriod(String),

    /// An agent with this name is already live.
    #[error("duplicate agent name: {0}")]
    DuplicateName(String),

    /// This name belonged to an agent that has been retired.
    #[error("agent name {0} was retired and cannot be reused")]
    NameRetired(String),

    /// No live agent has this name.
    #[error("agent not found: {0}")]
    AgentNotFound(String),
}
