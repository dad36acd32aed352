//! Error types for the `consortium-environment` crate.
//!
//! Every pool write validates before committing, so an error always leaves
//! the pool exactly as it was.

/// Errors that can occur when writing to the resource pool.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    /// The volume is zero, negative, or not finite.
    #[error("invalid volume: {0}")]
    InvalidVolume(f64),

    /// A write would leave a count below zero.
    #[error("count for {key} would become negative ({value})")]
    NegativeCount {
        /// The pool key.
        key: String,
        /// The rejected value.
        value: f64,
    },

    /// A value is NaN or infinite.
    #[error("non-finite value for {key}: {value}")]
    NonFinite {
        /// The pool key.
        key: String,
        /// The rejected value.
        value: f64,
    },

    /// An entry was expected in the pool but is missing.
    #[error("pool entry not found: {0}")]
    EntryNotFound(String),

    /// An entry was inserted where one already exists.
    #[error("pool entry already exists: {0}")]
    DuplicateEntry(String),

    /// A parent does not hold enough biomass for a transfer.
    #[error("{parent} holds {available} biomass, cannot transfer {requested}")]
    InsufficientBiomass {
        /// The donating agent.
        parent: String,
        /// Biomass currently held.
        available: f64,
        /// Biomass requested.
        requested: f64,
    },
}
