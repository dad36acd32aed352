//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and simulation execution.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `run` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: consortium_core::config::ConfigError,
    },

    /// The configuration was rejected before the first tick.
    #[error("setup error: {source}")]
    Setup {
        /// The underlying setup error.
        #[from]
        source: consortium_core::setup::SetupError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: consortium_core::runner::RunnerError,
    },

    /// The history could not be exported.
    #[error("history error: {source}")]
    History {
        /// The underlying history error.
        #[from]
        source: consortium_core::history::HistoryError,
    },
}
