//! Engine binary for the Consortium simulation.
//!
//! Loads a run configuration, assembles the community, and drives the
//! tick loop until a termination condition is met.
//!
//! # Startup Sequence
//!
//! 1. Resolve the config path (first argument, then `CONSORTIUM_CONFIG`,
//!    then `consortium-config.yaml`)
//! 2. Load configuration
//! 3. Initialize structured logging (tracing), honoring `CONSORTIUM_LOG`
//! 4. Load models and validate agents and threshold rules
//! 5. Install the Ctrl-C handler as an operator stop
//! 6. Run the simulation loop with a history recorder attached
//! 7. Log the result and, if `CONSORTIUM_HISTORY` is set, write the
//!    history as JSON

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use consortium_core::config::{LogFormat, LoggingConfig, SimulationConfig};
use consortium_core::history::HistoryRecorder;
use consortium_core::runner::{self, RunControl, SimulationResult};
use consortium_core::setup;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const DEFAULT_CONFIG: &str = "consortium-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, fails
/// validation, or a tick fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = config_path();
    let config = SimulationConfig::from_file(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    init_tracing(&config.logging);
    info!(
        path = %config_path.display(),
        name = %config.simulation.name,
        seed = config.simulation.seed,
        interval = config.simulation.interval,
        max_ticks = config.simulation.max_ticks,
        "Configuration loaded"
    );

    let history_path = std::env::var_os("CONSORTIUM_HISTORY").map(PathBuf::from);
    let result = run(&config, &config_path, history_path.as_deref())
        .await
        .context("simulation failed")?;

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "consortium-engine shutdown complete"
    );
    Ok(())
}

/// Build the simulation, run it, and export its history.
async fn run(
    config: &SimulationConfig,
    config_path: &Path,
    history_path: Option<&Path>,
) -> Result<SimulationResult, EngineError> {
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    let mut state = setup::build_from_config(config, base)?;

    let control = Arc::new(RunControl::from_config(&config.simulation));
    let stopper = Arc::clone(&control);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping after the current tick");
                stopper.request_stop();
            }
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });

    let mut history = HistoryRecorder::new();
    history.record_initial(&state);

    let result = runner::run_simulation(&mut state, &control, &mut history).await?;
    runner::log_simulation_end(&result);

    if let Some(path) = history_path {
        history.write_json(path)?;
        info!(path = %path.display(), points = history.len(), "History written");
    }
    Ok(result)
}

/// Resolve the config file path.
fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("CONSORTIUM_CONFIG"))
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from)
}

/// Initialize the global subscriber.
///
/// `CONSORTIUM_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_env("CONSORTIUM_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}
