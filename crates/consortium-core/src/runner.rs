//! Simulation loop runner with operator controls.
//!
//! This module provides [`run_simulation`], the top-level async function
//! that drives the tick loop with support for:
//!
//! - **Bounded simulation**: stop after `max_ticks`
//! - **Pacing**: optional real-time delay between ticks
//! - **Operator stop**: a shared flag checked before every tick
//! - **Extinction**: stop once no agent is live
//!
//! The runner wraps the single-tick [`run_tick`] function and adds the
//! control plane around it. A tick in flight is never cancelled.
//!
//! [`run_tick`]: crate::tick::run_tick

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::tick::{self, SimulationState, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Reason why the simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// An operator issued a stop command.
    OperatorStop,
    /// No agent is live.
    Extinction,
}

/// Run bounds and the shared stop flag.
///
/// Share it behind an `Arc` to stop the run from another task.
#[derive(Debug)]
pub struct RunControl {
    /// Maximum number of ticks (0 = unlimited).
    max_ticks: u64,
    /// Real-time milliseconds between ticks.
    pacing_ms: u64,
    /// Whether a stop has been requested.
    stop_requested: AtomicBool,
    /// Wall-clock time when the control was created.
    started_at: DateTime<Utc>,
}

impl RunControl {
    /// Create run controls.
    pub fn new(max_ticks: u64, pacing_ms: u64) -> Self {
        Self {
            max_ticks,
            pacing_ms,
            stop_requested: AtomicBool::new(false),
            started_at: Utc::now(),
        }
    }

    /// Create run controls from the `simulation` config section.
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.max_ticks, config.pacing_ms)
    }

    /// Maximum number of ticks (0 = unlimited).
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Real-time milliseconds between ticks.
    pub const fn pacing_ms(&self) -> u64 {
        self.pacing_ms
    }

    /// Ask the runner to stop before its next tick.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Whether `ticks_run` has reached the limit.
    pub const fn tick_limit_reached(&self, ticks_run: u64) -> bool {
        self.max_ticks > 0 && ticks_run >= self.max_ticks
    }

    /// Wall-clock start time.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall-clock milliseconds since start.
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
    }
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
    /// Wall-clock milliseconds the run took.
    pub elapsed_ms: i64,
}

/// Callback invoked after each tick completes.
///
/// The callback receives the tick summary and the updated simulation
/// state.
pub trait TickCallback: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState);
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {}
}

/// Run the simulation loop until a termination condition is met.
///
/// The stop flag and the tick limit are checked before each tick;
/// extinction is checked after.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails. The state is left as it was
/// after the last successful tick.
pub async fn run_simulation(
    state: &mut SimulationState,
    control: &RunControl,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        max_ticks = control.max_ticks(),
        pacing_ms = control.pacing_ms(),
        agents = state.registry.len(),
        "Simulation starting"
    );

    let end_reason = loop {
        // --- Check stop request (before tick) ---
        if control.is_stop_requested() {
            info!("Operator stop requested");
            break SimulationEndReason::OperatorStop;
        }

        // --- Check tick limit (before tick) ---
        if control.tick_limit_reached(total_ticks) {
            info!(total_ticks, max_ticks = control.max_ticks(), "Tick limit reached");
            break SimulationEndReason::MaxTicksReached;
        }

        // --- Execute tick ---
        let summary = tick::run_tick(state)?;
        total_ticks = total_ticks.saturating_add(1);

        // --- Notify callback ---
        callback.on_tick(&summary, state);

        // --- Check extinction ---
        let extinct = summary.agents_live == 0;
        last_summary = Some(summary);
        if extinct {
            info!(total_ticks, "No live agents -- extinction");
            break SimulationEndReason::Extinction;
        }

        // --- Pace ---
        let pacing_ms = control.pacing_ms();
        if pacing_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(pacing_ms)).await;
        }
    };

    Ok(SimulationResult {
        end_reason,
        final_summary: last_summary,
        total_ticks,
        elapsed_ms: control.elapsed_ms(),
    })
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        elapsed_ms = result.elapsed_ms,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        final_agents_live = result.final_summary.as_ref().map(|s| s.agents_live),
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            global_time = summary.global_time,
            entries = summary.pool.len(),
            total_count = summary.pool.total_count(),
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}
