//! In-memory time series of the pool.
//!
//! [`HistoryRecorder`] is a [`TickCallback`]: hand it to
//! [`run_simulation`] and it keeps one [`TimePoint`] per completed tick,
//! plus the initial state if [`HistoryRecorder::record_initial`] was
//! called first.
//!
//! [`run_simulation`]: crate::runner::run_simulation

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::runner::TickCallback;
use crate::tick::{SimulationState, TickSummary};

/// Errors raised while exporting a history.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Writing the output file failed.
    #[error("failed to write history: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failed.
    #[error("failed to serialize history: {0}")]
    Json(#[from] serde_json::Error),
}

/// The pool and population at one point in simulation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePoint {
    /// Number of ticks completed.
    pub step: u64,
    /// Simulation time.
    pub time: f64,
    /// Pool volume.
    pub volume: f64,
    /// Counts per key.
    pub counts: BTreeMap<String, f64>,
    /// Concentrations per key.
    pub concentrations: BTreeMap<String, f64>,
    /// Live agent names.
    pub live_agents: Vec<String>,
}

impl TimePoint {
    fn capture(state: &SimulationState) -> Self {
        Self {
            step: state.clock.tick(),
            time: state.clock.global_time(),
            volume: state.pool.volume(),
            counts: state.pool.counts().clone(),
            concentrations: state.pool.concentrations().clone(),
            live_agents: state.registry.live_names().map(str::to_owned).collect(),
        }
    }
}

/// Collects a [`TimePoint`] after every tick.
#[derive(Debug, Default, Clone, Serialize)]
pub struct HistoryRecorder {
    points: Vec<TimePoint>,
}

impl HistoryRecorder {
    /// Create an empty recorder.
    pub const fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Record the state before the first tick.
    pub fn record_initial(&mut self, state: &SimulationState) {
        self.points.push(TimePoint::capture(state));
    }

    /// Recorded points in time order.
    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    /// Number of recorded points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(time, count)` pairs for `key`. Points where the key is absent
    /// are skipped.
    pub fn series(&self, key: &str) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .filter_map(|p| p.counts.get(key).map(|&c| (p.time, c)))
            .collect()
    }

    /// `(time, concentration)` pairs for `key`.
    pub fn concentration_series(&self, key: &str) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .filter_map(|p| p.concentrations.get(key).map(|&c| (p.time, c)))
            .collect()
    }

    /// Serialize every point as pretty JSON.
    pub fn to_json(&self) -> Result<String, HistoryError> {
        Ok(serde_json::to_string_pretty(&self.points)?)
    }

    /// Write the JSON export to `path`.
    pub fn write_json(&self, path: &Path) -> Result<(), HistoryError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl TickCallback for HistoryRecorder {
    fn on_tick(&mut self, _summary: &TickSummary, state: &SimulationState) {
        // The clock has already advanced, so the point sits at the end of
        // the tick.
        self.points.push(TimePoint::capture(state));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::setup::build_from_config;
    use crate::tick::run_tick;

    fn feed_state() -> SimulationState {
        let config = SimulationConfig::parse(
            r"
simulation: { interval: 0.5 }
environment: { volume: 2, counts: { glc: 0 } }
agents:
  - { kind: pulsed, name: feed, period: 1, amounts: { glc: 3 } }
",
        )
        .unwrap();
        build_from_config(&config, Path::new(".")).unwrap()
    }

    #[test]
    fn records_one_point_per_tick() {
        let mut state = feed_state();
        let mut history = HistoryRecorder::new();
        history.record_initial(&state);
        for _ in 0..3 {
            let summary = run_tick(&mut state).unwrap();
            history.on_tick(&summary, &state);
        }
        assert_eq!(history.len(), 4);
        let series = history.series("glc");
        assert_eq!(series.len(), 4);
        let (t, c) = series.last().copied().unwrap();
        assert!((t - 1.5).abs() < 1e-12);
        // Pulses land on ticks 1 and 2.
        assert!((c - 6.0).abs() < 1e-9);
        let (_, conc) = history.concentration_series("glc").last().copied().unwrap();
        assert!((conc - 3.0).abs() < 1e-9);
    }

    #[test]
    fn exports_json() {
        let mut state = feed_state();
        let mut history = HistoryRecorder::new();
        let summary = run_tick(&mut state).unwrap();
        history.on_tick(&summary, &state);
        let value: serde_json::Value = serde_json::from_str(&history.to_json().unwrap()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value.pointer("/0/step").unwrap(), 1);
        assert_eq!(value.pointer("/0/live_agents/0").unwrap(), "feed");
    }
}
