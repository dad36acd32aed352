//! Integration tests for the async simulation runner.
//!
//! These drive `run_simulation` end to end with a `HistoryRecorder`
//! attached and check each termination path.

#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;

use consortium_core::config::SimulationConfig;
use consortium_core::history::HistoryRecorder;
use consortium_core::runner::{
    NoOpCallback, RunControl, SimulationEndReason, TickCallback, run_simulation,
};
use consortium_core::setup::build_from_config;
use consortium_core::tick::{SimulationState, TickSummary};

fn build(yaml: &str) -> (SimulationConfig, SimulationState) {
    let config = SimulationConfig::parse(yaml).unwrap();
    let state = build_from_config(&config, Path::new(".")).unwrap();
    (config, state)
}

const FEED: &str = r"
simulation: { interval: 0.5, max_ticks: 6 }
environment: { volume: 1, counts: { glc: 0 } }
agents:
  - { kind: pulsed, name: feed, period: 2, amounts: { glc: 10 } }
";

#[tokio::test]
async fn stops_at_tick_limit() {
    let (config, mut state) = build(FEED);
    let control = RunControl::from_config(&config.simulation);
    let mut history = HistoryRecorder::new();
    history.record_initial(&state);

    let result = run_simulation(&mut state, &control, &mut history)
        .await
        .unwrap();

    assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
    assert_eq!(result.total_ticks, 6);
    assert_eq!(result.final_summary.unwrap().tick, 5);
    assert_eq!(state.clock.tick(), 6);

    assert_eq!(history.len(), 7);
    let times: Vec<f64> = history.points().iter().map(|p| p.time).collect();
    for (i, t) in times.iter().enumerate() {
        let expected = 0.5 * f64::from(u32::try_from(i).unwrap());
        assert!((t - expected).abs() < 1e-12);
    }
    // Pulses on ticks 1, 3, 5.
    let last = history.series("glc").last().copied().unwrap();
    assert!((last.1 - 30.0).abs() < 1e-9);
}

#[tokio::test]
async fn stop_request_halts_before_next_tick() {
    let (_, mut state) = build(FEED);
    let control = RunControl::new(0, 0);
    control.request_stop();

    let result = run_simulation(&mut state, &control, &mut NoOpCallback)
        .await
        .unwrap();

    assert_eq!(result.end_reason, SimulationEndReason::OperatorStop);
    assert_eq!(result.total_ticks, 0);
    assert!(result.final_summary.is_none());
    assert_eq!(state.clock.tick(), 0);
}

/// Requests a stop once a given number of ticks has completed.
struct StopAfter {
    control: Arc<RunControl>,
    ticks: u64,
}

impl TickCallback for StopAfter {
    fn on_tick(&mut self, summary: &TickSummary, _state: &SimulationState) {
        if summary.tick.saturating_add(1) >= self.ticks {
            self.control.request_stop();
        }
    }
}

#[tokio::test]
async fn stop_from_callback_finishes_current_tick() {
    let (_, mut state) = build(FEED);
    let control = Arc::new(RunControl::new(0, 1));
    let mut callback = StopAfter {
        control: Arc::clone(&control),
        ticks: 3,
    };

    let result = run_simulation(&mut state, &control, &mut callback)
        .await
        .unwrap();

    assert_eq!(result.end_reason, SimulationEndReason::OperatorStop);
    assert_eq!(result.total_ticks, 3);
    assert!(control.is_stop_requested());
}

#[tokio::test]
async fn stop_from_another_task() {
    let (_, mut state) = build(FEED);
    let control = Arc::new(RunControl::new(0, 5));
    let stopper = Arc::clone(&control);
    let handle = tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_millis(30)).await;
        stopper.request_stop();
    });

    let result = run_simulation(&mut state, &control, &mut NoOpCallback)
        .await
        .unwrap();
    handle.await.unwrap();

    assert_eq!(result.end_reason, SimulationEndReason::OperatorStop);
    assert!(result.total_ticks > 0);
}

#[tokio::test]
async fn ends_on_extinction() {
    let (_, mut state) = build(
        r"
environment: { volume: 1, counts: { glc: 5, E.coli: 1 } }
models:
  toy:
    objective: BIOMASS
    reactions:
      EX_glc: { lower: -1000, upper: 1000, exchange: true }
      BIOMASS: { lower: 0, upper: 1000 }
    yields: { EX_glc: 0.1 }
agents:
  - kind: metabolic
    name: E.coli
    model: toy
    kinetics: { glc: { km: 0.5, vmax: 10 } }
    reaction_map: { glc: EX_glc }
thresholds:
  - { substrate: glc, range: { lower: 10 }, direction: remove, name: E.coli }
",
    );
    let control = RunControl::new(50, 0);

    let result = run_simulation(&mut state, &control, &mut NoOpCallback)
        .await
        .unwrap();

    assert_eq!(result.end_reason, SimulationEndReason::Extinction);
    assert_eq!(result.total_ticks, 1);
    let summary = result.final_summary.unwrap();
    assert_eq!(summary.agents_live, 0);
    assert!(!summary.pool.contains("E.coli"));
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn history_exports_to_disk() {
    let (config, mut state) = build(FEED);
    let control = RunControl::from_config(&config.simulation);
    let mut history = HistoryRecorder::new();
    run_simulation(&mut state, &control, &mut history)
        .await
        .unwrap();

    let path = std::env::temp_dir().join(format!("consortium-history-{}.json", std::process::id()));
    history.write_json(&path).unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(written.as_array().unwrap().len(), 6);
}
