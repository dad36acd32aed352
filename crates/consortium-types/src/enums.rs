//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};

/// What a threshold rule does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Spawn a new agent cloned from a parent.
    Add,
    /// Retire an existing agent.
    Remove,
}

/// How the reducer combines two agents writing the same key in one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// The last agent in the tick's permutation wins; earlier contributions
    /// to the same key are discarded.
    #[default]
    LastWriteWins,
    /// Contributions to the same key are summed, then clamped at zero.
    Summation,
}

/// Unit in which a setpoint target is expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetUnit {
    /// Targets are absolute counts.
    #[default]
    Counts,
    /// Targets are concentrations; the count target is `value * volume`.
    Concentration,
}

/// How a forcing agent derives the delta it emits.
///
/// Every agent emits a signed change relative to the tick snapshot. This
/// tag records whether the agent first computes an absolute target and
/// subtracts the current count, or emits a fixed change directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaContract {
    /// `delta = target_count - current_count`.
    TargetCount,
    /// `delta` is emitted as configured.
    DeltaCount,
}
