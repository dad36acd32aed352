//! Agent specifications as they appear in configuration.
//!
//! A spec is inert data. The agents crate turns a [`MetabolicSpec`] into a
//! live agent by loading its model, and wraps forcing specs directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::TargetUnit;
use crate::structs::{Bounds, Kinetics, ModelChanges};

/// Any agent that can be configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentSpec {
    /// Flux-balance agent backed by a metabolic model.
    Metabolic(MetabolicSpec),
    /// Holds substrates at fixed targets.
    Setpoint(SetpointSpec),
    /// Drives substrates along a sine wave.
    Oscillatory(OscillatorySpec),
    /// Injects fixed amounts periodically.
    Pulsed(PulsedSpec),
}

impl AgentSpec {
    /// The configured agent name.
    pub fn name(&self) -> &str {
        match self {
            Self::Metabolic(spec) => &spec.name,
            Self::Setpoint(spec) => &spec.name,
            Self::Oscillatory(spec) => &spec.name,
            Self::Pulsed(spec) => &spec.name,
        }
    }
}

/// Configuration of a metabolic (flux-balance) agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetabolicSpec {
    /// Unique agent name; also the agent's biomass key in the pool.
    pub name: String,
    /// Model reference resolved by the model loader.
    pub model: String,
    /// Uptake kinetics per substrate.
    #[serde(default)]
    pub kinetics: BTreeMap<String, Kinetics>,
    /// Substrate to exchange-reaction mapping.
    #[serde(default)]
    pub reaction_map: BTreeMap<String, String>,
    /// Static reaction bounds applied at creation.
    #[serde(default)]
    pub bounds: BTreeMap<String, Bounds>,
    /// Knockouts and overrides applied at creation.
    #[serde(default)]
    pub changes: ModelChanges,
}

impl MetabolicSpec {
    /// Keys this agent writes each tick: its substrates and its own name.
    pub fn tracked_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.reaction_map.keys().cloned().collect();
        keys.push(self.name.clone());
        keys
    }

    /// Clone this spec for an offspring with a new name and extra changes.
    #[must_use]
    pub fn offspring(&self, name: &str, changes: &ModelChanges) -> Self {
        Self {
            name: name.to_owned(),
            changes: self.changes.merged_with(changes),
            ..self.clone()
        }
    }
}

/// Configuration of a fixed-setpoint forcing agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetpointSpec {
    /// Unique agent name.
    pub name: String,
    /// Target per substrate.
    pub targets: BTreeMap<String, f64>,
    /// Whether targets are counts or concentrations.
    #[serde(default)]
    pub unit: TargetUnit,
}

/// One sine wave driving a substrate's concentration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    /// Peak deviation from the baseline.
    pub amplitude: f64,
    /// Angular frequency in radians per unit time.
    #[serde(alias = "omega")]
    pub angular_frequency: f64,
    /// Phase offset in radians.
    #[serde(default)]
    pub phase: f64,
    /// Mean concentration.
    #[serde(default)]
    pub baseline: f64,
}

impl Wave {
    /// Target concentration at simulation time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        self.amplitude.mul_add(self.angular_frequency.mul_add(t, self.phase).sin(), self.baseline)
    }
}

/// Configuration of an oscillatory forcing agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscillatorySpec {
    /// Unique agent name.
    pub name: String,
    /// Wave per substrate.
    pub waves: BTreeMap<String, Wave>,
}

/// Configuration of a pulsed forcing agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulsedSpec {
    /// Unique agent name.
    pub name: String,
    /// Pulse period in ticks (must be at least 1).
    pub period: u64,
    /// Amount injected per substrate on each pulse.
    pub amounts: BTreeMap<String, f64>,
}

impl PulsedSpec {
    /// Whether a pulse is delivered on 0-indexed tick `tick`.
    ///
    /// Pulses land on ticks where `(tick + 1) % period == 0`, never on
    /// tick 0. A zero period never fires.
    pub fn fires_at(&self, tick: u64) -> bool {
        if self.period == 0 || tick == 0 {
            return false;
        }
        tick.checked_add(1)
            .and_then(|next| next.checked_rem(self.period))
            .is_some_and(|rem| rem == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(period: u64) -> PulsedSpec {
        PulsedSpec {
            name: String::from("injector"),
            period,
            amounts: BTreeMap::from([(String::from("D-Glucose"), 80.0)]),
        }
    }

    #[test]
    fn pulses_on_expected_ticks() {
        let spec = pulse(5);
        let fired: Vec<u64> = (0..16).filter(|t| spec.fires_at(*t)).collect();
        assert_eq!(fired, vec![4, 9, 14]);
    }

    #[test]
    fn period_one_skips_tick_zero() {
        let spec = pulse(1);
        assert!(!spec.fires_at(0));
        assert!(spec.fires_at(1));
        assert!(spec.fires_at(2));
    }

    #[test]
    fn zero_period_never_fires() {
        let spec = pulse(0);
        assert!((0..10).all(|t| !spec.fires_at(t)));
    }

    #[test]
    fn wave_at_zero_is_baseline_plus_phase() {
        let wave = Wave {
            amplitude: 2.0,
            angular_frequency: 1.0,
            phase: 0.0,
            baseline: 5.0,
        };
        assert!((wave.value_at(0.0) - 5.0).abs() < 1e-12);
        assert!((wave.value_at(core::f64::consts::FRAC_PI_2) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn offspring_keeps_config_and_renames() {
        let parent = MetabolicSpec {
            name: String::from("E.coli"),
            model: String::from("iAF1260"),
            kinetics: BTreeMap::from([(String::from("Acetate"), Kinetics::new(0.5, 7.0))]),
            reaction_map: BTreeMap::from([(String::from("Acetate"), String::from("EX_ac_e"))]),
            bounds: BTreeMap::new(),
            changes: ModelChanges::default(),
        };
        let changes = ModelChanges {
            reaction_knockouts: vec![String::from("EX_ac_e")],
            ..ModelChanges::default()
        };
        let child = parent.offspring("E.coli 2", &changes);
        assert_eq!(child.name, "E.coli 2");
        assert_eq!(child.model, parent.model);
        assert_eq!(child.changes.reaction_knockouts.len(), 1);
        assert_eq!(child.tracked_keys(), vec![String::from("Acetate"), String::from("E.coli 2")]);
    }

    #[test]
    fn agent_spec_is_tagged_by_kind() {
        let json = r#"{"kind":"pulsed","name":"inj","period":5,"amounts":{"Acetate":1.0}}"#;
        let spec: Result<AgentSpec, _> = serde_json::from_str(json);
        assert!(matches!(spec, Ok(AgentSpec::Pulsed(_))));
    }
}
