//! Core data structs: kinetics, bounds, model changes, threshold rules,
//! and the per-tick agent delta.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::Direction;

// ---------------------------------------------------------------------------
// Kinetics and bounds
// ---------------------------------------------------------------------------

/// Michaelis--Menten uptake parameters for one substrate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kinetics {
    /// Half-saturation constant.
    pub km: f64,
    /// Maximum uptake rate.
    pub vmax: f64,
}

impl Kinetics {
    /// Create a kinetics pair.
    pub const fn new(km: f64, vmax: f64) -> Self {
        Self { km, vmax }
    }

    /// Saturating uptake rate at the given concentration.
    ///
    /// `vmax * c / (km + c)`, or zero when the denominator is not positive.
    pub fn uptake_rate(&self, concentration: f64) -> f64 {
        let denominator = self.km + concentration;
        if denominator <= 0.0 {
            return 0.0;
        }
        self.vmax * concentration / denominator
    }
}

/// Optional lower/upper flux bounds for a reaction.
///
/// `None` leaves the corresponding model bound untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower flux bound.
    #[serde(default)]
    pub lower: Option<f64>,
    /// Upper flux bound.
    #[serde(default)]
    pub upper: Option<f64>,
}

impl Bounds {
    /// Bounds with both sides set.
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// Bounds that only set the lower side.
    pub const fn lower(lower: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Model changes
// ---------------------------------------------------------------------------

/// Modifications applied once to an agent's model at creation.
///
/// Used for seed agents (their configured `changes`) and for offspring
/// spawned by a threshold rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelChanges {
    /// Gene identifiers to knock out.
    #[serde(default, alias = "gene_knockout")]
    pub gene_knockouts: Vec<String>,
    /// Reaction identifiers to knock out.
    #[serde(default, alias = "reaction_knockout")]
    pub reaction_knockouts: Vec<String>,
    /// Reaction bound overrides.
    #[serde(default)]
    pub bounds: BTreeMap<String, Bounds>,
    /// Kinetic parameter overrides, keyed by substrate.
    #[serde(default)]
    pub kinetics: BTreeMap<String, Kinetics>,
}

impl ModelChanges {
    /// Whether this change set does nothing.
    pub fn is_empty(&self) -> bool {
        self.gene_knockouts.is_empty()
            && self.reaction_knockouts.is_empty()
            && self.bounds.is_empty()
            && self.kinetics.is_empty()
    }

    /// Layer `other` on top of `self`.
    ///
    /// Knockout lists are concatenated without duplicates; bound and
    /// kinetic overrides in `other` replace those in `self`.
    #[must_use]
    pub fn merged_with(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for gene in &other.gene_knockouts {
            if !merged.gene_knockouts.contains(gene) {
                merged.gene_knockouts.push(gene.clone());
            }
        }
        for reaction in &other.reaction_knockouts {
            if !merged.reaction_knockouts.contains(reaction) {
                merged.reaction_knockouts.push(reaction.clone());
            }
        }
        merged
            .bounds
            .extend(other.bounds.iter().map(|(k, v)| (k.clone(), *v)));
        merged
            .kinetics
            .extend(other.kinetics.iter().map(|(k, v)| (k.clone(), *v)));
        merged
    }
}

// ---------------------------------------------------------------------------
// Threshold rules
// ---------------------------------------------------------------------------

/// Concentration window for a threshold rule.
///
/// The rule fires when the concentration leaves the window on a side
/// that is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRange {
    /// Fire when the concentration is strictly above this value.
    #[serde(default)]
    pub upper: Option<f64>,
    /// Fire when the concentration is strictly below this value.
    #[serde(default)]
    pub lower: Option<f64>,
}

impl ThresholdRange {
    /// Whether at least one side is set.
    pub const fn is_set(&self) -> bool {
        self.upper.is_some() || self.lower.is_some()
    }

    /// Whether `concentration` triggers the rule.
    pub fn is_triggered(&self, concentration: f64) -> bool {
        self.upper.is_some_and(|upper| concentration > upper)
            || self.lower.is_some_and(|lower| concentration < lower)
    }
}

/// A threshold rule as written in configuration.
///
/// Field requirements depend on `direction` and are checked when the
/// core crate turns the spec into a validated rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSpec {
    /// Pool key whose concentration is monitored.
    pub substrate: String,
    /// Trigger window.
    pub range: ThresholdRange,
    /// Spawn or retire.
    #[serde(alias = "type")]
    pub direction: Direction,
    /// Parent agent (required for [`Direction::Add`]).
    #[serde(default)]
    pub parent: Option<String>,
    /// Offspring name for `Add`, or the agent to retire for `Remove`.
    pub name: String,
    /// Changes applied to the offspring's model.
    #[serde(default)]
    pub changes: ModelChanges,
    /// Biomass moved from parent to offspring on spawn.
    #[serde(default, alias = "transfer_mass")]
    pub mass: f64,
}

// ---------------------------------------------------------------------------
// Agent delta
// ---------------------------------------------------------------------------

/// One agent's proposed signed change to the pool for one tick.
///
/// Keys are substrate identifiers or agent names (biomass entries).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentDelta(BTreeMap<String, f64>);

impl AgentDelta {
    /// An empty delta.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Set the change for a key, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    /// The change for a key, if present.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    /// Iterate over `(key, change)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Whether the delta touches no key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of keys touched.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sum of all changes.
    pub fn net(&self) -> f64 {
        self.0.values().sum()
    }
}

impl FromIterator<(String, f64)> for AgentDelta {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
