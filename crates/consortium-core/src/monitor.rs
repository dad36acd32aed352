//! Threshold rules and the population monitor.
//!
//! After each merge the [`PopulationMonitor`] checks every rule against the
//! post-merge pool. A rule fires when the monitored concentration leaves
//! its window, and it fires again on every tick the condition holds.
//! Firing produces [`LifecycleDirective`]s in rule order:
//!
//! - **Add** spawns an offspring cloned from a live metabolic parent, with
//!   the rule's model changes layered on, and plans a biomass transfer.
//!   Re-firing once the offspring exists is a no-op.
//! - **Remove** retires a live agent. Naming an absent or retired agent is
//!   a no-op.
//!
//! A spawn that cannot go ahead (parent missing, retired, not metabolic,
//! or short of biomass) is recorded as a [`SkippedFiring`] and logged.

use std::collections::{BTreeMap, BTreeSet};

use consortium_agents::{AgentRegistry, LifecycleDirective};
use consortium_environment::ResourcePool;
use consortium_types::{Direction, ModelChanges, ThresholdRange, ThresholdSpec};
use serde::Serialize;
use tracing::{debug, warn};

/// Errors in a threshold rule's configuration.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Neither side of the range is set.
    #[error("rule on {substrate} has no upper or lower bound")]
    NoBounds {
        /// Monitored substrate.
        substrate: String,
    },

    /// A range bound is not finite.
    #[error("rule on {substrate} has a non-finite bound")]
    NonFiniteBound {
        /// Monitored substrate.
        substrate: String,
    },

    /// An Add rule without a parent.
    #[error("add rule for {name} has no parent")]
    MissingParent {
        /// Offspring name.
        name: String,
    },

    /// The transfer mass is negative or not finite.
    #[error("add rule for {name} has invalid mass {mass}")]
    InvalidMass {
        /// Offspring name.
        name: String,
        /// Offending mass.
        mass: f64,
    },

    /// The offspring would share its parent's name.
    #[error("add rule names offspring {0} after its own parent")]
    SelfParent(String),
}

/// What a rule does when it fires.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleAction {
    /// Spawn an offspring from a parent.
    Spawn {
        /// Parent agent.
        parent: String,
        /// Offspring name.
        offspring: String,
        /// Changes applied to the offspring's model.
        changes: ModelChanges,
        /// Biomass moved from parent to offspring.
        transfer_mass: f64,
    },
    /// Retire an agent.
    Retire {
        /// Agent to retire.
        name: String,
    },
}

/// A validated threshold rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    /// Pool key whose concentration is monitored.
    pub substrate: String,
    /// Trigger window.
    pub range: ThresholdRange,
    /// Action on firing.
    pub action: RuleAction,
}

impl ThresholdRule {
    /// Validate a configured rule.
    pub fn from_spec(spec: &ThresholdSpec) -> Result<Self, RuleError> {
        if !spec.range.is_set() {
            return Err(RuleError::NoBounds {
                substrate: spec.substrate.clone(),
            });
        }
        let bounds_finite = [spec.range.upper, spec.range.lower]
            .into_iter()
            .flatten()
            .all(f64::is_finite);
        if !bounds_finite {
            return Err(RuleError::NonFiniteBound {
                substrate: spec.substrate.clone(),
            });
        }

        let action = match spec.direction {
            Direction::Add => {
                let parent = spec.parent.clone().ok_or_else(|| RuleError::MissingParent {
                    name: spec.name.clone(),
                })?;
                if parent == spec.name {
                    return Err(RuleError::SelfParent(parent));
                }
                if !spec.mass.is_finite() || spec.mass < 0.0 {
                    return Err(RuleError::InvalidMass {
                        name: spec.name.clone(),
                        mass: spec.mass,
                    });
                }
                RuleAction::Spawn {
                    parent,
                    offspring: spec.name.clone(),
                    changes: spec.changes.clone(),
                    transfer_mass: spec.mass,
                }
            }
            Direction::Remove => RuleAction::Retire {
                name: spec.name.clone(),
            },
        };

        Ok(Self {
            substrate: spec.substrate.clone(),
            range: spec.range,
            action,
        })
    }

    /// Whether the rule's condition holds in `pool`. A substrate absent
    /// from the pool never triggers.
    pub fn is_triggered(&self, pool: &ResourcePool) -> bool {
        pool.get_concentration(&self.substrate)
            .is_some_and(|conc| self.range.is_triggered(conc))
    }
}

/// Why a firing Add rule did not spawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The parent is not live (never existed, or retired).
    ParentMissing,
    /// The parent is a forcing agent.
    ParentNotMetabolic,
    /// The parent holds less biomass than the rule transfers.
    InsufficientBiomass {
        /// Biomass the parent holds after earlier transfers this tick.
        available: f64,
        /// Biomass the rule asks for.
        requested: f64,
    },
}

/// An Add rule that fired but could not spawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFiring {
    /// Index of the rule in configuration order.
    pub rule: usize,
    /// Offspring that was not spawned.
    pub offspring: String,
    /// Parent named by the rule.
    pub parent: String,
    /// Why.
    pub reason: SkipReason,
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorOutcome {
    /// Directives to apply, in rule order.
    pub directives: Vec<LifecycleDirective>,
    /// Add firings that were skipped.
    pub skipped: Vec<SkippedFiring>,
}

/// Evaluates threshold rules against the pool.
#[derive(Debug, Clone, Default)]
pub struct PopulationMonitor {
    rules: Vec<ThresholdRule>,
}

impl PopulationMonitor {
    /// Create a monitor from validated rules.
    pub const fn new(rules: Vec<ThresholdRule>) -> Self {
        Self { rules }
    }

    /// Validate configured rules, reporting the index of the first bad one.
    pub fn from_specs(specs: &[ThresholdSpec]) -> Result<Self, (usize, RuleError)> {
        let rules = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| ThresholdRule::from_spec(spec).map_err(|e| (index, e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// The rules, in evaluation order.
    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    /// Evaluate every rule against the post-merge `pool`.
    ///
    /// Later rules see the effects of earlier ones in the same pass: an
    /// offspring planned earlier is not spawned twice, a parent's biomass
    /// is reduced by earlier planned transfers, and an agent already
    /// scheduled for retirement cannot be a parent.
    pub fn evaluate(&self, pool: &ResourcePool, registry: &AgentRegistry) -> MonitorOutcome {
        let mut outcome = MonitorOutcome::default();
        let mut spawning: BTreeSet<&str> = BTreeSet::new();
        let mut retiring: BTreeSet<&str> = BTreeSet::new();
        let mut biomass: BTreeMap<&str, f64> = BTreeMap::new();

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.is_triggered(pool) {
                continue;
            }
            match &rule.action {
                RuleAction::Spawn {
                    parent,
                    offspring,
                    changes,
                    transfer_mass,
                } => {
                    if registry.is_live(offspring)
                        || registry.is_retired(offspring)
                        || spawning.contains(offspring.as_str())
                    {
                        debug!(rule = index, offspring = %offspring, "Add rule fired for existing name, ignored");
                        continue;
                    }
                    let skip = |reason: SkipReason| SkippedFiring {
                        rule: index,
                        offspring: offspring.clone(),
                        parent: parent.clone(),
                        reason,
                    };
                    if !registry.is_live(parent) || retiring.contains(parent.as_str()) {
                        warn!(rule = index, parent = %parent, "Add rule skipped, parent not live");
                        outcome.skipped.push(skip(SkipReason::ParentMissing));
                        continue;
                    }
                    let Some(parent_agent) = registry.metabolic(parent) else {
                        warn!(rule = index, parent = %parent, "Add rule skipped, parent is not metabolic");
                        outcome.skipped.push(skip(SkipReason::ParentNotMetabolic));
                        continue;
                    };
                    let available = biomass
                        .get(parent.as_str())
                        .copied()
                        .unwrap_or_else(|| pool.count(parent));
                    if available < *transfer_mass {
                        warn!(
                            rule = index,
                            parent = %parent,
                            available,
                            requested = transfer_mass,
                            "Add rule skipped, parent biomass too low"
                        );
                        outcome.skipped.push(skip(SkipReason::InsufficientBiomass {
                            available,
                            requested: *transfer_mass,
                        }));
                        continue;
                    }
                    biomass.insert(parent.as_str(), available - transfer_mass);

                    let spec = parent_agent.spec().offspring(offspring, changes);
                    let mut tracked: Vec<String> = parent_agent
                        .tracked_keys()
                        .into_iter()
                        .filter(|key| key != parent)
                        .collect();
                    tracked.push(offspring.clone());

                    debug!(rule = index, parent = %parent, offspring = %offspring, "Add rule fired");
                    spawning.insert(offspring.as_str());
                    outcome.directives.push(LifecycleDirective::Spawn {
                        spec,
                        parent: parent.clone(),
                        transfer_mass: *transfer_mass,
                        tracked,
                    });
                }
                RuleAction::Retire { name } => {
                    if !registry.is_live(name) || retiring.contains(name.as_str()) {
                        debug!(rule = index, agent = %name, "Remove rule fired for absent agent, ignored");
                        continue;
                    }
                    debug!(rule = index, agent = %name, "Remove rule fired");
                    retiring.insert(name.as_str());
                    outcome.directives.push(LifecycleDirective::Retire { name: name.clone() });
                }
            }
        }
        outcome
    }
}
