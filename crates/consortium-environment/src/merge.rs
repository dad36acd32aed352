//! The merge protocol.
//!
//! Every tick each live agent proposes an [`AgentDelta`] against the same
//! snapshot. The [`Reducer`] draws a fresh permutation of the agents from
//! its seeded RNG, walks the deltas in that order, and produces the next
//! pool. Two strategies are supported:
//!
//! 1. **Last write wins**: for each key the contribution of the last agent
//!    in the permutation replaces any earlier one. A contribution that would
//!    drive the count below zero is replaced by `-current`.
//! 2. **Summation**: contributions are summed and the result is clamped at
//!    zero.
//!
//! The reducer is also the only component that performs lifecycle writes
//! (biomass transfer on spawn, entry removal on retire), so every change to
//! the pool passes through this module.

use std::collections::BTreeMap;

use consortium_types::{AgentDelta, MergeStrategy};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::debug;

use crate::error::EnvironmentError;
use crate::pool::{PoolUpdate, ResourcePool};

/// A contribution discarded under last-write-wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverwrittenContribution {
    /// Pool key both agents wrote.
    pub key: String,
    /// Agent whose contribution was discarded.
    pub agent: String,
    /// The discarded contribution.
    pub discarded: f64,
    /// Agent whose later write replaced it.
    pub replaced_by: String,
}

/// What happened during one merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    /// Agent order used for this merge.
    pub order: Vec<String>,
    /// Final contribution applied per key.
    pub contributions: BTreeMap<String, f64>,
    /// Keys whose contribution was clamped to keep the count non-negative.
    pub clamped: Vec<String>,
    /// Contributions replaced by a later agent.
    pub overwritten: Vec<OverwrittenContribution>,
}

/// Merges per-agent deltas into the pool in a seeded random order.
///
/// Cloning a reducer clones its RNG state, so a clone draws the same
/// permutations as the original.
#[derive(Debug, Clone)]
pub struct Reducer {
    strategy: MergeStrategy,
    rng: StdRng,
}

impl Reducer {
    /// Create a reducer with a deterministic RNG.
    pub fn new(strategy: MergeStrategy, seed: u64) -> Self {
        Self {
            strategy,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The strategy in use.
    pub const fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Draw the next permutation of `agents`.
    ///
    /// The input is sorted first so the result depends only on the seed and
    /// the set of names.
    pub fn permutation<'a, I>(&mut self, agents: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut order: Vec<String> = agents.into_iter().map(str::to_owned).collect();
        order.sort_unstable();
        order.shuffle(&mut self.rng);
        order
    }

    /// Merge one tick's deltas into `pool`, returning the next pool.
    ///
    /// `pool` is the pre-merge state every agent saw; it is not modified.
    /// Keys absent from the pool read as zero and are created only when
    /// their resulting count is positive.
    pub fn merge(
        &mut self,
        pool: &ResourcePool,
        deltas: &BTreeMap<String, AgentDelta>,
    ) -> Result<(ResourcePool, MergeReport), EnvironmentError> {
        let order = self.permutation(deltas.keys().map(String::as_str));
        let mut report = MergeReport::default();

        match self.strategy {
            MergeStrategy::LastWriteWins => {
                let mut winners: BTreeMap<String, (String, f64)> = BTreeMap::new();
                for agent in &order {
                    let Some(delta) = deltas.get(agent) else {
                        continue;
                    };
                    for (key, change) in delta.iter() {
                        check_finite(key, change)?;
                        let current = pool.count(key);
                        let contribution = if current + change > 0.0 {
                            change
                        } else {
                            if current + change < 0.0 {
                                report.clamped.push(key.to_owned());
                            }
                            -current
                        };
                        if let Some((previous, discarded)) =
                            winners.insert(key.to_owned(), (agent.clone(), contribution))
                        {
                            report.overwritten.push(OverwrittenContribution {
                                key: key.to_owned(),
                                agent: previous,
                                discarded,
                                replaced_by: agent.clone(),
                            });
                        }
                    }
                }
                report.contributions = winners
                    .into_iter()
                    .map(|(key, (_, contribution))| (key, contribution))
                    .collect();
            }
            MergeStrategy::Summation => {
                let mut sums: BTreeMap<String, f64> = BTreeMap::new();
                for agent in &order {
                    let Some(delta) = deltas.get(agent) else {
                        continue;
                    };
                    for (key, change) in delta.iter() {
                        check_finite(key, change)?;
                        *sums.entry(key.to_owned()).or_insert(0.0) += change;
                    }
                }
                for (key, sum) in sums {
                    let current = pool.count(&key);
                    let contribution = if current + sum < 0.0 {
                        report.clamped.push(key.clone());
                        -current
                    } else {
                        sum
                    };
                    report.contributions.insert(key, contribution);
                }
            }
        }

        let mut counts = pool.counts().clone();
        for (key, contribution) in &report.contributions {
            let next = (pool.count(key) + contribution).max(0.0);
            if pool.contains(key) || next > 0.0 {
                counts.insert(key.clone(), next);
            }
        }
        let next = ResourcePool::from_counts(pool.volume(), counts)?;

        debug!(
            agents = order.len(),
            keys = report.contributions.len(),
            clamped = report.clamped.len(),
            overwritten = report.overwritten.len(),
            "Merged tick deltas"
        );
        report.order = order;
        Ok((next, report))
    }

    /// Move `mass` biomass from `parent` to a new `offspring` entry.
    ///
    /// After the call the parent holds `mass` less and the offspring holds
    /// exactly `mass`. Fails without writing if the parent holds less than
    /// `mass` or is missing.
    pub fn transfer_mass(
        pool: &mut ResourcePool,
        parent: &str,
        offspring: &str,
        mass: f64,
    ) -> Result<(), EnvironmentError> {
        if !pool.contains(parent) {
            return Err(EnvironmentError::EntryNotFound(parent.to_owned()));
        }
        let available = pool.count(parent);
        if !mass.is_finite() || mass < 0.0 || available < mass {
            return Err(EnvironmentError::InsufficientBiomass {
                parent: parent.to_owned(),
                available,
                requested: mass,
            });
        }
        let existing = pool.count(offspring);
        let update = PoolUpdate::counts(BTreeMap::from([
            (parent.to_owned(), -mass),
            (offspring.to_owned(), mass - existing),
        ]));
        pool.apply(update)?;
        debug!(parent, offspring, mass, "Transferred biomass");
        Ok(())
    }

    /// Remove a retired agent's biomass entry, returning its last count.
    pub fn retire_entry(pool: &mut ResourcePool, name: &str) -> Option<f64> {
        let removed = pool.remove_entry(name);
        debug!(agent = name, biomass = removed, "Removed biomass entry");
        removed
    }
}

fn check_finite(key: &str, value: f64) -> Result<(), EnvironmentError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EnvironmentError::NonFinite {
            key: key.to_owned(),
            value,
        })
    }
}
