//! The shared resource pool.
//!
//! A [`ResourcePool`] holds one volume and, per key, a count and a
//! concentration. Keys are substrate identifiers or agent names (an agent's
//! biomass lives under its own name). For every key the pool maintains
//! `concentration = count / volume`; writes go through [`ResourcePool::apply`]
//! or one of the narrow setters, each of which recomputes the dependent side
//! before committing.
//!
//! Writes are all-or-nothing: an update is validated against a scratch copy
//! and the pool is only replaced once every key has passed.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::EnvironmentError;

/// Tolerance used for rounding noise around zero.
///
/// A count that lands in `[-EPSILON, 0)` after a write is treated as zero;
/// anything lower is rejected.
pub const EPSILON: f64 = 1e-9;

/// A write to the pool, expressed either in counts or in concentrations.
///
/// Deltas are additive. Supplying both sides at once is not representable.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolUpdate {
    /// Count deltas, with an optional volume delta.
    Counts {
        /// Signed change per key.
        counts: BTreeMap<String, f64>,
        /// Signed change to the volume.
        volume: Option<f64>,
    },
    /// Concentration deltas per key.
    Concentrations(BTreeMap<String, f64>),
}

impl PoolUpdate {
    /// A count update without a volume change.
    pub const fn counts(counts: BTreeMap<String, f64>) -> Self {
        Self::Counts {
            counts,
            volume: None,
        }
    }
}

/// Counts and concentrations of every substrate and biomass entry in one
/// well-mixed volume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourcePool {
    volume: f64,
    counts: BTreeMap<String, f64>,
    concentrations: BTreeMap<String, f64>,
}

impl ResourcePool {
    /// Build a pool from absolute counts.
    pub fn from_counts(
        volume: f64,
        counts: BTreeMap<String, f64>,
    ) -> Result<Self, EnvironmentError> {
        check_volume(volume)?;
        let mut checked = BTreeMap::new();
        for (key, value) in counts {
            let value = checked_value(&key, value)?;
            checked.insert(key, value);
        }
        Ok(Self::with_counts(volume, checked))
    }

    /// Build a pool from absolute concentrations.
    pub fn from_concentrations(
        volume: f64,
        concentrations: BTreeMap<String, f64>,
    ) -> Result<Self, EnvironmentError> {
        check_volume(volume)?;
        let mut counts = BTreeMap::new();
        for (key, value) in concentrations {
            let value = checked_value(&key, value)?;
            counts.insert(key, value * volume);
        }
        Ok(Self::with_counts(volume, counts))
    }

    /// Assemble a pool from already-validated counts.
    fn with_counts(volume: f64, counts: BTreeMap<String, f64>) -> Self {
        let concentrations = counts
            .iter()
            .map(|(key, count)| (key.clone(), count / volume))
            .collect();
        Self {
            volume,
            counts,
            concentrations,
        }
    }

    /// The volume.
    pub const fn volume(&self) -> f64 {
        self.volume
    }

    /// All counts, keyed in order.
    pub const fn counts(&self) -> &BTreeMap<String, f64> {
        &self.counts
    }

    /// All concentrations, keyed in order.
    pub const fn concentrations(&self) -> &BTreeMap<String, f64> {
        &self.concentrations
    }

    /// Count for `key`, reading a missing key as zero.
    pub fn count(&self, key: &str) -> f64 {
        self.counts.get(key).copied().unwrap_or(0.0)
    }

    /// Concentration for `key`, reading a missing key as zero.
    pub fn concentration(&self, key: &str) -> f64 {
        self.concentrations.get(key).copied().unwrap_or(0.0)
    }

    /// Concentration for `key`, or `None` when the key is absent.
    pub fn get_concentration(&self, key: &str) -> Option<f64> {
        self.concentrations.get(key).copied()
    }

    /// Whether `key` has an entry.
    pub fn contains(&self, key: &str) -> bool {
        self.counts.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the pool has no entries.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of every count.
    pub fn total_count(&self) -> f64 {
        self.counts.values().sum()
    }

    /// Apply an additive update.
    ///
    /// On success every touched key has its count and concentration in
    /// step. A volume change rescales every concentration. On error the
    /// pool is unchanged.
    pub fn apply(&mut self, update: PoolUpdate) -> Result<(), EnvironmentError> {
        match update {
            PoolUpdate::Counts { counts, volume } => self.apply_counts(&counts, volume),
            PoolUpdate::Concentrations(deltas) => self.apply_concentrations(&deltas),
        }
    }

    fn apply_counts(
        &mut self,
        deltas: &BTreeMap<String, f64>,
        volume_delta: Option<f64>,
    ) -> Result<(), EnvironmentError> {
        let volume = self.volume + volume_delta.unwrap_or(0.0);
        check_volume(volume)?;

        let mut counts = self.counts.clone();
        for (key, delta) in deltas {
            let value = checked_value(key, self.count(key) + delta)?;
            counts.insert(key.clone(), value);
        }

        *self = Self::with_counts(volume, counts);
        Ok(())
    }

    fn apply_concentrations(
        &mut self,
        deltas: &BTreeMap<String, f64>,
    ) -> Result<(), EnvironmentError> {
        let mut next = self.clone();
        for (key, delta) in deltas {
            let value = checked_value(key, self.concentration(key) + delta)?;
            next.concentrations.insert(key.clone(), value);
            next.counts.insert(key.clone(), value * self.volume);
        }
        *self = next;
        Ok(())
    }

    /// Overwrite the count for `key`, creating the entry if needed.
    pub fn set_count(&mut self, key: &str, value: f64) -> Result<(), EnvironmentError> {
        let value = checked_value(key, value)?;
        self.counts.insert(key.to_owned(), value);
        self.concentrations.insert(key.to_owned(), value / self.volume);
        Ok(())
    }

    /// Insert a new entry. Fails if the key already exists.
    pub fn insert_entry(&mut self, key: &str, count: f64) -> Result<(), EnvironmentError> {
        if self.contains(key) {
            return Err(EnvironmentError::DuplicateEntry(key.to_owned()));
        }
        self.set_count(key, count)
    }

    /// Remove an entry, returning its last count.
    pub fn remove_entry(&mut self, key: &str) -> Option<f64> {
        self.concentrations.remove(key);
        self.counts.remove(key)
    }

    /// Whether every concentration equals `count / volume` within `eps`
    /// and every count is non-negative.
    pub fn check_invariant(&self, eps: f64) -> bool {
        if self.counts.len() != self.concentrations.len() || self.volume <= 0.0 {
            return false;
        }
        self.counts.iter().all(|(key, count)| {
            *count >= 0.0
                && self
                    .concentrations
                    .get(key)
                    .is_some_and(|conc| (conc - count / self.volume).abs() <= eps)
        })
    }
}

fn check_volume(volume: f64) -> Result<(), EnvironmentError> {
    if volume.is_finite() && volume > 0.0 {
        Ok(())
    } else {
        Err(EnvironmentError::InvalidVolume(volume))
    }
}

/// Validate a prospective count or concentration, clamping rounding noise.
fn checked_value(key: &str, value: f64) -> Result<f64, EnvironmentError> {
    if !value.is_finite() {
        return Err(EnvironmentError::NonFinite {
            key: key.to_owned(),
            value,
        });
    }
    if value < -EPSILON {
        return Err(EnvironmentError::NegativeCount {
            key: key.to_owned(),
            value,
        });
    }
    Ok(value.max(0.0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn map(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), *v))
            .collect()
    }

    #[test]
    fn from_counts_derives_concentrations() {
        let pool = ResourcePool::from_counts(2.0, map(&[("glc", 10.0), ("E.coli", 0.5)])).unwrap();
        assert!(approx(pool.concentration("glc"), 5.0));
        assert!(approx(pool.concentration("E.coli"), 0.25));
        assert!(pool.check_invariant(1e-12));
    }

    #[test]
    fn from_concentrations_derives_counts() {
        let pool = ResourcePool::from_concentrations(4.0, map(&[("glc", 2.5)])).unwrap();
        assert!(approx(pool.count("glc"), 10.0));
        assert!(pool.check_invariant(1e-12));
    }

    #[test]
    fn rejects_bad_volume() {
        assert!(matches!(
            ResourcePool::from_counts(0.0, BTreeMap::new()),
            Err(EnvironmentError::InvalidVolume(_))
        ));
        assert!(ResourcePool::from_counts(f64::NAN, BTreeMap::new()).is_err());
        assert!(ResourcePool::from_counts(-1.0, BTreeMap::new()).is_err());
    }

    #[test]
    fn count_delta_updates_concentration() {
        let mut pool = ResourcePool::from_counts(1.0, map(&[("glc", 10.0)])).unwrap();
        pool.apply(PoolUpdate::counts(map(&[("glc", -4.0), ("ac", 1.5)])))
            .unwrap();
        assert!(approx(pool.count("glc"), 6.0));
        assert!(approx(pool.concentration("ac"), 1.5));
        assert!(pool.check_invariant(1e-12));
    }

    #[test]
    fn volume_change_rescales_all_concentrations() {
        let mut pool = ResourcePool::from_counts(1.0, map(&[("glc", 10.0), ("ac", 4.0)])).unwrap();
        pool.apply(PoolUpdate::Counts {
            counts: BTreeMap::new(),
            volume: Some(1.0),
        })
        .unwrap();
        assert!(approx(pool.volume(), 2.0));
        assert!(approx(pool.concentration("glc"), 5.0));
        assert!(approx(pool.concentration("ac"), 2.0));
    }

    #[test]
    fn concentration_delta_updates_count() {
        let mut pool = ResourcePool::from_counts(2.0, map(&[("glc", 10.0)])).unwrap();
        pool.apply(PoolUpdate::Concentrations(map(&[("glc", 1.0)])))
            .unwrap();
        assert!(approx(pool.count("glc"), 12.0));
        assert!(pool.check_invariant(1e-12));
    }

    #[test]
    fn negative_result_is_rejected_and_pool_unchanged() {
        let mut pool = ResourcePool::from_counts(1.0, map(&[("glc", 1.0), ("ac", 1.0)])).unwrap();
        let before = pool.clone();
        let result = pool.apply(PoolUpdate::counts(map(&[("ac", 5.0), ("glc", -2.0)])));
        assert!(matches!(result, Err(EnvironmentError::NegativeCount { .. })));
        assert_eq!(pool, before);
    }

    #[test]
    fn rounding_noise_clamps_to_zero() {
        let mut pool = ResourcePool::from_counts(1.0, map(&[("glc", 1.0)])).unwrap();
        pool.apply(PoolUpdate::counts(map(&[("glc", -1.0 - 1e-12)])))
            .unwrap();
        assert!(approx(pool.count("glc"), 0.0));
        assert!(pool.count("glc") >= 0.0);
    }

    #[test]
    fn insert_and_remove_entries() {
        let mut pool = ResourcePool::from_counts(2.0, BTreeMap::new()).unwrap();
        pool.insert_entry("E.coli 2", 0.5).unwrap();
        assert!(approx(pool.concentration("E.coli 2"), 0.25));
        assert!(matches!(
            pool.insert_entry("E.coli 2", 1.0),
            Err(EnvironmentError::DuplicateEntry(_))
        ));
        assert_eq!(pool.remove_entry("E.coli 2"), Some(0.5));
        assert!(!pool.contains("E.coli 2"));
        assert!(pool.get_concentration("E.coli 2").is_none());
    }

    #[test]
    fn missing_key_reads_as_zero() {
        let pool = ResourcePool::from_counts(1.0, BTreeMap::new()).unwrap();
        assert!(approx(pool.count("nothing"), 0.0));
        assert!(approx(pool.concentration("nothing"), 0.0));
        assert!(pool.is_empty());
    }
}
