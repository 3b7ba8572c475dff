//! Per-query match statistics.

use serde::{Deserialize, Serialize};

use super::keys::stats_key;
use super::manager::CacheManager;
use crate::{Error, QueryId};

/// Match-count bounds and estimate for a query. `None` means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
    pub estimate: Option<i64>,
}

impl Stats {
    pub fn new(lower: Option<i64>, upper: Option<i64>, estimate: Option<i64>) -> Self {
        Self { lower, upper, estimate }
    }

    /// Stats for a match count known exactly.
    pub fn exact(count: i64) -> Self {
        Self::new(Some(count), Some(count), Some(count))
    }

    pub fn is_unknown(&self) -> bool {
        self.lower.is_none() && self.upper.is_none() && self.estimate.is_none()
    }

    /// Field-wise addition. An unknown operand on either side leaves the
    /// other operand's value in place.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if a field would overflow `i64`; `self`
    /// is left unchanged in that case.
    pub fn accumulate(&mut self, other: Stats) -> Result<(), Error> {
        fn add(current: Option<i64>, delta: Option<i64>, field: &str) -> Result<Option<i64>, Error> {
            match (current, delta) {
                (Some(value), Some(delta)) => value
                    .checked_add(delta)
                    .map(Some)
                    .ok_or_else(|| Error::InvalidInput(format!("stats {field} overflows: {value} + {delta}"))),
                (current, None) => Ok(current),
                (None, delta) => Ok(delta),
            }
        }

        *self = Stats {
            lower: add(self.lower, other.lower, "lower")?,
            upper: add(self.upper, other.upper, "upper")?,
            estimate: add(self.estimate, other.estimate, "estimate")?,
        };
        Ok(())
    }

    /// Subtract `count` from every known field, saturating at `i64::MIN`.
    pub(crate) fn decrement(&mut self, count: i64) {
        for value in [&mut self.lower, &mut self.upper, &mut self.estimate].into_iter().flatten() {
            *value = value.saturating_sub(count);
        }
    }
}

impl CacheManager {
    /// Get the cached stats for a query; all fields unknown if none are stored.
    pub fn get_stats(&self, id: QueryId) -> Result<Stats, Error> {
        match self.load(&stats_key(id))? {
            Some(bytes) => self.codec.decode_stats(&bytes),
            None => Ok(Stats::default()),
        }
    }

    /// Overwrite all three fields. A `None` field becomes unknown; it does
    /// not keep the stored value.
    pub fn set_stats(&mut self, id: QueryId, stats: Stats) -> Result<(), Error> {
        let bytes = self.codec.encode_stats(&stats)?;
        self.store(&stats_key(id), &bytes)
    }

    /// Add `stats` to the stored values field by field. See [`Stats::accumulate`].
    /// Nothing is written if a field would overflow.
    pub fn add_stats(&mut self, id: QueryId, stats: Stats) -> Result<(), Error> {
        let mut current = self.get_stats(id)?;
        current.accumulate(stats)?;
        self.set_stats(id, current)
    }

    /// Remove the stored stats, returning the query to all-unknown.
    pub fn clear_stats(&mut self, id: QueryId) -> Result<(), Error> {
        self.remove_key(&stats_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;

    fn manager() -> CacheManager {
        CacheManager::new(MemoryBackend::new())
    }

    #[test]
    fn test_unknown_by_default() {
        let cache = manager();
        assert_eq!(cache.get_stats(0).unwrap(), Stats::default());
        assert!(cache.get_stats(99).unwrap().is_unknown());
    }

    #[test]
    fn test_set_overwrites_every_field() {
        let mut cache = manager();
        cache.set_stats(0, Stats::new(Some(5), None, None)).unwrap();
        cache.set_stats(0, Stats::new(None, Some(10), None)).unwrap();
        assert_eq!(cache.get_stats(0).unwrap(), Stats::new(None, Some(10), None));
    }

    #[test]
    fn test_add_accumulates() {
        let mut cache = manager();
        cache.add_stats(0, Stats::new(Some(5), None, None)).unwrap();
        cache.add_stats(0, Stats::new(Some(3), None, None)).unwrap();
        assert_eq!(cache.get_stats(0).unwrap(), Stats::new(Some(8), None, None));
    }

    #[test]
    fn test_add_keeps_fields_with_unknown_operand() {
        let mut cache = manager();
        cache.set_stats(1, Stats::new(Some(4), Some(9), None)).unwrap();
        cache.add_stats(1, Stats::new(None, Some(1), Some(6))).unwrap();
        assert_eq!(cache.get_stats(1).unwrap(), Stats::new(Some(4), Some(10), Some(6)));
    }

    #[test]
    fn test_add_negative_delta() {
        let mut cache = manager();
        cache.set_stats(2, Stats::exact(12)).unwrap();
        cache.add_stats(2, Stats::exact(-1)).unwrap();
        assert_eq!(cache.get_stats(2).unwrap(), Stats::exact(11));
    }

    #[test]
    fn test_clear() {
        let mut cache = manager();
        cache.set_stats(0, Stats::exact(5)).unwrap();
        cache.clear_stats(0).unwrap();
        assert!(cache.get_stats(0).unwrap().is_unknown());
        cache.clear_stats(0).unwrap();
    }

    #[test]
    fn test_decrement_skips_unknown_fields() {
        let mut stats = Stats::new(Some(10), None, Some(7));
        stats.decrement(2);
        assert_eq!(stats, Stats::new(Some(8), None, Some(5)));
    }

    #[test]
    fn test_add_overflow_rejected() {
        let mut cache = manager();
        cache.set_stats(0, Stats::new(Some(1), Some(i64::MAX), None)).unwrap();

        let result = cache.add_stats(0, Stats::exact(1));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(cache.get_stats(0).unwrap(), Stats::new(Some(1), Some(i64::MAX), None));
    }

    #[test]
    fn test_decrement_saturates() {
        let mut stats = Stats::new(Some(i64::MIN + 1), None, Some(0));
        stats.decrement(5);
        assert_eq!(stats, Stats::new(Some(i64::MIN), None, Some(-5)));
    }
}
