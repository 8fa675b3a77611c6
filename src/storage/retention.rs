//! Retention policy: age and count caps
//!
//! Pure functions over any collection of timestamped items. The store applies
//! them after every load and on explicit sweeps.

use serde::{Deserialize, Serialize};

use crate::config::StorageSettings;

/// Anything carrying a capture timestamp
pub trait Retainable {
    fn captured_at_ms(&self) -> i64;
}

impl<A: Retainable, B> Retainable for (A, B) {
    fn captured_at_ms(&self) -> i64 {
        self.0.captured_at_ms()
    }
}

/// Count and age caps applied to the stored clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub max_records: usize,
    pub max_age_ms: u64,
}

impl RetentionPolicy {
    pub fn new(max_records: usize, max_age_ms: u64) -> Self {
        Self {
            max_records,
            max_age_ms,
        }
    }

    /// Effective record cap; a zero cap still admits the newest record
    pub fn capacity(&self) -> usize {
        self.max_records.max(1)
    }

    pub fn is_expired(&self, captured_at_ms: i64, now_ms: i64) -> bool {
        let max_age = i64::try_from(self.max_age_ms).unwrap_or(i64::MAX);
        now_ms.saturating_sub(captured_at_ms) > max_age
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from(&StorageSettings::default())
    }
}

impl From<&StorageSettings> for RetentionPolicy {
    fn from(settings: &StorageSettings) -> Self {
        Self::new(settings.max_records, settings.max_age_ms)
    }
}

/// What a sweep removed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Older than the age cap
    pub expired: usize,
    /// Beyond the count cap after age filtering
    pub over_capacity: usize,
    /// Undecodable entries dropped on read
    pub corrupt: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired + self.over_capacity + self.corrupt
    }

    pub fn is_empty(&self) -> bool {
        self.removed() == 0
    }
}

/// Index of the item to evict first: oldest capture, earliest position on ties
pub fn oldest_index<T: Retainable>(items: &[T]) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .min_by_key(|(index, item)| (item.captured_at_ms(), *index))
        .map(|(index, _)| index)
}

/// Drop expired items, then keep only the most recent `capacity` items.
///
/// Survivors keep their relative order. Ties on the count cap are resolved
/// the same way `oldest_index` resolves them, so a sweep and repeated
/// single evictions agree.
pub fn apply_retention<T: Retainable>(
    items: Vec<T>,
    now_ms: i64,
    policy: &RetentionPolicy,
) -> (Vec<T>, SweepReport) {
    let mut report = SweepReport::default();

    let before = items.len();
    let fresh: Vec<T> = items
        .into_iter()
        .filter(|item| !policy.is_expired(item.captured_at_ms(), now_ms))
        .collect();
    report.expired = before - fresh.len();

    let capacity = policy.capacity();
    if fresh.len() <= capacity {
        return (fresh, report);
    }

    let mut ranked: Vec<(i64, usize)> = fresh
        .iter()
        .enumerate()
        .map(|(index, item)| (item.captured_at_ms(), index))
        .collect();
    ranked.sort_unstable_by(|a, b| b.cmp(a));
    let mut keep = vec![false; fresh.len()];
    for &(_, index) in ranked.iter().take(capacity) {
        keep[index] = true;
    }

    report.over_capacity = fresh.len() - capacity;
    let kept = fresh
        .into_iter()
        .zip(keep)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect();

    (kept, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Stamp(i64);

    impl Retainable for Stamp {
        fn captured_at_ms(&self) -> i64 {
            self.0
        }
    }

    fn stamps(values: &[i64]) -> Vec<Stamp> {
        values.iter().copied().map(Stamp).collect()
    }

    #[test]
    fn test_expired_items_removed() {
        let policy = RetentionPolicy::new(10, 1_000);
        let (kept, report) = apply_retention(stamps(&[100, 5_000, 4_000, 3_999]), 5_000, &policy);
        assert_eq!(kept, stamps(&[5_000, 4_000]));
        assert_eq!(report.expired, 2);
        assert_eq!(report.over_capacity, 0);
    }

    #[test]
    fn test_age_boundary_is_kept() {
        let policy = RetentionPolicy::new(10, 1_000);
        assert!(!policy.is_expired(4_000, 5_000));
        assert!(policy.is_expired(3_999, 5_000));
        // Future stamps are never expired
        assert!(!policy.is_expired(9_000, 5_000));
    }

    #[test]
    fn test_count_cap_keeps_most_recent_in_order() {
        let policy = RetentionPolicy::new(3, u64::MAX);
        let (kept, report) = apply_retention(stamps(&[50, 10, 40, 20, 30]), 100, &policy);
        assert_eq!(kept, stamps(&[50, 40, 30]));
        assert_eq!(report.over_capacity, 2);
    }

    #[test]
    fn test_ties_evict_earliest_position() {
        let policy = RetentionPolicy::new(1, u64::MAX);
        let items = vec![(Stamp(5), "first"), (Stamp(5), "second")];
        assert_eq!(oldest_index(&items), Some(0));
        let (kept, _) = apply_retention(items, 10, &policy);
        assert_eq!(kept[0].1, "second");
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let policy = RetentionPolicy::new(2, 100);
        let (once, first) = apply_retention(stamps(&[0, 150, 190, 160, 170]), 200, &policy);
        let (twice, second) = apply_retention(once.clone(), 200, &policy);
        assert_eq!(once, twice);
        assert_eq!(first.removed(), 3);
        assert!(second.is_empty());
    }

    #[test]
    fn test_oldest_index_empty() {
        assert_eq!(oldest_index::<Stamp>(&[]), None);
    }
}
