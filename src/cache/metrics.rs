use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counters for cache lookups and population
#[derive(Debug, Default)]
pub struct CacheMetrics {
    load_times: RwLock<HashMap<String, Duration>>,
    lookup_hits: AtomicU64,
    lookup_misses: AtomicU64,
    duplicates: AtomicU64,
    load_failures: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record how long creating and loading an entry took
    pub fn record_load_time(&self, name: &str, duration: Duration) {
        self.load_times.write().insert(name.to_string(), duration);
    }

    pub fn record_hit(&self) {
        self.lookup_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.lookup_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an `add`/`load` for a name that was already present
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Lookup hit rate as a percentage
    pub fn hit_rate(&self) -> f32 {
        let hits = self.lookup_hits.load(Ordering::Relaxed) as f32;
        let misses = self.lookup_misses.load(Ordering::Relaxed) as f32;

        if hits + misses > 0.0 {
            hits / (hits + misses) * 100.0
        } else {
            0.0
        }
    }

    pub fn hits(&self) -> u64 {
        self.lookup_hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.lookup_misses.load(Ordering::Relaxed)
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.load_failures.load(Ordering::Relaxed)
    }

    /// Last recorded load time for a name
    pub fn load_time(&self, name: &str) -> Option<Duration> {
        self.load_times.read().get(name).copied()
    }

    /// Move a recorded load time to a new name
    pub(crate) fn rename(&self, from: &str, to: &str) {
        let mut load_times = self.load_times.write();
        if let Some(duration) = load_times.remove(from) {
            load_times.insert(to.to_string(), duration);
        }
    }

    /// Drop the load time of an entry that left the cache
    pub(crate) fn forget(&self, name: &str) {
        self.load_times.write().remove(name);
    }

    pub(crate) fn clear_load_times(&self) {
        self.load_times.write().clear();
    }

    pub fn all_load_times(&self) -> HashMap<String, Duration> {
        self.load_times.read().clone()
    }
}

/// Shared handle to a [`CacheMetrics`]
#[derive(Debug, Clone, Default)]
pub struct CacheMetricsHandle(Arc<CacheMetrics>);

impl CacheMetricsHandle {
    pub fn new() -> Self {
        Self(Arc::new(CacheMetrics::new()))
    }

    pub fn inner(&self) -> &CacheMetrics {
        &self.0
    }
}

impl std::ops::Deref for CacheMetricsHandle {
    type Target = CacheMetrics;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.hit_rate(), 0.0);

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        assert_eq!(metrics.hit_rate(), 75.0);
    }

    #[test]
    fn test_load_time_follows_rename() {
        let metrics = CacheMetricsHandle::new();
        metrics.record_load_time("a", Duration::from_millis(3));
        metrics.rename("a", "b");
        assert_eq!(metrics.load_time("a"), None);
        assert_eq!(metrics.load_time("b"), Some(Duration::from_millis(3)));
    }

    #[test]
    fn test_forget_load_time() {
        let metrics = CacheMetrics::new();
        metrics.record_load_time("a", Duration::from_millis(3));
        metrics.record_load_time("b", Duration::from_millis(5));

        metrics.forget("a");
        assert_eq!(metrics.load_time("a"), None);
        assert_eq!(metrics.all_load_times().len(), 1);

        metrics.clear_load_times();
        assert!(metrics.all_load_times().is_empty());
    }
}
