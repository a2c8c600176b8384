//! Per-device statistics registry
//!
//! [`DeviceRegistry`] owns one [`StatAccumulator`] per device key and keeps
//! keys in the order they were first accepted. The registry is a cheap,
//! cloneable handle: the ingestion side writes through one clone while report
//! and display code read through others.
//!
//! A single `RwLock` guards both the ordered key list and the accumulators,
//! so a reader never sees a new key without its accumulator or a count
//! without its matching mean and extrema. Each lock is held for one update or
//! one full copy, never across I/O.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::stats::{StatAccumulator, StatSnapshot};

/// One device's statistics, as returned by registry reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStats {
    /// Device key (`model` or `model id`)
    pub device_key: String,
    /// Statistics at the time of the read
    #[serde(flatten)]
    pub stats: StatSnapshot,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// Accumulators in first-seen order
    entries: Vec<(String, StatAccumulator)>,
    /// Device key to position in `entries`
    index: HashMap<String, usize>,
}

/// Concurrency-safe, insertion-ordered, grow-only map of device statistics.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves the registry coherent, so a panic in
    // another holder does not invalidate the data.
    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold `value` into the device's accumulator, creating it at the end of
    /// the order on first sight. Returns the post-update snapshot.
    pub fn update(&self, device_key: &str, value: f64) -> StatSnapshot {
        let mut inner = self.write();

        let existing = inner.index.get(device_key).copied();
        if let Some(pos) = existing {
            let acc = &mut inner.entries[pos].1;
            acc.append(value);
            return acc.snapshot();
        }

        let acc = StatAccumulator::new(value);
        let snapshot = acc.snapshot();
        let pos = inner.entries.len();
        inner.entries.push((device_key.to_string(), acc));
        inner.index.insert(device_key.to_string(), pos);
        snapshot
    }

    /// Copy of every device's statistics, in first-seen order.
    pub fn snapshot_all(&self) -> Vec<DeviceStats> {
        let inner = self.read();
        inner
            .entries
            .iter()
            .map(|(key, acc)| DeviceStats {
                device_key: key.clone(),
                stats: acc.snapshot(),
            })
            .collect()
    }

    /// Statistics for one device
    pub fn get(&self, device_key: &str) -> Option<StatSnapshot> {
        let inner = self.read();
        inner
            .index
            .get(device_key)
            .map(|&pos| inner.entries[pos].1.snapshot())
    }

    /// Check if a device has been seen
    pub fn contains(&self, device_key: &str) -> bool {
        self.read().index.contains_key(device_key)
    }

    /// Number of distinct devices
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// Check if no device has been seen yet
    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    /// Device keys in first-seen order
    pub fn device_keys(&self) -> Vec<String> {
        self.read().entries.iter().map(|(k, _)| k.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_new() {
        let registry = DeviceRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.snapshot_all().is_empty());
    }

    #[test]
    fn test_update_creates_then_appends() {
        let registry = DeviceRegistry::new();
        let first = registry.update("A 1", 10.0);
        assert_eq!(first.count, 1);

        let second = registry.update("A 1", 14.0);
        assert_eq!(second.count, 2);
        assert_eq!(second.mean, 12.0);
        assert_eq!(second.min, 10.0);
        assert_eq!(second.max, 14.0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_insertion_order_kept() {
        let registry = DeviceRegistry::new();
        registry.update("zeta", 1.0);
        registry.update("alpha", 2.0);
        registry.update("mid", 3.0);
        for _ in 0..5 {
            registry.update("alpha", 9.0);
        }

        let keys: Vec<_> = registry
            .snapshot_all()
            .into_iter()
            .map(|d| d.device_key)
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.device_keys(), keys);
    }

    #[test]
    fn test_get_and_contains() {
        let registry = DeviceRegistry::new();
        registry.update("B", 5.0);
        assert!(registry.contains("B"));
        assert!(!registry.contains("C"));
        assert_eq!(registry.get("B").map(|s| s.count), Some(1));
        assert!(registry.get("C").is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let writer = DeviceRegistry::new();
        let reader = writer.clone();
        writer.update("A", 1.0);
        assert_eq!(reader.len(), 1);
    }

    #[test]
    fn test_device_stats_serializes_flat() {
        let registry = DeviceRegistry::new();
        registry.update("A 1", 10.0);
        let json = serde_json::to_value(&registry.snapshot_all()[0]).unwrap();
        assert_eq!(json["device_key"], "A 1");
        assert_eq!(json["count"], 1);
        assert_eq!(json["mean"], 10.0);
    }
}
