//! Read-only report queries
//!
//! [`SnapshotQuery`] copies the registry and session counters and orders the
//! copy. It never holds a lock while sorting, so ingestion is not paused by a
//! report request.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::registry::{DeviceRegistry, DeviceStats};
use crate::session::{SessionStats, SessionTotals};

/// Row order for device listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Order in which devices were first accepted
    #[default]
    FirstSeen,
    /// Device key, ascending
    DeviceKey,
    /// Record count descending, then device key ascending
    RecordCount,
    /// Mean SNR descending, then device key ascending
    MeanSnr,
}

impl SortOrder {
    /// Name accepted by [`FromStr`]
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::FirstSeen => "first-seen",
            SortOrder::DeviceKey => "device",
            SortOrder::RecordCount => "count",
            SortOrder::MeanSnr => "snr",
        }
    }

    /// Sort rows in place
    pub fn apply(&self, rows: &mut [DeviceStats]) {
        match self {
            SortOrder::FirstSeen => {}
            SortOrder::DeviceKey => rows.sort_by(|a, b| a.device_key.cmp(&b.device_key)),
            SortOrder::RecordCount => rows.sort_by(|a, b| {
                b.stats
                    .count
                    .cmp(&a.stats.count)
                    .then_with(|| a.device_key.cmp(&b.device_key))
            }),
            SortOrder::MeanSnr => rows.sort_by(|a, b| {
                b.stats
                    .mean
                    .partial_cmp(&a.stats.mean)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.device_key.cmp(&b.device_key))
            }),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first-seen" | "first_seen" | "seen" => Ok(SortOrder::FirstSeen),
            "device" | "device-key" | "key" => Ok(SortOrder::DeviceKey),
            "count" | "record-count" | "records" => Ok(SortOrder::RecordCount),
            "snr" | "mean-snr" | "mean" => Ok(SortOrder::MeanSnr),
            other => Err(format!(
                "unknown sort order '{}' (expected first-seen, device, count or snr)",
                other
            )),
        }
    }
}

/// Everything a summary or table needs, captured together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Order the devices are listed in
    pub order: SortOrder,
    /// Session counters
    pub totals: SessionTotals,
    /// Per-device statistics
    pub devices: Vec<DeviceStats>,
}

/// Read-only view over a registry and its session counters.
#[derive(Debug, Clone)]
pub struct SnapshotQuery {
    registry: DeviceRegistry,
    session: SessionStats,
}

impl SnapshotQuery {
    /// Query over shared handles
    pub fn new(registry: DeviceRegistry, session: SessionStats) -> Self {
        Self { registry, session }
    }

    /// Devices in the requested order
    pub fn devices(&self, order: SortOrder) -> Vec<DeviceStats> {
        let mut rows = self.registry.snapshot_all();
        order.apply(&mut rows);
        rows
    }

    /// Devices sorted by key
    pub fn by_device(&self) -> Vec<DeviceStats> {
        self.devices(SortOrder::DeviceKey)
    }

    /// Devices sorted by record count
    pub fn by_record_count(&self) -> Vec<DeviceStats> {
        self.devices(SortOrder::RecordCount)
    }

    /// Devices sorted by mean SNR
    pub fn by_mean_snr(&self) -> Vec<DeviceStats> {
        self.devices(SortOrder::MeanSnr)
    }

    /// Session counters
    pub fn totals(&self) -> SessionTotals {
        self.session.totals()
    }

    /// Counters plus ordered devices
    pub fn report(&self, order: SortOrder) -> SessionReport {
        SessionReport {
            order,
            totals: self.session.totals(),
            devices: self.devices(order),
        }
    }
}
