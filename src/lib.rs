//! # rtlwatch - Live signal statistics for rtl_433 sensors
//!
//! Ingests the stream of records decoded by `rtl_433` from ISM-band sensors,
//! drops the repeat copies most sensors broadcast for each reading, and keeps
//! per-device signal-to-noise statistics for the whole monitoring session.
//!
//! ## Key Features
//!
//! - **Adjacent-duplicate filter**: O(1) comparison against the last accepted event
//! - **Online statistics**: Welford mean/stddev plus min/max per device
//! - **Concurrent reads**: sorted snapshots while ingestion keeps running
//! - **Observers**: push notifications for displays and exporters
//!
//! ## Quick Start
//!
//! ```rust
//! use rtlwatch::{IngestionPipeline, SortOrder, WatchConfig};
//!
//! let mut pipeline = IngestionPipeline::new(WatchConfig::utc()).unwrap();
//! let query = pipeline.query();
//!
//! pipeline.ingest(br#"{"time":"2023-03-02 10:00:00","model":"Acurite-Tower","id":2345,"snr":14.8}"#);
//! pipeline.ingest(br#"{"time":"2023-03-02 10:00:00","model":"Acurite-Tower","id":2345,"snr":14.8}"#);
//! pipeline.ingest(br#"{"time":"2023-03-02 10:00:04","model":"Oregon-THGR122N","snr":9.1}"#);
//!
//! let report = query.report(SortOrder::MeanSnr);
//! assert_eq!(report.totals.total_received, 3);
//! assert_eq!(report.totals.total_accepted, 2);
//! assert_eq!(report.devices[0].device_key, "Acurite-Tower 2345");
//!
//! println!("{}", rtlwatch::render_summary(&report));
//! ```
//!
//! ## Modules
//!
//! - [`event`]: Payload decoding
//! - [`dedup`]: Adjacent-duplicate filter
//! - [`stats`]: Online statistics accumulator
//! - [`registry`]: Per-device registry
//! - [`pipeline`]: Ingestion loop, observers, stop signal
//! - [`query`]: Sorted read-only views
//! - [`report`]: Text summary
//! - [`source`]: Payload sources (transport boundary)

// Modules
pub mod config;
pub mod dedup;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod report;
pub mod session;
pub mod source;
pub mod stats;

// Re-exports for convenient access
pub use config::{DedupRule, TimeZoneMode, WatchConfig};
pub use dedup::{DuplicateFilter, LastAccepted};
pub use error::{ConfigError, ParseError, Result, StatsError, TransportError, WatchError};
pub use event::{Event, EventParser};
pub use pipeline::{
    DeviceObserver, DeviceUpdate, IngestionPipeline, LogObserver, Outcome, RunSummary, StopSignal,
};
pub use query::{SessionReport, SnapshotQuery, SortOrder};
pub use registry::{DeviceRegistry, DeviceStats};
pub use report::render_summary;
pub use session::{SessionStats, SessionTotals};
pub use source::{ChannelPayload, ChannelSource, LineSource, PayloadSource};
pub use stats::{StatAccumulator, StatSnapshot};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_basic_flow() {
        let mut pipeline = IngestionPipeline::new(WatchConfig {
            log_accepted: false,
            ..WatchConfig::utc()
        })
        .unwrap();

        let outcome =
            pipeline.ingest(br#"{"time":"2023-03-02 10:00:00","model":"X","id":7,"snr":3.0}"#);
        assert!(outcome.is_accepted());
        assert_eq!(pipeline.registry().get("X 7").map(|s| s.count), Some(1));
    }
}
