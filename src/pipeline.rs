//! Ingestion pipeline
//!
//! [`IngestionPipeline`] drives one payload at a time through
//! parse → duplicate filter → registry update → observer notification.
//! Payloads are processed strictly in delivery order: the duplicate rule
//! compares against the previous accepted event, so reordering or batching
//! would change which events count.
//!
//! A payload either updates the registry and is notified, or is dropped
//! before any registry mutation (malformed or duplicate). Nothing is left
//! half-applied when the pipeline stops.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::WatchConfig;
use crate::dedup::DuplicateFilter;
use crate::error::{ConfigError, ParseError, TransportError};
use crate::event::{Event, EventParser};
use crate::query::SnapshotQuery;
use crate::registry::DeviceRegistry;
use crate::session::SessionStats;
use crate::source::PayloadSource;
use crate::stats::StatSnapshot;

/// Notification sent to observers for every accepted event.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUpdate {
    /// Device the event belongs to
    pub device_key: String,
    /// Device statistics including this event
    pub stats: StatSnapshot,
    /// `time` text of the event
    pub time: String,
    /// SNR carried by the event
    pub snr: f64,
    /// First accepted event for this device
    pub is_new_device: bool,
}

/// Receives pipeline notifications (display adapters, exporters, loggers).
///
/// Called on the ingestion thread; implementations must return quickly.
pub trait DeviceObserver: Send + Sync {
    /// A device's statistics changed
    fn device_updated(&self, update: &DeviceUpdate);

    /// A payload was dropped as malformed
    fn payload_dropped(&self, _error: &ParseError) {}
}

/// Prints the classic one-line-per-event trace through `log`.
#[derive(Debug, Default)]
pub struct LogObserver;

impl DeviceObserver for LogObserver {
    fn device_updated(&self, update: &DeviceUpdate) {
        info!(
            "{:<25} {:<20} snr={:>4.1}",
            update.device_key, update.time, update.snr
        );
    }
}

/// What happened to one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// New physical event, registry updated
    Accepted(DeviceUpdate),
    /// Repeat of the last accepted event
    Duplicate,
    /// Payload could not be parsed
    Malformed(ParseError),
}

impl Outcome {
    /// Check if the payload updated the registry
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }
}

/// Cooperative stop request shared between the pipeline and its owner.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// New, not yet raised
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the pipeline to stop after the payload in hand
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Counts for one call to [`IngestionPipeline::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Payloads pulled from the source
    pub processed: u64,
    /// Payloads accepted
    pub accepted: u64,
    /// Payloads rejected as duplicates
    pub duplicates: u64,
    /// Payloads dropped as malformed
    pub malformed: u64,
    /// The run ended because of a stop request
    pub stopped: bool,
}

impl RunSummary {
    fn record(&mut self, outcome: &Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::Accepted(_) => self.accepted += 1,
            Outcome::Duplicate => self.duplicates += 1,
            Outcome::Malformed(_) => self.malformed += 1,
        }
    }
}

/// The ingestion control loop and owner of the duplicate-filter state.
pub struct IngestionPipeline {
    parser: EventParser,
    filter: DuplicateFilter,
    registry: DeviceRegistry,
    session: SessionStats,
    observers: Vec<Arc<dyn DeviceObserver>>,
}

impl fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("filter", &self.filter)
            .field("devices", &self.registry.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::build(&WatchConfig::default())
    }
}

impl IngestionPipeline {
    /// Create a pipeline with fresh registry and counters.
    pub fn new(config: WatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(&config))
    }

    fn build(config: &WatchConfig) -> Self {
        let mut pipeline = Self {
            parser: EventParser::from_config(config),
            filter: DuplicateFilter::from_config(config),
            registry: DeviceRegistry::new(),
            session: SessionStats::new(),
            observers: Vec::new(),
        };
        if config.log_accepted {
            pipeline.subscribe(Arc::new(LogObserver));
        }
        pipeline
    }

    /// Register an observer for accepted events and drops
    pub fn subscribe(&mut self, observer: Arc<dyn DeviceObserver>) {
        self.observers.push(observer);
    }

    /// Shared handle to the device registry
    pub fn registry(&self) -> DeviceRegistry {
        self.registry.clone()
    }

    /// Shared handle to the session counters
    pub fn session(&self) -> SessionStats {
        self.session.clone()
    }

    /// Read-only query over this pipeline's state, usable from other threads
    pub fn query(&self) -> SnapshotQuery {
        SnapshotQuery::new(self.registry.clone(), self.session.clone())
    }

    /// Duplicate filter state
    pub fn filter(&self) -> &DuplicateFilter {
        &self.filter
    }

    /// Process one raw payload end to end.
    pub fn ingest(&mut self, payload: &[u8]) -> Outcome {
        self.session.record_received();

        match self.parser.parse(payload) {
            Ok(event) => self.process(event),
            Err(error) => {
                warn!("Dropping malformed payload: {}", error);
                self.session.record_malformed();
                for observer in &self.observers {
                    observer.payload_dropped(&error);
                }
                Outcome::Malformed(error)
            }
        }
    }

    /// Process an already-parsed event (counts as one received payload).
    pub fn ingest_event(&mut self, event: Event) -> Outcome {
        self.session.record_received();
        self.process(event)
    }

    fn process(&mut self, event: Event) -> Outcome {
        if !self.filter.is_new(&event) {
            debug!(
                "Duplicate of {} at {} rejected",
                event.device_key, event.time
            );
            self.session.record_duplicate();
            return Outcome::Duplicate;
        }
        self.filter.record(&event);

        let is_new_device = !self.registry.contains(&event.device_key);
        let stats = self.registry.update(&event.device_key, event.snr);
        self.session.record_accepted(&event.time);

        let update = DeviceUpdate {
            device_key: event.device_key,
            stats,
            time: event.time,
            snr: event.snr,
            is_new_device,
        };
        for observer in &self.observers {
            observer.device_updated(&update);
        }
        Outcome::Accepted(update)
    }

    /// Pull payloads from `source` until it ends, `stop` is raised, or the
    /// transport fails. Transport errors are returned as-is; the pipeline
    /// itself never retries or reconnects.
    pub fn run<S>(&mut self, source: &mut S, stop: &StopSignal) -> Result<RunSummary, TransportError>
    where
        S: PayloadSource + ?Sized,
    {
        let mut summary = RunSummary::default();

        while !stop.is_stopped() {
            let payload = match source.next_payload() {
                Some(Ok(payload)) => payload,
                Some(Err(error)) => {
                    warn!(
                        "Transport failed after {} payloads: {}",
                        summary.processed, error
                    );
                    return Err(error);
                }
                None => break,
            };

            let outcome = self.ingest(&payload);
            summary.record(&outcome);
        }

        summary.stopped = stop.is_stopped();
        info!(
            "Ingestion ended{}: {} processed, {} accepted, {} duplicates, {} malformed",
            if summary.stopped { " on stop request" } else { "" },
            summary.processed,
            summary.accepted,
            summary.duplicates,
            summary.malformed
        );
        Ok(summary)
    }
}
