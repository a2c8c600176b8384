//! Adjacent-duplicate filtering
//!
//! rtl_433 usually emits several copies of one physical transmission within
//! a fraction of a second. An event is compared only against the single most
//! recently *accepted* event, never against a per-device history, so the
//! filter is O(1) in memory and time.
//!
//! With the default [`DedupRule::Literal`] rule an event is accepted iff
//!
//! ```text
//! event.timestamp > last.time + threshold  &&  event.device_key != last.device_key
//! ```
//!
//! A second well-separated reading from the same device, with no other
//! device accepted in between, is therefore rejected.
//! [`DedupRule::EitherDiffers`] relaxes the conjunction to a disjunction.

use crate::config::{DedupRule, WatchConfig, DEFAULT_DUPLICATE_THRESHOLD};
use crate::event::Event;

/// Identity and time of the most recently accepted event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LastAccepted {
    /// Epoch seconds of the last accepted event (0.0 before the first)
    pub time: f64,
    /// Device key of the last accepted event ("" before the first)
    pub device_key: String,
}

/// Decides whether an event is a new physical occurrence.
#[derive(Debug, Clone)]
pub struct DuplicateFilter {
    threshold: f64,
    rule: DedupRule,
    last: LastAccepted,
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_THRESHOLD)
    }
}

impl DuplicateFilter {
    /// Literal-rule filter with the given window in seconds
    pub fn new(threshold: f64) -> Self {
        Self::with_rule(threshold, DedupRule::Literal)
    }

    /// Filter with an explicit acceptance rule
    pub fn with_rule(threshold: f64, rule: DedupRule) -> Self {
        Self {
            threshold,
            rule,
            last: LastAccepted::default(),
        }
    }

    /// Filter following a session configuration
    pub fn from_config(config: &WatchConfig) -> Self {
        Self::with_rule(config.duplicate_threshold, config.dedup_rule)
    }

    /// Pure acceptance decision against a given last-accepted state.
    pub fn accept(&self, event: &Event, last: &LastAccepted) -> bool {
        let fresh = event.timestamp > last.time + self.threshold;
        let other_device = event.device_key != last.device_key;
        match self.rule {
            DedupRule::Literal => fresh && other_device,
            DedupRule::EitherDiffers => fresh || other_device,
        }
    }

    /// Acceptance decision against the filter's own state. Does not mutate.
    pub fn is_new(&self, event: &Event) -> bool {
        self.accept(event, &self.last)
    }

    /// Record an accepted event as the new comparison point.
    pub fn record(&mut self, event: &Event) {
        self.last.time = event.timestamp;
        self.last.device_key.clone_from(&event.device_key);
    }

    /// Decide and, on acceptance, record in one step.
    pub fn check_and_record(&mut self, event: &Event) -> bool {
        if self.is_new(event) {
            self.record(event);
            true
        } else {
            false
        }
    }

    /// Current comparison point
    pub fn last_accepted(&self) -> &LastAccepted {
        &self.last
    }

    /// Configured window in seconds
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Configured acceptance rule
    pub fn rule(&self) -> DedupRule {
        self.rule
    }
}
