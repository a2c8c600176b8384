//! Session-wide counters
//!
//! Totals and first/last accepted times for the whole monitoring session.
//! Like [`crate::DeviceRegistry`], [`SessionStats`] is a shared handle: the
//! pipeline writes, report code reads.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Copy of the session counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTotals {
    /// Every payload handed to the pipeline
    pub total_received: u64,
    /// Payloads that passed the duplicate filter
    pub total_accepted: u64,
    /// Payloads rejected as adjacent duplicates
    pub total_duplicates: u64,
    /// Payloads dropped as malformed
    pub total_malformed: u64,
    /// `time` text of the first accepted event
    pub first_accepted: Option<String>,
    /// `time` text of the most recent accepted event
    pub last_accepted: Option<String>,
}

/// Shared handle to the session counters.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    totals: Arc<Mutex<SessionTotals>>,
}

impl SessionStats {
    /// Fresh counters
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionTotals> {
        self.totals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one delivered payload
    pub fn record_received(&self) {
        self.lock().total_received += 1;
    }

    /// Count one accepted event and note its time.
    ///
    /// Events built in code carry no decoder text; they are counted but
    /// leave the first/last times alone.
    pub fn record_accepted(&self, time: &str) {
        let mut totals = self.lock();
        totals.total_accepted += 1;
        if time.is_empty() {
            return;
        }
        if totals.first_accepted.is_none() {
            totals.first_accepted = Some(time.to_string());
        }
        totals.last_accepted = Some(time.to_string());
    }

    /// Count one rejected duplicate
    pub fn record_duplicate(&self) {
        self.lock().total_duplicates += 1;
    }

    /// Count one malformed payload
    pub fn record_malformed(&self) {
        self.lock().total_malformed += 1;
    }

    /// Consistent copy of all counters
    pub fn totals(&self) -> SessionTotals {
        self.lock().clone()
    }
}
