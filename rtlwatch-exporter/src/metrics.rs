// rtlwatch Exporter - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for rtlwatch.
//!
//! Per-device gauges are pushed by [`PrometheusObserver`] on every accepted
//! event. Session counters are advanced to the pipeline totals on each scrape.

use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_gauge_vec, register_int_counter, register_int_counter_vec, Encoder,
    Gauge, GaugeVec, IntCounter, IntCounterVec, TextEncoder,
};
use rtlwatch::{DeviceObserver, DeviceUpdate, ParseError, SessionTotals, StatSnapshot};
use std::sync::{Mutex, PoisonError};

lazy_static! {
    // ============================================================
    // Session Metrics (from SessionTotals)
    // ============================================================

    /// Serializes scrapes while they advance the session counters.
    static ref SESSION_SYNC: Mutex<()> = Mutex::new(());

    /// Every payload handed to the pipeline, malformed included.
    pub static ref EVENTS_RECEIVED_TOTAL: IntCounter = register_int_counter!(
        "rtlwatch_events_received_total",
        "Payloads received from the decoder"
    ).unwrap();

    /// Payloads that passed the duplicate filter.
    pub static ref EVENTS_ACCEPTED_TOTAL: IntCounter = register_int_counter!(
        "rtlwatch_events_accepted_total",
        "Events accepted after duplicate filtering"
    ).unwrap();

    /// Payloads rejected as adjacent duplicates.
    pub static ref EVENTS_DUPLICATE_TOTAL: IntCounter = register_int_counter!(
        "rtlwatch_events_duplicate_total",
        "Events rejected as adjacent duplicates"
    ).unwrap();

    /// Payloads that could not be parsed.
    pub static ref EVENTS_MALFORMED_TOTAL: IntCounter = register_int_counter!(
        "rtlwatch_events_malformed_total",
        "Payloads dropped as malformed"
    ).unwrap();

    /// Distinct devices seen this session.
    pub static ref DEVICES: Gauge = register_gauge!(
        "rtlwatch_devices",
        "Distinct devices with at least one accepted event"
    ).unwrap();

    // ============================================================
    // Per-device Metrics (from StatSnapshot)
    // ============================================================

    /// Accepted events per device.
    pub static ref DEVICE_RECORDS: GaugeVec = register_gauge_vec!(
        "rtlwatch_device_records",
        "Accepted events per device",
        &["device"]
    ).unwrap();

    /// Mean SNR per device.
    pub static ref DEVICE_SNR_MEAN: GaugeVec = register_gauge_vec!(
        "rtlwatch_device_snr_mean",
        "Mean signal-to-noise ratio per device (dB)",
        &["device"]
    ).unwrap();

    /// Population standard deviation of SNR per device.
    pub static ref DEVICE_SNR_STDDEV: GaugeVec = register_gauge_vec!(
        "rtlwatch_device_snr_stddev",
        "Standard deviation of signal-to-noise ratio per device (dB)",
        &["device"]
    ).unwrap();

    /// Lowest SNR per device.
    pub static ref DEVICE_SNR_MIN: GaugeVec = register_gauge_vec!(
        "rtlwatch_device_snr_min",
        "Lowest signal-to-noise ratio per device (dB)",
        &["device"]
    ).unwrap();

    /// Highest SNR per device.
    pub static ref DEVICE_SNR_MAX: GaugeVec = register_gauge_vec!(
        "rtlwatch_device_snr_max",
        "Highest signal-to-noise ratio per device (dB)",
        &["device"]
    ).unwrap();

    // ============================================================
    // Event Counters
    // ============================================================

    /// Dropped payloads by reason.
    pub static ref PAYLOAD_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rtlwatch_payload_errors_total",
        "Malformed payloads by reason",
        &["reason"]
    ).unwrap();
}

/// Label value for a parse failure.
pub fn error_reason(error: &ParseError) -> &'static str {
    match error {
        ParseError::InvalidJson(_) => "invalid_json",
        ParseError::MissingField(_) => "missing_field",
        ParseError::InvalidField { .. } => "invalid_field",
        ParseError::BadTimestamp { .. } => "bad_timestamp",
        ParseError::NonFiniteSnr(_) => "non_finite_snr",
    }
}

/// Update session metrics from a totals copy.
pub fn update_session_metrics(totals: &SessionTotals, devices: usize) {
    let _guard = SESSION_SYNC.lock().unwrap_or_else(PoisonError::into_inner);
    advance_counter(&EVENTS_RECEIVED_TOTAL, totals.total_received);
    advance_counter(&EVENTS_ACCEPTED_TOTAL, totals.total_accepted);
    advance_counter(&EVENTS_DUPLICATE_TOTAL, totals.total_duplicates);
    advance_counter(&EVENTS_MALFORMED_TOTAL, totals.total_malformed);
    DEVICES.set(devices as f64);
}

/// Bring `counter` up to `total`. An older totals copy never moves it back.
pub fn advance_counter(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

/// Update the per-device gauges.
pub fn update_device_metrics(device: &str, stats: &StatSnapshot) {
    DEVICE_RECORDS
        .with_label_values(&[device])
        .set(stats.count as f64);
    DEVICE_SNR_MEAN.with_label_values(&[device]).set(stats.mean);
    DEVICE_SNR_STDDEV
        .with_label_values(&[device])
        .set(stats.stddev);
    DEVICE_SNR_MIN.with_label_values(&[device]).set(stats.min);
    DEVICE_SNR_MAX.with_label_values(&[device]).set(stats.max);
}

/// Increment the dropped payload counter.
pub fn record_dropped_payload(reason: &str) {
    PAYLOAD_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

/// Pushes every pipeline notification into the Prometheus registry.
#[derive(Debug, Default)]
pub struct PrometheusObserver;

impl DeviceObserver for PrometheusObserver {
    fn device_updated(&self, update: &DeviceUpdate) {
        update_device_metrics(&update.device_key, &update.stats);
    }

    fn payload_dropped(&self, error: &ParseError) {
        record_dropped_payload(error_reason(error));
    }
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
