//! Event decoding
//!
//! Turns one rtl_433 JSON record into an [`Event`]. Only the fields used
//! for duplicate detection and statistics are looked at; everything else the
//! decoder emits (temperature, battery, channel, ...) is ignored.
//!
//! Example record:
//! ```json
//! {"time": "2023-03-02 10:15:07", "model": "Acurite-Tower", "id": 2345,
//!  "channel": "A", "temperature_C": 21.3, "snr": 14.8}
//! ```

use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::{TimeZoneMode, WatchConfig, DEFAULT_TIME_FORMAT};
use crate::error::ParseError;

/// One decoded sensor transmission considered for ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// `model`, or `model id` when the record carries an id
    pub device_key: String,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    /// Signal-to-noise ratio (0.0 when the record has none)
    pub snr: f64,
    /// The `time` field as the decoder wrote it
    pub time: String,
}

impl Event {
    /// Build an event directly (tests, synthetic sources).
    pub fn new(device_key: impl Into<String>, timestamp: f64, snr: f64) -> Self {
        Self {
            device_key: device_key.into(),
            timestamp,
            snr,
            time: String::new(),
        }
    }
}

/// Decodes raw payloads into events.
#[derive(Debug, Clone)]
pub struct EventParser {
    time_format: String,
    time_zone: TimeZoneMode,
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EventParser {
    /// Parser with the default format, local time zone
    pub fn new() -> Self {
        Self {
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            time_zone: TimeZoneMode::Local,
        }
    }

    /// Parser following a session configuration
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            time_format: config.time_format.clone(),
            time_zone: config.time_zone,
        }
    }

    /// Decode one raw payload.
    pub fn parse(&self, payload: &[u8]) -> Result<Event, ParseError> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        self.parse_value(&value)
    }

    /// Decode an already-deserialized record.
    pub fn parse_value(&self, record: &Value) -> Result<Event, ParseError> {
        let obj = record
            .as_object()
            .ok_or_else(|| ParseError::InvalidJson("payload is not an object".to_string()))?;

        let time = match obj.get("time") {
            None | Some(Value::Null) => return Err(ParseError::MissingField("time")),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(ParseError::InvalidField {
                    field: "time",
                    reason: format!("expected string, got {}", other),
                })
            }
        };

        let model = match obj.get("model") {
            None | Some(Value::Null) => return Err(ParseError::MissingField("model")),
            Some(Value::String(s)) if !s.is_empty() => s.as_str(),
            Some(other) => {
                return Err(ParseError::InvalidField {
                    field: "model",
                    reason: format!("expected non-empty string, got {}", other),
                })
            }
        };

        let device_key = match obj.get("id").map(id_text).transpose()?.flatten() {
            Some(id) => format!("{} {}", model, id),
            None => model.to_string(),
        };

        let timestamp = self.parse_time(&time)?;
        let snr = match obj.get("snr") {
            None | Some(Value::Null) => 0.0,
            Some(value) => snr_value(value)?,
        };

        Ok(Event {
            device_key,
            timestamp,
            snr,
            time,
        })
    }

    /// Convert the decoder's date-time text into epoch seconds.
    pub fn parse_time(&self, text: &str) -> Result<f64, ParseError> {
        let bad = || ParseError::BadTimestamp {
            value: text.to_string(),
            format: self.time_format.clone(),
        };

        // The decoder never pads its timestamps.
        if text.trim() != text {
            return Err(bad());
        }
        let naive = NaiveDateTime::parse_from_str(text, &self.time_format).map_err(|_| bad())?;

        let millis = match self.time_zone {
            TimeZoneMode::Utc => Utc.from_utc_datetime(&naive).timestamp_millis(),
            // Ambiguous wall-clock times (DST fall-back) take the first
            // instant; nonexistent ones (spring-forward gap) are rejected.
            TimeZoneMode::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .ok_or_else(bad)?
                .timestamp_millis(),
        };

        Ok(millis as f64 / 1000.0)
    }
}

fn id_text(value: &Value) -> Result<Option<String>, ParseError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(ParseError::InvalidField {
            field: "id",
            reason: format!("expected string or number, got {}", other),
        }),
    }
}

fn snr_value(value: &Value) -> Result<f64, ParseError> {
    let snr = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| ParseError::InvalidField {
            field: "snr",
            reason: format!("{} is not representable as f64", n),
        })?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| ParseError::InvalidField {
            field: "snr",
            reason: format!("'{}' is not a number", s),
        })?,
        other => {
            return Err(ParseError::InvalidField {
                field: "snr",
                reason: format!("expected number, got {}", other),
            })
        }
    };

    if !snr.is_finite() {
        return Err(ParseError::NonFiniteSnr(value.to_string()));
    }
    Ok(snr)
}
