//! Error types for rtlwatch
//!
//! This module defines all error types used throughout the library.
//! None of them is fatal to a monitoring session: a malformed payload is
//! dropped and counted, and a transport failure is handed back to whoever
//! owns the transport.

use thiserror::Error;

/// Result type alias for rtlwatch operations
pub type Result<T> = std::result::Result<T, WatchError>;

/// Main error type for rtlwatch operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WatchError {
    /// Payload could not be turned into an event
    #[error("Malformed payload: {0}")]
    Parse(#[from] ParseError),

    /// Statistics rejected a value
    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    /// Payload delivery failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors while decoding one payload (the malformed-payload class)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Payload is not a JSON object
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// A required field is absent
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A field has an unusable type or value
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// `time` does not match the expected date-time format
    #[error("Bad timestamp '{value}' (expected format {format})")]
    BadTimestamp { value: String, format: String },

    /// `snr` is NaN or infinite
    #[error("Non-finite snr: {0}")]
    NonFiniteSnr(String),
}

/// Errors raised by the statistics accumulator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    /// Value is not a finite number (NaN, Inf)
    #[error("Non-finite value: {0}")]
    NonFinite(f64),
}

/// Errors reported by a payload source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Reading from the underlying stream failed
    #[error("I/O error: {0}")]
    Io(String),

    /// The delivering side went away
    #[error("Disconnected: {reason}")]
    Disconnected { reason: String },
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

/// Errors in the session configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A tunable is out of range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// Configuration file could not be read or decoded
    #[error("Cannot load configuration from {path}: {reason}")]
    Load { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WatchError::Parse(ParseError::BadTimestamp {
            value: "yesterday".to_string(),
            format: "%Y-%m-%d %H:%M:%S".to_string(),
        });
        let msg = format!("{}", err);
        assert!(msg.contains("Malformed payload"));
        assert!(msg.contains("yesterday"));
    }

    #[test]
    fn test_error_conversion() {
        let stats_err = StatsError::NonFinite(f64::INFINITY);
        let err: WatchError = stats_err.into();
        assert!(matches!(err, WatchError::Stats(_)));

        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let transport: TransportError = io.into();
        assert!(matches!(transport, TransportError::Io(_)));
    }
}
