//! Payload sources
//!
//! The transport boundary. A [`PayloadSource`] hands raw payloads to the
//! pipeline one at a time, in delivery order. Connection handling, retries
//! and credentials stay with the transport; a source only reports failures.

use std::io::BufRead;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::error::TransportError;
use crate::pipeline::StopSignal;

/// Default interval at which a blocked [`ChannelSource`] rechecks its stop flag
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Something that delivers raw payloads.
pub trait PayloadSource {
    /// Next payload, `None` once the stream has ended.
    fn next_payload(&mut self) -> Option<Result<Vec<u8>, TransportError>>;
}

/// Pre-recorded payloads, mostly for replays and tests.
impl PayloadSource for std::vec::IntoIter<Vec<u8>> {
    fn next_payload(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        self.next().map(Ok)
    }
}

/// One payload per line, as written by `rtl_433 -F json` or
/// `mosquitto_sub -t 'rtl_433/+/events'`.
///
/// Lines are handed over as raw bytes. A line that is not valid UTF-8 is
/// the parser's problem (a malformed payload), not the end of the stream.
#[derive(Debug)]
pub struct LineSource<R> {
    reader: R,
    buf: Vec<u8>,
    lines_read: u64,
}

impl<R: BufRead> LineSource<R> {
    /// Wrap a buffered reader
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            lines_read: 0,
        }
    }

    /// Number of lines consumed so far, blank ones included
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}

impl<R: BufRead> PayloadSource for LineSource<R> {
    fn next_payload(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.lines_read += 1;
                    let line = trim_ascii(&self.buf);
                    if line.is_empty() {
                        continue;
                    }
                    return Some(Ok(line.to_vec()));
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = match bytes.iter().position(|b| !b.is_ascii_whitespace()) {
        Some(start) => start,
        None => return &[],
    };
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |end| end + 1);
    &bytes[start..end]
}

/// Item carried by a [`ChannelSource`].
///
/// Plain payloads for producers that cannot fail, results for producers
/// that must hand a read failure on to the pipeline.
pub trait ChannelPayload: Send {
    /// Unwrap into what the pipeline consumes
    fn into_payload(self) -> Result<Vec<u8>, TransportError>;
}

impl ChannelPayload for Vec<u8> {
    fn into_payload(self) -> Result<Vec<u8>, TransportError> {
        Ok(self)
    }
}

impl ChannelPayload for Result<Vec<u8>, TransportError> {
    fn into_payload(self) -> Result<Vec<u8>, TransportError> {
        self
    }
}

/// Payloads pushed by another thread over an mpsc channel.
///
/// A blocked receive wakes every poll interval to check the stop flag, so
/// a quiet transport never holds up a stop request.
#[derive(Debug)]
pub struct ChannelSource<T = Vec<u8>> {
    rx: Receiver<T>,
    stop: StopSignal,
    poll: Duration,
}

impl<T: ChannelPayload> ChannelSource<T> {
    /// Wrap a receiver, watching `stop`
    pub fn new(rx: Receiver<T>, stop: StopSignal) -> Self {
        Self::with_poll_interval(rx, stop, DEFAULT_POLL_INTERVAL)
    }

    /// Wrap a receiver with a custom poll interval
    pub fn with_poll_interval(rx: Receiver<T>, stop: StopSignal, poll: Duration) -> Self {
        Self { rx, stop, poll }
    }
}

impl<T: ChannelPayload> PayloadSource for ChannelSource<T> {
    fn next_payload(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        loop {
            if self.stop.is_stopped() {
                return None;
            }
            match self.rx.recv_timeout(self.poll) {
                Ok(item) => return Some(item.into_payload()),
                Err(RecvTimeoutError::Timeout) => continue,
                // Sender dropped: the transport closed its end cleanly
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}
