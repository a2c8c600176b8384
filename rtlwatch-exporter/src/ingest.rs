// rtlwatch Exporter - Input reader and ingestion engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Input reader and ingestion engine.
//!
//! A dedicated reader thread turns the input stream (file or stdin) into
//! payloads on a bounded channel. The pipeline consumes that channel through
//! a [`ChannelSource`], so a stop request is honoured even while the reader
//! is blocked waiting for the decoder to print its next line. A read failure
//! travels down the same channel and ends the run with an error.

use crate::metrics::PrometheusObserver;
use rtlwatch::{
    ChannelSource, ConfigError, IngestionPipeline, LineSource, PayloadSource, RunSummary,
    SnapshotQuery, StopSignal, TransportError, WatchConfig,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Payloads buffered between the reader thread and the pipeline.
const READ_AHEAD: usize = 1024;

/// Input name meaning standard input.
pub const STDIN: &str = "-";

/// One line from the reader thread, or the failure that ended the input.
pub type Delivery = Result<Vec<u8>, TransportError>;

/// State of the ingestion engine, shared with HTTP handlers.
#[derive(Debug, Default)]
pub struct IngestState {
    /// The pipeline is consuming input.
    pub running: AtomicBool,
    /// The pipeline has returned (input ended or stop requested).
    pub finished: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl IngestState {
    /// Why ingestion ended early, if it failed.
    pub fn failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_failure(&self, reason: String) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
    }
}

/// Open `input` and start a reader thread forwarding one payload per line.
///
/// Dropping the receiver makes the reader exit after its next line.
pub fn spawn_reader(input: &str) -> Result<Receiver<Delivery>, IngestError> {
    let reader: Box<dyn BufRead + Send> = if input == STDIN {
        info!("Reading rtl_433 JSON lines from stdin");
        Box::new(BufReader::new(io::stdin()))
    } else {
        let path = Path::new(input);
        if !path.exists() {
            return Err(IngestError::FileNotFound(input.to_string()));
        }
        info!("Reading rtl_433 JSON lines from {}", path.display());
        Box::new(BufReader::new(File::open(path)?))
    };

    let (tx, rx) = mpsc::sync_channel(READ_AHEAD);
    thread::Builder::new()
        .name("rtlwatch-reader".to_string())
        .spawn(move || forward_lines(LineSource::new(reader), tx))?;
    Ok(rx)
}

fn forward_lines<R: BufRead>(mut source: LineSource<R>, tx: SyncSender<Delivery>) {
    while let Some(next) = source.next_payload() {
        let failed = next.is_err();
        if let Err(e) = &next {
            warn!("Input failed after {} lines: {}", source.lines_read(), e);
        }
        if tx.send(next).is_err() {
            debug!("Pipeline gone, reader exiting");
            return;
        }
        if failed {
            return;
        }
    }
    info!("Input ended after {} lines", source.lines_read());
}

/// Owns the pipeline and runs it on a blocking thread.
pub struct IngestEngine {
    pipeline: IngestionPipeline,
    state: Arc<IngestState>,
}

impl IngestEngine {
    /// Build a pipeline from `config` with the Prometheus observer attached.
    pub fn new(config: WatchConfig) -> Result<Self, IngestError> {
        let mut pipeline = IngestionPipeline::new(config)?;
        pipeline.subscribe(Arc::new(PrometheusObserver));

        Ok(Self {
            pipeline,
            state: Arc::new(IngestState::default()),
        })
    }

    /// Get the engine state.
    pub fn state(&self) -> Arc<IngestState> {
        Arc::clone(&self.state)
    }

    /// Read-only query over the pipeline's registry and totals.
    pub fn query(&self) -> SnapshotQuery {
        self.pipeline.query()
    }

    /// Consume payloads from `rx` until the reader closes it, `stop` is
    /// raised or the reader reports a failure.
    pub fn run(mut self, rx: Receiver<Delivery>, stop: &StopSignal) -> Result<RunSummary, IngestError> {
        self.state.running.store(true, Ordering::SeqCst);
        info!("Ingestion started: {:?}", self.pipeline);

        let mut source = ChannelSource::new(rx, stop.clone());
        let result = self.pipeline.run(&mut source, stop);

        if let Err(e) = &result {
            warn!("Ingestion failed: {}", e);
            self.state.set_failure(e.to_string());
        }
        self.state.running.store(false, Ordering::SeqCst);
        self.state.finished.store(true, Ordering::SeqCst);
        result.map_err(IngestError::from)
    }
}

/// Wait for the engine task and flatten its outcome.
pub async fn join_engine(
    task: JoinHandle<Result<RunSummary, IngestError>>,
) -> Result<RunSummary, IngestError> {
    match task.await {
        Ok(result) => result,
        Err(e) => Err(IngestError::Task(e.to_string())),
    }
}

/// Exporter errors.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ingestion task failed: {0}")]
    Task(String),
}
