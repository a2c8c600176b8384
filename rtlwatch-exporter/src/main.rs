// rtlwatch Exporter - Prometheus exporter and live report server
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # rtlwatch Exporter
//!
//! Reads `rtl_433` JSON output, keeps per-device signal statistics and serves
//! them as Prometheus metrics, JSON and a text report.
//!
//! ## Usage
//!
//! ```bash
//! # Live from the decoder
//! rtl_433 -F json | rtlwatch-exporter --summary-on-exit
//!
//! # From an MQTT subscription
//! mosquitto_sub -t 'rtl_433/+/events' | rtlwatch-exporter
//!
//! # From a capture, keep serving after the file ends
//! rtlwatch-exporter --input capture.json --linger --port 9433
//! ```

mod ingest;
mod metrics;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::Parser;
use ingest::{join_engine, spawn_reader, IngestEngine, IngestError, IngestState, STDIN};
use metrics::{encode_metrics, update_session_metrics};
use rtlwatch::{
    render_summary, DedupRule, SessionReport, SessionTotals, SnapshotQuery, SortOrder, StopSignal,
    TimeZoneMode, WatchConfig,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// rtlwatch Prometheus Exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "9433")]
    port: u16,

    /// rtl_433 JSON lines to read ("-" for stdin)
    #[arg(short, long, default_value = STDIN)]
    input: String,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Duplicate window in seconds (overrides the configuration file)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Also accept the same device again once the window has passed
    #[arg(long)]
    either_differs: bool,

    /// Interpret decoder timestamps as UTC instead of local time
    #[arg(long)]
    utc: bool,

    /// Keep serving after the input ends, until interrupted
    #[arg(long)]
    linger: bool,

    /// Print the session summary on exit
    #[arg(long)]
    summary_on_exit: bool,

    /// Device order for the exit summary (first-seen, device, count, snr)
    #[arg(long, default_value = "device")]
    sort: SortOrder,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Configuration file (or defaults) with command-line overrides applied.
    fn watch_config(&self) -> Result<WatchConfig, IngestError> {
        let mut config = match &self.config {
            Some(path) => WatchConfig::from_json_file(path)?,
            None => WatchConfig::default(),
        };
        if let Some(threshold) = self.threshold {
            config.duplicate_threshold = threshold;
        }
        if self.either_differs {
            config.dedup_rule = DedupRule::EitherDiffers;
        }
        if self.utc {
            config.time_zone = TimeZoneMode::Utc;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Application state shared across handlers.
struct AppState {
    query: SnapshotQuery,
    ingest: Arc<IngestState>,
    start_time: std::time::Instant,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("rtlwatch Exporter v{}", env!("CARGO_PKG_VERSION"));

    match serve(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve(args: Args) -> Result<(), IngestError> {
    let config = args.watch_config()?;
    info!(
        "Duplicate window {}s ({:?} rule), {:?} timestamps",
        config.duplicate_threshold, config.dedup_rule, config.time_zone
    );

    let engine = IngestEngine::new(config)?;
    let query = engine.query();
    let ingest_state = engine.state();
    let rx = spawn_reader(&args.input)?;

    // Run the pipeline on a blocking thread
    let stop = StopSignal::new();
    let input_done = Arc::new(Notify::new());
    let ingest = {
        let stop = stop.clone();
        let input_done = Arc::clone(&input_done);
        tokio::task::spawn_blocking(move || {
            let result = engine.run(rx, &stop);
            input_done.notify_one();
            result
        })
    };

    let state = Arc::new(AppState {
        query: query.clone(),
        ingest: ingest_state,
        start_time: std::time::Instant::now(),
    });

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .route("/devices", get(devices_handler))
        .route("/report", get(report_handler))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            stop.stop();
            return Err(e.into());
        }
    };
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(input_done, stop.clone(), args.linger))
        .await;
    stop.stop();

    // The pipeline sees the stop request within one poll interval
    let outcome = join_engine(ingest).await;
    if let Ok(summary) = &outcome {
        info!(
            "Ingestion finished: {} payloads, {} accepted, {} duplicates, {} malformed",
            summary.processed, summary.accepted, summary.duplicates, summary.malformed
        );
    }

    if args.summary_on_exit {
        println!("{}", render_summary(&query.report(args.sort)));
    }
    served?;
    outcome.map(|_| ())
}

/// Resolves once the server should stop: on Ctrl-C, or when ingestion
/// returns unless lingering. Raises the pipeline's stop signal either way.
async fn shutdown_signal(input_done: Arc<Notify>, stop: StopSignal, linger: bool) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Interrupted, stopping ingestion");
        }
        _ = input_done.notified() => {
            info!("Ingestion returned");
            if linger {
                info!("Lingering until interrupted");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
            }
        }
    }
    stop.stop();
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>rtlwatch Exporter</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>rtlwatch Exporter</h1>
    <p>Signal-to-noise statistics for sensors decoded by rtl_433.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div class="endpoint"><a href="/devices?sort=snr">/devices?sort=snr</a> - Device statistics (JSON)</div>
        <div class="endpoint"><a href="/report?sort=device">/report?sort=device</a> - Session report (text)</div>
        <div class="endpoint"><a href="/health">/health</a> - Health check</div>
        <div class="endpoint"><a href="/ready">/ready</a> - Readiness check</div>
        <div class="endpoint"><a href="/status">/status</a> - Status information (JSON)</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>rtlwatch_events_received_total</code> - Payloads received</li>
        <li><code>rtlwatch_events_accepted_total</code> - Events after duplicate filtering</li>
        <li><code>rtlwatch_events_duplicate_total</code> - Adjacent duplicates rejected</li>
        <li><code>rtlwatch_events_malformed_total</code> - Payloads dropped as malformed</li>
        <li><code>rtlwatch_devices</code> - Distinct devices</li>
        <li><code>rtlwatch_device_*</code> - Per-device record count and SNR mean/stddev/min/max</li>
        <li><code>rtlwatch_payload_errors_total</code> - Malformed payloads by reason</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let devices = state.query.devices(SortOrder::FirstSeen).len();
    update_session_metrics(&state.query.totals(), devices);

    match encode_metrics() {
        Ok(metrics) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; charset=utf-8")],
            metrics,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness check handler.
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.ingest.running.load(Ordering::SeqCst) || state.ingest.finished.load(Ordering::SeqCst)
    {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Starting")
    }
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    running: bool,
    finished: bool,
    failure: Option<String>,
    devices: usize,
    totals: SessionTotals,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        running: state.ingest.running.load(Ordering::SeqCst),
        finished: state.ingest.finished.load(Ordering::SeqCst),
        failure: state.ingest.failure(),
        devices: state.query.devices(SortOrder::FirstSeen).len(),
        totals: state.query.totals(),
    })
}

/// `?sort=` query parameter.
#[derive(Debug, Default, Deserialize)]
struct SortParams {
    sort: Option<String>,
}

/// Requested order, first-seen when absent.
fn parse_sort(params: &SortParams) -> Result<SortOrder, (StatusCode, String)> {
    match params.sort.as_deref() {
        None => Ok(SortOrder::default()),
        Some(s) => s
            .parse()
            .map_err(|e: String| (StatusCode::BAD_REQUEST, e)),
    }
}

/// Devices handler - returns the session report as JSON.
async fn devices_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SortParams>,
) -> Result<Json<SessionReport>, (StatusCode, String)> {
    let order = parse_sort(&params)?;
    Ok(Json(state.query.report(order)))
}

/// Report handler - returns the text summary.
async fn report_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SortParams>,
) -> Result<String, (StatusCode, String)> {
    let order = parse_sort(&params)?;
    Ok(render_summary(&state.query.report(order)))
}
