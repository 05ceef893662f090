//! Bybit Stream Client Binary
//!
//! Streams Bybit public ticker or trade data until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin bybit-stream-client -- --mode trade --symbols BTC,ETH,SOL
//! ```
//!
//! # Environment Variables
//!
//! - `BYBIT_MODE`, `BYBIT_SYMBOLS`, `BYBIT_CATEGORY`, `BYBIT_WS_URL`,
//!   `BYBIT_METRICS_PORT`: fallbacks for the matching flags
//! - `BYBIT_KEEPALIVE_INTERVAL_SECS`: ping interval (default: 10)
//! - `BYBIT_IDLE_TIMEOUT_SECS`: idle watchdog, 0 disables (default: 30)
//! - `BYBIT_REPORT_WINDOW_SECS`: rate report window (default: 10)
//! - `BYBIT_RAW_PREVIEW_FRAMES`: raw frames logged per session (default: 10)
//! - `BYBIT_MAX_FRAME_BYTES`: frame size limit (default: 4 MiB)
//! - `BYBIT_SUBSCRIBE_BATCH`: topics per subscribe message (default: 10)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `RUST_LOG`: Log filter (default: `bybit_stream_client=info`)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bybit_stream_client::infrastructure::telemetry;
use bybit_stream_client::{
    BybitClient, Cli, ClientSettings, StreamEvent, StreamMode, TuningSettings, init_metrics,
};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Event channel capacity between the client and the printer.
const EVENT_CHANNEL_CAPACITY: usize = 4096;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let cli = Cli::parse();

    let _telemetry_guard = telemetry::init();

    let settings = cli.into_settings(TuningSettings::from_env());
    let config = settings
        .client_config()
        .context("invalid client configuration")?;
    log_config(&settings);

    if settings.metrics_port > 0 {
        let addr = init_metrics(settings.metrics_port).context("failed to start metrics exporter")?;
        tracing::info!(addr = %addr, "Prometheus exporter listening");
    }

    let shutdown_token = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::channel::<StreamEvent>(EVENT_CHANNEL_CAPACITY);

    let mode = config.request.mode();
    let printer = tokio::spawn(handle_stream_events(event_rx, mode));

    let client = Arc::new(BybitClient::new(config, event_tx, shutdown_token.clone()));
    let client_handle = tokio::spawn(Arc::clone(&client).run());

    await_shutdown(shutdown_token).await;

    let client_abort = client_handle.abort_handle();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, client_handle)
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Client did not stop in time, aborting"
        );
        client_abort.abort();
    }
    drop(client);

    let printer_abort = printer.abort_handle();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, printer).await.is_err() {
        printer_abort.abort();
    }

    tracing::info!("Bybit stream client stopped");
    Ok(())
}

/// Print market data until the client drops its sender.
async fn handle_stream_events(mut rx: mpsc::Receiver<StreamEvent>, mode: StreamMode) {
    let label = mode.as_str().to_uppercase();

    while let Some(event) = rx.recv().await {
        for line in status_lines(&event, &label) {
            tracing::info!("{line}");
        }
    }
}

/// Status lines for one event.
///
/// Connection lifecycle is logged by the client itself, so only records and
/// rate samples are rendered here.
fn status_lines(event: &StreamEvent, label: &str) -> Vec<String> {
    match event {
        StreamEvent::Record(record) => vec![format!(
            "BYBIT {label} {} price={} ts={:.3}",
            record.symbol, record.price, record.timestamp
        )],
        StreamEvent::RateReport(report) => report.samples.iter().map(ToString::to_string).collect(),
        StreamEvent::Connecting { .. }
        | StreamEvent::Connected
        | StreamEvent::SubscribeAck { .. }
        | StreamEvent::Disconnected { .. }
        | StreamEvent::Reconnecting { .. }
        | StreamEvent::Stopped => Vec::new(),
    }
}

/// Log the parsed configuration.
fn log_config(settings: &ClientSettings) {
    tracing::info!(
        mode = settings.mode.as_str(),
        category = settings.category.as_str(),
        symbols = %settings.symbols,
        url = %settings.url(),
        metrics_port = settings.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(tuning = ?settings.tuning, "Tunables");
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
