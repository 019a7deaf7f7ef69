//! Price Ticker Binary
//!
//! Starts the price notification broker with the simulated change feed.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin price-ticker
//! ```
//!
//! # Environment Variables
//!
//! - `TICKER_WS_PORT`: WebSocket subscriber port (default: 8090)
//! - `TICKER_HEALTH_PORT`: Health check and metrics port (default: 8091)
//! - `TICKER_PUSH_TIMEOUT_MS`: Per-push deadline (default: 2000)
//! - `TICKER_WRITE_INTERVAL_MS`: Simulated write interval (default: 350)
//! - `TICKER_MIN_PRICE` / `TICKER_MAX_PRICE`: Simulated price range (default: 1 / 100)
//! - `TICKER_SEED_FILE`: JSON instrument seed (default: built-in universe)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use price_ticker::application::ports::ChangeFeed;
use price_ticker::infrastructure::feed::{
    FeedState, FeedSupervisor, ReconnectConfig, SimulatedFeed, SimulatedFeedConfig,
    builtin_universe, load_seed_file, run_feed_bridge,
};
use price_ticker::infrastructure::health::{HealthServer, HealthServerState};
use price_ticker::infrastructure::telemetry;
use price_ticker::infrastructure::websocket::WsServer;
use price_ticker::{BrokerConfig, NotificationBroker, TickerConfig, init_metrics};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv_from_ancestors();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Price Ticker");

    let _metrics_handle = init_metrics();

    let config = TickerConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Upstream table
    let seed = match &config.feed.seed_file {
        Some(path) => load_seed_file(path)?,
        None => builtin_universe(),
    };
    let feed = Arc::new(SimulatedFeed::new(
        seed,
        SimulatedFeedConfig::from_feed_settings(&config.feed),
    ));

    // Broker, seeded before any subscriber can connect
    let broker = Arc::new(NotificationBroker::new(BrokerConfig {
        push_timeout: config.broker.push_timeout,
    }));
    broker.seed(feed.load_snapshot().await?);

    let feed_state = Arc::new(FeedState::new(feed.name()));

    // Listeners are bound up front so a busy port aborts startup
    let ws_server = WsServer::new(
        config.server.ws_port,
        Arc::clone(&broker),
        config.broker.outbound_buffer,
        shutdown_token.clone(),
    );
    let ws_listener = ws_server.bind().await?;

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION"),
        Arc::clone(&broker),
        Arc::clone(&feed_state),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    let health_listener = health_server.bind().await?;

    // Feed -> bridge -> broker
    let (events_tx, events_rx) = mpsc::channel(config.broker.feed_channel_capacity);

    let bridge_task = tokio::spawn(run_feed_bridge(
        events_rx,
        Arc::clone(&broker),
        Arc::clone(&feed_state),
        shutdown_token.clone(),
    ));

    let supervisor = FeedSupervisor::new(
        feed,
        ReconnectConfig::from_feed_settings(&config.feed),
    );
    let supervisor_cancel = shutdown_token.clone();
    let supervisor_task = tokio::spawn(async move {
        if let Err(e) = supervisor.run(events_tx, supervisor_cancel).await {
            tracing::error!(error = %e, "Change feed supervisor stopped");
        }
    });

    tokio::spawn(async move {
        if let Err(e) = ws_server.serve(ws_listener).await {
            tracing::error!(error = %e, "WebSocket server error");
        }
    });

    tokio::spawn(async move {
        if let Err(e) = health_server.serve(health_listener).await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    tracing::info!(
        instruments = broker.stats().instruments,
        "Price ticker ready"
    );

    await_shutdown(shutdown_token).await;

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = supervisor_task.await;
        let _ = bridge_task.await;
    })
    .await;
    if drained.is_err() {
        tracing::warn!("Feed tasks did not stop before the shutdown timeout");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &TickerConfig) {
    tracing::info!(
        ws_port = config.server.ws_port,
        health_port = config.server.health_port,
        push_timeout_ms = u64::try_from(config.broker.push_timeout.as_millis()).unwrap_or(u64::MAX),
        outbound_buffer = config.broker.outbound_buffer,
        "Configuration loaded"
    );
    tracing::debug!(
        write_interval_ms =
            u64::try_from(config.feed.write_interval.as_millis()).unwrap_or(u64::MAX),
        min_price = %config.feed.min_price,
        max_price = %config.feed.max_price,
        seed_file = ?config.feed.seed_file,
        "Simulated feed settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv_from_ancestors() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let Ok(cwd) = std::env::current_dir() else {
        return;
    };
    if let Some(env_path) = cwd
        .ancestors()
        .skip(1)
        .map(|dir| dir.join(".env"))
        .find(|path| path.exists())
    {
        let _ = dotenvy::from_path(&env_path);
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
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

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
