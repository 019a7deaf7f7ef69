//! Price Ticker Console Client
//!
//! Subscribes to the ticker, loads the instrument snapshot and keeps a
//! local table up to date from pushed price changes.
//!
//! # Usage
//!
//! ```bash
//! TICKER_URL=ws://127.0.0.1:8090/ws cargo run --bin price-ticker-client
//! ```
//!
//! Ctrl+C unsubscribes and closes the connection.

use anyhow::{Context, Result};
use futures_util::{Sink, SinkExt, StreamExt};
use price_ticker::infrastructure::websocket::{ClientMessage, ServerMessage};
use price_ticker::{Instrument, PriceUpdate};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "ws://127.0.0.1:8090/ws";

/// Local copy of the instrument table.
#[derive(Debug, Default)]
struct StockTable {
    rows: Vec<Instrument>,
}

impl StockTable {
    fn load(&mut self, stocks: Vec<Instrument>) {
        self.rows = stocks;
    }

    /// Overwrite the row with the update's code. Unknown codes are ignored.
    fn apply(&mut self, update: &PriceUpdate) -> bool {
        let Some(row) = self.rows.iter_mut().find(|row| row.code == update.code) else {
            return false;
        };
        row.name.clone_from(&update.name);
        row.price = update.price;
        true
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let url = std::env::var("TICKER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let (socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    tracing::info!(%url, "Connected");

    let (mut sink, mut stream) = socket.split();
    send(&mut sink, &ClientMessage::Subscribe).await?;
    send(&mut sink, &ClientMessage::GetAllStocks).await?;

    let mut table = StockTable::default();

    loop {
        let frame = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Unsubscribing");
                send(&mut sink, &ClientMessage::Unsubscribe).await?;
                let _ = sink.close().await;
                break;
            }
            frame = stream.next() => frame,
        };

        let Some(frame) = frame else {
            tracing::warn!("Server closed the connection");
            break;
        };

        let text = match frame.context("connection error")? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<ServerMessage>(text.as_str()) {
            Ok(message) => handle(&mut table, message),
            Err(e) => tracing::warn!(error = %e, "Unrecognised frame"),
        }
    }

    Ok(())
}

fn handle(table: &mut StockTable, message: ServerMessage) {
    match message {
        ServerMessage::AllStocks { stocks } => {
            for stock in &stocks {
                tracing::info!(code = %stock.code, name = %stock.name, price = %stock.price, "Stock");
            }
            tracing::info!(count = stocks.len(), "Snapshot loaded");
            table.load(stocks);
        }
        ServerMessage::PriceChange(update) => {
            if table.apply(&update) {
                tracing::info!(code = %update.code, price = %update.price, "Price changed");
            }
        }
        ServerMessage::Subscribed => tracing::info!("Subscribed"),
        ServerMessage::Unsubscribed => tracing::info!("Unsubscribed"),
        ServerMessage::Pong => tracing::debug!("Pong"),
        ServerMessage::Error { message } => tracing::warn!(%message, "Server rejected request"),
    }
}

async fn send<S>(sink: &mut S, message: &ClientMessage) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let text = serde_json::to_string(message)?;
    sink.send(Message::Text(text.into()))
        .await
        .context("failed to send request")
}
