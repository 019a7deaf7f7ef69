//! WebSocket Server
//!
//! Serves `GET /ws` and hands each upgraded socket to a session.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::session::run_session;
use crate::application::services::NotificationBroker;

#[derive(Clone)]
struct WsState {
    broker: Arc<NotificationBroker>,
    outbound_buffer: usize,
}

/// Build the subscriber router.
pub fn router(broker: Arc<NotificationBroker>, outbound_buffer: usize) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(WsState {
            broker,
            outbound_buffer,
        })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state.broker, state.outbound_buffer))
}

/// WebSocket subscriber endpoint.
pub struct WsServer {
    port: u16,
    broker: Arc<NotificationBroker>,
    outbound_buffer: usize,
    cancel: CancellationToken,
}

impl WsServer {
    /// Create a server.
    #[must_use]
    pub const fn new(
        port: u16,
        broker: Arc<NotificationBroker>,
        outbound_buffer: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            port,
            broker,
            outbound_buffer,
            cancel,
        }
    }

    /// Bind the configured port.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::BindFailed` if the port is unavailable.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(self.port, e.to_string()))
    }

    /// Bind and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or the server stops abnormally.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::ServerFailed` if the server stops abnormally.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let port = listener.local_addr().map_or(self.port, |addr| addr.port());
        tracing::info!(port, "WebSocket server listening");

        axum::serve(listener, router(self.broker, self.outbound_buffer))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ServerError::ServerFailed(e.to_string()))?;

        tracing::info!("WebSocket server stopped");
        Ok(())
    }
}

/// WebSocket server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
