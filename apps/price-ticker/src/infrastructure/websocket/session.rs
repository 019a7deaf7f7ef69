//! WebSocket Session
//!
//! One accepted socket. The session owns a subscriber id for its whole
//! lifetime; subscribing registers a handle whose pushes are queued on a
//! bounded outbound channel drained by a dedicated writer task. A full
//! queue makes the push wait, so a slow reader is eventually dropped by the
//! broker's push deadline. Replies share that queue, so a slow reader's
//! requests also wait until the deadline drops it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::Instrument as _;
use uuid::Uuid;

use super::messages::{ClientMessage, ServerMessage};
use crate::application::ports::{PushError, SubscriberConnection};
use crate::application::services::{NotificationBroker, Subscriber};
use crate::domain::instrument::PriceUpdate;
use crate::domain::subscription::{SubscriberHandle, SubscriberId};

/// How long queued frames may take to flush once the client has gone.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Subscriber connection backed by a session's outbound queue.
#[derive(Debug, Clone)]
pub struct WsConnection {
    outbound: mpsc::Sender<ServerMessage>,
}

impl WsConnection {
    /// Wrap an outbound queue.
    #[must_use]
    pub const fn new(outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self { outbound }
    }
}

#[async_trait]
impl SubscriberConnection for WsConnection {
    async fn push(&self, update: &PriceUpdate) -> Result<(), PushError> {
        self.outbound
            .send(ServerMessage::PriceChange(update.clone()))
            .await
            .map_err(|_| PushError::Closed)
    }
}

/// Serve one socket until the client goes away.
pub async fn run_session(socket: WebSocket, broker: Arc<NotificationBroker>, outbound_buffer: usize) {
    let session_id = Uuid::new_v4();
    let subscriber_id = SubscriberId::next();
    let span = tracing::info_span!("ws_session", %session_id, subscriber = %subscriber_id);

    serve_socket(socket, broker, outbound_buffer, subscriber_id)
        .instrument(span)
        .await;
}

async fn serve_socket(
    socket: WebSocket,
    broker: Arc<NotificationBroker>,
    outbound_buffer: usize,
    subscriber_id: SubscriberId,
) {
    tracing::info!("Session opened");

    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::channel::<ServerMessage>(outbound_buffer.max(1));

    let handle: Subscriber = SubscriberHandle::new(
        subscriber_id,
        Arc::new(WsConnection::new(tx.clone())) as Arc<dyn SubscriberConnection>,
    );

    let mut writer = tokio::spawn(write_frames(sink, rx).in_current_span());

    while let Some(frame) = stream.next().await {
        let reply = match frame {
            Ok(Message::Text(text)) => handle_client_frame(text.as_str(), &broker, &handle),
            Ok(Message::Binary(_)) => ServerMessage::Error {
                message: "binary frames are not supported".to_string(),
            },
            Ok(Message::Close(_)) => break,
            // Ping replies are sent by the socket itself.
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "Socket read failed");
                break;
            }
        };

        // Waits while the queue is full.
        if tx.send(reply).await.is_err() {
            break;
        }
    }

    broker.unsubscribe(subscriber_id);

    // The writer stops once every sender is gone and the queue is empty.
    drop(handle);
    drop(tx);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        tracing::debug!("Outbound queue did not drain in time");
        writer.abort();
    }
    tracing::info!("Session closed");
}

/// Drain queued frames into `sink`, then close it.
async fn write_frames<S>(mut sink: S, mut rx: mpsc::Receiver<ServerMessage>)
where
    S: Sink<Message> + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode frame");
                continue;
            }
        };
        if sink.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Apply one client text frame and build the reply.
pub fn handle_client_frame(
    text: &str,
    broker: &NotificationBroker,
    handle: &Subscriber,
) -> ServerMessage {
    let request = match serde_json::from_str::<ClientMessage>(text) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable client frame");
            return ServerMessage::Error {
                message: format!("invalid request: {e}"),
            };
        }
    };

    match request {
        ClientMessage::Subscribe => {
            broker.subscribe(handle.clone());
            ServerMessage::Subscribed
        }
        ClientMessage::Unsubscribe => {
            broker.unsubscribe(handle.id());
            ServerMessage::Unsubscribed
        }
        ClientMessage::GetAllStocks => ServerMessage::AllStocks {
            stocks: broker.get_all_instruments(),
        },
        ClientMessage::Ping => ServerMessage::Pong,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::instrument::Instrument;

    fn session_handle(buffer: usize) -> (Subscriber, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(buffer);
        let handle = SubscriberHandle::new(
            SubscriberId::next(),
            Arc::new(WsConnection::new(tx)) as Arc<dyn SubscriberConnection>,
        );
        (handle, rx)
    }

    #[tokio::test]
    async fn push_enqueues_price_change() {
        let (tx, mut rx) = mpsc::channel(1);
        let connection = WsConnection::new(tx);

        connection
            .push(&PriceUpdate::new("X", "Xerox", dec!(12.34)))
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::PriceChange(PriceUpdate::new("X", "Xerox", dec!(12.34))))
        );
    }

    #[tokio::test]
    async fn push_to_closed_queue_fails() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = WsConnection::new(tx)
            .push(&PriceUpdate::new("X", "Xerox", dec!(1)))
            .await;

        assert_eq!(result, Err(PushError::Closed));
    }

    #[tokio::test]
    async fn queued_frames_are_flushed_after_queue_closes() {
        let (tx, rx) = mpsc::channel(4);
        let (sink, written) = futures::channel::mpsc::unbounded::<Message>();

        tx.send(ServerMessage::Unsubscribed).await.unwrap();
        tx.send(ServerMessage::Error {
            message: "late".to_string(),
        })
        .await
        .unwrap();
        drop(tx);

        write_frames(sink, rx).await;

        let frames: Vec<ServerMessage> = written
            .filter_map(|message| async move {
                match message {
                    Message::Text(text) => serde_json::from_str(text.as_str()).ok(),
                    _ => None,
                }
            })
            .collect()
            .await;
        assert_eq!(
            frames,
            vec![
                ServerMessage::Unsubscribed,
                ServerMessage::Error {
                    message: "late".to_string()
                },
            ]
        );
    }

    #[test]
    fn subscribe_and_unsubscribe_frames() {
        let broker = NotificationBroker::default();
        let (handle, _rx) = session_handle(4);

        assert_eq!(
            handle_client_frame(r#"{"type":"subscribe"}"#, &broker, &handle),
            ServerMessage::Subscribed
        );
        assert!(broker.is_subscribed(handle.id()));

        assert_eq!(
            handle_client_frame(r#"{"type":"unsubscribe"}"#, &broker, &handle),
            ServerMessage::Unsubscribed
        );
        assert!(!broker.is_subscribed(handle.id()));
    }

    #[test]
    fn get_all_stocks_returns_snapshot() {
        let broker = NotificationBroker::default();
        let seed = vec![
            Instrument::new("AAA", "Acme", dec!(10.00)).unwrap(),
            Instrument::new("BBB", "Beta", dec!(20.00)).unwrap(),
        ];
        broker.seed(seed.clone());
        let (handle, _rx) = session_handle(4);

        assert_eq!(
            handle_client_frame(r#"{"type":"get_all_stocks"}"#, &broker, &handle),
            ServerMessage::AllStocks { stocks: seed }
        );
    }

    #[test]
    fn garbage_yields_error_frame() {
        let broker = NotificationBroker::default();
        let (handle, _rx) = session_handle(4);

        let reply = handle_client_frame("not json", &broker, &handle);

        assert!(matches!(reply, ServerMessage::Error { .. }));
        assert!(!broker.is_subscribed(handle.id()));
    }
}
