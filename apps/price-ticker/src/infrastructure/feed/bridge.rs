//! Feed Bridge
//!
//! The single task that turns feed events into broker calls. Events are
//! handled one at a time in arrival order, so per-instrument ordering from
//! the feed is preserved through the store and out to subscribers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::state::{ConnectionState, FeedState};
use crate::application::ports::FeedEvent;
use crate::application::services::{FanoutReport, NotificationBroker};
use crate::domain::instrument::{ChangeEvent, ValidationError};
use crate::infrastructure::metrics::{self, EventOutcome};

/// Drain `events` into `broker` until the channel closes or `cancel` fires.
pub async fn run_feed_bridge(
    mut events: mpsc::Receiver<FeedEvent>,
    broker: Arc<NotificationBroker>,
    state: Arc<FeedState>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        let Some(event) = event else {
            tracing::info!("Feed event channel closed");
            break;
        };

        handle_feed_event(event, &broker, &state).await;
    }

    state.set_state(ConnectionState::Disconnected);
    tracing::debug!("Feed bridge stopped");
}

/// Apply one feed event.
///
/// Returns the fan-out report when the event changed a price.
pub async fn handle_feed_event(
    event: FeedEvent,
    broker: &NotificationBroker,
    state: &FeedState,
) -> Option<FanoutReport> {
    match event {
        FeedEvent::Connected => {
            tracing::info!("Change feed connected");
            state.set_state(ConnectionState::Connected);
            None
        }
        FeedEvent::Disconnected => {
            tracing::info!("Change feed disconnected");
            state.set_state(ConnectionState::Disconnected);
            None
        }
        FeedEvent::Reconnecting { attempt } => {
            state.record_reconnect(attempt);
            metrics::record_feed_restart();
            None
        }
        FeedEvent::Error(message) => {
            tracing::warn!(error = %message, "Change feed error");
            state.set_error(message);
            metrics::record_feed_error();
            None
        }
        FeedEvent::Change(raw) => {
            state.record_event();
            match ChangeEvent::try_from(raw) {
                Ok(change) => {
                    metrics::record_feed_event(EventOutcome::Applied);
                    Some(broker.on_change_event(change).await)
                }
                Err(ValidationError::UnsupportedKind { kind, code }) => {
                    tracing::debug!(kind = kind.as_str(), %code, "Ignoring change event");
                    metrics::record_feed_event(EventOutcome::Ignored);
                    None
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Discarding malformed change event");
                    metrics::record_feed_event(EventOutcome::Rejected);
                    None
                }
            }
        }
    }
}
