//! Port Interfaces
//!
//! Contracts between the broker and the outside world, following the
//! Hexagonal Architecture pattern. Infrastructure adapters implement them.
//!
//! ## Driven Ports (Outbound)
//!
//! - `SubscriberConnection`: pushes one price update to one connected client
//!
//! ## Driver Ports (Inbound)
//!
//! - `ChangeFeed`: source of instrument snapshots and row-level change events

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::instrument::{Instrument, PriceUpdate, RawChangeEvent};

// =============================================================================
// Subscriber Connection
// =============================================================================

/// Why a push to a subscriber did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// The connection is closed or its writer has gone away.
    #[error("subscriber connection closed")]
    Closed,

    /// The push did not complete within the broker's deadline.
    #[error("push timed out after {0:?}")]
    TimedOut(Duration),

    /// Transport-specific failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl PushError {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::TimedOut(_) => "timed_out",
            Self::Transport(_) => "transport",
        }
    }
}

/// One connected subscriber, as seen by the broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriberConnection: Send + Sync {
    /// Deliver a price change to this subscriber.
    ///
    /// # Errors
    ///
    /// Returns `PushError` when the connection can no longer accept updates.
    async fn push(&self, update: &PriceUpdate) -> Result<(), PushError>;
}

// =============================================================================
// Change Feed
// =============================================================================

/// Events emitted by a change feed while it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The feed is live and delivering changes.
    Connected,
    /// The feed lost its source.
    Disconnected,
    /// The feed is being restarted.
    Reconnecting {
        /// Restart attempt number.
        attempt: u32,
    },
    /// A committed upstream row mutation.
    Change(RawChangeEvent),
    /// A feed-level fault. The feed keeps running or is restarted.
    Error(String),
}

/// Errors reported by change feeds.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The initial snapshot could not be read.
    #[error("snapshot load failed: {0}")]
    Snapshot(String),

    /// The backing source became unavailable.
    #[error("feed source unavailable: {0}")]
    Unavailable(String),

    /// The event channel to the broker was closed.
    #[error("feed event channel closed")]
    ChannelClosed,

    /// The supervisor gave up restarting the feed.
    #[error("maximum feed restart attempts exceeded")]
    MaxRestartsExceeded,
}

/// A source of instrument state and change events.
///
/// Exactly one feed is active per broker. `load_snapshot` is called once at
/// startup; `run` may be called again by a supervisor after it fails.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Read the current rows of the backing source.
    ///
    /// # Errors
    ///
    /// Returns `FeedError` if the source cannot be read.
    async fn load_snapshot(&self) -> Result<Vec<Instrument>, FeedError>;

    /// Emit events in observation order until cancelled.
    ///
    /// Returns `Ok(())` on cancellation or when the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns `FeedError` when the feed faults and should be restarted.
    async fn run(
        &self,
        events: mpsc::Sender<FeedEvent>,
        cancel: CancellationToken,
    ) -> Result<(), FeedError>;
}
