//! Feed State Tracking
//!
//! Connection state of the active change feed, shared between the feed
//! bridge (writer) and the health server (reader).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Connection state of a change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not started or stopped cleanly.
    Disconnected,
    /// Live and delivering changes.
    Connected,
    /// Waiting to be restarted.
    Reconnecting,
    /// Faulted.
    Error,
}

impl ConnectionState {
    /// Label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

/// Serializable view of [`FeedState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStatus {
    /// Feed name.
    pub name: String,
    /// Current connection state.
    pub state: ConnectionState,
    /// When the feed last reported connected.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Most recent error message.
    pub last_error: Option<String>,
    /// Change events received since startup.
    pub events_received: u64,
    /// Restart attempts since the last successful connect.
    pub reconnect_attempts: u32,
}

/// Tracks the state of the upstream change feed.
#[derive(Debug)]
pub struct FeedState {
    name: String,
    state: RwLock<ConnectionState>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    events_received: AtomicU64,
    reconnect_attempts: AtomicU32,
}

impl FeedState {
    /// Create a disconnected feed state.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(ConnectionState::Disconnected),
            last_connected_at: RwLock::new(None),
            last_error: RwLock::new(None),
            events_received: AtomicU64::new(0),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    /// Set the connection state.
    ///
    /// Connecting clears the last error and the restart count.
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        if state == ConnectionState::Connected {
            *self.last_connected_at.write() = Some(Utc::now());
            *self.last_error.write() = None;
            self.reconnect_attempts.store(0, Ordering::Relaxed);
        }
    }

    /// Enter the error state.
    pub fn set_error(&self, message: impl Into<String>) {
        *self.state.write() = ConnectionState::Error;
        *self.last_error.write() = Some(message.into());
    }

    /// Record a restart attempt.
    pub fn record_reconnect(&self, attempt: u32) {
        *self.state.write() = ConnectionState::Reconnecting;
        self.reconnect_attempts.store(attempt, Ordering::Relaxed);
    }

    /// Count a change event.
    pub fn record_event(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether the feed is live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Change events received since startup.
    #[must_use]
    pub fn events_received(&self) -> u64 {
        self.events_received.load(Ordering::Relaxed)
    }

    /// Serializable snapshot.
    #[must_use]
    pub fn status(&self) -> FeedStatus {
        FeedStatus {
            name: self.name.clone(),
            state: self.state(),
            last_connected_at: *self.last_connected_at.read(),
            last_error: self.last_error.read().clone(),
            events_received: self.events_received(),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
        }
    }
}
