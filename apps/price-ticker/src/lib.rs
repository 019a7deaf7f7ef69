#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Price Ticker - Live Price Notification Broker
//!
//! Keeps an in-memory snapshot of priced instruments, applies row-level
//! change events from an upstream feed, and pushes every price change to
//! all subscribed clients over WebSocket.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: instrument records, the instrument store, the subscriber
//!   registry
//!
//! - **Application**: port traits and the notification broker
//!   - `ports`: `SubscriberConnection`, `ChangeFeed`
//!   - `services`: `NotificationBroker`
//!
//! - **Infrastructure**: adapters and ambient services
//!   - `feed`: simulated and channel feeds, supervisor, feed bridge
//!   - `websocket`: `GET /ws` subscriber sessions
//!   - `health`: health, readiness and metrics endpoint
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//!                  ┌──────────┐     ┌──────────────┐     ┌───────────┐
//! Change feed ───► │  Bridge  │ ──► │    Broker    │ ──► │ WS session│ ──► Client 1
//! (supervised)     └──────────┘     │ store, then  │ ──► │ WS session│ ──► Client 2
//!                                   │   fan-out    │     └───────────┘
//!                                   └──────────────┘ ◄── get_all_stocks
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - instrument records, store and registry.
pub mod domain;

/// Application layer - ports and the notification broker.
pub mod application;

/// Infrastructure layer - adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::instrument::{
    ChangeEvent, ChangeKind, Instrument, PriceUpdate, RawChangeEvent, ValidationError,
};
pub use domain::store::{InstrumentStore, UpsertOutcome};
pub use domain::subscription::{SubscriberHandle, SubscriberId, SubscriberRegistry};

// Ports and broker
pub use application::ports::{ChangeFeed, FeedError, FeedEvent, PushError, SubscriberConnection};
pub use application::services::{
    BrokerConfig, BrokerStats, FanoutReport, NotificationBroker, Subscriber,
};

// Infrastructure config
pub use infrastructure::config::{
    BrokerSettings, ConfigError, FeedSettings, ServerSettings, TickerConfig,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
