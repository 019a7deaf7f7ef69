//! Configuration Module
//!
//! Configuration loading for the price ticker service.

mod settings;

pub use settings::{BrokerSettings, ConfigError, FeedSettings, ServerSettings, TickerConfig};
