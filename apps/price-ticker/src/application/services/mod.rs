//! Application Services
//!
//! - `NotificationBroker`: applies change events to the store and fans
//!   price updates out to registered subscribers

mod broker;

pub use broker::{BrokerConfig, BrokerStats, FanoutReport, NotificationBroker, Subscriber};
