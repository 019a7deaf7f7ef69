//! Application Layer - Port definitions and the notification broker.
//!
//! This layer wires the domain store and registry to the outside world
//! through the port traits.

/// Port interfaces for feeds and subscriber connections.
pub mod ports;

/// Application services (the notification broker).
pub mod services;
