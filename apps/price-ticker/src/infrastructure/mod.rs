//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports, plus the ambient
//! services (configuration, telemetry, metrics, health).

/// Change feed adapters, supervision and the feed bridge.
pub mod feed;

/// WebSocket subscriber transport.
pub mod websocket;

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
