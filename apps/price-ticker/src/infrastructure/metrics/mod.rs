//! Prometheus Metrics Module
//!
//! # Metrics Categories
//!
//! - **Feed**: change events by outcome, feed errors, feed restarts
//! - **Delivery**: pushes by outcome and fan-out latency
//! - **State**: registered subscribers and tracked instruments
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! before [`init_metrics`] is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::application::ports::PushError;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if another global recorder is already installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            #[allow(clippy::expect_used)]
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn register_metrics() {
    describe_counter!(
        "price_ticker_feed_events_total",
        "Change events received from the feed, by outcome"
    );
    describe_counter!("price_ticker_feed_errors_total", "Feed-level errors");
    describe_counter!("price_ticker_feed_restarts_total", "Feed restart attempts");

    describe_counter!(
        "price_ticker_pushes_total",
        "Pushes to subscribers, by outcome"
    );
    describe_histogram!(
        "price_ticker_fanout_seconds",
        "Time to fan one update out to every subscriber"
    );

    describe_gauge!(
        "price_ticker_subscribers",
        "Number of registered subscribers"
    );
    describe_gauge!(
        "price_ticker_instruments",
        "Number of tracked instruments"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome label for a feed change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Validated and applied to the broker.
    Applied,
    /// Rejected as malformed.
    Rejected,
    /// Well formed but not acted on (deletes).
    Ignored,
}

impl EventOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Rejected => "rejected",
            Self::Ignored => "ignored",
        }
    }
}

/// Record a change event received from the feed.
pub fn record_feed_event(outcome: EventOutcome) {
    counter!("price_ticker_feed_events_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record a feed-level error.
pub fn record_feed_error() {
    counter!("price_ticker_feed_errors_total").increment(1);
}

/// Record a feed restart attempt.
pub fn record_feed_restart() {
    counter!("price_ticker_feed_restarts_total").increment(1);
}

/// Record successful pushes.
pub fn record_pushes_delivered(count: u64) {
    if count > 0 {
        counter!("price_ticker_pushes_total", "outcome" => "delivered").increment(count);
    }
}

/// Record one failed push.
pub fn record_push_failure(err: &PushError) {
    counter!("price_ticker_pushes_total", "outcome" => err.as_str()).increment(1);
}

/// Record fan-out duration.
pub fn record_fanout_duration(duration: Duration) {
    histogram!("price_ticker_fanout_seconds").record(duration.as_secs_f64());
}

/// Update the registered subscriber count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribers(count: usize) {
    gauge!("price_ticker_subscribers").set(count as f64);
}

/// Update the tracked instrument count.
#[allow(clippy::cast_precision_loss)]
pub fn set_instruments(count: usize) {
    gauge!("price_ticker_instruments").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_outcome_as_str() {
        assert_eq!(EventOutcome::Applied.as_str(), "applied");
        assert_eq!(EventOutcome::Rejected.as_str(), "rejected");
        assert_eq!(EventOutcome::Ignored.as_str(), "ignored");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_feed_event(EventOutcome::Applied);
        record_push_failure(&PushError::Closed);
        record_fanout_duration(Duration::from_millis(3));
        set_subscribers(3);
    }
}
