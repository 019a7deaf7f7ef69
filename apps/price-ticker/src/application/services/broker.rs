//! Notification Broker
//!
//! Bridges change events to the instrument store and to subscribers.
//!
//! # Delivery
//!
//! For every change event the broker first upserts the store, then pushes
//! the update to each registered subscriber exactly once. Pushes run
//! concurrently and each is bounded by `push_timeout`. A push that fails or
//! times out unregisters that subscriber; it is not retried and never holds
//! up delivery to the others.
//!
//! Store and registry each carry their own lock. Neither lock is held while
//! a push is awaited.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::application::ports::{PushError, SubscriberConnection};
use crate::domain::instrument::{ChangeEvent, Instrument, PriceUpdate};
use crate::domain::store::InstrumentStore;
use crate::domain::subscription::{SubscriberHandle, SubscriberId, SubscriberRegistry};
use crate::infrastructure::metrics;

/// Subscriber handle as held by the broker.
pub type Subscriber = SubscriberHandle<dyn SubscriberConnection>;

/// Default per-push deadline.
const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Configuration
// =============================================================================

/// Broker tuning.
#[derive(Debug, Clone, Copy)]
pub struct BrokerConfig {
    /// Deadline for a single push; expiry counts as a failed push.
    pub push_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            push_timeout: DEFAULT_PUSH_TIMEOUT,
        }
    }
}

// =============================================================================
// Fan-out Report
// =============================================================================

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Subscribers that accepted the update.
    pub delivered: usize,
    /// Subscribers whose push failed.
    pub failed: usize,
    /// Subscribers whose push exceeded the deadline.
    pub timed_out: usize,
    /// Subscribers unregistered by this fan-out.
    pub dropped: Vec<SubscriberId>,
}

impl FanoutReport {
    /// Total subscribers the update was attempted on.
    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.delivered + self.failed + self.timed_out
    }
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Default)]
struct DeliveryCounters {
    events_applied: AtomicU64,
    pushes_delivered: AtomicU64,
    pushes_failed: AtomicU64,
    subscribers_dropped: AtomicU64,
}

/// Point-in-time broker statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Registered subscribers.
    pub subscribers: usize,
    /// Tracked instruments.
    pub instruments: usize,
    /// Change events applied to the store.
    pub events_applied: u64,
    /// Successful pushes.
    pub pushes_delivered: u64,
    /// Failed or timed-out pushes.
    pub pushes_failed: u64,
    /// Subscribers unregistered after a failed push.
    pub subscribers_dropped: u64,
}

// =============================================================================
// Broker
// =============================================================================

/// Publish-subscribe broker for instrument price changes.
pub struct NotificationBroker {
    store: InstrumentStore,
    registry: SubscriberRegistry<dyn SubscriberConnection>,
    push_timeout: Duration,
    counters: DeliveryCounters,
}

impl Default for NotificationBroker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl NotificationBroker {
    /// Create a broker with an empty store and no subscribers.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            store: InstrumentStore::new(),
            registry: SubscriberRegistry::new(),
            push_timeout: config.push_timeout,
            counters: DeliveryCounters::default(),
        }
    }

    /// Load the initial instrument snapshot.
    ///
    /// Returns the number of instruments newly added to the store.
    pub fn seed(&self, instruments: Vec<Instrument>) -> usize {
        let inserted = self.store.load(instruments);
        metrics::set_instruments(self.store.len());
        tracing::info!(
            inserted,
            total = self.store.len(),
            "Instrument snapshot loaded"
        );
        inserted
    }

    /// Current state of every tracked instrument, in insertion order.
    #[must_use]
    pub fn get_all_instruments(&self) -> Vec<Instrument> {
        self.store.snapshot()
    }

    /// Current state of one instrument.
    #[must_use]
    pub fn instrument(&self, code: &str) -> Option<Instrument> {
        self.store.get(code)
    }

    /// Register a subscriber. Idempotent.
    ///
    /// No snapshot is pushed; callers fetch it with
    /// [`get_all_instruments`](Self::get_all_instruments).
    pub fn subscribe(&self, handle: Subscriber) -> bool {
        let id = handle.id();
        let added = self.registry.add(handle);
        if added {
            metrics::set_subscribers(self.registry.len());
            tracing::info!(subscriber = %id, "Subscriber registered");
        } else {
            tracing::debug!(subscriber = %id, "Subscriber already registered");
        }
        added
    }

    /// Unregister a subscriber. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            metrics::set_subscribers(self.registry.len());
            tracing::info!(subscriber = %id, "Subscriber unregistered");
        }
        removed
    }

    /// Whether `id` is currently registered.
    #[must_use]
    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.registry.contains(id)
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Apply a validated change to the store, then fan it out.
    ///
    /// The store is updated before any push starts, so a snapshot taken
    /// once this call is under way already carries the new price.
    pub async fn on_change_event(&self, event: ChangeEvent) -> FanoutReport {
        let outcome = self.store.upsert(&event.code, &event.name, event.price);
        self.counters.events_applied.fetch_add(1, Ordering::Relaxed);
        metrics::set_instruments(self.store.len());

        tracing::debug!(
            code = %event.code,
            price = %event.price,
            kind = event.kind.as_str(),
            outcome = ?outcome,
            "Change applied"
        );

        self.publish(&PriceUpdate::from(&event)).await
    }

    /// Push `update` to every registered subscriber.
    ///
    /// Does not touch the store.
    pub async fn publish(&self, update: &PriceUpdate) -> FanoutReport {
        let mut targets = Vec::with_capacity(self.registry.len());
        self.registry.for_each(|handle| targets.push(handle.clone()));

        if targets.is_empty() {
            return FanoutReport::default();
        }

        let started = Instant::now();
        let deadline = self.push_timeout;

        let outcomes = join_all(targets.iter().map(|handle| async move {
            let result = match tokio::time::timeout(deadline, handle.connection().push(update)).await
            {
                Ok(result) => result,
                Err(_) => Err(PushError::TimedOut(deadline)),
            };
            (handle.id(), result)
        }))
        .await;

        let mut report = FanoutReport::default();
        for (id, result) in outcomes {
            match result {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    if matches!(err, PushError::TimedOut(_)) {
                        report.timed_out += 1;
                    } else {
                        report.failed += 1;
                    }
                    metrics::record_push_failure(&err);
                    self.drop_subscriber(id, &err, &mut report);
                }
            }
        }

        self.record(&report, started.elapsed());
        report
    }

    /// Snapshot of broker statistics.
    #[must_use]
    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            subscribers: self.registry.len(),
            instruments: self.store.len(),
            events_applied: self.counters.events_applied.load(Ordering::Relaxed),
            pushes_delivered: self.counters.pushes_delivered.load(Ordering::Relaxed),
            pushes_failed: self.counters.pushes_failed.load(Ordering::Relaxed),
            subscribers_dropped: self.counters.subscribers_dropped.load(Ordering::Relaxed),
        }
    }

    fn drop_subscriber(&self, id: SubscriberId, err: &PushError, report: &mut FanoutReport) {
        // Already gone if it unsubscribed while the push was in flight.
        if self.registry.remove(id) {
            tracing::warn!(subscriber = %id, error = %err, "Dropping subscriber after failed push");
            self.counters
                .subscribers_dropped
                .fetch_add(1, Ordering::Relaxed);
            report.dropped.push(id);
        }
    }

    fn record(&self, report: &FanoutReport, elapsed: Duration) {
        let failed = report.failed + report.timed_out;
        self.counters
            .pushes_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.counters
            .pushes_failed
            .fetch_add(failed as u64, Ordering::Relaxed);

        metrics::record_pushes_delivered(report.delivered as u64);
        metrics::record_fanout_duration(elapsed);
        if !report.dropped.is_empty() {
            metrics::set_subscribers(self.registry.len());
        }

        tracing::trace!(
            delivered = report.delivered,
            failed,
            elapsed_us = elapsed.as_micros(),
            "Fan-out complete"
        );
    }
}

// =============================================================================
// Tests
// =============================================================================
