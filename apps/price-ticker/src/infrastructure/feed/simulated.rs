//! Simulated Price Feed
//!
//! An in-memory instrument table with a background writer. Every write
//! interval one random row receives a random price and an `Update` change
//! event is emitted for it, the way a database change-notification feed
//! would report an external writer's commits.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ChangeFeed, FeedError, FeedEvent};
use crate::domain::instrument::{Instrument, RawChangeEvent};
use crate::infrastructure::config::FeedSettings;

/// Simulated writer settings.
#[derive(Debug, Clone)]
pub struct SimulatedFeedConfig {
    /// Interval between writes.
    pub write_interval: Duration,
    /// Lowest generated price.
    pub min_price: Decimal,
    /// Highest generated price.
    pub max_price: Decimal,
}

impl Default for SimulatedFeedConfig {
    fn default() -> Self {
        Self::from_feed_settings(&FeedSettings::default())
    }
}

impl SimulatedFeedConfig {
    /// Build from feed settings.
    #[must_use]
    pub const fn from_feed_settings(settings: &FeedSettings) -> Self {
        Self {
            write_interval: settings.write_interval,
            min_price: settings.min_price,
            max_price: settings.max_price,
        }
    }

    /// Inclusive price range in whole cents.
    ///
    /// Bounds too large for `i64` cents saturate at `i64::MAX`.
    fn cents_range(&self) -> (i64, i64) {
        let to_cents = |price: Decimal, round: fn(&Decimal) -> Decimal| {
            price
                .checked_mul(Decimal::ONE_HUNDRED)
                .and_then(|cents| round(&cents).to_i64())
                .unwrap_or(i64::MAX)
                .max(0)
        };
        let low = to_cents(self.min_price, Decimal::ceil);
        let high = to_cents(self.max_price, Decimal::floor);
        (low, high.max(low))
    }
}

/// Change feed backed by an in-memory table and a random writer.
pub struct SimulatedFeed {
    table: RwLock<Vec<Instrument>>,
    config: SimulatedFeedConfig,
}

impl SimulatedFeed {
    /// Create a feed over `seed` rows.
    #[must_use]
    pub fn new(seed: Vec<Instrument>, config: SimulatedFeedConfig) -> Self {
        Self {
            table: RwLock::new(seed),
            config,
        }
    }

    /// Write a random price to a random row.
    ///
    /// Returns the change event for the write, or `None` if the table is empty.
    pub fn write_random(&self) -> Option<RawChangeEvent> {
        let (low, high) = self.config.cents_range();
        let mut table = self.table.write();
        if table.is_empty() {
            return None;
        }

        let mut rng = rand::rng();
        let index = rng.random_range(0..table.len());
        let price = Decimal::new(rng.random_range(low..=high), 2);

        let row = &mut table[index];
        row.price = price;
        Some(RawChangeEvent::update(row.code.clone(), row.name.clone(), price))
    }
}

#[async_trait]
impl ChangeFeed for SimulatedFeed {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn load_snapshot(&self) -> Result<Vec<Instrument>, FeedError> {
        Ok(self.table.read().clone())
    }

    async fn run(
        &self,
        events: mpsc::Sender<FeedEvent>,
        cancel: CancellationToken,
    ) -> Result<(), FeedError> {
        events
            .send(FeedEvent::Connected)
            .await
            .map_err(|_| FeedError::ChannelClosed)?;

        let mut ticker = tokio::time::interval(self.config.write_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Simulated writer stopping");
                    let _ = events.send(FeedEvent::Disconnected).await;
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let Some(change) = self.write_random() else {
                        continue;
                    };
                    tracing::trace!(
                        code = change.code.as_deref().unwrap_or_default(),
                        "Simulated write"
                    );
                    events
                        .send(FeedEvent::Change(change))
                        .await
                        .map_err(|_| FeedError::ChannelClosed)?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::instrument::{ChangeEvent, ChangeKind};

    fn feed(min: Decimal, max: Decimal) -> SimulatedFeed {
        SimulatedFeed::new(
            vec![
                Instrument::new("AAA", "Acme", dec!(10)).unwrap(),
                Instrument::new("BBB", "Beta", dec!(20)).unwrap(),
            ],
            SimulatedFeedConfig {
                write_interval: Duration::from_millis(5),
                min_price: min,
                max_price: max,
            },
        )
    }

    #[test]
    fn writes_stay_in_range_with_two_decimals() {
        let feed = feed(dec!(1), dec!(100));
        for _ in 0..200 {
            let event = ChangeEvent::try_from(feed.write_random().unwrap()).unwrap();
            assert_eq!(event.kind, ChangeKind::Update);
            assert!(event.price >= dec!(1) && event.price <= dec!(100));
            assert!(event.price.scale() <= 2);
        }
    }

    #[test]
    fn write_updates_table() {
        let feed = feed(dec!(7.77), dec!(7.77));
        let event = feed.write_random().unwrap();

        let table = feed.table.read();
        let row = table
            .iter()
            .find(|row| Some(&row.code) == event.code.as_ref())
            .unwrap();
        assert_eq!(row.price, dec!(7.77));
    }

    #[test]
    fn empty_table_writes_nothing() {
        let feed = SimulatedFeed::new(vec![], SimulatedFeedConfig::default());
        assert!(feed.write_random().is_none());
    }

    #[test]
    fn cents_range_rounds_inward() {
        let config = SimulatedFeedConfig {
            write_interval: Duration::from_millis(1),
            min_price: dec!(1.001),
            max_price: dec!(1.019),
        };
        assert_eq!(config.cents_range(), (101, 101));
    }

    #[test]
    fn oversized_bound_saturates_instead_of_overflowing() {
        let feed = feed(dec!(1), Decimal::MAX);
        assert_eq!(feed.config.cents_range(), (100, i64::MAX));

        let event = ChangeEvent::try_from(feed.write_random().unwrap()).unwrap();
        assert!(event.price >= dec!(1));
    }

    #[tokio::test]
    async fn run_emits_connected_then_changes() {
        let feed = feed(dec!(1), dec!(2));
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { feed.run(tx, cancel).await })
        };

        assert_eq!(rx.recv().await, Some(FeedEvent::Connected));
        assert!(matches!(rx.recv().await, Some(FeedEvent::Change(_))));

        cancel.cancel();
        tokio_test::assert_ok!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn closed_channel_is_an_error() {
        let feed = feed(dec!(1), dec!(2));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = feed.run(tx, CancellationToken::new()).await;
        assert!(matches!(result, Err(FeedError::ChannelClosed)));
    }
}
