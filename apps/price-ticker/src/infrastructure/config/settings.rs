//! Ticker Configuration Settings
//!
//! Configuration types for the price ticker, loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// WebSocket subscriber endpoint port.
    pub ws_port: u16,
    /// Health check and metrics HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            ws_port: 8090,
            health_port: 8091,
        }
    }
}

/// Broker and session delivery settings.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Deadline for a single push to a subscriber.
    pub push_timeout: Duration,
    /// Capacity of each session's outbound frame queue.
    pub outbound_buffer: usize,
    /// Capacity of the feed to broker event channel.
    pub feed_channel_capacity: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            push_timeout: Duration::from_millis(2000),
            outbound_buffer: 256,
            feed_channel_capacity: 1024,
        }
    }
}

/// Simulated feed and supervisor settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Interval between simulated price writes.
    pub write_interval: Duration,
    /// Lowest simulated price.
    pub min_price: Decimal,
    /// Highest simulated price.
    pub max_price: Decimal,
    /// JSON seed file; the built-in universe is used when unset.
    pub seed_file: Option<PathBuf>,
    /// Initial restart delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum restart delay.
    pub reconnect_delay_max: Duration,
    /// Restart delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum restart attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            write_interval: Duration::from_millis(350),
            min_price: Decimal::ONE,
            max_price: Decimal::ONE_HUNDRED,
            seed_file: None,
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0, // Unlimited
        }
    }
}

/// Complete ticker configuration.
#[derive(Debug, Clone, Default)]
pub struct TickerConfig {
    /// Server port settings.
    pub server: ServerSettings,
    /// Broker delivery settings.
    pub broker: BrokerSettings,
    /// Feed settings.
    pub feed: FeedSettings,
}

impl TickerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting settings are inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Missing or unparseable values fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting settings are inconsistent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        let server_defaults = ServerSettings::default();
        let broker_defaults = BrokerSettings::default();
        let feed_defaults = FeedSettings::default();

        let server = ServerSettings {
            ws_port: env.parse("TICKER_WS_PORT", server_defaults.ws_port),
            health_port: env.parse("TICKER_HEALTH_PORT", server_defaults.health_port),
        };

        let broker = BrokerSettings {
            push_timeout: env.millis("TICKER_PUSH_TIMEOUT_MS", broker_defaults.push_timeout),
            outbound_buffer: env.parse("TICKER_OUTBOUND_BUFFER", broker_defaults.outbound_buffer),
            feed_channel_capacity: env.parse(
                "TICKER_FEED_CHANNEL_CAPACITY",
                broker_defaults.feed_channel_capacity,
            ),
        };

        let feed = FeedSettings {
            write_interval: env.millis("TICKER_WRITE_INTERVAL_MS", feed_defaults.write_interval),
            min_price: env.parse("TICKER_MIN_PRICE", feed_defaults.min_price),
            max_price: env.parse("TICKER_MAX_PRICE", feed_defaults.max_price),
            seed_file: env
                .get("TICKER_SEED_FILE")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            reconnect_delay_initial: env.millis(
                "TICKER_RECONNECT_DELAY_INITIAL_MS",
                feed_defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: env.secs(
                "TICKER_RECONNECT_DELAY_MAX_SECS",
                feed_defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env.parse(
                "TICKER_RECONNECT_DELAY_MULTIPLIER",
                feed_defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: env.parse(
                "TICKER_MAX_RECONNECT_ATTEMPTS",
                feed_defaults.max_reconnect_attempts,
            ),
        };

        let config = Self {
            server,
            broker,
            feed,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.push_timeout.is_zero() {
            return Err(ConfigError::ZeroPushTimeout);
        }
        if self.broker.outbound_buffer == 0 {
            return Err(ConfigError::ZeroCapacity("TICKER_OUTBOUND_BUFFER"));
        }
        if self.broker.feed_channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("TICKER_FEED_CHANNEL_CAPACITY"));
        }
        if self.feed.min_price.is_sign_negative() || self.feed.max_price.is_sign_negative() {
            return Err(ConfigError::NegativePrice {
                min: self.feed.min_price,
                max: self.feed.max_price,
            });
        }
        if self.feed.min_price > self.feed.max_price {
            return Err(ConfigError::InvalidPriceRange {
                min: self.feed.min_price,
                max: self.feed.max_price,
            });
        }
        for price in [self.feed.min_price, self.feed.max_price] {
            if !fits_in_cents(price) {
                return Err(ConfigError::PriceOutOfRange { price });
            }
        }
        Ok(())
    }
}

/// Whether `price` expressed in whole cents fits an `i64`.
fn fits_in_cents(price: Decimal) -> bool {
    price
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.trunc().to_i64())
        .is_some()
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Push timeout must be positive.
    #[error("TICKER_PUSH_TIMEOUT_MS must be greater than zero")]
    ZeroPushTimeout,
    /// Channel capacity must be positive.
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),
    /// Simulated price bounds must not be negative.
    #[error("price bounds cannot be negative (min {min}, max {max})")]
    NegativePrice {
        /// Configured lower bound.
        min: Decimal,
        /// Configured upper bound.
        max: Decimal,
    },
    /// Lower price bound exceeds the upper one.
    #[error("TICKER_MIN_PRICE {min} exceeds TICKER_MAX_PRICE {max}")]
    InvalidPriceRange {
        /// Configured lower bound.
        min: Decimal,
        /// Configured upper bound.
        max: Decimal,
    },
    /// A price bound is too large to simulate in whole cents.
    #[error("price bound {price} is too large")]
    PriceOutOfRange {
        /// Offending bound.
        price: Decimal,
    },
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string())
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn secs(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}
