//! Feed Supervisor
//!
//! Keeps the active change feed running. A feed that returns an error is
//! reported on the event channel and restarted after a backoff delay; a
//! clean return or cancellation ends supervision.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{ChangeFeed, FeedError, FeedEvent};

/// Restarts a [`ChangeFeed`] with exponential backoff.
pub struct FeedSupervisor {
    feed: Arc<dyn ChangeFeed>,
    reconnect: ReconnectConfig,
}

impl FeedSupervisor {
    /// Supervise `feed`.
    #[must_use]
    pub fn new(feed: Arc<dyn ChangeFeed>, reconnect: ReconnectConfig) -> Self {
        Self { feed, reconnect }
    }

    /// Run the feed until it finishes, is cancelled, or exhausts restarts.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::MaxRestartsExceeded` when the backoff policy gives
    /// up, or `FeedError::ChannelClosed` when nothing consumes events any more.
    pub async fn run(
        self,
        events: mpsc::Sender<FeedEvent>,
        cancel: CancellationToken,
    ) -> Result<(), FeedError> {
        let name = self.feed.name().to_string();
        let mut policy = ReconnectPolicy::new(self.reconnect);

        loop {
            let started = Instant::now();
            tracing::info!(feed = %name, "Starting change feed");

            let err = match self.feed.run(events.clone(), cancel.clone()).await {
                Ok(()) => {
                    tracing::info!(feed = %name, "Change feed stopped");
                    return Ok(());
                }
                Err(FeedError::ChannelClosed) => return Err(FeedError::ChannelClosed),
                Err(err) => err,
            };

            if cancel.is_cancelled() {
                return Ok(());
            }

            tracing::warn!(feed = %name, error = %err, "Change feed failed");
            send(&events, FeedEvent::Error(err.to_string())).await?;

            // A run that outlived the longest backoff counts as healthy.
            if started.elapsed() >= policy.max_delay() {
                policy.reset();
            }

            let Some(delay) = policy.next_delay() else {
                tracing::error!(
                    feed = %name,
                    attempts = policy.attempt_count(),
                    "Giving up on change feed"
                );
                return Err(FeedError::MaxRestartsExceeded);
            };

            let attempt = policy.attempt_count();
            tracing::info!(
                feed = %name,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Restarting change feed"
            );
            send(&events, FeedEvent::Reconnecting { attempt }).await?;

            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

async fn send(events: &mpsc::Sender<FeedEvent>, event: FeedEvent) -> Result<(), FeedError> {
    events
        .send(event)
        .await
        .map_err(|_| FeedError::ChannelClosed)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::instrument::Instrument;

    /// Fails a fixed number of runs, then succeeds.
    struct FlakyFeed {
        failures: u32,
        runs: AtomicU32,
    }

    #[async_trait]
    impl ChangeFeed for FlakyFeed {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn load_snapshot(&self) -> Result<Vec<Instrument>, FeedError> {
            Ok(vec![])
        }

        async fn run(
            &self,
            events: mpsc::Sender<FeedEvent>,
            _cancel: CancellationToken,
        ) -> Result<(), FeedError> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            if run < self.failures {
                return Err(FeedError::Unavailable(format!("run {run}")));
            }
            send(&events, FeedEvent::Connected).await
        }
    }

    fn fast_backoff(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_secs(5),
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn restarts_failing_feed() {
        let feed = Arc::new(FlakyFeed {
            failures: 2,
            runs: AtomicU32::new(0),
        });
        let (tx, mut rx) = mpsc::channel(16);

        FeedSupervisor::new(Arc::clone(&feed) as Arc<dyn ChangeFeed>, fast_backoff(0))
            .run(tx, CancellationToken::new())
            .await
            .unwrap();

        let mut seen = vec![];
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }

        assert_eq!(feed.runs.load(Ordering::SeqCst), 3);
        assert_eq!(
            seen,
            vec![
                FeedEvent::Error("feed source unavailable: run 0".into()),
                FeedEvent::Reconnecting { attempt: 1 },
                FeedEvent::Error("feed source unavailable: run 1".into()),
                FeedEvent::Reconnecting { attempt: 2 },
                FeedEvent::Connected,
            ]
        );
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let feed = Arc::new(FlakyFeed {
            failures: u32::MAX,
            runs: AtomicU32::new(0),
        });
        let (tx, _rx) = mpsc::channel(16);

        let result = FeedSupervisor::new(feed, fast_backoff(2))
            .run(tx, CancellationToken::new())
            .await;

        assert!(matches!(result, Err(FeedError::MaxRestartsExceeded)));
    }

    #[tokio::test]
    async fn cancellation_during_backoff_ends_cleanly() {
        let feed = Arc::new(FlakyFeed {
            failures: u32::MAX,
            runs: AtomicU32::new(0),
        });
        let (tx, _rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(60),
            ..fast_backoff(0)
        };

        let task = tokio::spawn(FeedSupervisor::new(feed, config).run(tx, cancel.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        tokio_test::assert_ok!(result);
    }
}
