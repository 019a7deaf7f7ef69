//! Channel Feed
//!
//! A change feed driven by an external producer through an `mpsc` channel.
//! Used to embed the broker behind another event source and in tests.

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ChangeFeed, FeedError, FeedEvent};
use crate::domain::instrument::Instrument;

/// Change feed that forwards events from a producer-owned channel.
///
/// The receiver is consumed across restarts: a supervisor re-running the
/// feed resumes where the previous run stopped.
pub struct ChannelFeed {
    name: String,
    seed: Vec<Instrument>,
    receiver: Mutex<mpsc::Receiver<FeedEvent>>,
}

impl ChannelFeed {
    /// Create a feed and the sender its producer writes to.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        seed: Vec<Instrument>,
        capacity: usize,
    ) -> (Self, mpsc::Sender<FeedEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::from_receiver(name, seed, rx), tx)
    }

    /// Wrap an existing receiver.
    #[must_use]
    pub fn from_receiver(
        name: impl Into<String>,
        seed: Vec<Instrument>,
        receiver: mpsc::Receiver<FeedEvent>,
    ) -> Self {
        Self {
            name: name.into(),
            seed,
            receiver: Mutex::new(receiver),
        }
    }
}

#[async_trait]
impl ChangeFeed for ChannelFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_snapshot(&self) -> Result<Vec<Instrument>, FeedError> {
        Ok(self.seed.clone())
    }

    async fn run(
        &self,
        events: mpsc::Sender<FeedEvent>,
        cancel: CancellationToken,
    ) -> Result<(), FeedError> {
        let mut receiver = self.receiver.lock().await;

        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                event = receiver.recv() => event,
            };

            // Producer hung up: the source is exhausted.
            let Some(event) = event else {
                let _ = events.send(FeedEvent::Disconnected).await;
                return Ok(());
            };

            events
                .send(event)
                .await
                .map_err(|_| FeedError::ChannelClosed)?;
        }
    }
}
