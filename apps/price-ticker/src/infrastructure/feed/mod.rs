//! Change Feed Adapters
//!
//! - **Simulated**: in-memory table with a random price writer
//! - **Channel**: events pushed by an embedding producer
//! - **Supervisor**: restarts a failing feed with backoff
//! - **Bridge**: applies feed events to the broker, in order

pub mod bridge;
pub mod channel;
pub mod reconnect;
pub mod seed;
pub mod simulated;
pub mod state;
pub mod supervisor;

pub use bridge::{handle_feed_event, run_feed_bridge};
pub use channel::ChannelFeed;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use seed::{SeedError, builtin_universe, load_seed_file};
pub use simulated::{SimulatedFeed, SimulatedFeedConfig};
pub use state::{ConnectionState, FeedState, FeedStatus};
pub use supervisor::FeedSupervisor;
