//! WebSocket Subscriber Transport
//!
//! - `messages`: JSON frame types
//! - `session`: per-socket subscriber connection and request handling
//! - `server`: `GET /ws` endpoint

pub mod messages;
pub mod server;
pub mod session;

pub use messages::{ClientMessage, ServerMessage};
pub use server::{ServerError, WsServer, router};
pub use session::{WsConnection, handle_client_frame, run_session};
