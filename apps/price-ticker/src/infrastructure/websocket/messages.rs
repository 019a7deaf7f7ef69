//! WebSocket Frames
//!
//! JSON text frames exchanged with subscribers, tagged by `type`.
//!
//! ```text
//! client → server: {"type":"subscribe"} | {"type":"unsubscribe"}
//!                  {"type":"get_all_stocks"} | {"type":"ping"}
//! server → client: {"type":"price_change","code":"X","name":"Xerox","price":"12.34"}
//!                  {"type":"all_stocks","stocks":[...]} | {"type":"error","message":"..."}
//!                  {"type":"subscribed"} | {"type":"unsubscribed"} | {"type":"pong"}
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::instrument::{Instrument, PriceUpdate};

/// Requests sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register for price pushes.
    Subscribe,
    /// Stop price pushes.
    Unsubscribe,
    /// Request the current instrument snapshot.
    GetAllStocks,
    /// Liveness check.
    Ping,
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Subscription acknowledged.
    Subscribed,
    /// Unsubscription acknowledged.
    Unsubscribed,
    /// Current instrument snapshot.
    AllStocks {
        /// Every tracked instrument, in insertion order.
        stocks: Vec<Instrument>,
    },
    /// A pushed price change.
    PriceChange(PriceUpdate),
    /// Reply to `ping`.
    Pong,
    /// The client's request could not be handled.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test_case(r#"{"type":"subscribe"}"#, ClientMessage::Subscribe ; "subscribe")]
    #[test_case(r#"{"type":"unsubscribe"}"#, ClientMessage::Unsubscribe ; "unsubscribe")]
    #[test_case(r#"{"type":"get_all_stocks"}"#, ClientMessage::GetAllStocks ; "get all stocks")]
    #[test_case(r#"{"type":"ping"}"#, ClientMessage::Ping ; "ping")]
    fn parses_client_frames(raw: &str, expected: ClientMessage) {
        assert_eq!(serde_json::from_str::<ClientMessage>(raw).unwrap(), expected);
    }

    #[test]
    fn unknown_client_frame_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"publish"}"#).is_err());
    }

    #[test]
    fn price_change_is_flat_with_string_price() {
        let frame = ServerMessage::PriceChange(PriceUpdate::new("X", "Xerox", dec!(12.34)));

        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "price_change", "code": "X", "name": "Xerox", "price": "12.34"})
        );
    }

    #[test]
    fn all_stocks_shape() {
        let frame = ServerMessage::AllStocks {
            stocks: vec![Instrument::new("AAA", "Acme", dec!(10.00)).unwrap()],
        };

        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({
                "type": "all_stocks",
                "stocks": [{"code": "AAA", "name": "Acme", "price": "10.00"}]
            })
        );
    }
}
