//! Instrument Types
//!
//! Core records for priced instruments and the change events that mutate
//! them. Feeds deliver [`RawChangeEvent`]s with every field optional; the
//! broker only ever applies validated [`ChangeEvent`]s.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Instrument
// =============================================================================

/// A tracked priced instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Unique instrument code, stable for the instrument's lifetime.
    pub code: String,
    /// Display label. May be empty.
    pub name: String,
    /// Current price. Never negative.
    pub price: Decimal,
}

impl Instrument {
    /// Create a validated instrument.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the code is empty or the price is negative.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
    ) -> Result<Self, ValidationError> {
        let code = code.into();
        validate_code(&code)?;
        validate_price(&code, price)?;

        Ok(Self {
            code,
            name: name.into(),
            price,
        })
    }

    /// Re-run validation on a record built elsewhere (e.g. deserialized).
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the code is empty or the price is negative.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_code(&self.code)?;
        validate_price(&self.code, self.price)
    }
}

// =============================================================================
// Change Events
// =============================================================================

/// Kind of upstream row mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// A new row was inserted.
    Insert,
    /// An existing row was updated.
    Update,
    /// A row was deleted. Not applied to the store.
    Delete,
}

impl ChangeKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A change event exactly as a feed delivered it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChangeEvent {
    /// Mutation kind.
    pub change_kind: Option<ChangeKind>,
    /// Instrument code.
    pub code: Option<String>,
    /// Instrument name.
    pub name: Option<String>,
    /// New price.
    pub price: Option<Decimal>,
}

impl RawChangeEvent {
    /// Build a fully-populated raw event.
    #[must_use]
    pub fn new(
        change_kind: ChangeKind,
        code: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            change_kind: Some(change_kind),
            code: Some(code.into()),
            name: Some(name.into()),
            price: Some(price),
        }
    }

    /// Build a raw `Update` event.
    #[must_use]
    pub fn update(code: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self::new(ChangeKind::Update, code, name, price)
    }
}

/// A validated insert or update, ready to be applied by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Mutation kind (`Insert` or `Update`).
    pub kind: ChangeKind,
    /// Instrument code.
    pub code: String,
    /// Instrument name.
    pub name: String,
    /// New price.
    pub price: Decimal,
}

impl TryFrom<RawChangeEvent> for ChangeEvent {
    type Error = ValidationError;

    fn try_from(raw: RawChangeEvent) -> Result<Self, Self::Error> {
        let kind = raw
            .change_kind
            .ok_or(ValidationError::MissingField("change_kind"))?;
        let code = raw.code.ok_or(ValidationError::MissingField("code"))?;

        if kind == ChangeKind::Delete {
            return Err(ValidationError::UnsupportedKind { kind, code });
        }

        let name = raw.name.ok_or(ValidationError::MissingField("name"))?;
        let price = raw.price.ok_or(ValidationError::MissingField("price"))?;

        validate_code(&code)?;
        validate_price(&code, price)?;

        Ok(Self {
            kind,
            code,
            name,
            price,
        })
    }
}

// =============================================================================
// Price Update
// =============================================================================

/// Payload pushed to subscribers for a single price change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Instrument code.
    pub code: String,
    /// Instrument name.
    pub name: String,
    /// New price.
    pub price: Decimal,
}

impl PriceUpdate {
    /// Create a price update.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            price,
        }
    }
}

impl From<&ChangeEvent> for PriceUpdate {
    fn from(event: &ChangeEvent) -> Self {
        Self::new(event.code.clone(), event.name.clone(), event.price)
    }
}

impl From<&Instrument> for PriceUpdate {
    fn from(instrument: &Instrument) -> Self {
        Self::new(
            instrument.code.clone(),
            instrument.name.clone(),
            instrument.price,
        )
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Reasons a record or change event is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The instrument code was empty or blank.
    #[error("instrument code cannot be empty")]
    EmptyCode,

    /// The price was below zero.
    #[error("negative price {price} for {code}")]
    NegativePrice {
        /// Instrument code.
        code: String,
        /// Offending price.
        price: Decimal,
    },

    /// The change kind does not propagate prices.
    #[error("{} events are not applied (code {code})", kind.as_str())]
    UnsupportedKind {
        /// Change kind.
        kind: ChangeKind,
        /// Instrument code.
        code: String,
    },
}

fn validate_code(code: &str) -> Result<(), ValidationError> {
    if code.trim().is_empty() {
        return Err(ValidationError::EmptyCode);
    }
    Ok(())
}

fn validate_price(code: &str, price: Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::NegativePrice {
            code: code.to_string(),
            price,
        });
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn instrument_new_accepts_empty_name() {
        let instrument = Instrument::new("AAA", "", dec!(10.00)).unwrap();
        assert_eq!(instrument.name, "");
        assert_eq!(instrument.price, dec!(10.00));
    }

    #[test]
    fn instrument_new_accepts_zero_price() {
        assert!(Instrument::new("AAA", "Acme", Decimal::ZERO).is_ok());
    }

    #[test]
    fn instrument_new_rejects_negative_price() {
        let err = Instrument::new("AAA", "Acme", dec!(-0.01)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NegativePrice {
                code: "AAA".to_string(),
                price: dec!(-0.01),
            }
        );
    }

    #[test]
    fn instrument_new_rejects_blank_code() {
        assert_eq!(
            Instrument::new("  ", "Acme", dec!(1)).unwrap_err(),
            ValidationError::EmptyCode
        );
    }

    #[test]
    fn raw_update_converts() {
        let event = ChangeEvent::try_from(RawChangeEvent::update("X", "Xerox", dec!(12.34))).unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.code, "X");
        assert_eq!(event.name, "Xerox");
        assert_eq!(event.price, dec!(12.34));
    }

    #[test]
    fn raw_insert_converts() {
        let raw = RawChangeEvent::new(ChangeKind::Insert, "NEW", "Newco", dec!(1.5));
        assert_eq!(ChangeEvent::try_from(raw).unwrap().kind, ChangeKind::Insert);
    }

    #[test]
    fn raw_missing_fields_rejected() {
        let mut raw = RawChangeEvent::update("X", "Xerox", dec!(1));
        raw.price = None;
        assert_eq!(
            ChangeEvent::try_from(raw).unwrap_err(),
            ValidationError::MissingField("price")
        );

        let mut raw = RawChangeEvent::update("X", "Xerox", dec!(1));
        raw.name = None;
        assert_eq!(
            ChangeEvent::try_from(raw).unwrap_err(),
            ValidationError::MissingField("name")
        );

        assert_eq!(
            ChangeEvent::try_from(RawChangeEvent::default()).unwrap_err(),
            ValidationError::MissingField("change_kind")
        );
    }

    #[test]
    fn raw_delete_is_unsupported() {
        let raw = RawChangeEvent::new(ChangeKind::Delete, "X", "Xerox", dec!(1));
        assert!(matches!(
            ChangeEvent::try_from(raw),
            Err(ValidationError::UnsupportedKind {
                kind: ChangeKind::Delete,
                ..
            })
        ));
    }

    #[test]
    fn delete_without_price_is_still_unsupported_not_malformed() {
        let raw = RawChangeEvent {
            change_kind: Some(ChangeKind::Delete),
            code: Some("X".to_string()),
            name: None,
            price: None,
        };
        assert!(matches!(
            ChangeEvent::try_from(raw),
            Err(ValidationError::UnsupportedKind { .. })
        ));
    }

    #[test]
    fn raw_event_deserializes_from_feed_json() {
        let raw: RawChangeEvent = serde_json::from_str(
            r#"{"change_kind":"update","code":"AAA","name":"Acme","price":"15.50"}"#,
        )
        .unwrap();
        assert_eq!(raw, RawChangeEvent::update("AAA", "Acme", dec!(15.50)));
    }

    #[test]
    fn price_update_serializes_price_as_string() {
        let json = serde_json::to_value(PriceUpdate::new("X", "Xerox", dec!(12.34))).unwrap();
        assert_eq!(json["price"], "12.34");
    }
}
