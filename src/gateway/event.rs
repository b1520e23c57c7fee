//! Inbound gateway event parsing.

use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::AccountFlags;
use crate::error::MarketError;

/// Checkout session object carried by completed/expired events.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SessionObject {
    /// Gateway session id.
    pub id: String,
    /// Payment intent created for the session, if any.
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Metadata echoed back from session creation.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Connected account object carried by account-updated events.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AccountObject {
    /// Gateway account id.
    pub id: String,
    /// Verification flags.
    #[serde(flatten)]
    pub flags: AccountFlags,
}

/// Charge object carried by charge-succeeded events.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChargeObject {
    /// Gateway charge id.
    pub id: String,
    /// Owning payment intent.
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Hosted receipt.
    #[serde(default)]
    pub receipt_url: Option<String>,
}

/// A parsed, already-authenticated gateway event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// `checkout.session.completed`
    CheckoutCompleted(SessionObject),
    /// `checkout.session.expired`
    CheckoutExpired(SessionObject),
    /// `payment_intent.payment_failed`
    PaymentFailed,
    /// `account.updated`
    AccountUpdated(AccountObject),
    /// `charge.succeeded`
    ChargeSucceeded(ChargeObject),
    /// Anything else; carries the event type.
    Other(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

impl GatewayEvent {
    /// Parses a raw webhook body.
    ///
    /// Unknown event types parse to [`GatewayEvent::Other`] without looking
    /// at their payload.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::BadRequest`] if the body is not an event
    /// envelope or a known event's object has the wrong shape.
    pub fn from_slice(body: &[u8]) -> Result<Self, MarketError> {
        let envelope: Envelope = serde_json::from_slice(body)
            .map_err(|e| MarketError::BadRequest(format!("malformed event: {e}")))?;
        let object = envelope.data.object;
        let event = match envelope.event_type.as_str() {
            "checkout.session.completed" => Self::CheckoutCompleted(parse_object(object)?),
            "checkout.session.expired" => Self::CheckoutExpired(parse_object(object)?),
            "payment_intent.payment_failed" => Self::PaymentFailed,
            "account.updated" => Self::AccountUpdated(parse_object(object)?),
            "charge.succeeded" => Self::ChargeSucceeded(parse_object(object)?),
            _ => Self::Other(envelope.event_type),
        };
        Ok(event)
    }

    /// Gateway event type string.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::CheckoutCompleted(_) => "checkout.session.completed",
            Self::CheckoutExpired(_) => "checkout.session.expired",
            Self::PaymentFailed => "payment_intent.payment_failed",
            Self::AccountUpdated(_) => "account.updated",
            Self::ChargeSucceeded(_) => "charge.succeeded",
            Self::Other(kind) => kind,
        }
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, MarketError> {
    serde_json::from_value(value)
        .map_err(|e| MarketError::BadRequest(format!("malformed event object: {e}")))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_completed_session_with_metadata() {
        let body = br#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_1",
                "payment_intent": "pi_1",
                "metadata": {"orderId": "o", "slotIdsCsv": "a,b"}
            }}
        }"#;
        let Ok(GatewayEvent::CheckoutCompleted(session)) = GatewayEvent::from_slice(body) else {
            panic!("expected completed session");
        };
        assert_eq!(session.id, "cs_1");
        assert_eq!(session.payment_intent.as_deref(), Some("pi_1"));
        assert_eq!(session.metadata.get("slotIdsCsv").map(String::as_str), Some("a,b"));
    }

    #[test]
    fn missing_metadata_defaults_to_empty() {
        let body = br#"{"type":"checkout.session.expired","data":{"object":{"id":"cs_2"}}}"#;
        let Ok(GatewayEvent::CheckoutExpired(session)) = GatewayEvent::from_slice(body) else {
            panic!("expected expired session");
        };
        assert!(session.metadata.is_empty());
        assert!(session.payment_intent.is_none());
    }

    #[test]
    fn parses_account_flags() {
        let body = br#"{"type":"account.updated","data":{"object":{
            "id":"acct_1","charges_enabled":true,"details_submitted":true
        }}}"#;
        let Ok(GatewayEvent::AccountUpdated(account)) = GatewayEvent::from_slice(body) else {
            panic!("expected account update");
        };
        assert_eq!(account.id, "acct_1");
        assert!(account.flags.charges_enabled);
        assert!(!account.flags.payouts_enabled);
    }

    #[test]
    fn unknown_types_are_passed_through() {
        let body = br#"{"type":"invoice.paid","data":{"object":42}}"#;
        let Ok(event) = GatewayEvent::from_slice(body) else {
            panic!("unknown type should parse");
        };
        assert_eq!(event, GatewayEvent::Other("invoice.paid".to_string()));
        assert_eq!(event.event_type(), "invoice.paid");
    }

    #[test]
    fn garbage_is_bad_request() {
        assert!(matches!(
            GatewayEvent::from_slice(b"not json"),
            Err(MarketError::BadRequest(_))
        ));
        let wrong_shape = br#"{"type":"charge.succeeded","data":{"object":{"amount":1}}}"#;
        assert!(GatewayEvent::from_slice(wrong_shape).is_err());
    }
}
