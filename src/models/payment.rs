//! Payment processor models: checkout sessions and webhook events.
//!
//! # Checkout Flow
//!
//! 1. Storefront creates a `pending` order
//! 2. Storefront creates a checkout session carrying the order id
//! 3. Customer pays on the processor's hosted page
//! 4. Processor sends a signed `checkout.session.*` event to `/webhooks/payments`
//! 5. Storefront moves the order to `paid`, `failed` or `cancelled`

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parameters for creating a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order_id: Uuid,
    pub customer_email: String,
    pub product_name: String,
    pub unit_amount_cents: i64,
    pub quantity: i32,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Checkout session as reported by the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,

    /// Hosted payment page. Only present while the session is open.
    pub url: Option<String>,

    /// `open`, `complete` or `expired`.
    #[serde(default)]
    pub status: Option<String>,

    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: Option<String>,

    #[serde(default)]
    pub payment_intent: Option<String>,

    /// Total charged, in cents.
    #[serde(default)]
    pub amount_total: Option<i64>,

    #[serde(default)]
    pub client_reference_id: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// Order this session was created for.
    ///
    /// Reads `metadata.order_id` first, then `client_reference_id`.
    pub fn order_id(&self) -> Option<Uuid> {
        self.metadata
            .get("order_id")
            .or(self.client_reference_id.as_ref())
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }

    /// Whether the customer's money has been captured.
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status.as_deref(),
            Some("paid") | Some("no_payment_required")
        )
    }
}

/// Envelope of a webhook event.
///
/// # Example
///
/// ```json
/// {
///   "id": "evt_1N...",
///   "type": "checkout.session.completed",
///   "created": 1735000000,
///   "data": { "object": { "id": "cs_test_...", "payment_status": "paid" } }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: PaymentEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEventData {
    pub object: serde_json::Value,
}

/// Query string of `GET /checkout/success`.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: String,
}

/// Query string of `GET /checkout/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    pub order_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_prefers_metadata() {
        let metadata_id = Uuid::new_v4();
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_1",
            "url": null,
            "client_reference_id": Uuid::new_v4().to_string(),
            "metadata": { "order_id": metadata_id.to_string() }
        }))
        .unwrap();
        assert_eq!(session.order_id(), Some(metadata_id));
    }

    #[test]
    fn order_id_falls_back_to_reference() {
        let id = Uuid::new_v4();
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_1",
            "client_reference_id": id.to_string()
        }))
        .unwrap();
        assert_eq!(session.order_id(), Some(id));
        assert!(!session.is_paid());
    }

    #[test]
    fn event_envelope_parses() {
        let event: PaymentEvent = serde_json::from_str(
            r#"{"id":"evt_1","type":"checkout.session.expired","created":10,
                "data":{"object":{"id":"cs_1"}},"livemode":false}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, "checkout.session.expired");
        assert_eq!(event.data.object["id"], "cs_1");
    }
}
