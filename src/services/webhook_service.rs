//! Payment webhook verification and dispatch.
//!
//! This module handles signature checks for incoming processor events and
//! applies `checkout.session.*` events to orders.
//!
//! # Signature Format
//!
//! Header `Stripe-Signature: t=<unix seconds>,v1=<hex>[,v1=<hex>...]`.
//! Each `v1` is `HMAC-SHA256(secret, "<t>.<raw body>")`. Several `v1` entries
//! appear while the endpoint secret is being rolled; any one may match.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::clients::Store;
use crate::error::AppError;
use crate::models::{
    order::{Order, OrderStatus},
    payment::{CheckoutSession, PaymentEvent},
};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the processor's signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verify a webhook signature header against the raw request body.
///
/// # Errors
///
/// `InvalidSignature` when the header is malformed, the timestamp is outside
/// `tolerance_secs` of `now`, or no `v1` signature matches.
pub fn verify_signature(
    header: &str,
    payload: &[u8],
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), AppError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            // v0 and unknown schemes are not trusted
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(AppError::InvalidSignature)?;
    if signatures.is_empty() {
        return Err(AppError::InvalidSignature);
    }
    // `t` is unauthenticated input; abs_diff cannot overflow
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        tracing::warn!(timestamp, now, "webhook timestamp outside tolerance");
        return Err(AppError::InvalidSignature);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    // verify_slice compares in constant time
    if signatures
        .iter()
        .any(|signature| mac.clone().verify_slice(signature).is_ok())
    {
        Ok(())
    } else {
        Err(AppError::InvalidSignature)
    }
}

/// Build a signature header for `payload`, as the processor would.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, AppError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// What happened to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The order moved to this status.
    Applied(OrderStatus),
    /// The order was already in the target status (replayed event).
    Duplicate,
    /// Event type not handled, or payment still in flight.
    Ignored,
    /// No order matches the event.
    UnknownOrder,
    /// The order is settled differently, or the event disagrees with it.
    Conflict,
    /// Money was captured for an order that is already cancelled or failed.
    /// Needs a refund or manual reconciliation.
    PaidAfterClose,
}

fn paid_after_close(
    order: &Order,
    event: &PaymentEvent,
    session: &CheckoutSession,
) -> EventOutcome {
    tracing::error!(
        order_id = %order.id,
        status = %order.status,
        event_id = %event.id,
        session_id = %session.id,
        payment_intent = session.payment_intent.as_deref().unwrap_or(""),
        "payment captured for a closed order, needs reconciliation"
    );
    EventOutcome::PaidAfterClose
}

/// Status an event asks for, or `None` when it should be ignored.
fn target_status(event_type: &str, session: &CheckoutSession) -> Option<OrderStatus> {
    match event_type {
        // Delayed payment methods complete the session before money moves
        "checkout.session.completed" => session.is_paid().then_some(OrderStatus::Paid),
        "checkout.session.async_payment_succeeded" => Some(OrderStatus::Paid),
        "checkout.session.async_payment_failed" => Some(OrderStatus::Failed),
        "checkout.session.expired" => Some(OrderStatus::Cancelled),
        _ => None,
    }
}

async fn find_order(
    store: &dyn Store,
    session: &CheckoutSession,
) -> Result<Option<Order>, AppError> {
    if let Some(order_id) = session.order_id() {
        if let Some(order) = store.get_order(order_id).await? {
            return Ok(Some(order));
        }
    }
    store.find_order_by_session(&session.id).await
}

/// Apply a verified event to the matching order.
///
/// Never fails for business-level mismatches: those are logged and
/// acknowledged so the processor does not retry them.
///
/// # Errors
///
/// - `InvalidRequest`: a `checkout.session.*` event whose object is not a session
/// - Upstream errors from the store (the processor will retry)
pub async fn handle_event(
    store: &dyn Store,
    event: &PaymentEvent,
) -> Result<EventOutcome, AppError> {
    if !event.event_type.starts_with("checkout.session.") {
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "ignoring event");
        return Ok(EventOutcome::Ignored);
    }

    let session: CheckoutSession = serde_json::from_value(event.data.object.clone())
        .map_err(|e| AppError::InvalidRequest(format!("Malformed checkout session: {e}")))?;

    let Some(target) = target_status(&event.event_type, &session) else {
        tracing::info!(event_id = %event.id, session_id = %session.id, "event requires no order change");
        return Ok(EventOutcome::Ignored);
    };

    let Some(order) = find_order(store, &session).await? else {
        tracing::warn!(event_id = %event.id, session_id = %session.id, "no order for checkout session");
        return Ok(EventOutcome::UnknownOrder);
    };

    if let Some(known) = &order.checkout_session_id {
        if *known != session.id {
            tracing::warn!(order_id = %order.id, session_id = %session.id, "event session does not match order");
            return Ok(EventOutcome::Conflict);
        }
    }

    if target == OrderStatus::Paid {
        if let Some(total) = session.amount_total {
            if total != order.amount_cents {
                tracing::error!(
                    order_id = %order.id,
                    expected = order.amount_cents,
                    charged = total,
                    "charged amount differs from order total"
                );
                return Ok(EventOutcome::Conflict);
            }
        }
    }

    if order.status == target {
        return Ok(EventOutcome::Duplicate);
    }
    if target == OrderStatus::Paid
        && matches!(order.status, OrderStatus::Cancelled | OrderStatus::Failed)
    {
        return Ok(paid_after_close(&order, event, &session));
    }
    if !order.status.can_transition_to(target) {
        tracing::warn!(order_id = %order.id, from = %order.status, to = %target, "illegal order transition");
        return Ok(EventOutcome::Conflict);
    }

    match store
        .transition_order(order.id, target, session.payment_intent.as_deref())
        .await?
    {
        Some(updated) => {
            tracing::info!(order_id = %updated.id, status = %updated.status, event_id = %event.id, "order updated");
            Ok(EventOutcome::Applied(target))
        }
        // Lost a race with a concurrent delivery
        None => match store.get_order(order.id).await? {
            Some(current) if current.status == target => Ok(EventOutcome::Duplicate),
            Some(current)
                if target == OrderStatus::Paid
                    && matches!(current.status, OrderStatus::Cancelled | OrderStatus::Failed) =>
            {
                Ok(paid_after_close(&current, event, &session))
            }
            _ => Ok(EventOutcome::Conflict),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::memory::InMemoryStore;
    use crate::models::product::Product;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"id":"evt_1"}"#;

    #[test]
    fn signed_payload_verifies() {
        let header = sign(BODY, SECRET, 1_000).unwrap();
        assert!(verify_signature(&header, BODY, SECRET, 300, 1_100).is_ok());
    }

    #[test]
    fn tampered_body_or_wrong_secret_fails() {
        let header = sign(BODY, SECRET, 1_000).unwrap();
        assert!(verify_signature(&header, b"{}", SECRET, 300, 1_000).is_err());
        assert!(verify_signature(&header, BODY, "whsec_other", 300, 1_000).is_err());
    }

    #[test]
    fn stale_timestamp_fails() {
        let header = sign(BODY, SECRET, 1_000).unwrap();
        assert!(verify_signature(&header, BODY, SECRET, 300, 1_301).is_err());
        assert!(verify_signature(&header, BODY, SECRET, 300, 699).is_err());
    }

    #[test]
    fn any_v1_may_match() {
        let good = sign(BODY, SECRET, 1_000).unwrap();
        let good_sig = good.split_once(",v1=").unwrap().1;
        let header = format!("t=1000,v1={},v0=ignored,v1={}", "00".repeat(32), good_sig);
        assert!(verify_signature(&header, BODY, SECRET, 300, 1_000).is_ok());
    }

    #[test]
    fn malformed_headers_fail() {
        for header in [
            "",
            "t=1000",
            "v1=abcd",
            "t=x,v1=abcd",
            "garbage",
            "t=-9223372036854775808,v1=00",
            "t=9223372036854775807,v1=00",
        ] {
            assert!(
                verify_signature(header, BODY, SECRET, 300, 1_000).is_err(),
                "{header}"
            );
        }
    }

    async fn seeded() -> (InMemoryStore, Order) {
        let store = InMemoryStore::new();
        let product = Product {
            id: Uuid::new_v4(),
            name: "Mug".into(),
            description: None,
            price_cents: 1000,
            currency: "usd".into(),
            image_url: None,
            active: true,
            created_at: Utc::now(),
        };
        let order = Order::new_pending(Uuid::new_v4(), &product, 2).unwrap();
        store.insert_order(&order).await.unwrap();
        store.set_checkout_session(order.id, "cs_1").await.unwrap();
        (store, order)
    }

    fn event(event_type: &str, object: serde_json::Value) -> PaymentEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": event_type,
            "created": 0,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn completed_and_paid_marks_order_paid_once() {
        let (store, order) = seeded().await;
        let ev = event(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "payment_status": "paid",
                "payment_intent": "pi_1",
                "amount_total": 2000,
                "metadata": { "order_id": order.id.to_string() }
            }),
        );

        assert_eq!(
            handle_event(&store, &ev).await.unwrap(),
            EventOutcome::Applied(OrderStatus::Paid)
        );
        assert_eq!(
            handle_event(&store, &ev).await.unwrap(),
            EventOutcome::Duplicate
        );
        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
        assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_1"));
    }

    #[tokio::test]
    async fn completed_but_unpaid_waits_for_async_result() {
        let (store, order) = seeded().await;
        let ev = event(
            "checkout.session.completed",
            json!({ "id": "cs_1", "payment_status": "unpaid" }),
        );
        assert_eq!(
            handle_event(&store, &ev).await.unwrap(),
            EventOutcome::Ignored
        );

        let failed = event(
            "checkout.session.async_payment_failed",
            json!({ "id": "cs_1" }),
        );
        assert_eq!(
            handle_event(&store, &failed).await.unwrap(),
            EventOutcome::Applied(OrderStatus::Failed)
        );
        assert_eq!(
            store.get_order(order.id).await.unwrap().unwrap().status,
            OrderStatus::Failed
        );
    }

    #[tokio::test]
    async fn expiry_after_payment_is_a_conflict() {
        let (store, order) = seeded().await;
        store
            .transition_order(order.id, OrderStatus::Paid, None)
            .await
            .unwrap();
        let ev = event("checkout.session.expired", json!({ "id": "cs_1" }));
        assert_eq!(
            handle_event(&store, &ev).await.unwrap(),
            EventOutcome::Conflict
        );
        assert_eq!(
            store.get_order(order.id).await.unwrap().unwrap().status,
            OrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn payment_on_cancelled_order_needs_reconciliation() {
        let (store, order) = seeded().await;
        store
            .transition_order(order.id, OrderStatus::Cancelled, None)
            .await
            .unwrap();
        let ev = event(
            "checkout.session.completed",
            json!({ "id": "cs_1", "payment_status": "paid", "amount_total": 2000 }),
        );
        assert_eq!(
            handle_event(&store, &ev).await.unwrap(),
            EventOutcome::PaidAfterClose
        );
        assert_eq!(
            store.get_order(order.id).await.unwrap().unwrap().status,
            OrderStatus::Cancelled
        );

        // A failure notice for a cancelled order is only a conflict
        let failed = event(
            "checkout.session.async_payment_failed",
            json!({ "id": "cs_1" }),
        );
        assert_eq!(
            handle_event(&store, &failed).await.unwrap(),
            EventOutcome::Conflict
        );
    }

    #[tokio::test]
    async fn amount_mismatch_is_not_applied() {
        let (store, order) = seeded().await;
        let ev = event(
            "checkout.session.completed",
            json!({ "id": "cs_1", "payment_status": "paid", "amount_total": 1 }),
        );
        assert_eq!(
            handle_event(&store, &ev).await.unwrap(),
            EventOutcome::Conflict
        );
        assert_eq!(
            store.get_order(order.id).await.unwrap().unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn unknown_and_unrelated_events() {
        let (store, _) = seeded().await;
        let unknown = event("checkout.session.expired", json!({ "id": "cs_other" }));
        assert_eq!(
            handle_event(&store, &unknown).await.unwrap(),
            EventOutcome::UnknownOrder
        );

        let unrelated = event("invoice.paid", json!({ "id": "in_1" }));
        assert_eq!(
            handle_event(&store, &unrelated).await.unwrap(),
            EventOutcome::Ignored
        );

        let malformed = event("checkout.session.expired", json!({ "nope": true }));
        assert!(matches!(
            handle_event(&store, &malformed).await,
            Err(AppError::InvalidRequest(_))
        ));
    }
}
