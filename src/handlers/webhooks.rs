//! Payment processor webhook endpoint.
//!
//! The processor calls this endpoint for every checkout event. Requests are
//! authenticated by signature, not by session, and must be read as raw bytes
//! because the signature covers the exact body.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use chrono::Utc;
use serde_json::{Value, json};

use crate::{
    app_state::AppState,
    error::AppError,
    models::payment::PaymentEvent,
    services::webhook_service::{self, SIGNATURE_HEADER},
};

/// Receive a payment event.
///
/// # Endpoint
///
/// `POST /webhooks/payments`
///
/// # Response
///
/// - **200** `{"received": true}`: event verified (applied, ignored or a replay)
/// - **400**: missing/invalid signature or malformed event
/// - **502**: hosted database unavailable; the processor retries later
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    webhook_service::verify_signature(
        signature,
        &body,
        &state.config.payment_webhook_secret,
        state.config.webhook_tolerance_secs,
        Utc::now().timestamp(),
    )?;

    let event: PaymentEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed event: {e}")))?;

    let outcome = webhook_service::handle_event(state.store.as_ref(), &event).await?;
    tracing::info!(event_id = %event.id, event_type = %event.event_type, ?outcome, "webhook processed");

    Ok(Json(json!({ "received": true })))
}
