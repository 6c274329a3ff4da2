use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::db::AppState;
use crate::error::{AppError, Result, msg};
use crate::payments::{StripeCheckoutSession, StripeWebhookEvent};
use crate::reconcile::reconcile_paid_session;

/// Event types that mean a checkout's payment has settled.
const PAID_CHECKOUT_EVENTS: [&str; 2] = [
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
];

fn signature_header(headers: &HeaderMap) -> Result<&str> {
    headers
        .get("stripe-signature")
        .ok_or_else(|| AppError::BadRequest(msg::MISSING_SIGNATURE.into()))?
        .to_str()
        .map_err(|e| {
            tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
            AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into())
        })
}

/// Receive Stripe's signed events.
///
/// Paid checkout events run the same reconciliation as `/verify-payment`,
/// so an order completes even when the browser never comes back. Every other
/// event type is acknowledged and ignored. Redeliveries are harmless because
/// completion only happens once.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let stripe = state.stripe_client()?;
    let signature = signature_header(&headers)?;

    if !stripe.verify_webhook_signature(&body, signature)? {
        tracing::warn!("Rejected Stripe webhook with invalid signature");
        return Err(AppError::Unauthorized);
    }

    let event: StripeWebhookEvent = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!("Failed to parse Stripe webhook: {}", e);
        AppError::BadRequest(msg::INVALID_WEBHOOK_PAYLOAD.into())
    })?;

    if !PAID_CHECKOUT_EVENTS.contains(&event.event_type.as_str()) {
        tracing::debug!(event_id = ?event.id, "Ignoring Stripe event {}", event.event_type);
        return Ok(StatusCode::OK);
    }

    let session: StripeCheckoutSession = serde_json::from_value(event.data.object).map_err(|e| {
        tracing::error!("Stripe {} event carried an unreadable session: {}", event.event_type, e);
        AppError::BadRequest(msg::INVALID_WEBHOOK_PAYLOAD.into())
    })?;

    // Delayed payment methods send `completed` while still unpaid; the
    // `async_payment_succeeded` event follows once the funds arrive.
    if !session.is_paid() {
        tracing::info!(
            session_id = %session.id,
            payment_status = %session.payment_status,
            "Checkout completed without payment yet, waiting for settlement"
        );
        return Ok(StatusCode::OK);
    }

    let conn = state.db.get()?;
    let outcome = reconcile_paid_session(&conn, &session)?;
    tracing::info!(
        event_id = ?event.id,
        event_type = %event.event_type,
        session_id = %session.id,
        outcome = ?outcome,
        "Processed Stripe checkout event"
    );

    Ok(StatusCode::OK)
}
