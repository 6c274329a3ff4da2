use axum::extract::State;

use crate::db::AppState;
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::models::{VerifyRequest, VerifyResponse};
use crate::payments::stripe::is_valid_checkout_session_id;
use crate::reconcile::reconcile_paid_session;

/// Confirm a checkout with Stripe after the browser returns from the hosted
/// page, and complete the matching order if it was paid.
///
/// Safe to call any number of times: the order only transitions once.
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    let session_id = request.session_id.trim();
    if session_id.is_empty() {
        return Err(AppError::BadRequest(msg::SESSION_ID_REQUIRED.into()));
    }
    if !is_valid_checkout_session_id(session_id) {
        return Err(AppError::BadRequest(msg::INVALID_SESSION_ID.into()));
    }

    let stripe = state.stripe_client()?;
    let session = stripe.retrieve_checkout_session(session_id).await?;

    if !session.is_paid() {
        tracing::info!(
            session_id = %session.id,
            payment_status = %session.payment_status,
            "Checkout session not paid"
        );
        return Ok(Json(VerifyResponse {
            verified: false,
            status: session.payment_status,
            session_id: session.id,
            ..Default::default()
        }));
    }

    let outcome = {
        let conn = state.db.get()?;
        reconcile_paid_session(&conn, &session)?
    };

    Ok(Json(VerifyResponse {
        verified: true,
        payment_intent_id: session.payment_intent.clone(),
        amount: session.amount_total,
        currency: session.currency.clone(),
        customer_email: session.payer_email().map(str::to_string),
        customer_name: session.payer_name().map(str::to_string),
        order_updated: Some(outcome.order_updated()),
        status: session.payment_status,
        session_id: session.id,
    }))
}
