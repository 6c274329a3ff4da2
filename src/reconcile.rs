//! Reconciliation of paid Stripe sessions onto local orders.
//!
//! Shared by the `/verify-payment` endpoint (browser returning from Stripe)
//! and the Stripe webhook, so both paths apply the same single
//! `pending -> completed` transition.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::Result;
use crate::models::{CompleteOrder, Order, OrderStatus};
use crate::payments::StripeCheckoutSession;

/// What happened to the local order for a paid session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// This call moved the order from `pending` to `completed`.
    Completed,
    /// The order was already completed (earlier call, webhook, or a concurrent request).
    AlreadyCompleted,
    /// Stripe says paid but no order carries this session id.
    OrderNotFound,
    /// The order is cancelled or refunded and was left untouched.
    UnexpectedStatus(OrderStatus),
}

impl Reconciliation {
    /// Whether the order ended up completed, regardless of which call wrote it.
    pub fn order_updated(&self) -> bool {
        matches!(self, Self::Completed | Self::AlreadyCompleted)
    }
}

/// Complete the order belonging to a paid session, at most once.
///
/// Callers must only pass sessions with `payment_status == "paid"`.
pub fn reconcile_paid_session(
    conn: &Connection,
    session: &StripeCheckoutSession,
) -> Result<Reconciliation> {
    let Some(order) = queries::get_order_by_session(conn, &session.id)? else {
        tracing::error!(
            session_id = %session.id,
            session_status = ?session.status,
            client_reference_id = ?session.client_reference_id,
            metadata_order_id = ?session.metadata.order_id,
            metadata_user_id = ?session.metadata.user_id,
            "Paid Stripe session has no matching order"
        );
        return Ok(Reconciliation::OrderNotFound);
    };

    check_amount(&order, session);

    match order.status {
        OrderStatus::Completed => Ok(Reconciliation::AlreadyCompleted),
        OrderStatus::Pending => {
            let completion = CompleteOrder {
                payment_intent_id: session.payment_intent.clone(),
                customer_email: session.payer_email().map(str::to_string),
                customer_name: session.payer_name().map(str::to_string),
            };

            if queries::try_complete_order(conn, &session.id, &completion)? {
                tracing::info!(order_id = %order.id, session_id = %session.id, "Order completed");
                return Ok(Reconciliation::Completed);
            }

            // Lost the race: someone else changed the row between read and write.
            let current = queries::get_order_by_session(conn, &session.id)?;
            match current.map(|o| o.status) {
                Some(OrderStatus::Completed) => Ok(Reconciliation::AlreadyCompleted),
                Some(status) => {
                    tracing::warn!(
                        order_id = %order.id,
                        status = %status,
                        "Order left pending concurrently, not completing"
                    );
                    Ok(Reconciliation::UnexpectedStatus(status))
                }
                None => Ok(Reconciliation::OrderNotFound),
            }
        }
        status => {
            tracing::warn!(
                order_id = %order.id,
                session_id = %session.id,
                status = %status,
                "Paid session for an order that is not pending, leaving it untouched"
            );
            Ok(Reconciliation::UnexpectedStatus(status))
        }
    }
}

/// Log when Stripe's charged total differs from the stored one. The stored
/// total stays authoritative.
fn check_amount(order: &Order, session: &StripeCheckoutSession) {
    if let Some(charged) = session.amount_total.filter(|c| *c != order.total_amount) {
        tracing::warn!(
            order_id = %order.id,
            stored_total = order.total_amount,
            charged_total = charged,
            "Stripe amount differs from stored order total"
        );
    }
    if let Some(currency) = session
        .currency
        .as_deref()
        .filter(|c| !c.eq_ignore_ascii_case(&order.currency))
    {
        tracing::warn!(
            order_id = %order.id,
            stored_currency = %order.currency,
            charged_currency = %currency,
            "Stripe currency differs from stored order currency"
        );
    }
}
