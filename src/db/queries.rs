use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::{AppError, Result, msg};
use crate::id;
use crate::models::*;
use crate::money;

use super::from_row::{ORDER_COLS, query_all, query_one};

const SECONDS_PER_HOUR: i64 = 3600;

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Orders ============

/// Insert a new `pending` order. The total is computed here from the
/// normalized items and never changes afterwards.
pub fn create_order(conn: &Connection, input: &CreateOrder) -> Result<Order> {
    let total_amount = money::order_total(&input.items)
        .ok_or_else(|| AppError::BadRequest(msg::TOTAL_OVERFLOW.into()))?;
    let id = id::new_order_id();
    let now = now();
    let items_json = serde_json::to_string(&input.items)?;

    conn.execute(
        "INSERT INTO orders (id, user_id, items, total_amount, currency, status, shipping_address, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?8)",
        params![
            &id,
            &input.user_id,
            &items_json,
            total_amount,
            &input.currency,
            &input.shipping_address,
            now,
            now
        ],
    )?;

    Ok(Order {
        id,
        user_id: input.user_id.clone(),
        items: input.items.clone(),
        total_amount,
        currency: input.currency.clone(),
        status: OrderStatus::Pending,
        stripe_session_id: None,
        stripe_payment_intent_id: None,
        customer_email: None,
        customer_name: None,
        shipping_address: input.shipping_address.clone(),
        completed_at: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_order_by_id(conn: &Connection, id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[&id],
    )
}

pub fn get_order_by_session(conn: &Connection, session_id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE stripe_session_id = ?1", ORDER_COLS),
        &[&session_id],
    )
}

/// Record the Stripe checkout session on a freshly created order.
///
/// Only applies to pending orders that don't have a session yet.
/// Returns whether the row was updated.
pub fn attach_checkout_session(
    conn: &Connection,
    order_id: &str,
    session_id: &str,
    payment_intent_id: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders
         SET stripe_session_id = ?1,
             stripe_payment_intent_id = COALESCE(?2, stripe_payment_intent_id),
             updated_at = ?3
         WHERE id = ?4 AND status = 'pending' AND stripe_session_id IS NULL",
        params![session_id, payment_intent_id, now(), order_id],
    )?;
    Ok(affected > 0)
}

/// Atomically move the order owning `session_id` from `pending` to `completed`.
///
/// Compare-and-swap on the status column: concurrent or repeated calls for the
/// same session converge on exactly one successful write.
///
/// Returns:
/// - `Ok(true)` if this call performed the transition
/// - `Ok(false)` if no pending order matched (already completed, other status, or unknown session)
pub fn try_complete_order(
    conn: &Connection,
    session_id: &str,
    input: &CompleteOrder,
) -> Result<bool> {
    let now = now();
    let affected = conn.execute(
        "UPDATE orders
         SET status = 'completed',
             completed_at = ?1,
             updated_at = ?1,
             customer_email = COALESCE(?2, customer_email),
             customer_name = COALESCE(?3, customer_name),
             stripe_payment_intent_id = COALESCE(?4, stripe_payment_intent_id)
         WHERE stripe_session_id = ?5 AND status = 'pending'",
        params![
            now,
            &input.customer_email,
            &input.customer_name,
            &input.payment_intent_id,
            session_id
        ],
    )?;
    Ok(affected > 0)
}

/// Conditionally move an order from `from` to `to`.
///
/// Callers validate the transition; this only guarantees the row was still
/// in `from` when it was written. Returns whether the row was updated.
pub fn transition_order_status(
    conn: &Connection,
    id: &str,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_ref(), now(), id, from.as_ref()],
    )?;
    Ok(affected > 0)
}

pub fn count_orders(conn: &Connection, filters: &OrderFilters) -> Result<i64> {
    let status = filters.status.map(|s| s.as_ref().to_string());
    let count = conn.query_row(
        "SELECT COUNT(*) FROM orders
         WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR user_id = ?2)",
        params![status, &filters.user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// List orders newest first, with the total count for pagination.
pub fn list_orders_paginated(
    conn: &Connection,
    filters: &OrderFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Order>, i64)> {
    let total = count_orders(conn, filters)?;
    let status = filters.status.map(|s| s.as_ref().to_string());

    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM orders
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR user_id = ?2)
             ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4",
            ORDER_COLS
        ),
        params![status, &filters.user_id, limit, offset],
    )?;

    Ok((items, total))
}

/// Delete pending orders that never got a checkout session and are older
/// than the retention window. Orders with a session are kept: the customer
/// may still complete payment on the hosted page.
/// Returns the number of deleted orders. A non-positive window deletes nothing.
pub fn purge_stale_pending_orders(conn: &Connection, retention_hours: i64) -> Result<usize> {
    if retention_hours <= 0 {
        return Ok(0);
    }
    let cutoff = now().saturating_sub(retention_hours.saturating_mul(SECONDS_PER_HOUR));
    let deleted = conn.execute(
        "DELETE FROM orders
         WHERE status = 'pending' AND stripe_session_id IS NULL AND created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}
