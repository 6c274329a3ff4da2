use axum::extract::State;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::models::{Order, OrderFilters, OrderStatus};
use crate::pagination::{Paginated, clamp_limit, clamp_offset};

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Paginated<Order>>> {
    let limit = clamp_limit(query.limit);
    let offset = clamp_offset(query.offset);
    let filters = OrderFilters {
        status: query.status,
        user_id: query.user_id,
    };

    let conn = state.db.get()?;
    let (orders, total) = queries::list_orders_paginated(&conn, &filters, limit, offset)?;

    Ok(Json(Paginated::new(orders, total, limit, offset)))
}

pub async fn get_order_detail(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    let conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, &order_id)?.or_not_found(msg::ORDER_NOT_FOUND)?;
    Ok(Json(order))
}

/// Cancel an order that was never paid.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    transition(&state, &order_id, OrderStatus::Cancelled).map(Json)
}

/// Record a refund issued in the Stripe dashboard.
pub async fn refund_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    transition(&state, &order_id, OrderStatus::Refunded).map(Json)
}

fn transition(state: &AppState, order_id: &str, to: OrderStatus) -> Result<Order> {
    let conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, order_id)?.or_not_found(msg::ORDER_NOT_FOUND)?;

    if !order.status.can_transition_to(to) {
        return Err(AppError::Conflict(format!(
            "Cannot move order from {} to {}",
            order.status, to
        )));
    }

    // Conditional on the status we just read, so a concurrent completion
    // can't be overwritten by a cancel.
    if !queries::transition_order_status(&conn, order_id, order.status, to)? {
        return Err(AppError::Conflict(msg::ORDER_CHANGED_CONCURRENTLY.into()));
    }

    tracing::info!(order_id = %order_id, from = %order.status, to = %to, "Order status changed by admin");

    queries::get_order_by_id(&conn, order_id)?.or_not_found(msg::ORDER_NOT_FOUND)
}
