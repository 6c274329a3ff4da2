use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::id::is_valid_order_id;
use crate::models::OrderSummary;

/// Public order status for the confirmation page. Order ids are unguessable,
/// so the id itself is the capability.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderSummary>> {
    if !is_valid_order_id(&order_id) {
        return Err(AppError::NotFound(msg::ORDER_NOT_FOUND.into()));
    }

    let conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, &order_id)?.or_not_found(msg::ORDER_NOT_FOUND)?;

    Ok(Json(order.into()))
}
