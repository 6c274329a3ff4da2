//! Prefixed order identifiers.
//!
//! Orders use an `rx_ord_` prefix so they can never be confused with Stripe
//! identifiers (`cs_`, `pi_`, `cus_`) in logs, metadata, or support tickets.
//!
//! Format: `rx_ord_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

pub const ORDER_PREFIX: &str = "rx_ord_";

/// Generates a new order ID.
pub fn new_order_id() -> String {
    format!("{}{}", ORDER_PREFIX, Uuid::new_v4().as_simple())
}

/// Cheap format check used to reject garbage before hitting the database.
pub fn is_valid_order_id(s: &str) -> bool {
    let Some(hex_part) = s.strip_prefix(ORDER_PREFIX) else {
        return false;
    };
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}
