use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Order lifecycle.
///
/// Allowed transitions: `pending -> completed`, `pending -> cancelled`,
/// `completed -> refunded`. Everything else is rejected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Completed, OrderStatus::Refunded)
        )
    }
}

/// A normalized cart line, stored inline on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    /// Unit price in minor currency units (cents)
    pub unit_amount: i64,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl LineItem {
    /// `unit_amount * quantity`, or `None` on overflow.
    pub fn subtotal(&self) -> Option<i64> {
        self.unit_amount.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Owning user from the auth provider (None = guest checkout)
    pub user_id: Option<String>,
    pub items: Vec<LineItem>,
    /// Sum of line subtotals in minor units, fixed at creation
    pub total_amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub stripe_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub shipping_address: Option<String>,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Public tracking view of an order (no payer details or processor ids).
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: String,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    pub total_amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            status: order.status,
            items: order.items,
            total_amount: order.total_amount,
            currency: order.currency,
            shipping_address: order.shipping_address,
            created_at: order.created_at,
            completed_at: order.completed_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub user_id: Option<String>,
    pub items: Vec<LineItem>,
    pub currency: String,
    pub shipping_address: Option<String>,
}

/// Payer details recorded when a paid session completes its order.
#[derive(Debug, Clone, Default)]
pub struct CompleteOrder {
    pub payment_intent_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilters {
    pub status: Option<OrderStatus>,
    pub user_id: Option<String>,
}
