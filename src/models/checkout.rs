use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result, msg};
use crate::money;

use super::LineItem;

const DEFAULT_PAYMENT_METHOD: &str = "card";

/// Cart snapshot sent by the storefront when the customer clicks "checkout".
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_method_types: Option<Vec<String>>,
    #[serde(default)]
    pub shipping_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub name: String,
    /// Unit price in major units as shown in the storefront (e.g. 15.99)
    pub price: f64,
    pub quantity: i64,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A validated cart, ready to be persisted and sent to Stripe.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCart {
    pub items: Vec<LineItem>,
    pub total_amount: i64,
    pub currency: String,
    pub payment_method_types: Vec<String>,
    pub shipping_address: Option<String>,
}

impl CheckoutRequest {
    /// Validate and normalize the cart. Fails on the first invalid field;
    /// nothing is persisted until this succeeds.
    pub fn normalize(self, default_currency: &str) -> Result<NormalizedCart> {
        if self.items.is_empty() {
            return Err(AppError::BadRequest(msg::EMPTY_CART.into()));
        }

        let items = self
            .items
            .into_iter()
            .map(CartItem::normalize)
            .collect::<Result<Vec<_>>>()?;

        let total_amount = money::order_total(&items)
            .ok_or_else(|| AppError::BadRequest(msg::TOTAL_OVERFLOW.into()))?;

        let currency = match self.currency.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c.to_lowercase(),
            _ => default_currency.to_lowercase(),
        };
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::BadRequest(msg::INVALID_CURRENCY.into()));
        }

        let payment_method_types = match self.payment_method_types {
            Some(types) if !types.is_empty() => {
                if types.iter().any(|t| t.trim().is_empty()) {
                    return Err(AppError::BadRequest(msg::INVALID_PAYMENT_METHOD.into()));
                }
                types.into_iter().map(|t| t.trim().to_string()).collect()
            }
            _ => vec![DEFAULT_PAYMENT_METHOD.to_string()],
        };

        Ok(NormalizedCart {
            items,
            total_amount,
            currency,
            payment_method_types,
            shipping_address: non_blank(self.shipping_address),
        })
    }
}

impl CartItem {
    fn normalize(self) -> Result<LineItem> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest(msg::BLANK_ITEM_NAME.into()));
        }
        if self.quantity <= 0 {
            return Err(AppError::BadRequest(msg::NON_POSITIVE_QUANTITY.into()));
        }
        // A price that rounds to zero cents is not chargeable either.
        let unit_amount = money::to_minor_units(self.price)
            .filter(|amount| *amount > 0)
            .ok_or_else(|| AppError::BadRequest(msg::NON_POSITIVE_PRICE.into()))?;

        Ok(LineItem {
            name: name.to_string(),
            unit_amount,
            quantity: self.quantity,
            image_url: non_blank(self.image_url),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// Stripe-hosted payment page to redirect the browser to
    pub url: String,
    pub session_id: String,
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(alias = "session_id")]
    pub session_id: String,
}

/// Verification outcome. The payment details are only filled in when the
/// session is paid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub verified: bool,
    /// Stripe's `payment_status` ("paid", "unpaid", "no_payment_required")
    pub status: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    /// Amount charged, in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    /// Whether the local order is (now) completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_updated: Option<bool>,
}
