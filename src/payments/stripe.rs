use hmac::{Hmac, Mac};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::StripeConfig;
use crate::error::{AppError, Result, msg};
use crate::models::LineItem;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a webhook timestamp before it's rejected (in seconds).
/// Stripe recommends 300 seconds (5 minutes).
const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Allowed clock skew for webhook timestamps from the future.
const WEBHOOK_FUTURE_SKEW_SECS: i64 = 60;

const CHECKOUT_SESSION_PREFIX: &str = "cs_";

/// Shape check for Checkout Session ids (`cs_test_...`, `cs_live_...`).
///
/// The id becomes a URL path segment on an authenticated request, so only
/// ASCII alphanumerics and `_` are accepted.
pub fn is_valid_checkout_session_id(session_id: &str) -> bool {
    session_id
        .strip_prefix(CHECKOUT_SESSION_PREFIX)
        .is_some_and(|rest| {
            !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Everything needed to open a hosted checkout page for one order.
#[derive(Debug)]
pub struct CheckoutSessionParams<'a> {
    pub order_id: &'a str,
    pub user_id: Option<&'a str>,
    pub items: &'a [LineItem],
    pub currency: &'a str,
    pub payment_method_types: &'a [String],
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

impl CheckoutSessionParams<'_> {
    /// Flatten into Stripe's bracketed form encoding.
    ///
    /// Line item amounts are the already-normalized minor units from the
    /// order, so Stripe charges exactly the stored total.
    fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.to_string()),
            ("cancel_url".to_string(), self.cancel_url.to_string()),
            ("client_reference_id".to_string(), self.order_id.to_string()),
            ("metadata[order_id]".to_string(), self.order_id.to_string()),
        ];
        if let Some(user_id) = self.user_id {
            form.push(("metadata[user_id]".to_string(), user_id.to_string()));
        }
        for (i, method) in self.payment_method_types.iter().enumerate() {
            form.push((format!("payment_method_types[{}]", i), method.clone()));
        }
        for (i, item) in self.items.iter().enumerate() {
            let prefix = format!("line_items[{}]", i);
            form.push((format!("{}[price_data][currency]", prefix), self.currency.to_string()));
            form.push((
                format!("{}[price_data][unit_amount]", prefix),
                item.unit_amount.to_string(),
            ));
            form.push((
                format!("{}[price_data][product_data][name]", prefix),
                item.name.clone(),
            ));
            if let Some(ref image_url) = item.image_url {
                form.push((
                    format!("{}[price_data][product_data][images][0]", prefix),
                    image_url.clone(),
                ));
            }
            form.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
        }
        form
    }
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: Option<String>,
    api_base: String,
}

impl StripeClient {
    pub fn new(client: Client, config: &StripeConfig) -> Self {
        Self {
            client,
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            api_base: config.api_base.clone(),
        }
    }

    /// Create a hosted Checkout Session in `payment` mode with ad-hoc
    /// `price_data` for each cart line.
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams<'_>,
    ) -> Result<StripeCheckoutSession> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params.to_form())
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Stripe API error: {}", e)))?;

        Self::parse_session(response).await
    }

    /// Fetch the current state of a Checkout Session.
    pub async fn retrieve_checkout_session(&self, session_id: &str) -> Result<StripeCheckoutSession> {
        if !is_valid_checkout_session_id(session_id) {
            return Err(AppError::BadRequest(msg::INVALID_SESSION_ID.into()));
        }

        let response = self
            .client
            .get(format!("{}/v1/checkout/sessions/{}", self.api_base, session_id))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Stripe API error: {}", e)))?;

        Self::parse_session(response).await
    }

    async fn parse_session(response: Response) -> Result<StripeCheckoutSession> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&error_text)
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or(error_text);
            return Err(if status == StatusCode::NOT_FOUND {
                AppError::NotFound(message)
            } else {
                AppError::PaymentProvider(message)
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Failed to parse Stripe response: {}", e)))
    }

    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| AppError::Config(msg::WEBHOOK_SECRET_NOT_CONFIGURED.into()))?;
        verify_signature_at(secret, payload, signature, chrono::Utc::now().timestamp())
    }
}

/// Check a `stripe-signature` header (`t=timestamp,v1=signature`) against
/// `payload` as of `now`.
fn verify_signature_at(secret: &str, payload: &[u8], signature: &str, now: i64) -> Result<bool> {
    let mut timestamp = None;
    let mut sig_v1 = None;

    for part in signature.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(s) = part.strip_prefix("v1=") {
            sig_v1 = Some(s);
        }
    }

    let timestamp_str =
        timestamp.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
    let sig_v1 = sig_v1.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;

    let timestamp: i64 = timestamp_str
        .parse()
        .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

    let age = now - timestamp;
    if age > WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
        tracing::warn!(
            "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
            age,
            WEBHOOK_TIMESTAMP_TOLERANCE_SECS
        );
        return Ok(false);
    }
    if age < -WEBHOOK_FUTURE_SKEW_SECS {
        tracing::warn!("Stripe webhook rejected: timestamp in the future (age={}s)", age);
        return Ok(false);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
    mac.update(timestamp_str.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    // Length is not secret (always 64 hex chars), only the content comparison
    // needs to be constant-time.
    let expected_bytes = expected.as_bytes();
    let provided_bytes = sig_v1.as_bytes();
    if expected_bytes.len() != provided_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(provided_bytes).into())
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// The subset of a Checkout Session this service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    /// Hosted page URL (null once the session is complete or expired)
    #[serde(default)]
    pub url: Option<String>,
    /// "paid", "unpaid", or "no_payment_required"
    pub payment_status: String,
    /// "open", "complete", or "expired"
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<StripeCustomerDetails>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

impl StripeCheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    /// Email the payer entered on the hosted page, falling back to the
    /// prefilled one.
    pub fn payer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
    }

    pub fn payer_name(&self) -> Option<&str> {
        self.customer_details.as_ref().and_then(|d| d.name.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeMetadata {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}
