use std::env;

const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Stripe credentials and endpoint.
///
/// Only present when `STRIPE_SECRET_KEY` is set. Handlers that need the
/// processor turn a missing config into a configuration error at request time.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    /// Base URL of the Stripe REST API (overridable for local mocks)
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Storefront base URL, used for the checkout success and cancel redirects
    pub storefront_url: String,
    /// Origin allowed by CORS on the storefront-facing endpoints
    pub storefront_origin: String,
    pub stripe: Option<StripeConfig>,
    pub default_currency: String,
    /// HS256 secret shared with the auth provider, used to read the caller's user id
    pub auth_jwt_secret: Option<String>,
    pub admin_api_key: Option<String>,
    /// Pending orders without a checkout session are pruned after this many hours (0 = never)
    pub pending_order_retention_hours: i64,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("RXCART_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let storefront_url = env::var("STOREFRONT_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        let storefront_origin = env::var("STOREFRONT_ORIGIN")
            .unwrap_or_else(|_| crate::util::origin_of(&storefront_url).to_string());

        let stripe = non_empty_var("STRIPE_SECRET_KEY").map(|secret_key| StripeConfig {
            secret_key,
            webhook_secret: non_empty_var("STRIPE_WEBHOOK_SECRET"),
            api_base: env::var("STRIPE_API_BASE")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string()),
        });

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "rxcart.db".to_string()),
            storefront_url,
            storefront_origin,
            stripe,
            default_currency: env::var("DEFAULT_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or_else(|_| "usd".to_string()),
            auth_jwt_secret: non_empty_var("AUTH_JWT_SECRET"),
            admin_api_key: non_empty_var("ADMIN_API_KEY"),
            pending_order_retention_hours: env::var("PENDING_ORDER_RETENTION_HOURS")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(72),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
