mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::{Config, StripeConfig};
use crate::error::{AppError, Result, msg};
use crate::payments::StripeClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state shared by all handlers.
///
/// Everything here is immutable after startup apart from the pool itself.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Storefront base URL for checkout redirects (no trailing slash)
    pub storefront_url: String,
    /// Origin allowed by CORS on storefront endpoints
    pub storefront_origin: String,
    /// None when STRIPE_SECRET_KEY is not configured
    pub stripe: Option<StripeConfig>,
    pub default_currency: String,
    pub auth_jwt_secret: Option<String>,
    pub admin_api_key: Option<String>,
    /// Shared HTTP client for Stripe calls (connection pooling)
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: &Config, db: DbPool) -> Self {
        Self {
            db,
            storefront_url: config.storefront_url.clone(),
            storefront_origin: config.storefront_origin.clone(),
            stripe: config.stripe.clone(),
            default_currency: config.default_currency.clone(),
            auth_jwt_secret: config.auth_jwt_secret.clone(),
            admin_api_key: config.admin_api_key.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Stripe client for this request, or a configuration error if no key is set.
    pub fn stripe_client(&self) -> Result<StripeClient> {
        let config = self
            .stripe
            .as_ref()
            .ok_or_else(|| AppError::Config(msg::STRIPE_NOT_CONFIGURED.into()))?;
        Ok(StripeClient::new(self.http.clone(), config))
    }
}

/// Create a file-backed pool. Every connection gets a busy timeout and
/// foreign keys; the database runs in WAL mode so readers don't block the
/// conditional order updates.
pub fn create_pool(database_path: &str) -> std::result::Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
    });
    Pool::builder().max_size(10).build(manager)
}
