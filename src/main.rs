use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::time::Duration;

use rxcart::config::Config;
use rxcart::db::{AppState, DbPool, create_pool, init_db, queries};
use rxcart::handlers;

#[derive(Parser, Debug)]
#[command(name = "rxcart")]
#[command(about = "Checkout and payment verification backend for the online pharmacy storefront")]
struct Cli {
    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,

    /// Prune stale pending orders once and exit without serving
    #[arg(long)]
    prune_only: bool,
}

/// Delete pending orders that never reached Stripe. 0 hours disables pruning.
fn prune_stale_orders(db: &DbPool, retention_hours: i64) {
    if retention_hours <= 0 {
        return;
    }

    let conn = match db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("Failed to get db connection for pruning: {}", e);
            return;
        }
    };

    match queries::purge_stale_pending_orders(&conn, retention_hours) {
        Ok(count) if count > 0 => {
            tracing::info!(
                "Pruned {} pending orders without a checkout session older than {} hours",
                count,
                retention_hours
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!("Failed to prune stale pending orders: {}", e);
        }
    }
}

fn spawn_prune_task(db: DbPool, retention_hours: i64) {
    if retention_hours <= 0 {
        tracing::info!("Pending order pruning disabled (PENDING_ORDER_RETENTION_HOURS=0)");
        return;
    }

    tokio::spawn(async move {
        let interval = Duration::from_secs(60 * 60);

        loop {
            tokio::time::sleep(interval).await;
            prune_stale_orders(&db, retention_hours);
        }
    });

    tracing::info!("Background pruning task started (runs every hour)");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rxcart=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.stripe.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY is not set: checkout and verification will fail");
    }
    if config.admin_api_key.is_none() {
        tracing::info!("ADMIN_API_KEY is not set: admin endpoints are disabled");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    prune_stale_orders(&db_pool, config.pending_order_retention_hours);

    if cli.prune_only {
        return;
    }

    spawn_prune_task(db_pool.clone(), config.pending_order_retention_hours);

    let state = AppState::new(&config, db_pool);

    let app = handlers::router(&state)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    } else if cli.ephemeral {
        tracing::warn!("--ephemeral ignored: not in dev mode (set RXCART_ENV=dev)");
    }

    tracing::info!("rxcart listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
