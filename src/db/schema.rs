use rusqlite::Connection;

/// Initialize the database schema. Safe to run on every startup.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- One row per checkout attempt. Line items are embedded as JSON.
        -- Amounts are integer minor units; timestamps are unix seconds.
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            user_id TEXT,                          -- NULL = guest checkout
            items TEXT NOT NULL,                   -- JSON array of line items
            total_amount INTEGER NOT NULL CHECK (total_amount > 0),
            currency TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'completed', 'cancelled', 'refunded')),
            stripe_session_id TEXT UNIQUE,         -- set once the processor session exists
            stripe_payment_intent_id TEXT,
            customer_email TEXT,
            customer_name TEXT,
            shipping_address TEXT,
            completed_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_status_created ON orders(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);
        "#,
    )?;
    Ok(())
}
