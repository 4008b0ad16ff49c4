use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS employees (
            id                TEXT PRIMARY KEY,
            character_name    TEXT NOT NULL UNIQUE,
            discord_id        TEXT NOT NULL UNIQUE,
            verification_key  TEXT NOT NULL,
            is_blocked        INTEGER NOT NULL DEFAULT 0,
            block_reason      TEXT,
            blocked_at        TEXT,
            created_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS owners (
            id                TEXT PRIMARY KEY,
            character_name    TEXT NOT NULL UNIQUE,
            discord_id        TEXT NOT NULL,
            verification_key  TEXT NOT NULL,
            created_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS sales (
            id                   TEXT PRIMARY KEY,
            employee_id          TEXT NOT NULL REFERENCES employees(id),
            customer_name        TEXT NOT NULL,
            vehicle_plate        TEXT NOT NULL,
            discount_percentage  REAL NOT NULL DEFAULT 0,
            subtotal             REAL NOT NULL,
            discount_amount      REAL NOT NULL,
            tax_amount           REAL NOT NULL,
            total_amount         REAL NOT NULL,
            is_fake              INTEGER NOT NULL DEFAULT 0,
            is_verified          INTEGER NOT NULL DEFAULT 0,
            verified_at          TEXT,
            discord_message_id   TEXT,
            created_at           TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_sales_employee
            ON sales(employee_id, created_at);

        CREATE TABLE IF NOT EXISTS sale_items (
            id             TEXT PRIMARY KEY,
            sale_id        TEXT NOT NULL REFERENCES sales(id),
            item_name      TEXT NOT NULL,
            item_category  TEXT NOT NULL,
            item_type      TEXT NOT NULL,
            quantity       INTEGER NOT NULL,
            price          REAL NOT NULL,
            subtotal       REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sale_items_sale
            ON sale_items(sale_id);

        CREATE TABLE IF NOT EXISTS announcements (
            id          TEXT PRIMARY KEY,
            message     TEXT NOT NULL,
            expires_at  TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            created_by  TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
