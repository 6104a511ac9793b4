use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                role        TEXT NOT NULL CHECK (role IN ('admin', 'cashier')),
                pin_hash    TEXT NOT NULL,
                is_active   INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE sessions (
                token       TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role        TEXT NOT NULL,
                name        TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE transactions (
                id               TEXT PRIMARY KEY,
                amount           INTEGER NOT NULL CHECK (amount > 0),
                purpose          TEXT NOT NULL,
                fund             TEXT NOT NULL CHECK (fund IN ('mosque', 'imam')),
                transaction_date TEXT NOT NULL,
                created_at       TEXT NOT NULL DEFAULT (datetime('now')),
                created_by       TEXT REFERENCES users(id) ON DELETE SET NULL
            );

            CREATE INDEX idx_transactions_fund
                ON transactions(fund);
            CREATE INDEX idx_transactions_recent
                ON transactions(transaction_date, created_at);

            CREATE TABLE committee_members (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                image_url   TEXT,
                media_state TEXT NOT NULL DEFAULT 'none'
                            CHECK (media_state IN ('none', 'pending', 'committed')),
                designation TEXT NOT NULL,
                phone       TEXT,
                is_active   INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_committee_media_state
                ON committee_members(media_state);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
