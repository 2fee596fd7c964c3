use rusqlite::Connection;

use crate::error::StoreError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS profiles (
    user_id BLOB PRIMARY KEY CHECK (length(user_id) = 16),
    full_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    message_id BLOB PRIMARY KEY CHECK (length(message_id) = 16),
    sender_id BLOB NOT NULL CHECK (length(sender_id) = 16),
    recipient_id BLOB CHECK (recipient_id IS NULL OR length(recipient_id) = 16),
    body TEXT NOT NULL CHECK (length(body) > 0),
    created_at INTEGER NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0 CHECK (is_read IN (0, 1))
);
CREATE INDEX IF NOT EXISTS idx_messages_order ON messages (created_at, message_id);
CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages (sender_id, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages (recipient_id, created_at)
    WHERE recipient_id IS NOT NULL;
";
