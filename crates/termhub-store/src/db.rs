use rusqlite::Connection;

use crate::error::Result;

/// Initialise the messages and read-watermark tables. Safe to call on every
/// startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id                    INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id            TEXT NOT NULL,
            sender                TEXT NOT NULL,
            content               TEXT NOT NULL,
            requires_user_input   INTEGER NOT NULL DEFAULT 0,
            metadata              TEXT NOT NULL DEFAULT '{}',
            created_at            TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages(session_id, created_at, id);

        CREATE TABLE IF NOT EXISTS message_read_watermark (
            session_id            TEXT PRIMARY KEY,
            last_read_message_id  INTEGER,
            unread_count          INTEGER NOT NULL DEFAULT 0,
            updated_at            TEXT NOT NULL
        );",
    )?;
    Ok(())
}
