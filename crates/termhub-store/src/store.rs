use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::instrument;

use crate::db::init_db;
use crate::error::Result;
use crate::types::{Message, Sender, SessionStatusRow};

/// Durable per-session ordered message log plus read watermark.
///
/// Wraps a single SQLite connection in a `Mutex`, the same shape this
/// codebase uses for its other persisted-entity managers. A single
/// connection trivially gives the per-session write serialisation the
/// append/watermark invariants require.
pub struct ConversationStore {
    db: Mutex<Connection>,
}

impl ConversationStore {
    /// Open (creating if absent) the SQLite database at `path` and
    /// initialise its schema.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// Wrap an already-open, already-initialised connection. Used by tests
    /// to run against an in-memory database.
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    #[instrument(skip(self, content), fields(session_id))]
    pub fn append_agent(
        &self,
        session_id: &str,
        content: &str,
        requires_user_input: bool,
    ) -> Result<Message> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO messages (session_id, sender, content, requires_user_input, metadata, created_at)
             VALUES (?1, 'agent', ?2, ?3, '{}', ?4)",
            params![session_id, content, requires_user_input as i64, now],
        )?;
        let id = tx.last_insert_rowid();

        bump_unread(&tx, session_id)?;
        tx.commit()?;

        Ok(Message {
            id,
            session_id: session_id.to_string(),
            sender: Sender::Agent,
            content: content.to_string(),
            requires_user_input,
            created_at: now,
            metadata: serde_json::json!({}),
        })
    }

    #[instrument(skip(self, content), fields(session_id, mark_as_read))]
    pub fn append_user(
        &self,
        session_id: &str,
        content: &str,
        mark_as_read: bool,
    ) -> Result<Message> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO messages (session_id, sender, content, requires_user_input, metadata, created_at)
             VALUES (?1, 'user', ?2, 0, '{}', ?3)",
            params![session_id, content, now],
        )?;
        let id = tx.last_insert_rowid();

        if mark_as_read {
            set_watermark(&tx, session_id, id, 0)?;
        } else {
            bump_unread(&tx, session_id)?;
        }
        tx.commit()?;

        Ok(Message {
            id,
            session_id: session_id.to_string(),
            sender: Sender::User,
            content: content.to_string(),
            requires_user_input: false,
            created_at: now,
            metadata: serde_json::json!({}),
        })
    }

    #[instrument(skip(self), fields(session_id, limit, offset))]
    pub fn list(&self, session_id: &str, limit: i64, offset: i64) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, session_id, sender, content, requires_user_input, metadata, created_at
             FROM messages
             WHERE session_id = ?1
             ORDER BY created_at ASC, id ASC
             LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(params![session_id, limit, offset], row_to_message)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    #[instrument(skip(self), fields(session_id))]
    pub fn unread(&self, session_id: &str) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let watermark = last_read_id(&db, session_id)?;
        query_after(&db, session_id, watermark, None)
    }

    #[instrument(skip(self), fields(session_id))]
    pub fn queued_user_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let watermark = last_read_id(&db, session_id)?;
        query_after(&db, session_id, watermark, Some(Sender::User))
    }

    /// Append an agent message, then atomically read the user messages
    /// queued since the prior watermark and advance the watermark to the
    /// newly inserted agent message. Lets the agent "pull" any replies a
    /// user sent while it was busy, in one transaction.
    #[instrument(skip(self, content), fields(session_id))]
    pub fn append_agent_and_take_queue(
        &self,
        session_id: &str,
        content: &str,
        requires_user_input: bool,
    ) -> Result<(Message, Vec<Message>)> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let prior_watermark = last_read_id(&tx, session_id)?;
        let queued = query_after(&tx, session_id, prior_watermark, Some(Sender::User))?;

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO messages (session_id, sender, content, requires_user_input, metadata, created_at)
             VALUES (?1, 'agent', ?2, ?3, '{}', ?4)",
            params![session_id, content, requires_user_input as i64, now],
        )?;
        let id = tx.last_insert_rowid();

        set_watermark(&tx, session_id, id, 0)?;
        tx.commit()?;

        let message = Message {
            id,
            session_id: session_id.to_string(),
            sender: Sender::Agent,
            content: content.to_string(),
            requires_user_input,
            created_at: now,
            metadata: serde_json::json!({}),
        };

        Ok((message, queued))
    }

    #[instrument(skip(self), fields(session_id, message_id))]
    pub fn mark_as_read(&self, session_id: &str, message_id: i64) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;

        let current = last_read_id(&tx, session_id)?;
        if let Some(current_id) = current {
            if message_id <= current_id {
                return Ok(());
            }
        }

        let remaining: i64 = tx.query_row(
            "SELECT COUNT(*) FROM messages WHERE session_id = ?1 AND id > ?2",
            params![session_id, message_id],
            |row| row.get(0),
        )?;

        set_watermark(&tx, session_id, message_id, remaining)?;
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self), fields(session_id))]
    pub fn status(&self, session_id: &str) -> Result<SessionStatusRow> {
        let db = self.db.lock().unwrap();

        let total_messages: i64 = db.query_row(
            "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;

        let unread_count: i64 = db
            .query_row(
                "SELECT unread_count FROM message_read_watermark WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(total_messages);

        let last_row: Option<(String, i64)> = db
            .query_row(
                "SELECT created_at, requires_user_input FROM messages
                 WHERE session_id = ?1 ORDER BY id DESC LIMIT 1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(SessionStatusRow {
            session_id: session_id.to_string(),
            total_messages: total_messages.max(0) as u64,
            unread_messages: unread_count.max(0) as u64,
            last_message_time: last_row.as_ref().map(|(ts, _)| ts.clone()),
            requires_user_input: last_row.map(|(_, flag)| flag != 0).unwrap_or(false),
        })
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let sender_str: String = row.get(2)?;
    let metadata_str: String = row.get(5)?;
    Ok(Message {
        id: row.get(0)?,
        session_id: row.get(1)?,
        sender: Sender::parse(&sender_str).unwrap_or(Sender::Agent),
        content: row.get(3)?,
        requires_user_input: row.get::<_, i64>(4)? != 0,
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({})),
        created_at: row.get(6)?,
    })
}

fn last_read_id(conn: &Connection, session_id: &str) -> Result<Option<i64>> {
    let id: Option<Option<i64>> = conn
        .query_row(
            "SELECT last_read_message_id FROM message_read_watermark WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.flatten())
}

fn query_after(
    conn: &Connection,
    session_id: &str,
    after_id: Option<i64>,
    sender_filter: Option<Sender>,
) -> Result<Vec<Message>> {
    let after_id = after_id.unwrap_or(0);
    let sql = match sender_filter {
        Some(_) => {
            "SELECT id, session_id, sender, content, requires_user_input, metadata, created_at
             FROM messages
             WHERE session_id = ?1 AND id > ?2 AND sender = ?3
             ORDER BY created_at ASC, id ASC"
        }
        None => {
            "SELECT id, session_id, sender, content, requires_user_input, metadata, created_at
             FROM messages
             WHERE session_id = ?1 AND id > ?2
             ORDER BY created_at ASC, id ASC"
        }
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = match sender_filter {
        Some(s) => stmt
            .query_map(params![session_id, after_id, s.as_str()], row_to_message)?
            .filter_map(|r| r.ok())
            .collect(),
        None => stmt
            .query_map(params![session_id, after_id], row_to_message)?
            .filter_map(|r| r.ok())
            .collect(),
    };
    Ok(rows)
}

fn bump_unread(conn: &Connection, session_id: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO message_read_watermark (session_id, last_read_message_id, unread_count, updated_at)
         VALUES (?1, NULL, 1, ?2)
         ON CONFLICT(session_id) DO UPDATE SET
            unread_count = unread_count + 1,
            updated_at = excluded.updated_at",
        params![session_id, now],
    )?;
    Ok(())
}

fn set_watermark(conn: &Connection, session_id: &str, last_read_message_id: i64, unread_count: i64) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO message_read_watermark (session_id, last_read_message_id, unread_count, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(session_id) DO UPDATE SET
            last_read_message_id = excluded.last_read_message_id,
            unread_count = excluded.unread_count,
            updated_at = excluded.updated_at",
        params![session_id, last_read_message_id, unread_count, now],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConversationStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        ConversationStore::new(conn)
    }

    #[test]
    fn append_agent_increments_unread() {
        let s = store();
        s.append_agent("sess-1", "hello", false).unwrap();
        s.append_agent("sess-1", "world", false).unwrap();
        let status = s.status("sess-1").unwrap();
        assert_eq!(status.total_messages, 2);
        assert_eq!(status.unread_messages, 2);
    }

    #[test]
    fn mark_as_read_resets_unread_count() {
        let s = store();
        let m1 = s.append_agent("sess-1", "first", false).unwrap();
        s.append_agent("sess-1", "second", false).unwrap();
        s.mark_as_read("sess-1", m1.id).unwrap();
        let status = s.status("sess-1").unwrap();
        assert_eq!(status.unread_messages, 1);
    }

    #[test]
    fn append_user_with_mark_as_read_advances_watermark() {
        let s = store();
        s.append_user("sess-1", "hi", true).unwrap();
        let status = s.status("sess-1").unwrap();
        assert_eq!(status.unread_messages, 0);
    }

    #[test]
    fn append_agent_and_take_queue_collects_pending_user_messages() {
        let s = store();
        s.append_user("sess-1", "first question", false).unwrap();
        s.append_user("sess-1", "second question", false).unwrap();

        let (agent_msg, queued) = s
            .append_agent_and_take_queue("sess-1", "here's my answer", false)
            .unwrap();

        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].content, "first question");
        assert_eq!(agent_msg.content, "here's my answer");

        let status = s.status("sess-1").unwrap();
        assert_eq!(status.unread_messages, 0);
    }

    #[test]
    fn list_orders_messages_ascending() {
        let s = store();
        s.append_user("sess-1", "one", true).unwrap();
        s.append_agent("sess-1", "two", false).unwrap();
        s.append_user("sess-1", "three", true).unwrap();

        let all = s.list("sess-1", 100, 0).unwrap();
        assert_eq!(
            all.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
            vec!["one", "two", "three"]
        );
    }

    #[test]
    fn status_reports_last_message_requires_user_input() {
        let s = store();
        s.append_agent("sess-1", "need a decision", true).unwrap();
        let status = s.status("sess-1").unwrap();
        assert!(status.requires_user_input);
    }

    #[test]
    fn mark_as_read_is_noop_for_already_seen_message() {
        let s = store();
        let m1 = s.append_agent("sess-1", "first", false).unwrap();
        s.append_agent("sess-1", "second", false).unwrap();
        s.mark_as_read("sess-1", m1.id).unwrap();
        let status_before = s.status("sess-1").unwrap();
        s.mark_as_read("sess-1", m1.id).unwrap();
        let status_after = s.status("sess-1").unwrap();
        assert_eq!(status_before.unread_messages, status_after.unread_messages);
    }
}
