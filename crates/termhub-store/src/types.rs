use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Agent,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Agent => "agent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Sender::User),
            "agent" => Some(Sender::Agent),
            _ => None,
        }
    }
}

/// One element of a session's conversation log. Append-only: once assigned,
/// `id` never changes and the row is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub session_id: String,
    pub sender: Sender,
    pub content: String,
    pub requires_user_input: bool,
    /// RFC3339 timestamp.
    pub created_at: String,
    /// Free-form annotations (e.g. tool-use metadata extracted from a
    /// structured log event). Empty object when nothing was attached.
    pub metadata: serde_json::Value,
}

/// Compact per-session summary backing `GET .../messages/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusRow {
    pub session_id: String,
    pub total_messages: u64,
    pub unread_messages: u64,
    pub last_message_time: Option<String>,
    pub requires_user_input: bool,
}
