use serde::{Deserialize, Serialize};

use termhub_store::Message;

/// One frame sent from the hub to a WebSocket observer. Mirrors the wire
/// shape `{action, sessionId?, output?, type?, data?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub action: String,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl OutboundFrame {
    pub fn terminal_output(session_id: &str, output: String) -> Self {
        Self {
            action: "output".to_string(),
            session_id: Some(session_id.to_string()),
            output: Some(output),
            kind: None,
            data: None,
        }
    }

    pub fn messages_replay(session_id: &str, messages: &[Message]) -> Self {
        Self {
            action: "messages".to_string(),
            session_id: Some(session_id.to_string()),
            output: None,
            kind: None,
            data: Some(serde_json::to_value(messages).unwrap_or(serde_json::json!([]))),
        }
    }

    pub fn new_message(session_id: &str, message: &Message) -> Self {
        Self {
            action: "newMessage".to_string(),
            session_id: Some(session_id.to_string()),
            output: None,
            kind: None,
            data: Some(serde_json::to_value(message).unwrap_or(serde_json::json!(null))),
        }
    }

    pub fn typing(session_id: &str) -> Self {
        Self {
            action: "typing".to_string(),
            session_id: Some(session_id.to_string()),
            output: None,
            kind: Some("typing".to_string()),
            data: None,
        }
    }

    pub fn stop_typing(session_id: &str) -> Self {
        Self {
            action: "stopTyping".to_string(),
            session_id: Some(session_id.to_string()),
            output: None,
            kind: Some("typing".to_string()),
            data: None,
        }
    }

    pub fn session_terminated(session_id: &str) -> Self {
        Self {
            action: "sessionTerminated".to_string(),
            session_id: Some(session_id.to_string()),
            output: None,
            kind: Some("status".to_string()),
            data: None,
        }
    }
}

/// What an observer is currently following.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// Receives lifecycle/status events for every session — the
    /// session-list view.
    All,
    Session(String),
}
