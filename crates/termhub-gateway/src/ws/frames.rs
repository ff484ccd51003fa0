//! Inbound WS wire shape — `{action, sessionId?, input?, data?}`.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    pub action: String,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}
