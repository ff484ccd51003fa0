use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque pointer the Gateway uses to address a terminal pane — in practice
/// the `-t` target string passed to the multiplexer binary (a session name,
/// optionally qualified with a window/pane index).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaneRef(pub String);

impl PaneRef {
    pub fn for_session(session_id: &str) -> Self {
        Self(session_id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
