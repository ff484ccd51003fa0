use serde::{Deserialize, Serialize};

/// Coarse classification of what a tool's pane currently shows. Adapters
/// derive this from the trailing lines of a snapshot; it drives whether the
/// Screen-Scrape Monitor treats new output as a completed agent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputState {
    Starting,
    Ready,
    WaitingInput,
    Processing,
    Error,
}
