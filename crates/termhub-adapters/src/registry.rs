use std::sync::Arc;

use crate::adapter::ToolAdapter;
use crate::tools::{ClaudeAdapter, CopilotAdapter, CursorAdapter, GeminiAdapter};

/// Resolve a tool tag to its adapter. Returns `None` for unknown tags —
/// callers surface that as a 400 Validation error.
pub fn adapter_for(tool_tag: &str) -> Option<Arc<dyn ToolAdapter>> {
    match tool_tag {
        "claude" => Some(Arc::new(ClaudeAdapter)),
        "gemini" => Some(Arc::new(GeminiAdapter)),
        "cursor" => Some(Arc::new(CursorAdapter)),
        "copilot" => Some(Arc::new(CopilotAdapter)),
        _ => None,
    }
}

/// All tags this registry knows about, in a stable order.
pub fn known_tags() -> &'static [&'static str] {
    &["claude", "gemini", "cursor", "copilot"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_all_known_tags() {
        for tag in known_tags() {
            assert!(adapter_for(tag).is_some(), "missing adapter for {tag}");
        }
    }

    #[test]
    fn unknown_tag_resolves_to_none() {
        assert!(adapter_for("copypasta").is_none());
    }
}
