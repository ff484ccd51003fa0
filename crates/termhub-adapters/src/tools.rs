use crate::adapter::{trailing_lines, ToolAdapter};
use crate::types::OutputState;

fn looks_like_permission_prompt(snapshot: &str) -> bool {
    let tail = trailing_lines(snapshot, 8).join("\n").to_lowercase();
    let has_question = tail.contains('?') || tail.contains("proceed") || tail.contains("continue");
    let has_options = tail.contains("y/n")
        || tail.contains("yes")
        || tail.contains("[1]")
        || tail.contains("1.")
        || tail.contains("allow");
    has_question && has_options
}

/// Anthropic's coding CLI. Writes a per-session JSONL log under its own
/// project directory, so the Structured Log Tailer is authoritative for it.
pub struct ClaudeAdapter;

impl ToolAdapter for ClaudeAdapter {
    fn tag(&self) -> &'static str {
        "claude"
    }

    fn launch_argv(&self) -> Vec<String> {
        vec!["claude".to_string()]
    }

    fn has_structured_log(&self) -> bool {
        true
    }

    fn log_dir_hint(&self) -> Option<String> {
        Some(".claude/projects".to_string())
    }

    fn classify(&self, snapshot: &str, previous: Option<OutputState>) -> OutputState {
        if snapshot.trim().is_empty() {
            return OutputState::Starting;
        }
        let tail = trailing_lines(snapshot, 4).join(" ").to_lowercase();
        if tail.contains("esc to interrupt") || tail.contains("thinking") {
            OutputState::Processing
        } else if looks_like_permission_prompt(snapshot) {
            OutputState::WaitingInput
        } else if tail.contains("error") {
            OutputState::Error
        } else if tail.trim_end().ends_with('>') {
            OutputState::Ready
        } else {
            previous.unwrap_or(OutputState::Ready)
        }
    }

    fn is_permission_prompt(&self, snapshot: &str) -> bool {
        looks_like_permission_prompt(snapshot)
    }
}

/// Google's Gemini CLI. No structured per-session log in the default
/// install, so the Screen-Scrape Monitor is authoritative.
pub struct GeminiAdapter;

impl ToolAdapter for GeminiAdapter {
    fn tag(&self) -> &'static str {
        "gemini"
    }

    fn launch_argv(&self) -> Vec<String> {
        vec!["gemini".to_string()]
    }

    fn classify(&self, snapshot: &str, previous: Option<OutputState>) -> OutputState {
        if snapshot.trim().is_empty() {
            return OutputState::Starting;
        }
        let tail = trailing_lines(snapshot, 4).join(" ").to_lowercase();
        if tail.contains("generating") || tail.contains("waiting for model") {
            OutputState::Processing
        } else if looks_like_permission_prompt(snapshot) {
            OutputState::WaitingInput
        } else if tail.contains("error") {
            OutputState::Error
        } else if tail.trim_end().ends_with('>') || tail.contains("type your message") {
            OutputState::Ready
        } else {
            previous.unwrap_or(OutputState::Ready)
        }
    }

    fn is_permission_prompt(&self, snapshot: &str) -> bool {
        looks_like_permission_prompt(snapshot)
    }
}

/// Cursor's terminal agent mode.
pub struct CursorAdapter;

impl ToolAdapter for CursorAdapter {
    fn tag(&self) -> &'static str {
        "cursor"
    }

    fn launch_argv(&self) -> Vec<String> {
        vec!["cursor-agent".to_string()]
    }

    fn classify(&self, snapshot: &str, previous: Option<OutputState>) -> OutputState {
        if snapshot.trim().is_empty() {
            return OutputState::Starting;
        }
        let tail = trailing_lines(snapshot, 4).join(" ").to_lowercase();
        if tail.contains("working") || tail.contains("running tool") {
            OutputState::Processing
        } else if looks_like_permission_prompt(snapshot) {
            OutputState::WaitingInput
        } else if tail.contains("error") || tail.contains("failed") {
            OutputState::Error
        } else if tail.trim_end().ends_with('>') {
            OutputState::Ready
        } else {
            previous.unwrap_or(OutputState::Ready)
        }
    }

    fn is_permission_prompt(&self, snapshot: &str) -> bool {
        looks_like_permission_prompt(snapshot)
    }
}

/// GitHub Copilot CLI.
pub struct CopilotAdapter;

impl ToolAdapter for CopilotAdapter {
    fn tag(&self) -> &'static str {
        "copilot"
    }

    fn launch_argv(&self) -> Vec<String> {
        vec!["gh".to_string(), "copilot".to_string()]
    }

    fn classify(&self, snapshot: &str, previous: Option<OutputState>) -> OutputState {
        if snapshot.trim().is_empty() {
            return OutputState::Starting;
        }
        let tail = trailing_lines(snapshot, 4).join(" ").to_lowercase();
        if tail.contains("thinking") || tail.contains("suggesting") {
            OutputState::Processing
        } else if looks_like_permission_prompt(snapshot) {
            OutputState::WaitingInput
        } else if tail.contains("error") {
            OutputState::Error
        } else if tail.trim_end().ends_with('>') || tail.contains("welcome to github copilot") {
            OutputState::Ready
        } else {
            previous.unwrap_or(OutputState::Ready)
        }
    }

    fn is_permission_prompt(&self, snapshot: &str) -> bool {
        looks_like_permission_prompt(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_classifies_processing_indicator() {
        let adapter = ClaudeAdapter;
        let state = adapter.classify("some output\n... esc to interrupt ...", None);
        assert_eq!(state, OutputState::Processing);
    }

    #[test]
    fn claude_empty_snapshot_is_starting() {
        let adapter = ClaudeAdapter;
        assert_eq!(adapter.classify("", None), OutputState::Starting);
    }

    #[test]
    fn permission_prompt_requires_question_and_options() {
        let snapshot = "Do you want to proceed?\n1. Yes\n2. No";
        assert!(looks_like_permission_prompt(snapshot));
        assert!(!looks_like_permission_prompt("just some plain output"));
    }

    #[test]
    fn gemini_falls_back_to_previous_state_when_ambiguous() {
        let adapter = GeminiAdapter;
        let state = adapter.classify("some ambiguous mid-stream text", Some(OutputState::Processing));
        assert_eq!(state, OutputState::Processing);
    }
}
