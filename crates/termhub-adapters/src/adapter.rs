use crate::types::OutputState;

/// A tool's launch command, output classifier, and input formatter.
///
/// Implementations must be pure: `classify` and `is_permission_prompt` take
/// the previous-state hint as an explicit parameter rather than caching it
/// on `self`, so an adapter instance is safe to share across sessions.
pub trait ToolAdapter: Send + Sync {
    /// The tag this adapter answers to (`"claude"`, `"gemini"`, ...).
    fn tag(&self) -> &'static str;

    /// Argument vector to launch the tool inside a fresh pane.
    fn launch_argv(&self) -> Vec<String>;

    /// Whether this tool writes a per-session structured event log that the
    /// Structured Log Tailer should prefer over screen-scraping.
    fn has_structured_log(&self) -> bool {
        false
    }

    /// Directory the tailer should watch for this tool's log files, if any.
    fn log_dir_hint(&self) -> Option<String> {
        None
    }

    /// Derive the tool's current output state from the trailing lines of a
    /// pane snapshot. `previous` is the last state this session was in;
    /// passing it explicitly keeps this function pure.
    fn classify(&self, snapshot: &str, previous: Option<OutputState>) -> OutputState;

    /// Does the current snapshot show a permission/confirmation prompt
    /// waiting on the user?
    fn is_permission_prompt(&self, snapshot: &str) -> bool;

    /// Transform raw user text into the bytes that should be sent to the
    /// pane for this tool. Most adapters pass text through unchanged; a
    /// tool-specific adapter can override this to escape control sequences
    /// its parser is sensitive to.
    fn format_input(&self, user_text: &str) -> String {
        user_text.to_string()
    }
}

pub(crate) fn trailing_lines(snapshot: &str, n: usize) -> Vec<&str> {
    snapshot
        .lines()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .take(n)
        .collect()
}
