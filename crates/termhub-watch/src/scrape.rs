//! The Screen-Scrape Monitor (Component D).
//!
//! Runs two cadences off one `tokio::select!` loop: a snapshot cadence that
//! always publishes raw terminal output for plain terminal viewers, and a
//! message-extraction cadence that is only active when this monitor was
//! started as the session's authoritative message source (i.e. no
//! structured log tailer bound within its wait window, §9). Both cadences
//! share the same poll interval, so they're driven off a single
//! `tokio::time::interval` tick rather than two independent timers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use termhub_adapters::{OutputState, ToolAdapter};
use termhub_core::SessionId;
use termhub_hub::BroadcastHub;
use termhub_mux::{MultiplexerGateway, PaneRef};
use termhub_store::ConversationStore;

/// Handle to a running screen-scrape monitor task.
pub struct ScrapeHandle {
    cancel: CancellationToken,
}

impl ScrapeHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

pub fn start(
    session_id: SessionId,
    pane: PaneRef,
    mux: Arc<MultiplexerGateway>,
    store: Arc<ConversationStore>,
    hub: Arc<BroadcastHub>,
    adapter: Arc<dyn ToolAdapter>,
    authoritative: bool,
    interval: std::time::Duration,
) -> ScrapeHandle {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    tokio::spawn(run_loop(
        session_id,
        pane,
        mux,
        store,
        hub,
        adapter,
        authoritative,
        interval,
        task_cancel,
    ));

    ScrapeHandle { cancel }
}

/// Mutable state the scrape loop carries between ticks. Kept separate from
/// the loop function so the extraction logic can be unit-tested without
/// spinning up tasks.
#[derive(Default)]
struct ScrapeState {
    last_snapshot: String,
    last_state: Option<OutputState>,
    last_emitted_user: Option<String>,
    last_emitted_agent: Option<String>,
    last_emitted_prompt: Option<String>,
    agent_buffer: Vec<String>,
}

async fn run_loop(
    session_id: SessionId,
    pane: PaneRef,
    mux: Arc<MultiplexerGateway>,
    store: Arc<ConversationStore>,
    hub: Arc<BroadcastHub>,
    adapter: Arc<dyn ToolAdapter>,
    authoritative: bool,
    interval: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    let mut state = ScrapeState::default();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(session_id = %session_id, "screen-scrape monitor stopped");
                return;
            }
            _ = ticker.tick() => {
                let snapshot = match mux.snapshot(&pane).await {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "screen-scrape snapshot failed");
                        continue;
                    }
                };

                if snapshot == state.last_snapshot {
                    continue;
                }

                hub.publish_terminal_output(session_id.as_str(), snapshot.clone());

                if authoritative {
                    extract_messages(&session_id, &snapshot, adapter.as_ref(), &store, &hub, &mut state);
                }

                state.last_snapshot = snapshot;
            }
        }
    }
}

/// Diff `snapshot` against the previously seen pane content and emit any
/// completed messages found in the new suffix.
fn extract_messages(
    session_id: &SessionId,
    snapshot: &str,
    adapter: &dyn ToolAdapter,
    store: &Arc<ConversationStore>,
    hub: &Arc<BroadcastHub>,
    state: &mut ScrapeState,
) {
    let new_state = adapter.classify(snapshot, state.last_state);
    state.last_state = Some(new_state);

    if adapter.is_permission_prompt(snapshot) {
        let prompt_text = trailing_block(snapshot, 8);
        if state.last_emitted_prompt.as_deref() != Some(prompt_text.as_str()) {
            match store.append_agent(session_id.as_str(), &prompt_text, true) {
                Ok(msg) => hub.publish_new_message(session_id.as_str(), &msg),
                Err(e) => warn!(session_id = %session_id, error = %e, "failed to persist permission prompt"),
            }
            state.last_emitted_prompt = Some(prompt_text);
        }
        return;
    }

    let suffix = new_suffix_lines(&state.last_snapshot, snapshot);
    if suffix.is_empty() {
        return;
    }

    for line in suffix {
        let trimmed = line.trim();

        if trimmed.is_empty() || is_prompt_marker(trimmed) || is_footer(trimmed) {
            flush_agent_block(session_id, store, hub, state);
            continue;
        }

        if is_user_line(line, state.last_emitted_user.as_deref()) {
            flush_agent_block(session_id, store, hub, state);
            if state.last_emitted_user.as_deref() != Some(trimmed) {
                state.last_emitted_user = Some(trimmed.to_string());
            }
            continue;
        }

        state.agent_buffer.push(line.to_string());
    }
}

fn flush_agent_block(
    session_id: &SessionId,
    store: &Arc<ConversationStore>,
    hub: &Arc<BroadcastHub>,
    state: &mut ScrapeState,
) {
    if state.agent_buffer.is_empty() {
        return;
    }
    let content = state.agent_buffer.join("\n").trim().to_string();
    state.agent_buffer.clear();

    if content.is_empty() || state.last_emitted_agent.as_deref() == Some(content.as_str()) {
        return;
    }

    match store.append_agent(session_id.as_str(), &content, false) {
        Ok(msg) => hub.publish_new_message(session_id.as_str(), &msg),
        Err(e) => warn!(session_id = %session_id, error = %e, "failed to persist scraped agent message"),
    }
    state.last_emitted_agent = Some(content);
}

/// A line counts as user input when it's short, plain, and doesn't look
/// like one of the agent's own response patterns (prefixes, code fences,
/// indentation) — and isn't a repeat of the last line we already emitted.
fn is_user_line(line: &str, last_user: Option<&str>) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.len() > 200 {
        return false;
    }
    if line.starts_with(' ') || line.starts_with('\t') {
        return false;
    }
    if trimmed.starts_with('>')
        || trimmed.starts_with("```")
        || trimmed.starts_with('#')
        || trimmed.starts_with('*')
        || trimmed.starts_with('-')
    {
        return false;
    }
    if Some(trimmed) == last_user {
        return false;
    }
    true
}

fn is_prompt_marker(trimmed: &str) -> bool {
    trimmed == ">" || trimmed.ends_with("> ") || trimmed == "$"
}

fn is_footer(trimmed: &str) -> bool {
    let lower = trimmed.to_lowercase();
    lower.contains("how can i help") || lower.contains("what would you like")
}

/// Find the lines appended since `old` was last seen by anchoring on the
/// last line `old` and `new` still share, then returning everything after
/// it. If nothing overlaps (the pane was cleared, or this is the first
/// tick), the whole snapshot is treated as new.
fn new_suffix_lines<'a>(old: &str, new: &'a str) -> Vec<&'a str> {
    let new_lines: Vec<&str> = new.lines().collect();
    let old_lines: Vec<&str> = old.lines().collect();

    if old_lines.is_empty() {
        return new_lines;
    }

    for old_line in old_lines.iter().rev() {
        if let Some(pos) = new_lines.iter().rposition(|l| l == old_line) {
            return new_lines[pos + 1..].to_vec();
        }
    }

    new_lines
}

/// Extract the trailing non-blank lines of a snapshot — used as the content
/// of a permission-prompt message, since the prompt text itself is what the
/// user needs to see to answer it.
fn trailing_block(snapshot: &str, n: usize) -> String {
    let lines: Vec<&str> = snapshot
        .lines()
        .rev()
        .take(n)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_suffix_lines_finds_appended_content() {
        let old = "line one\nline two\n> ";
        let new = "line one\nline two\n> hello\nclaude replies\n> ";
        let suffix = new_suffix_lines(old, new);
        assert_eq!(suffix, vec!["hello", "claude replies", "> "]);
    }

    #[test]
    fn new_suffix_lines_treats_unrelated_snapshot_as_all_new() {
        let old = "totally different content";
        let new = "fresh pane after clear";
        let suffix = new_suffix_lines(old, new);
        assert_eq!(suffix, vec!["fresh pane after clear"]);
    }

    #[test]
    fn user_line_rejects_indented_and_code_fence_lines() {
        assert!(!is_user_line("    indented output", None));
        assert!(!is_user_line("```rust", None));
        assert!(is_user_line("hello there", None));
    }

    #[test]
    fn user_line_rejects_repeat_of_last_emitted() {
        assert!(!is_user_line("hello", Some("hello")));
    }

    #[test]
    fn extract_messages_emits_agent_block_on_blank_line() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        termhub_store::db::init_db(&conn).unwrap();
        let store = Arc::new(ConversationStore::new(conn));
        let hub = Arc::new(BroadcastHub::new(store.clone()));
        let adapter: Arc<dyn ToolAdapter> = Arc::new(termhub_adapters::tools::ClaudeAdapter);
        let session_id = SessionId::from("s1");

        let mut state = ScrapeState::default();
        let snapshot = "some agent reply\nmore agent text\n\n> ";
        extract_messages(&session_id, snapshot, adapter.as_ref(), &store, &hub, &mut state);

        let messages = store.list("s1", 10, 0).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("some agent reply"));
    }
}
