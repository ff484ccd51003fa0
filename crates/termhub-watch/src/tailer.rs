//! The Structured Log Tailer (Component C).
//!
//! When a tool writes its own per-session event log, tailing that log is far
//! more reliable than screen-scraping: every assistant turn arrives as one
//! clean JSON object instead of a pile of ANSI-laden terminal lines. `start`
//! waits up to `log_wait` for the tool to create a new log file, falls back
//! to the most recently modified existing one if nothing new shows up, and
//! then polls it for appended lines until cancelled.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use termhub_core::SessionId;
use termhub_hub::BroadcastHub;
use termhub_store::ConversationStore;

use crate::error::{Result, WatchError};
use crate::types::{extract_assistant_text, LogEvent};

/// Handle to a running tailer task. Dropping it does not stop the task —
/// call `stop` explicitly, the way the Session Orchestrator does when a
/// session is torn down.
pub struct TailerHandle {
    cancel: CancellationToken,
}

impl TailerHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

pub async fn start(
    session_id: SessionId,
    log_dir: PathBuf,
    store: Arc<ConversationStore>,
    hub: Arc<BroadcastHub>,
    log_wait: Duration,
    poll_interval: Duration,
) -> Result<TailerHandle> {
    let pre_existing = list_log_files(&log_dir);
    let found = wait_for_new_file(&log_dir, &pre_existing, log_wait).await;

    let (path, start_pos) = match found {
        Some(p) => (p, 0u64),
        None => match most_recently_modified(&pre_existing) {
            Some(p) => {
                let len = tokio::fs::metadata(&p).await.map(|m| m.len()).unwrap_or(0);
                (p, len)
            }
            None => return Err(WatchError::LogNotFound(session_id.to_string())),
        },
    };

    debug!(session_id = %session_id, path = %path.display(), start_pos, "structured log tailer attached");

    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    tokio::spawn(run_loop(session_id, path, start_pos, store, hub, poll_interval, task_cancel));

    Ok(TailerHandle { cancel })
}

async fn wait_for_new_file(dir: &Path, pre_existing: &HashSet<PathBuf>, log_wait: Duration) -> Option<PathBuf> {
    let deadline = tokio::time::Instant::now() + log_wait;
    loop {
        let current = list_log_files(dir);
        if let Some(new_file) = current.iter().find(|f| !pre_existing.contains(*f)) {
            return Some(new_file.clone());
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn list_log_files(dir: &Path) -> HashSet<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect()
        })
        .unwrap_or_default()
}

fn most_recently_modified(files: &HashSet<PathBuf>) -> Option<PathBuf> {
    files
        .iter()
        .filter_map(|p| {
            std::fs::metadata(p)
                .ok()
                .and_then(|m| m.modified().ok())
                .map(|t| (p.clone(), t))
        })
        .max_by_key(|(_, t)| *t)
        .map(|(p, _)| p)
}

async fn run_loop(
    session_id: SessionId,
    path: PathBuf,
    mut position: u64,
    store: Arc<ConversationStore>,
    hub: Arc<BroadcastHub>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(session_id = %session_id, "structured log tailer stopped");
                return;
            }
            _ = interval.tick() => {
                if let Err(e) = tail_once(&session_id, &path, &mut position, &store, &hub).await {
                    warn!(session_id = %session_id, error = %e, "structured log tail iteration failed");
                }
            }
        }
    }
}

async fn tail_once(
    session_id: &SessionId,
    path: &Path,
    position: &mut u64,
    store: &Arc<ConversationStore>,
    hub: &Arc<BroadcastHub>,
) -> Result<()> {
    let mut file = File::open(path).await?;
    let len = file.metadata().await?.len();

    if len < *position {
        // The tool truncated or replaced its log underneath us. Start over
        // rather than seeking past the end of a shorter file.
        *position = 0;
    }

    file.seek(std::io::SeekFrom::Start(*position)).await?;
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut new_position = *position;

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        new_position += n as u64;

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            dispatch_line(session_id, trimmed, store, hub);
        }
    }

    *position = new_position;
    Ok(())
}

fn dispatch_line(session_id: &SessionId, line: &str, store: &Arc<ConversationStore>, hub: &Arc<BroadcastHub>) {
    let event: LogEvent = match serde_json::from_str(line) {
        Ok(e) => e,
        Err(e) => {
            debug!(session_id = %session_id, error = %e, "skipping malformed log line");
            return;
        }
    };

    match event {
        LogEvent::User => {
            hub.publish_typing(session_id.as_str());
        }
        LogEvent::Assistant { message } => {
            let (text, requires_user_input) = extract_assistant_text(&message.content);
            if text.trim().is_empty() {
                return;
            }
            hub.publish_stop_typing(session_id.as_str());
            match store.append_agent(session_id.as_str(), &text, requires_user_input) {
                Ok(msg) => hub.publish_new_message(session_id.as_str(), &msg),
                Err(e) => warn!(session_id = %session_id, error = %e, "failed to persist assistant message"),
            }
        }
        LogEvent::Thinking | LogEvent::ToolUse | LogEvent::Processing => {
            hub.publish_typing(session_id.as_str());
        }
        LogEvent::Summary | LogEvent::Unknown => {
            debug!(session_id = %session_id, "log event not published");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::io::Write;
    use tempfile::tempdir;

    fn store() -> Arc<ConversationStore> {
        let conn = Connection::open_in_memory().unwrap();
        termhub_store::db::init_db(&conn).unwrap();
        Arc::new(ConversationStore::new(conn))
    }

    fn hub(store: Arc<ConversationStore>) -> Arc<BroadcastHub> {
        Arc::new(BroadcastHub::new(store))
    }

    #[tokio::test]
    async fn start_falls_back_to_existing_file_when_none_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("existing.jsonl");
        std::fs::write(&path, r#"{"type":"assistant","message":{"content":"hi"}}"#.to_string() + "\n").unwrap();

        let store = store();
        let hub = hub(store.clone());
        let handle = start(
            SessionId::new(),
            dir.path().to_path_buf(),
            store,
            hub,
            Duration::from_millis(50),
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        handle.stop();
    }

    #[tokio::test]
    async fn start_errors_when_no_log_present_at_all() {
        let dir = tempdir().unwrap();
        let store = store();
        let hub = hub(store.clone());
        let err = start(
            SessionId::new(),
            dir.path().to_path_buf(),
            store,
            hub,
            Duration::from_millis(30),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "LOG_NOT_FOUND");
    }

    #[tokio::test]
    async fn tail_once_persists_assistant_messages_and_advances_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"type":"assistant","message":{{"content":"first"}}}}"#).unwrap();
        drop(file);

        let store = store();
        let hub = hub(store.clone());
        let mut position = 0u64;
        tail_once(&SessionId::from("s1"), &path, &mut position, &store, &hub)
            .await
            .unwrap();

        let messages = store.list("s1", 10, 0).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "first");
        assert!(position > 0);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, r#"{{"type":"assistant","message":{{"content":"second"}}}}"#).unwrap();
        drop(file);

        tail_once(&SessionId::from("s1"), &path, &mut position, &store, &hub)
            .await
            .unwrap();
        let messages = store.list("s1", 10, 0).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "second");
    }
}
