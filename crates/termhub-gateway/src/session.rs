//! In-memory Session registry owned by the Session Orchestrator. Not
//! persisted — only the conversation log and watermark (termhub-store) are
//! durable; the session record itself (status, pane_ref, timestamps) lives
//! for the process lifetime, matching SPEC_FULL.md §3's Session entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use termhub_core::SessionId;
use termhub_mux::PaneRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Detached,
    Terminated,
}

/// Which message source is authoritative for a session, decided once at
/// creation time and never re-evaluated — resolves the distilled spec's
/// open question on C/D double-emission (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    Tailer,
    ScreenScrape,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: SessionId,
    pub tool: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub pane_ref: PaneRef,
}

/// Wire shape for `{id, name, tool, status, created}` and for list entries.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: String,
    pub name: Option<String>,
    pub tool: String,
    pub status: SessionStatus,
    pub created: DateTime<Utc>,
}

impl From<&SessionRecord> for SessionView {
    fn from(r: &SessionRecord) -> Self {
        Self {
            id: r.id.to_string(),
            name: r.name.clone(),
            tool: r.tool.clone(),
            status: r.status,
            created: r.created_at,
        }
    }
}

/// Holds the running watcher task handles for one session so the
/// orchestrator can cancel them on deletion. At most one of `tailer` /
/// `scrape` is the authoritative message source (see `source`); the other
/// slot, if present, is only feeding the terminal-snapshot cadence.
pub struct MonitorHandle {
    pub source: MessageSource,
    pub tailer: Option<termhub_watch::TailerHandle>,
    pub scrape: Option<termhub_watch::ScrapeHandle>,
}

impl MonitorHandle {
    pub fn stop(&self) {
        if let Some(t) = &self.tailer {
            t.stop();
        }
        if let Some(s) = &self.scrape {
            s.stop();
        }
    }
}
