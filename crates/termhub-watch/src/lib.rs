//! termhub-watch — the dual-channel message extraction pipeline.
//!
//! Two independent message sources feed the Conversation Store and
//! Broadcast Hub for a session: the Structured Log Tailer (`tailer`,
//! Component C), authoritative when a tool writes its own per-session
//! event log, and the Screen-Scrape Monitor (`scrape`, Component D), the
//! fallback (and always-on terminal-snapshot source) otherwise. The Session
//! Orchestrator decides which one is authoritative for a given session and
//! starts the other purely for its terminal-snapshot side effect.

pub mod error;
pub mod scrape;
pub mod tailer;
pub mod types;

pub use error::{Result, WatchError};
pub use scrape::ScrapeHandle;
pub use tailer::TailerHandle;
