//! The Multiplexer Gateway — the only place in this workspace that talks to
//! the external detachable terminal multiplexer.
//!
//! Every public method shells out through a `ProcessRunner`; no method holds
//! a lock across the subprocess call, and none of them retry internally —
//! callers decide whether a failure is worth retrying (the Session
//! Orchestrator retries `create` once, with a suffixed id, on
//! `AlreadyExists`).

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{MuxError, Result};
use crate::runner::ProcessRunner;
use crate::types::PaneRef;

/// Wraps an external multiplexer binary (`tmux` by default).
pub struct MultiplexerGateway {
    bin: String,
    runner: Arc<dyn ProcessRunner>,
}

impl MultiplexerGateway {
    pub fn new(bin: impl Into<String>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            bin: bin.into(),
            runner,
        }
    }

    /// Create a detached session named `session_id`, with one window named
    /// after `tool_tag`.
    pub async fn create(&self, session_id: &str, tool_tag: &str) -> Result<PaneRef> {
        if self.exists(session_id).await? {
            return Err(MuxError::AlreadyExists(session_id.to_string()));
        }

        let out = self
            .run(&["new-session", "-d", "-s", session_id, "-n", tool_tag])
            .await?;

        if !out.success {
            return Err(MuxError::BackendUnavailable(out.stderr));
        }

        debug!(session_id, tool_tag, "created multiplexer session");
        Ok(PaneRef::for_session(session_id))
    }

    /// Send `text` as a shell-style command: interpreted characters followed
    /// by a submit key.
    pub async fn send_command(&self, pane: &PaneRef, text: &str) -> Result<()> {
        let out = self
            .run(&["send-keys", "-t", pane.as_str(), text, "Enter"])
            .await?;
        self.expect_success(out, pane)
    }

    /// Send `text` as raw literal characters, then submit with a *separate*
    /// send-keys call. The split matters: a single call with an embedded
    /// newline would fragment the input before the multiplexer sees it all.
    pub async fn send_literal(&self, pane: &PaneRef, text: &str) -> Result<()> {
        let out = self
            .run(&["send-keys", "-l", "-t", pane.as_str(), "--", text])
            .await?;
        self.expect_success(out, pane)?;

        let out = self.run(&["send-keys", "-t", pane.as_str(), "Enter"]).await?;
        self.expect_success(out, pane)
    }

    /// Send a single named key (e.g. `Tab`, `Enter`, `Escape`).
    pub async fn send_key(&self, pane: &PaneRef, key_name: &str) -> Result<()> {
        let out = self.run(&["send-keys", "-t", pane.as_str(), key_name]).await?;
        self.expect_success(out, pane)
    }

    /// Return the current visible pane content as one text string.
    pub async fn snapshot(&self, pane: &PaneRef) -> Result<String> {
        let out = self.run(&["capture-pane", "-t", pane.as_str(), "-p"]).await?;
        if !out.success {
            return Err(MuxError::NotFound(pane.to_string()));
        }
        Ok(out.stdout)
    }

    /// Does a session with this name exist in the multiplexer?
    pub async fn exists(&self, session_id: &str) -> Result<bool> {
        let out = self.run(&["has-session", "-t", session_id]).await?;
        Ok(out.success)
    }

    /// Kill a session by name. Idempotent from the caller's perspective: a
    /// missing session is reported as `NotFound`, not silently ignored,
    /// since the Session Orchestrator needs to know whether it actually
    /// tore anything down.
    pub async fn kill(&self, session_id: &str) -> Result<()> {
        let out = self.run(&["kill-session", "-t", session_id]).await?;
        if !out.success {
            return Err(MuxError::NotFound(session_id.to_string()));
        }
        Ok(())
    }

    /// Attach to a session natively, replacing the current terminal. Built
    /// for completeness with the external collaborator contract; the
    /// HTTP/WebSocket surface never calls this itself — attach is a
    /// native-shell operation, not something proxied over the wire.
    pub async fn attach(&self, session_id: &str) -> Result<()> {
        let out = self.run(&["attach-session", "-t", session_id]).await?;
        if !out.success {
            return Err(MuxError::NotFound(session_id.to_string()));
        }
        Ok(())
    }

    /// Resolve the pane reference for a session that may already exist in
    /// the multiplexer (used on the `AlreadyExists` reattach path).
    pub async fn list_panes(&self, session_id: &str) -> Result<Vec<String>> {
        let out = self
            .run(&[
                "list-panes",
                "-t",
                session_id,
                "-F",
                "#{pane_id}",
            ])
            .await?;
        if !out.success {
            return Err(MuxError::NotFound(session_id.to_string()));
        }
        Ok(out.stdout.lines().map(str::to_string).collect())
    }

    pub async fn list_windows(&self, session_id: &str) -> Result<Vec<String>> {
        let out = self
            .run(&[
                "list-windows",
                "-t",
                session_id,
                "-F",
                "#{window_name}",
            ])
            .await?;
        if !out.success {
            return Err(MuxError::NotFound(session_id.to_string()));
        }
        Ok(out.stdout.lines().map(str::to_string).collect())
    }

    async fn run(&self, args: &[&str]) -> Result<crate::runner::RunOutput> {
        self.runner.run(&self.bin, args).await.map_err(|e| {
            warn!(error = %e, "multiplexer subprocess failed to spawn");
            MuxError::BackendUnavailable(e.to_string())
        })
    }

    fn expect_success(&self, out: crate::runner::RunOutput, pane: &PaneRef) -> Result<()> {
        if out.success {
            Ok(())
        } else {
            Err(MuxError::NotFound(pane.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;
    use crate::runner::RunOutput;

    fn gateway(fake: Arc<FakeRunner>) -> MultiplexerGateway {
        MultiplexerGateway::new("tmux", fake)
    }

    #[tokio::test]
    async fn create_succeeds_when_session_absent() {
        let fake = Arc::new(FakeRunner::new());
        fake.script(
            "has-session -t demo",
            RunOutput {
                success: false,
                stdout: String::new(),
                stderr: "can't find session".into(),
            },
        );
        let gw = gateway(fake);
        let pane = gw.create("demo", "claude").await.unwrap();
        assert_eq!(pane.as_str(), "demo");
    }

    #[tokio::test]
    async fn create_fails_when_session_already_exists() {
        let fake = Arc::new(FakeRunner::new());
        fake.script(
            "has-session -t demo",
            RunOutput {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            },
        );
        let gw = gateway(fake);
        let err = gw.create("demo", "claude").await.unwrap_err();
        assert_eq!(err.code(), "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn send_literal_issues_two_separate_calls() {
        let fake = Arc::new(FakeRunner::new());
        let gw = gateway(Arc::clone(&fake));
        let pane = PaneRef::for_session("demo");
        gw.send_literal(&pane, "hello\nworld").await.unwrap();

        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].contains(&"-l".to_string()));
        assert_eq!(calls[1].last().unwrap(), "Enter");
    }

    #[tokio::test]
    async fn snapshot_returns_captured_text() {
        let fake = Arc::new(FakeRunner::new());
        fake.script(
            "capture-pane -t demo -p",
            RunOutput {
                success: true,
                stdout: "$ echo hi\nhi\n".into(),
                stderr: String::new(),
            },
        );
        let gw = gateway(fake);
        let pane = PaneRef::for_session("demo");
        let out = gw.snapshot(&pane).await.unwrap();
        assert_eq!(out, "$ echo hi\nhi\n");
    }

    #[tokio::test]
    async fn kill_missing_session_is_not_found() {
        let fake = Arc::new(FakeRunner::new());
        fake.script(
            "kill-session -t ghost",
            RunOutput {
                success: false,
                stdout: String::new(),
                stderr: "can't find session".into(),
            },
        );
        let gw = gateway(fake);
        let err = gw.kill("ghost").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
