//! The only seam between this crate and the real `tmux` binary.
//!
//! Every gateway operation funnels its subprocess invocation through
//! `ProcessRunner` so tests can substitute a fake instead of requiring a
//! real multiplexer on the test host.

use async_trait::async_trait;

/// Outcome of running a multiplexer subcommand.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `bin` with `args`, capturing stdout/stderr, and report whether
    /// the process exited successfully. Never retries; never holds a lock
    /// across the call.
    async fn run(&self, bin: &str, args: &[&str]) -> std::io::Result<RunOutput>;
}

/// Invokes the real external multiplexer binary via `tokio::process::Command`.
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, bin: &str, args: &[&str]) -> std::io::Result<RunOutput> {
        let output = tokio::process::Command::new(bin)
            .args(args)
            .output()
            .await?;

        Ok(RunOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every invocation and returns scripted responses keyed by the
    /// joined argument string, falling back to a default success response.
    #[derive(Default)]
    pub struct FakeRunner {
        pub calls: Mutex<Vec<Vec<String>>>,
        pub scripted: Mutex<HashMap<String, RunOutput>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(&self, args_joined: &str, output: RunOutput) {
            self.scripted
                .lock()
                .unwrap()
                .insert(args_joined.to_string(), output);
        }
    }

    #[async_trait]
    impl ProcessRunner for FakeRunner {
        async fn run(&self, _bin: &str, args: &[&str]) -> std::io::Result<RunOutput> {
            let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
            let joined = owned.join(" ");
            self.calls.lock().unwrap().push(owned);

            Ok(self
                .scripted
                .lock()
                .unwrap()
                .get(&joined)
                .cloned()
                .unwrap_or(RunOutput {
                    success: true,
                    stdout: String::new(),
                    stderr: String::new(),
                }))
        }
    }
}
