//! termhub-mux — the Multiplexer Gateway.
//!
//! Wraps an external detachable terminal multiplexer (`tmux` by default) as
//! a subprocess. This crate never links a multiplexer library in-process;
//! every operation is one `ProcessRunner::run` call away from a real
//! `tmux` invocation, which keeps the gateway itself trivially fakeable in
//! tests.

pub mod error;
pub mod gateway;
pub mod runner;
pub mod types;

pub use error::{MuxError, Result};
pub use gateway::MultiplexerGateway;
pub use runner::{ProcessRunner, TokioProcessRunner};
pub use types::PaneRef;

#[cfg(any(test, feature = "test-util"))]
pub use runner::fake;
