//! termhub-adapters — the Tool Adapter Registry.
//!
//! Each supported AI CLI tool gets one `ToolAdapter` implementation: a
//! launch command, a pure output-state classifier, a permission-prompt
//! detector, and an input formatter. Adding a new tool means adding an
//! adapter here, not touching the orchestrator.

pub mod adapter;
pub mod registry;
pub mod tools;
pub mod types;

pub use adapter::ToolAdapter;
pub use registry::{adapter_for, known_tags};
pub use types::OutputState;
