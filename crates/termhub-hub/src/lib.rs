//! termhub-hub — the Broadcast Hub.
//!
//! Fans out terminal snapshots, conversation messages, and typing/status
//! events to a dynamic set of WebSocket observers. Delivery is always a
//! non-blocking `try_send`; an observer whose queue overflows is dropped
//! rather than allowed to slow down every other observer.

pub mod hub;
pub mod observer;
pub mod types;

pub use hub::BroadcastHub;
pub use observer::{Observer, OBSERVER_QUEUE_CAPACITY};
pub use types::{OutboundFrame, Subscription};
