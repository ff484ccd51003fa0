use std::sync::RwLock;

use tokio::sync::mpsc;

use crate::types::{OutboundFrame, Subscription};

/// Bounded outbound queue depth. An observer that falls this far behind is
/// treated as a slow consumer and dropped — back-pressure by disconnect,
/// not by blocking publishers.
pub const OBSERVER_QUEUE_CAPACITY: usize = 256;

pub struct Observer {
    pub subscription: RwLock<Option<Subscription>>,
    pub tx: mpsc::Sender<OutboundFrame>,
}

impl Observer {
    pub fn new() -> (Self, mpsc::Receiver<OutboundFrame>) {
        Self::with_capacity(OBSERVER_QUEUE_CAPACITY)
    }

    /// Same as `new`, but with an explicit queue capacity — lets tests
    /// exercise the full-queue/drop-observer path without actually
    /// publishing 256 events.
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                subscription: RwLock::new(None),
                tx,
            },
            rx,
        )
    }

    pub fn matches(&self, session_id: &str) -> bool {
        match &*self.subscription.read().unwrap() {
            Some(Subscription::All) => true,
            Some(Subscription::Session(sid)) => sid == session_id,
            None => false,
        }
    }
}
