use std::sync::Arc;

use dashmap::DashMap;
use termhub_core::ObserverId;
use termhub_store::{ConversationStore, Message};
use tokio::sync::mpsc;
use tracing::debug;

use crate::observer::Observer;
use crate::types::{OutboundFrame, Subscription};

/// Many-to-many event fan-out between the session-side publishers (the
/// Structured Log Tailer, the Screen-Scrape Monitor, and the Session
/// Orchestrator) and the dynamic set of observers attached over WebSocket.
pub struct BroadcastHub {
    observers: DashMap<ObserverId, Observer>,
    store: Arc<ConversationStore>,
}

impl BroadcastHub {
    pub fn new(store: Arc<ConversationStore>) -> Self {
        Self {
            observers: DashMap::new(),
            store,
        }
    }

    /// Register a new observer and return its id plus the receiving half of
    /// its outbound queue. The caller (the WS connection task) drains the
    /// receiver and forwards frames to the transport.
    pub fn register(&self) -> (ObserverId, mpsc::Receiver<OutboundFrame>) {
        self.register_with_capacity(crate::observer::OBSERVER_QUEUE_CAPACITY)
    }

    /// Same as `register`, but with an explicit outbound queue capacity —
    /// lets tests reproduce a slow consumer (a queue of 1) without
    /// publishing hundreds of events.
    pub fn register_with_capacity(&self, capacity: usize) -> (ObserverId, mpsc::Receiver<OutboundFrame>) {
        let id = ObserverId::new();
        let (observer, rx) = Observer::with_capacity(capacity);
        self.observers.insert(id.clone(), observer);
        (id, rx)
    }

    pub fn unregister(&self, id: &ObserverId) {
        self.observers.remove(id);
    }

    /// Subscribe an observer to a session and immediately replay its
    /// current message list. Replacing an existing subscription is
    /// intentional: a client may switch which session it's watching
    /// without reconnecting.
    pub fn subscribe(&self, id: &ObserverId, session_id: &str) {
        let Some(observer) = self.observers.get(id) else {
            return;
        };
        *observer.subscription.write().unwrap() = Some(Subscription::Session(session_id.to_string()));

        let messages = self.store.list(session_id, i64::MAX, 0).unwrap_or_default();
        let frame = OutboundFrame::messages_replay(session_id, &messages);
        let _ = observer.tx.try_send(frame);
    }

    /// Push the current message list for `session_id` to one observer
    /// without touching its subscription — backs the WS `getMessages`
    /// action, which re-fetches without re-subscribing.
    pub fn replay_messages(&self, id: &ObserverId, session_id: &str) {
        let Some(observer) = self.observers.get(id) else {
            return;
        };
        let messages = self.store.list(session_id, i64::MAX, 0).unwrap_or_default();
        let frame = OutboundFrame::messages_replay(session_id, &messages);
        let _ = observer.tx.try_send(frame);
    }

    /// Subscribe to lifecycle/status events for every session.
    pub fn subscribe_all(&self, id: &ObserverId) {
        if let Some(observer) = self.observers.get(id) {
            *observer.subscription.write().unwrap() = Some(Subscription::All);
        }
    }

    pub fn unsubscribe(&self, id: &ObserverId) {
        if let Some(observer) = self.observers.get(id) {
            *observer.subscription.write().unwrap() = None;
        }
    }

    pub fn publish_terminal_output(&self, session_id: &str, output: String) {
        self.publish(session_id, || OutboundFrame::terminal_output(session_id, output.clone()));
    }

    pub fn publish_new_message(&self, session_id: &str, message: &Message) {
        self.publish(session_id, || OutboundFrame::new_message(session_id, message));
    }

    pub fn publish_typing(&self, session_id: &str) {
        self.publish(session_id, || OutboundFrame::typing(session_id));
    }

    pub fn publish_stop_typing(&self, session_id: &str) {
        self.publish(session_id, || OutboundFrame::stop_typing(session_id));
    }

    pub fn publish_session_terminated(&self, session_id: &str) {
        self.publish(session_id, || OutboundFrame::session_terminated(session_id));
    }

    /// Non-blocking fan-out to every observer subscribed to `session_id`
    /// (or to `All`). A full queue (or a closed receiver) drops that
    /// observer from the registry — the connection task will notice its
    /// channel closed on its next read and tear down the transport.
    fn publish(&self, session_id: &str, make_frame: impl Fn() -> OutboundFrame) {
        let mut dead = Vec::new();

        for entry in self.observers.iter() {
            if !entry.value().matches(session_id) {
                continue;
            }
            if entry.value().tx.try_send(make_frame()).is_err() {
                dead.push(entry.key().clone());
            }
        }

        for id in dead {
            debug!(session_id, observer = %id, "dropping slow/closed observer");
            self.observers.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn hub() -> BroadcastHub {
        let conn = Connection::open_in_memory().unwrap();
        termhub_store::db::init_db(&conn).unwrap();
        BroadcastHub::new(Arc::new(ConversationStore::new(conn)))
    }

    #[tokio::test]
    async fn subscribe_replays_existing_messages() {
        let hub = hub();
        hub.store.append_agent("s1", "hello", false).unwrap();

        let (id, mut rx) = hub.register();
        hub.subscribe(&id, "s1");

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.action, "messages");
    }

    #[tokio::test]
    async fn publish_only_reaches_matching_subscription() {
        let hub = hub();
        let (id_a, mut rx_a) = hub.register();
        let (id_b, mut rx_b) = hub.register();
        hub.subscribe(&id_a, "s1");
        hub.subscribe(&id_b, "s2");

        // drain the initial replay frame from both
        rx_a.recv().await.unwrap();
        rx_b.recv().await.unwrap();

        let msg = hub.store.append_agent("s1", "update", false).unwrap();
        hub.publish_new_message("s1", &msg);

        let frame = rx_a.recv().await.unwrap();
        assert_eq!(frame.action, "newMessage");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_stops_future_delivery() {
        let hub = hub();
        let (id, _rx) = hub.register();
        hub.subscribe(&id, "s1");
        hub.unregister(&id);

        let msg = hub.store.append_agent("s1", "update", false).unwrap();
        // Should not panic even though the observer is gone.
        hub.publish_new_message("s1", &msg);
    }

    #[tokio::test]
    async fn slow_observer_is_dropped_once_its_queue_overflows() {
        let hub = hub();
        // Capacity 1 and never drained — the S6 slow-consumer scenario.
        let (id, mut rx) = hub.register_with_capacity(1);
        hub.subscribe_all(&id);

        let msg = hub.store.append_agent("s1", "one", false).unwrap();
        hub.publish_new_message("s1", &msg); // fills the one-slot queue
        hub.publish_new_message("s1", &msg); // queue full: try_send fails, observer dropped
        hub.publish_new_message("s1", &msg); // observer already gone: must be a silent no-op

        assert_eq!(hub.observers.len(), 0);

        // The single frame that made it through before the drop is still
        // readable, and the channel is now closed from the sender side.
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.action, "newMessage");
        assert!(rx.recv().await.is_none());
    }
}
