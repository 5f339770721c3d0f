//! The in-process local chat bus.
//!
//! This is the relay's view of the host's chat system: an observer registry
//! for message-received callbacks, a `post` entry point, and an identity
//! table. Delivery runs on a single persistent worker task draining a
//! bounded FIFO queue, so locally-originated messages keep their order and
//! a slow subscriber can never block the producer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::common::messages::LocalChatMessage;
use crate::common::types::{MessageCategory, SubscriptionId};

/// Capacity of the delivery queue. Posts beyond this are dropped with a
/// warning rather than blocking the caller.
pub const LOCAL_QUEUE_CAPACITY: usize = 256;

/// Channel tag applied when a posted message does not name one.
const DEFAULT_CHANNEL_TAG: &str = "#general";

/// A local chat identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    /// Stable lookup key, unique per identity.
    pub key: String,
    /// Display name shown in chat.
    pub name: String,
}

/// Callback invoked for every message that passes through the bus.
pub type LocalCallback = Box<dyn Fn(&LocalChatMessage) + Send + Sync>;

/// The local chat message bus.
pub struct LocalChatBus {
    queue_tx: mpsc::Sender<LocalChatMessage>,
    subscribers: Mutex<Vec<(SubscriptionId, LocalCallback)>>,
    identities: Mutex<HashMap<String, LocalIdentity>>,
    next_subscription: AtomicU64,
}

impl LocalChatBus {
    /// Create the bus and the receiving end of its delivery queue.
    ///
    /// The receiver must be handed to [`LocalChatBus::spawn_worker`] for
    /// messages to be delivered.
    pub fn new() -> (Arc<Self>, mpsc::Receiver<LocalChatMessage>) {
        let (queue_tx, queue_rx) = mpsc::channel(LOCAL_QUEUE_CAPACITY);
        let bus = Arc::new(Self {
            queue_tx,
            subscribers: Mutex::new(Vec::new()),
            identities: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
        });
        (bus, queue_rx)
    }

    /// Spawn the delivery worker.
    pub fn spawn_worker(
        self: &Arc<Self>,
        mut queue_rx: mpsc::Receiver<LocalChatMessage>,
    ) -> JoinHandle<()> {
        let bus = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = queue_rx.recv().await {
                bus.dispatch(&message).await;
            }
            debug!("Local chat delivery worker ended");
        })
    }

    async fn dispatch(&self, message: &LocalChatMessage) {
        let subscribers = self.subscribers.lock().await;
        for (_, callback) in subscribers.iter() {
            callback(message);
        }
    }

    /// Register a message-received callback. Returns the handle used to
    /// deregister it.
    pub async fn subscribe(&self, callback: LocalCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().await.push((id, callback));
        id
    }

    /// Remove a previously registered callback by handle.
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .await
            .retain(|(existing, _)| *existing != id);
    }

    /// Number of live subscriptions.
    #[allow(dead_code)]
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Look up an identity by stable key, creating it on first access.
    pub async fn get_or_create_identity(
        &self,
        stable_key: &str,
        display_name: &str,
    ) -> LocalIdentity {
        let mut identities = self.identities.lock().await;
        identities
            .entry(stable_key.to_string())
            .or_insert_with(|| LocalIdentity {
                key: stable_key.to_string(),
                name: display_name.to_string(),
            })
            .clone()
    }

    /// Post a message into local chat as the given identity.
    ///
    /// The channel tag is taken from a leading `#channel` token when
    /// present. Posted messages flow through the same delivery queue as
    /// everything else, so subscribers (including the relay) see them.
    pub fn post(&self, text: &str, as_identity: &LocalIdentity) {
        let message = LocalChatMessage {
            text: text.to_string(),
            sender: as_identity.name.clone(),
            tag: leading_channel_tag(text),
            category: MessageCategory::Chat,
            temporary: false,
        };
        self.ingest(message);
    }

    /// Enqueue a message for delivery. Never blocks; drops on overflow.
    pub fn ingest(&self, message: LocalChatMessage) {
        if self.queue_tx.try_send(message).is_err() {
            warn!("Local chat queue full, dropping message");
        }
    }
}

/// Extract the leading `#channel` token of a message, if any.
fn leading_channel_tag(text: &str) -> String {
    if text.starts_with('#') {
        text.split_whitespace()
            .next()
            .unwrap_or(DEFAULT_CHANNEL_TAG)
            .to_string()
    } else {
        DEFAULT_CHANNEL_TAG.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn make_message(sender: &str, tag: &str, text: &str) -> LocalChatMessage {
        LocalChatMessage {
            text: text.to_string(),
            sender: sender.to_string(),
            tag: tag.to_string(),
            category: MessageCategory::Chat,
            temporary: false,
        }
    }

    #[tokio::test]
    async fn test_subscribe_and_deliver() {
        let (bus, queue_rx) = LocalChatBus::new();
        let worker = bus.spawn_worker(queue_rx);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        bus.subscribe(Box::new(move |message| {
            let _ = seen_tx.send(message.clone());
        }))
        .await;

        bus.ingest(make_message("Bob", "#Global", "hi"));

        let delivered = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
            .await
            .expect("delivery timed out")
            .expect("channel closed");
        assert_eq!(delivered.sender, "Bob");
        assert_eq!(delivered.text, "hi");

        worker.abort();
    }

    #[tokio::test]
    async fn test_unsubscribe_by_handle() {
        let (bus, _queue_rx) = LocalChatBus::new();

        let first = bus.subscribe(Box::new(|_| {})).await;
        let second = bus.subscribe(Box::new(|_| {})).await;
        assert_eq!(bus.subscriber_count().await, 2);

        bus.unsubscribe(first).await;
        assert_eq!(bus.subscriber_count().await, 1);

        // Removing the same handle again must not touch the survivor.
        bus.unsubscribe(first).await;
        assert_eq!(bus.subscriber_count().await, 1);

        bus.unsubscribe(second).await;
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_identity_created_once() {
        let (bus, _queue_rx) = LocalChatBus::new();

        let first = bus.get_or_create_identity("discord-relay", "Discord").await;
        let second = bus.get_or_create_identity("discord-relay", "Renamed").await;

        assert_eq!(first, second);
        assert_eq!(second.name, "Discord");
    }

    #[tokio::test]
    async fn test_post_derives_tag() {
        let (bus, mut queue_rx) = LocalChatBus::new();
        let identity = bus.get_or_create_identity("discord-relay", "Discord").await;

        bus.post("#Global <b>Alice</b>: hello", &identity);
        let message = queue_rx.recv().await.expect("message enqueued");
        assert_eq!(message.tag, "#Global");
        assert_eq!(message.sender, "Discord");

        bus.post("no channel marker", &identity);
        let message = queue_rx.recv().await.expect("message enqueued");
        assert_eq!(message.tag, "#general");
    }

    #[tokio::test]
    async fn test_ordering_preserved() {
        let (bus, queue_rx) = LocalChatBus::new();
        let worker = bus.spawn_worker(queue_rx);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        bus.subscribe(Box::new(move |message| {
            let _ = seen_tx.send(message.text.clone());
        }))
        .await;

        for i in 0..5 {
            bus.ingest(make_message("Bob", "#Global", &format!("message {i}")));
        }

        for i in 0..5 {
            let text = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
                .await
                .expect("delivery timed out")
                .expect("channel closed");
            assert_eq!(text, format!("message {i}"));
        }

        worker.abort();
    }
}
