//! Source subscription feeds
//!
//! The three raw collections (conversations, work items, contact profiles)
//! reach this core as *full-snapshot* subscriptions: every change delivers
//! the complete current collection, never a delta. [`SourceFeed`] is the
//! in-process publisher for that contract, backed by a `tokio::sync::watch`
//! channel; subscribing hands out a receiver, dropping the receiver is the
//! unsubscribe.
//!
//! Storage adapters (whatever technology backs the real collections) sit
//! outside this crate and push snapshots into a feed; tests and the daemon
//! publish directly.

use tokio::sync::watch;

use crate::model::Message;

/// In-process full-snapshot publisher for one source collection
#[derive(Debug)]
pub struct SourceFeed<T> {
    tx: watch::Sender<Vec<T>>,
}

impl<T: Clone + Send + Sync + 'static> SourceFeed<T> {
    /// Create a feed with an empty initial snapshot
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx }
    }

    /// Subscribe to the feed; the receiver sees the current snapshot
    /// immediately and every subsequent publish
    pub fn subscribe(&self) -> watch::Receiver<Vec<T>> {
        self.tx.subscribe()
    }

    /// Publish a new full snapshot, replacing the previous one
    ///
    /// Publishing with no live subscribers is fine; the snapshot is kept for
    /// the next subscriber.
    pub fn publish(&self, snapshot: Vec<T>) {
        self.tx.send_replace(snapshot);
    }

    /// Current snapshot (mainly for tests and diagnostics)
    pub fn current(&self) -> Vec<T> {
        self.tx.borrow().clone()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for SourceFeed<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-thread live message stream
///
/// Opening a thread subscribes to its message list; opening a different
/// thread drops the previous receiver, which is the cancellation contract:
/// no listener outlives the thread view it belongs to.
pub trait MessageSource: Send + Sync {
    /// Subscribe to the full message list of one thread
    fn subscribe(&self, thread_id: &str) -> watch::Receiver<Vec<Message>>;
}

/// In-memory [`MessageSource`] keyed by thread id
#[derive(Default)]
pub struct InMemoryMessageSource {
    feeds: std::sync::Mutex<std::collections::HashMap<String, SourceFeed<Message>>>,
}

impl InMemoryMessageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the full message list for a thread
    pub fn publish(&self, thread_id: &str, messages: Vec<Message>) {
        let mut feeds = self.feeds.lock().expect("message source lock poisoned");
        feeds
            .entry(thread_id.to_string())
            .or_default()
            .publish(messages);
    }
}

impl MessageSource for InMemoryMessageSource {
    fn subscribe(&self, thread_id: &str) -> watch::Receiver<Vec<Message>> {
        let mut feeds = self.feeds.lock().expect("message source lock poisoned");
        feeds.entry(thread_id.to_string()).or_default().subscribe()
    }
}
