//! Stream merger
//!
//! Produces the unified thread set reactively from the three
//! independently-updating sources. On any upstream change the full set is
//! recomputed from the current snapshots, with no incremental patching, so the
//! result never depends on notification arrival order and a transient
//! inconsistency (profile snapshot lagging behind a conversation snapshot)
//! self-heals on the next notification.
//!
//! Work items already linked to a conversation are suppressed from the
//! unified set: the conversation-derived thread is the single
//! representation of that obligation.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use crate::model::{ContactProfile, ConversationRecord, Thread, WorkItemRecord};
use crate::normalize::ThreadNormalizer;
use crate::profiles::ProfileIndex;

/// Pure merge of the three snapshots into the unified thread set
///
/// Deterministic: ordered by recency, id as tiebreaker. Running this twice
/// on the same inputs yields an identical set.
pub fn merge_snapshots(
    normalizer: &ThreadNormalizer,
    conversations: &[ConversationRecord],
    work_items: &[WorkItemRecord],
    profiles: &[ContactProfile],
    now: DateTime<Utc>,
) -> Vec<Thread> {
    let index = ProfileIndex::from_snapshot(profiles);

    let mut threads: Vec<Thread> = conversations
        .iter()
        .filter(|record| !record.id.is_empty())
        .map(|record| normalizer.conversation(record, &index, now))
        .collect();

    // Work items represented by a conversation are suppressed as
    // standalone threads.
    let linked: HashSet<String> = threads
        .iter()
        .filter_map(|thread| thread.linked_work_item_id.clone())
        .collect();

    threads.extend(
        work_items
            .iter()
            .filter(|record| !record.id.is_empty() && !linked.contains(record.id.as_str()))
            .map(|record| normalizer.work_item(record, now)),
    );

    threads.sort_by(|a, b| {
        b.last_activity
            .cmp(&a.last_activity)
            .then_with(|| a.id.cmp(&b.id))
    });
    threads
}

/// Reactive merger over the three source feeds
///
/// Owns one receiver per source and a `watch` publisher for the unified
/// set. [`StreamMerger::run`] drives the rebuild loop until every source
/// that can still wake it has closed.
pub struct StreamMerger {
    normalizer: ThreadNormalizer,
    conversations: watch::Receiver<Vec<ConversationRecord>>,
    work_items: watch::Receiver<Vec<WorkItemRecord>>,
    profiles: watch::Receiver<Vec<ContactProfile>>,
    out: watch::Sender<Vec<Thread>>,
}

impl StreamMerger {
    pub fn new(
        normalizer: ThreadNormalizer,
        conversations: watch::Receiver<Vec<ConversationRecord>>,
        work_items: watch::Receiver<Vec<WorkItemRecord>>,
        profiles: watch::Receiver<Vec<ContactProfile>>,
    ) -> Self {
        let (out, _) = watch::channel(Vec::new());
        Self {
            normalizer,
            conversations,
            work_items,
            profiles,
            out,
        }
    }

    /// Subscribe to the unified thread set
    pub fn subscribe(&self) -> watch::Receiver<Vec<Thread>> {
        self.out.subscribe()
    }

    /// Rebuild the unified set from the current snapshots and publish it
    fn rebuild(&mut self, now: DateTime<Utc>) {
        let conversations = self.conversations.borrow_and_update().clone();
        let work_items = self.work_items.borrow_and_update().clone();
        let profiles = self.profiles.borrow_and_update().clone();

        let unified = merge_snapshots(
            &self.normalizer,
            &conversations,
            &work_items,
            &profiles,
            now,
        );
        debug!(
            conversations = conversations.len(),
            work_items = work_items.len(),
            profiles = profiles.len(),
            unified = unified.len(),
            "rebuilt unified thread set"
        );
        self.out.send_replace(unified);
    }

    /// Drive the rebuild loop
    ///
    /// Recomputes once per notification. A closed source stops waking the
    /// loop but does not stop it: the profile directory going away must
    /// degrade to record-provided names, not kill the inbox. The loop ends
    /// when all three sources are closed.
    pub async fn run(mut self) {
        self.rebuild(Utc::now());

        let mut conversations_open = true;
        let mut work_items_open = true;
        let mut profiles_open = true;

        while conversations_open || work_items_open || profiles_open {
            tokio::select! {
                changed = self.conversations.changed(), if conversations_open => {
                    conversations_open = changed.is_ok();
                }
                changed = self.work_items.changed(), if work_items_open => {
                    work_items_open = changed.is_ok();
                }
                changed = self.profiles.changed(), if profiles_open => {
                    profiles_open = changed.is_ok();
                }
            }
            self.rebuild(Utc::now());
        }
        debug!("all sources closed, merger stopping");
    }
}
