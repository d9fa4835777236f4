//! Outbound send pipeline
//!
//! Orchestrates one outbound message: optimistic local application,
//! external delivery, canonical persistence, and the post-delivery status
//! side effects.
//!
//! ## Guarantees
//!
//! 1. Empty drafts (no text, no media) are rejected before any side effect.
//! 2. One send in flight per pipeline instance; a concurrent second send is
//!    rejected, not queued.
//! 3. The composer is cleared immediately; a delivery failure restores the
//!    draft so nothing the operator typed is silently lost.
//! 4. Delivery success is the sole gate for local mutation: a failed
//!    delivery leaves no message record and touches neither status nor
//!    assignee.
//! 5. After a successful delivery, persistence failures are logged and
//!    swallowed: the message *was* delivered, and the canonical copy will
//!    arrive through the snapshot stream; surfacing an error here would be
//!    misleading.
//!
//! The optimistic copy lives in a [`PendingOverlay`] applied on top of the
//! last confirmed message snapshot and is dropped once the canonical echo
//! with the same id arrives. The canonical snapshot is never mutated from
//! the optimistic path.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DeskError, Result};
use crate::model::{DeliveryKind, Message, Thread, ThreadStatus};
use crate::status::{apply_send_effects, SendEffects};

/// Composer state for one thread view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub text: String,
    pub media_ref: Option<String>,
    pub quoted_message_id: Option<String>,
}

impl Draft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Empty text with no media is a no-op draft
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.media_ref.is_none()
    }
}

/// Outbound delivery request, one per send attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequest {
    pub target_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_message_id: Option<String>,
    pub kind: DeliveryKind,
}

/// Delivery channel verdict
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponse {
    pub success: bool,
    pub error_message: Option<String>,
}

impl DeliveryResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(reason.into()),
        }
    }
}

/// External delivery channel for outbound messages
///
/// Synchronous from the pipeline's perspective: the call is awaited and its
/// verdict gates every local mutation, whatever the underlying transport.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, request: DeliveryRequest) -> Result<DeliveryResponse>;
}

/// Canonical persistence writes
///
/// Fire-and-forget: the pipeline logs failures and does not retry. The
/// canonical copy flows back through the source subscriptions.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn append_message(&self, thread_id: &str, message: &Message) -> Result<()>;

    async fn update_thread_preview(
        &self,
        thread_id: &str,
        preview: &str,
        last_activity: DateTime<Utc>,
    ) -> Result<()>;

    async fn set_status_and_assignee(
        &self,
        thread_id: &str,
        status: ThreadStatus,
        assignee: &str,
    ) -> Result<()>;

    async fn clear_unread(&self, thread_id: &str) -> Result<()>;
}

/// Pending optimistic messages layered over the confirmed snapshot
#[derive(Debug, Default)]
pub struct PendingOverlay {
    pending: Vec<Message>,
}

impl PendingOverlay {
    pub fn push(&mut self, message: Message) {
        self.pending.push(message);
    }

    /// Drop pending entries whose canonical echo has arrived
    pub fn reconcile(&mut self, canonical: &[Message]) {
        self.pending
            .retain(|pending| !canonical.iter().any(|m| m.id == pending.id));
    }

    /// Confirmed snapshot with the pending entries merged in
    ///
    /// Ordered by timestamp ascending and deduplicated by id, so a
    /// duplicate local echo converges to one visual entry.
    pub fn merged(&self, canonical: &[Message]) -> Vec<Message> {
        let mut seen = std::collections::HashSet::new();
        let mut merged: Vec<Message> = canonical
            .iter()
            .chain(self.pending.iter())
            .filter(|message| seen.insert(message.id.clone()))
            .cloned()
            .collect();
        merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        merged
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Result of a successful send
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// The optimistic local copy (canonical echo converges on its id)
    pub message: Message,
    /// Status/assignee side effects applied after delivery
    pub effects: SendEffects,
}

/// Per-open-thread send pipeline
pub struct SendPipeline {
    thread_id: String,
    delivery: Arc<dyn DeliveryChannel>,
    persistence: Arc<dyn Persistence>,
    composer: std::sync::Mutex<Draft>,
    overlay: std::sync::Mutex<PendingOverlay>,
    in_flight: tokio::sync::Mutex<()>,
}

impl SendPipeline {
    pub fn new(
        thread_id: impl Into<String>,
        delivery: Arc<dyn DeliveryChannel>,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            delivery,
            persistence,
            composer: std::sync::Mutex::new(Draft::default()),
            overlay: std::sync::Mutex::new(PendingOverlay::default()),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Replace the composer draft
    pub fn set_draft(&self, draft: Draft) {
        *self.composer.lock().expect("composer lock poisoned") = draft;
    }

    /// Current composer draft
    pub fn draft(&self) -> Draft {
        self.composer.lock().expect("composer lock poisoned").clone()
    }

    /// Reconcile the overlay against a fresh canonical snapshot
    pub fn reconcile(&self, canonical: &[Message]) {
        self.overlay
            .lock()
            .expect("overlay lock poisoned")
            .reconcile(canonical);
    }

    /// Canonical snapshot with pending optimistic messages applied
    pub fn merged_view(&self, canonical: &[Message]) -> Vec<Message> {
        self.overlay
            .lock()
            .expect("overlay lock poisoned")
            .merged(canonical)
    }

    /// Number of optimistic messages not yet confirmed
    pub fn pending_count(&self) -> usize {
        self.overlay.lock().expect("overlay lock poisoned").len()
    }

    /// Send the current draft to `thread`'s contact
    ///
    /// `thread` is the session's working copy; on success its preview,
    /// status and assignee reflect the applied side effects.
    pub async fn send(&self, thread: &mut Thread, sender: &str) -> Result<SendOutcome> {
        if self.draft().is_empty() {
            return Err(DeskError::EmptyMessage);
        }

        // Single-flight per open thread view.
        let _in_flight = self
            .in_flight
            .try_lock()
            .map_err(|_| DeskError::SendInFlight(self.thread_id.clone()))?;

        // Clear the composer immediately, independent of the outcome; the
        // draft is restored below if delivery fails.
        let draft = std::mem::take(&mut *self.composer.lock().expect("composer lock poisoned"));

        let request = DeliveryRequest {
            target_id: self.thread_id.clone(),
            text: if draft.text.is_empty() {
                None
            } else {
                Some(draft.text.clone())
            },
            media_ref: draft.media_ref.clone(),
            quoted_message_id: draft.quoted_message_id.clone(),
            kind: if draft.media_ref.is_some() {
                DeliveryKind::Media
            } else {
                DeliveryKind::Chat
            },
        };

        let verdict = self.delivery.deliver(request).await;
        let rejection = match verdict {
            Ok(response) if response.success => None,
            Ok(response) => Some(
                response
                    .error_message
                    .unwrap_or_else(|| "delivery failed".to_string()),
            ),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = rejection {
            // Abort before any local mutation; give the draft back.
            *self.composer.lock().expect("composer lock poisoned") = draft;
            return Err(DeskError::DeliveryRejected(reason));
        }

        // Delivery confirmed: apply the optimistic copy. Everything from
        // here on is best-effort; the canonical echo will catch up.
        let message = Message::outbound(draft.text, draft.media_ref, draft.quoted_message_id);
        self.overlay
            .lock()
            .expect("overlay lock poisoned")
            .push(message.clone());

        let preview = if message.text.is_empty() {
            "\u{1F4CE} Attachment".to_string() // 📎
        } else {
            message.text.clone()
        };
        thread.last_message_preview = preview.clone();
        thread.last_activity = message.timestamp;

        if let Err(e) = self.persistence.append_message(&self.thread_id, &message).await {
            warn!(thread = %self.thread_id, error = %e, "optimistic message write failed");
        }
        if let Err(e) = self
            .persistence
            .update_thread_preview(&self.thread_id, &preview, message.timestamp)
            .await
        {
            warn!(thread = %self.thread_id, error = %e, "thread preview update failed");
        }

        let effects = apply_send_effects(thread, sender);
        if !effects.is_empty() {
            debug!(
                thread = %self.thread_id,
                assigned = ?effects.assigned,
                activated = effects.activated,
                "applying post-send side effects"
            );
            if let Err(e) = self
                .persistence
                .set_status_and_assignee(&self.thread_id, thread.status, &thread.assignee)
                .await
            {
                warn!(thread = %self.thread_id, error = %e, "status/assignee update failed");
            }
        }

        Ok(SendOutcome { message, effects })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ThreadStatus, UNASSIGNED};
    use chrono::Utc;
    use std::collections::BTreeSet;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    fn thread(status: ThreadStatus, assignee: &str) -> Thread {
        Thread {
            id: "c-1".to_string(),
            display_name: "Ana".to_string(),
            avatar_url: String::new(),
            last_message_preview: "old".to_string(),
            last_activity: Utc::now(),
            last_activity_label: String::new(),
            assignee: assignee.to_string(),
            sector: String::new(),
            tags: BTreeSet::new(),
            unread_count: 0,
            status,
            is_group: false,
            is_work_item: false,
            linked_work_item_id: None,
        }
    }

    #[derive(Default)]
    struct FakeDelivery {
        fail_with: Option<String>,
        requests: StdMutex<Vec<DeliveryRequest>>,
    }

    #[async_trait]
    impl DeliveryChannel for FakeDelivery {
        async fn deliver(&self, request: DeliveryRequest) -> Result<DeliveryResponse> {
            self.requests.lock().unwrap().push(request);
            match &self.fail_with {
                Some(reason) => Ok(DeliveryResponse::rejected(reason.clone())),
                None => Ok(DeliveryResponse::ok()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingPersistence {
        appended: StdMutex<Vec<Message>>,
        status_writes: StdMutex<Vec<(ThreadStatus, String)>>,
        fail_appends: bool,
    }

    #[async_trait]
    impl Persistence for RecordingPersistence {
        async fn append_message(&self, _thread_id: &str, message: &Message) -> Result<()> {
            if self.fail_appends {
                return Err(DeskError::Store("disk full".into()));
            }
            self.appended.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn update_thread_preview(
            &self,
            _thread_id: &str,
            _preview: &str,
            _last_activity: DateTime<Utc>,
        ) -> Result<()> {
            Ok(())
        }

        async fn set_status_and_assignee(
            &self,
            _thread_id: &str,
            status: ThreadStatus,
            assignee: &str,
        ) -> Result<()> {
            self.status_writes
                .lock()
                .unwrap()
                .push((status, assignee.to_string()));
            Ok(())
        }

        async fn clear_unread(&self, _thread_id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn pipeline_with(
        delivery: Arc<dyn DeliveryChannel>,
        persistence: Arc<RecordingPersistence>,
    ) -> SendPipeline {
        SendPipeline::new("c-1", delivery, persistence)
    }

    #[tokio::test]
    async fn test_empty_draft_is_rejected_before_side_effects() {
        let delivery = Arc::new(FakeDelivery::default());
        let persistence = Arc::new(RecordingPersistence::default());
        let pipeline = pipeline_with(delivery.clone(), persistence);

        let mut t = thread(ThreadStatus::Active, "Ana");
        let err = pipeline.send(&mut t, "Ana").await.unwrap_err();
        assert!(matches!(err, DeskError::EmptyMessage));
        assert!(delivery.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_only_text_is_empty() {
        let delivery = Arc::new(FakeDelivery::default());
        let persistence = Arc::new(RecordingPersistence::default());
        let pipeline = pipeline_with(delivery, persistence);

        pipeline.set_draft(Draft::text("   \n"));
        let mut t = thread(ThreadStatus::Active, "Ana");
        assert!(matches!(
            pipeline.send(&mut t, "Ana").await,
            Err(DeskError::EmptyMessage)
        ));
    }

    #[tokio::test]
    async fn test_failed_delivery_restores_draft_and_mutates_nothing() {
        let delivery = Arc::new(FakeDelivery {
            fail_with: Some("channel offline".to_string()),
            ..Default::default()
        });
        let persistence = Arc::new(RecordingPersistence::default());
        let pipeline = pipeline_with(delivery, persistence.clone());

        pipeline.set_draft(Draft::text("hello"));
        let mut t = thread(ThreadStatus::Waiting, UNASSIGNED);
        let err = pipeline.send(&mut t, "Ana").await.unwrap_err();

        assert!(matches!(err, DeskError::DeliveryRejected(_)));
        // Draft restored for retry.
        assert_eq!(pipeline.draft().text, "hello");
        // No local message, no status/assignee mutation.
        assert_eq!(pipeline.pending_count(), 0);
        assert!(persistence.appended.lock().unwrap().is_empty());
        assert!(persistence.status_writes.lock().unwrap().is_empty());
        assert_eq!(t.status, ThreadStatus::Waiting);
        assert_eq!(t.assignee, UNASSIGNED);
        assert_eq!(t.last_message_preview, "old");
    }

    #[tokio::test]
    async fn test_successful_send_applies_side_effects() {
        let delivery = Arc::new(FakeDelivery::default());
        let persistence = Arc::new(RecordingPersistence::default());
        let pipeline = pipeline_with(delivery, persistence.clone());

        pipeline.set_draft(Draft::text("on my way"));
        let mut t = thread(ThreadStatus::Waiting, UNASSIGNED);
        let outcome = pipeline.send(&mut t, "Ana").await.unwrap();

        assert_eq!(t.status, ThreadStatus::Active);
        assert_eq!(t.assignee, "Ana");
        assert_eq!(t.last_message_preview, "on my way");
        assert_eq!(outcome.effects.assigned.as_deref(), Some("Ana"));
        assert!(outcome.effects.activated);
        assert_eq!(pipeline.pending_count(), 1);
        assert!(pipeline.draft().is_empty());

        let writes = persistence.status_writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0], (ThreadStatus::Active, "Ana".to_string()));
    }

    #[tokio::test]
    async fn test_persistence_failure_after_delivery_is_swallowed() {
        let delivery = Arc::new(FakeDelivery::default());
        let persistence = Arc::new(RecordingPersistence {
            fail_appends: true,
            ..Default::default()
        });
        let pipeline = pipeline_with(delivery, persistence);

        pipeline.set_draft(Draft::text("hello"));
        let mut t = thread(ThreadStatus::Active, "Ana");
        // The remote delivery succeeded, so the send must report success
        // even though the optimistic write failed.
        let outcome = pipeline.send(&mut t, "Ana").await;
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_media_only_draft_is_sendable() {
        let delivery = Arc::new(FakeDelivery::default());
        let persistence = Arc::new(RecordingPersistence::default());
        let pipeline = pipeline_with(delivery.clone(), persistence);

        pipeline.set_draft(Draft {
            media_ref: Some("media/photo.jpg".to_string()),
            ..Default::default()
        });
        let mut t = thread(ThreadStatus::Active, "Ana");
        pipeline.send(&mut t, "Ana").await.unwrap();

        let requests = delivery.requests.lock().unwrap();
        assert_eq!(requests[0].kind, DeliveryKind::Media);
        assert!(requests[0].text.is_none());
        assert!(t.last_message_preview.contains("Attachment"));
    }

    struct HoldingDelivery {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl DeliveryChannel for HoldingDelivery {
        async fn deliver(&self, _request: DeliveryRequest) -> Result<DeliveryResponse> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(DeliveryResponse::ok())
        }
    }

    #[tokio::test]
    async fn test_second_send_is_blocked_while_in_flight() {
        let delivery = Arc::new(HoldingDelivery {
            started: Notify::new(),
            release: Notify::new(),
        });
        let persistence = Arc::new(RecordingPersistence::default());
        let pipeline = Arc::new(SendPipeline::new(
            "c-1",
            delivery.clone(),
            persistence,
        ));

        pipeline.set_draft(Draft::text("first"));
        let first = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let mut t = thread(ThreadStatus::Active, "Ana");
                pipeline.send(&mut t, "Ana").await
            })
        };

        delivery.started.notified().await;

        // A second send into the same pipeline while one is in flight.
        pipeline.set_draft(Draft::text("second"));
        let mut t = thread(ThreadStatus::Active, "Ana");
        let err = pipeline.send(&mut t, "Ana").await.unwrap_err();
        assert!(matches!(err, DeskError::SendInFlight(_)));

        delivery.release.notify_one();
        first.await.unwrap().unwrap();
    }

    #[test]
    fn test_overlay_reconcile_drops_confirmed_messages() {
        let mut overlay = PendingOverlay::default();
        let pending = Message::outbound("hi".to_string(), None, None);
        overlay.push(pending.clone());
        assert_eq!(overlay.len(), 1);

        // Canonical echo arrives with the same id.
        overlay.reconcile(&[pending]);
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_overlay_merged_deduplicates_by_id() {
        let mut overlay = PendingOverlay::default();
        let message = Message::outbound("hi".to_string(), None, None);
        overlay.push(message.clone());

        // Echo already in canonical but overlay not yet reconciled: the
        // merged view must still show one entry.
        let merged = overlay.merged(&[message.clone()]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, message.id);
    }

    #[test]
    fn test_overlay_merged_orders_by_timestamp() {
        let mut early = Message::outbound("early".to_string(), None, None);
        early.timestamp = Utc::now() - chrono::Duration::minutes(5);
        let late = Message::outbound("late".to_string(), None, None);

        let mut overlay = PendingOverlay::default();
        overlay.push(late.clone());

        let merged = overlay.merged(&[early.clone()]);
        assert_eq!(merged[0].text, "early");
        assert_eq!(merged[1].text, "late");
    }
}
