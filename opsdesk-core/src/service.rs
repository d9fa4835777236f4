//! Inbox service
//!
//! Daemon-facing glue over the core: owns the unified thread receiver and
//! the currently open thread view. One thread is open at a time; opening a
//! different thread drops the previous session, which cancels its live
//! message listener and its send pipeline in one move.
//!
//! Opening a thread zeroes its unread count with a single best-effort
//! write. That write is deliberately not coupled to any message fetch: a
//! message racing in microseconds later simply re-surfaces unread state on
//! the next notification cycle.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{DeskError, Result};
use crate::filter::{self, FilterContext, UnreadCounts};
use crate::model::{Message, Thread, ThreadStatus};
use crate::send::{DeliveryChannel, Draft, Persistence, SendOutcome, SendPipeline};
use crate::source::MessageSource;
use crate::status::{self, Transition};

/// View onto one open thread: working copy, live messages, send pipeline
pub struct ThreadSession {
    thread: Thread,
    pipeline: SendPipeline,
    messages: watch::Receiver<Vec<Message>>,
}

impl std::fmt::Debug for ThreadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadSession")
            .field("thread", &self.thread)
            .field("pending_count", &self.pipeline.pending_count())
            .finish()
    }
}

impl ThreadSession {
    /// Working copy of the thread, including locally applied side effects
    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    pub fn set_draft(&self, draft: Draft) {
        self.pipeline.set_draft(draft);
    }

    pub fn draft(&self) -> Draft {
        self.pipeline.draft()
    }

    /// Send the current draft as `sender`
    pub async fn send(&mut self, sender: &str) -> Result<SendOutcome> {
        self.pipeline.send(&mut self.thread, sender).await
    }

    /// Current message list: canonical snapshot with the optimistic overlay
    /// applied, reconciled against any echoes that have arrived
    pub fn messages(&mut self) -> Vec<Message> {
        let canonical = self.messages.borrow_and_update().clone();
        self.pipeline.reconcile(&canonical);
        self.pipeline.merged_view(&canonical)
    }

    /// Optimistic messages still waiting for their canonical echo
    pub fn pending_count(&self) -> usize {
        self.pipeline.pending_count()
    }
}

/// Operator-facing inbox over the unified thread set
pub struct InboxService {
    threads: watch::Receiver<Vec<Thread>>,
    delivery: Arc<dyn DeliveryChannel>,
    persistence: Arc<dyn Persistence>,
    messages: Arc<dyn MessageSource>,
    session: Option<ThreadSession>,
}

impl InboxService {
    pub fn new(
        threads: watch::Receiver<Vec<Thread>>,
        delivery: Arc<dyn DeliveryChannel>,
        persistence: Arc<dyn Persistence>,
        messages: Arc<dyn MessageSource>,
    ) -> Self {
        Self {
            threads,
            delivery,
            persistence,
            messages,
            session: None,
        }
    }

    /// Current unified thread set
    pub fn threads(&self) -> Vec<Thread> {
        self.threads.borrow().clone()
    }

    /// Visible subset under the given filter context
    pub fn visible(&self, ctx: &FilterContext) -> Vec<Thread> {
        filter::visible(&self.threads.borrow(), ctx)
    }

    /// Per-category unread counters under the given filter context
    pub fn counts(&self, ctx: &FilterContext) -> UnreadCounts {
        filter::counts(&self.threads.borrow(), ctx)
    }

    /// Id of the currently open thread, if any
    pub fn open_thread_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.thread.id.as_str())
    }

    /// Currently open session
    pub fn session(&mut self) -> Option<&mut ThreadSession> {
        self.session.as_mut()
    }

    /// Open a thread, closing whichever one was open before
    ///
    /// Dropping the previous session unsubscribes its live message
    /// listener; the unread zero-write is best-effort and never blocks the
    /// open.
    pub async fn open_thread(&mut self, id: &str) -> Result<&mut ThreadSession> {
        // Cancel interest in the previously open thread first.
        if let Some(previous) = self.session.take() {
            debug!(thread = %previous.thread.id, "closing previous thread session");
        }

        let mut thread = self
            .threads
            .borrow()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| DeskError::ThreadNotFound(id.to_string()))?;

        if thread.unread_count > 0 {
            if let Err(e) = self.persistence.clear_unread(id).await {
                warn!(thread = id, error = %e, "unread zero-write failed");
            }
            thread.unread_count = 0;
        }

        let pipeline = SendPipeline::new(id, self.delivery.clone(), self.persistence.clone());
        self.session = Some(ThreadSession {
            thread,
            pipeline,
            messages: self.messages.subscribe(id),
        });
        Ok(self.session.as_mut().expect("session just set"))
    }

    /// Close the open thread view, if any
    pub fn close_thread(&mut self) {
        self.session = None;
    }

    /// Apply an operator-triggered status transition
    ///
    /// The canonical write is fire-and-forget; the updated record comes
    /// back through the conversation snapshot stream.
    pub async fn transition(&mut self, id: &str, to: ThreadStatus) -> Result<Transition> {
        let mut thread = self
            .threads
            .borrow()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .or_else(|| {
                // The open session's working copy may be ahead of the
                // snapshot (post-send side effects).
                self.session
                    .as_ref()
                    .filter(|s| s.thread.id == id)
                    .map(|s| s.thread.clone())
            })
            .ok_or_else(|| DeskError::ThreadNotFound(id.to_string()))?;

        let transition = status::transition(&mut thread, to)?;

        if let Err(e) = self
            .persistence
            .set_status_and_assignee(id, thread.status, &thread.assignee)
            .await
        {
            warn!(thread = id, error = %e, "status transition write failed");
        }

        if let Some(session) = self.session.as_mut() {
            if session.thread.id == id {
                session.thread.status = thread.status;
                session.thread.assignee = thread.assignee.clone();
            }
        }

        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ThreadStatus, UNASSIGNED};
    use crate::send::{DeliveryRequest, DeliveryResponse};
    use crate::source::InMemoryMessageSource;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeSet;
    use std::sync::Mutex as StdMutex;

    struct OkDelivery;

    #[async_trait]
    impl DeliveryChannel for OkDelivery {
        async fn deliver(&self, _request: DeliveryRequest) -> Result<DeliveryResponse> {
            Ok(DeliveryResponse::ok())
        }
    }

    #[derive(Default)]
    struct RecordingPersistence {
        unread_clears: StdMutex<Vec<String>>,
        status_writes: StdMutex<Vec<(String, ThreadStatus, String)>>,
    }

    #[async_trait]
    impl Persistence for RecordingPersistence {
        async fn append_message(&self, _thread_id: &str, _message: &Message) -> Result<()> {
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
            thread_id: &str,
            status: ThreadStatus,
            assignee: &str,
        ) -> Result<()> {
            self.status_writes.lock().unwrap().push((
                thread_id.to_string(),
                status,
                assignee.to_string(),
            ));
            Ok(())
        }

        async fn clear_unread(&self, thread_id: &str) -> Result<()> {
            self.unread_clears
                .lock()
                .unwrap()
                .push(thread_id.to_string());
            Ok(())
        }
    }

    fn thread(id: &str, unread: u32, status: ThreadStatus) -> Thread {
        Thread {
            id: id.to_string(),
            display_name: id.to_string(),
            avatar_url: String::new(),
            last_message_preview: String::new(),
            last_activity: Utc::now(),
            last_activity_label: String::new(),
            assignee: UNASSIGNED.to_string(),
            sector: String::new(),
            tags: BTreeSet::new(),
            unread_count: unread,
            status,
            is_group: false,
            is_work_item: false,
            linked_work_item_id: None,
        }
    }

    fn service_with(
        threads: Vec<Thread>,
    ) -> (
        watch::Sender<Vec<Thread>>,
        Arc<RecordingPersistence>,
        Arc<InMemoryMessageSource>,
        InboxService,
    ) {
        let (tx, rx) = watch::channel(threads);
        let persistence = Arc::new(RecordingPersistence::default());
        let messages = Arc::new(InMemoryMessageSource::new());
        let service = InboxService::new(
            rx,
            Arc::new(OkDelivery),
            persistence.clone(),
            messages.clone(),
        );
        (tx, persistence, messages, service)
    }

    #[tokio::test]
    async fn test_open_thread_zeroes_unread_once() {
        let (_tx, persistence, _messages, mut service) =
            service_with(vec![thread("c-1", 4, ThreadStatus::Active)]);

        let session = service.open_thread("c-1").await.unwrap();
        assert_eq!(session.thread().unread_count, 0);
        assert_eq!(*persistence.unread_clears.lock().unwrap(), vec!["c-1"]);

        // Already-read threads skip the write entirely.
        let (_tx, persistence, _messages, mut service) =
            service_with(vec![thread("c-2", 0, ThreadStatus::Active)]);
        service.open_thread("c-2").await.unwrap();
        assert!(persistence.unread_clears.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_unknown_thread_fails() {
        let (_tx, _persistence, _messages, mut service) = service_with(vec![]);
        let err = service.open_thread("ghost").await.unwrap_err();
        assert!(matches!(err, DeskError::ThreadNotFound(_)));
        assert!(service.open_thread_id().is_none());
    }

    #[tokio::test]
    async fn test_opening_another_thread_replaces_the_session() {
        let (_tx, _persistence, _messages, mut service) = service_with(vec![
            thread("c-1", 0, ThreadStatus::Active),
            thread("c-2", 0, ThreadStatus::Active),
        ]);

        service.open_thread("c-1").await.unwrap();
        assert_eq!(service.open_thread_id(), Some("c-1"));

        service.open_thread("c-2").await.unwrap();
        assert_eq!(service.open_thread_id(), Some("c-2"));

        service.close_thread();
        assert!(service.open_thread_id().is_none());
    }

    #[tokio::test]
    async fn test_session_merges_canonical_and_pending_messages() {
        let (_tx, _persistence, messages, mut service) =
            service_with(vec![thread("c-1", 0, ThreadStatus::Waiting)]);

        let mut inbound = Message::outbound("can you help?".to_string(), None, None);
        inbound.sender = crate::model::SenderKind::Contact;
        messages.publish("c-1", vec![inbound]);

        let session = service.open_thread("c-1").await.unwrap();
        session.set_draft(Draft::text("of course"));
        session.send("Ana").await.unwrap();

        let view = session.messages();
        assert_eq!(view.len(), 2);
        assert_eq!(session.pending_count(), 1);

        // Canonical echo arrives; the overlay reconciles away.
        let echoed: Vec<Message> = view;
        messages.publish("c-1", echoed);
        let view = session.messages();
        assert_eq!(view.len(), 2);
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_transition_persists_and_updates_open_session() {
        let (_tx, persistence, _messages, mut service) =
            service_with(vec![thread("c-1", 0, ThreadStatus::Active)]);

        service.open_thread("c-1").await.unwrap();
        let transition = service
            .transition("c-1", ThreadStatus::Resolved)
            .await
            .unwrap();
        assert_eq!(transition.to, ThreadStatus::Resolved);

        let writes = persistence.status_writes.lock().unwrap();
        assert_eq!(
            writes[0],
            (
                "c-1".to_string(),
                ThreadStatus::Resolved,
                UNASSIGNED.to_string()
            )
        );
        drop(writes);

        let session = service.session().unwrap();
        assert_eq!(session.thread().status, ThreadStatus::Resolved);
    }

    #[tokio::test]
    async fn test_illegal_transition_is_rejected() {
        let (_tx, persistence, _messages, mut service) =
            service_with(vec![thread("c-1", 0, ThreadStatus::Resolved)]);

        let err = service
            .transition("c-1", ThreadStatus::Waiting)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::InvalidTransition { .. }));
        assert!(persistence.status_writes.lock().unwrap().is_empty());
    }
}
