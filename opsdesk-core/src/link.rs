//! Conversation ↔ work-item link maintenance
//!
//! A conversation and its linked work item share two fields: the schedule
//! date and the completion state. Changes on either side propagate to the
//! other through the back-reference, in both directions. A missing
//! counterpart (already deleted, never synced) is a silent no-op, never an
//! error, and deleting one side only *offers* the other for deletion; the
//! operator confirms each side independently.
//!
//! Creating a scheduled item from a conversation establishes the link at
//! creation time, never retrofitted; `Meeting`-kind items additionally get
//! a calendar entry carrying the work item's id.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{ConversationRecord, ThreadStatus, WorkItemKind, WorkItemRecord};

/// Conversation-side store operations used by link maintenance
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<ConversationRecord>>;

    async fn set_scheduled_at(&self, id: &str, at: Option<DateTime<Utc>>) -> Result<()>;

    async fn set_status(&self, id: &str, status: ThreadStatus) -> Result<()>;

    async fn set_linked_work_item(&self, id: &str, work_item_id: Option<String>) -> Result<()>;
}

/// Work-item store operations, keyed by id, back-reference included
#[async_trait]
pub trait WorkItemStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<WorkItemRecord>>;

    async fn upsert(&self, item: &WorkItemRecord) -> Result<()>;

    async fn set_scheduled_at(&self, id: &str, at: Option<DateTime<Utc>>) -> Result<()>;

    async fn set_completed(&self, id: &str, completed: bool) -> Result<()>;
}

/// Calendar entry created alongside meeting-kind work items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEntry {
    pub id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    /// Link back to the work item this entry was created with
    pub work_item_id: String,
}

/// Calendar collaborator
#[async_trait]
pub trait CalendarStore: Send + Sync {
    async fn create(&self, entry: &CalendarEntry) -> Result<()>;
}

/// Keeps a conversation and its linked work item consistent
pub struct LinkSync {
    conversations: Arc<dyn ConversationStore>,
    work_items: Arc<dyn WorkItemStore>,
    calendar: Arc<dyn CalendarStore>,
}

impl LinkSync {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        work_items: Arc<dyn WorkItemStore>,
        calendar: Arc<dyn CalendarStore>,
    ) -> Self {
        Self {
            conversations,
            work_items,
            calendar,
        }
    }

    /// Propagate a schedule change made on the conversation side
    pub async fn reschedule_from_conversation(
        &self,
        conversation_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.conversations
            .set_scheduled_at(conversation_id, at)
            .await?;

        let Some(conversation) = self.conversations.get(conversation_id).await? else {
            debug!(conversation = conversation_id, "conversation gone, nothing to propagate");
            return Ok(());
        };
        let Some(work_item_id) = conversation.linked_work_item_id else {
            return Ok(());
        };

        if self.work_items.get(&work_item_id).await?.is_none() {
            debug!(
                work_item = %work_item_id,
                "linked work item missing, skipping schedule propagation"
            );
            return Ok(());
        }
        self.work_items.set_scheduled_at(&work_item_id, at).await
    }

    /// Propagate a schedule change made on the work-item side
    pub async fn reschedule_from_work_item(
        &self,
        work_item_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.work_items.set_scheduled_at(work_item_id, at).await?;

        let Some(item) = self.work_items.get(work_item_id).await? else {
            debug!(work_item = work_item_id, "work item gone, nothing to propagate");
            return Ok(());
        };
        let Some(conversation_id) = item.linked_conversation_id else {
            return Ok(());
        };

        if self.conversations.get(&conversation_id).await?.is_none() {
            debug!(
                conversation = %conversation_id,
                "linked conversation missing, skipping schedule propagation"
            );
            return Ok(());
        }
        self.conversations.set_scheduled_at(&conversation_id, at).await
    }

    /// Propagate a completion change made on the work-item side
    ///
    /// The linked conversation mirrors completion as its resolved state.
    pub async fn complete_from_work_item(&self, work_item_id: &str, completed: bool) -> Result<()> {
        self.work_items.set_completed(work_item_id, completed).await?;

        let Some(item) = self.work_items.get(work_item_id).await? else {
            return Ok(());
        };
        let Some(conversation_id) = item.linked_conversation_id else {
            return Ok(());
        };

        if self.conversations.get(&conversation_id).await?.is_none() {
            debug!(
                conversation = %conversation_id,
                "linked conversation missing, skipping completion propagation"
            );
            return Ok(());
        }
        let status = if completed {
            ThreadStatus::Resolved
        } else {
            ThreadStatus::Active
        };
        self.conversations.set_status(&conversation_id, status).await
    }

    /// Propagate a resolution change made on the conversation side
    pub async fn complete_from_conversation(
        &self,
        conversation_id: &str,
        completed: bool,
    ) -> Result<()> {
        let Some(conversation) = self.conversations.get(conversation_id).await? else {
            return Ok(());
        };
        let Some(work_item_id) = conversation.linked_work_item_id else {
            return Ok(());
        };

        if self.work_items.get(&work_item_id).await?.is_none() {
            debug!(
                work_item = %work_item_id,
                "linked work item missing, skipping completion propagation"
            );
            return Ok(());
        }
        self.work_items.set_completed(&work_item_id, completed).await
    }

    /// The id to offer for deletion when a conversation's link partner goes
    ///
    /// The caller confirms the deletion with the operator; nothing is
    /// force-deleted here.
    pub async fn deletion_offer_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .conversations
            .get(conversation_id)
            .await?
            .and_then(|c| c.linked_work_item_id))
    }

    /// The id to offer for deletion when a work item's link partner goes
    pub async fn deletion_offer_for_work_item(
        &self,
        work_item_id: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .work_items
            .get(work_item_id)
            .await?
            .and_then(|i| i.linked_conversation_id))
    }

    /// Create a scheduled item from a conversation context
    ///
    /// The work item, its back-reference, the conversation's forward link
    /// and, for meetings, the calendar entry are all established here, at
    /// creation time.
    pub async fn create_scheduled_item(
        &self,
        conversation_id: &str,
        title: &str,
        kind: WorkItemKind,
        at: DateTime<Utc>,
    ) -> Result<WorkItemRecord> {
        let conversation = self.conversations.get(conversation_id).await?;

        let item = WorkItemRecord {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            assignee: conversation
                .as_ref()
                .map(|c| c.assignee.clone())
                .unwrap_or_else(|| crate::model::UNASSIGNED.to_string()),
            sector: conversation.map(|c| c.sector).unwrap_or_default(),
            kind,
            scheduled_at: Some(at),
            linked_conversation_id: Some(conversation_id.to_string()),
            updated_at_ts: Utc::now().timestamp_millis(),
            ..Default::default()
        };
        self.work_items.upsert(&item).await?;
        self.conversations
            .set_linked_work_item(conversation_id, Some(item.id.clone()))
            .await?;

        if kind == WorkItemKind::Meeting {
            let entry = CalendarEntry {
                id: Uuid::new_v4().to_string(),
                title: title.to_string(),
                starts_at: at,
                work_item_id: item.id.clone(),
            };
            self.calendar.create(&entry).await?;
        }

        Ok(item)
    }
}
