use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ThreadStatus, GROUP_ID_SUFFIX, UNASSIGNED};

fn default_assignee() -> String {
    UNASSIGNED.to_string()
}

/// Raw conversation record as delivered by the conversation source
///
/// Every field beyond `id` is defaulted: an upstream writer that omits or
/// garbles a field must never break the merge path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationRecord {
    /// Channel-scoped conversation id
    pub id: String,

    /// Display name set by an operator or the channel
    pub display_name: Option<String>,

    /// Name the contact pushes through the channel itself
    pub push_name: Option<String>,

    /// Avatar URL provided by the channel
    pub avatar_url: Option<String>,

    /// Preview of the latest message
    pub last_message_preview: String,

    /// Latest activity, epoch milliseconds
    pub last_activity_ts: i64,

    /// Responsible operator, or the unassigned sentinel
    #[serde(default = "default_assignee")]
    pub assignee: String,

    /// Categorical grouping tag
    pub sector: String,

    /// Free-form tags
    pub tags: BTreeSet<String>,

    /// Unread message count; zeroed when the operator opens the thread
    pub unread_count: u32,

    /// Queue status
    pub status: ThreadStatus,

    /// Explicit group flag; group ids are also recognized by suffix
    pub is_group: bool,

    /// Linked work item, if one was created from this conversation
    pub linked_work_item_id: Option<String>,

    /// Shared schedule date, kept in sync with the linked work item
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl Default for ConversationRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            display_name: None,
            push_name: None,
            avatar_url: None,
            last_message_preview: String::new(),
            last_activity_ts: 0,
            assignee: default_assignee(),
            sector: String::new(),
            tags: BTreeSet::new(),
            unread_count: 0,
            status: ThreadStatus::default(),
            is_group: false,
            linked_work_item_id: None,
            scheduled_at: None,
        }
    }
}

impl ConversationRecord {
    /// Whether this record describes a multi-participant channel
    pub fn is_group_channel(&self) -> bool {
        self.is_group || self.id.ends_with(GROUP_ID_SUFFIX)
    }
}

/// Kind of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkItemKind {
    #[default]
    Task,
    /// Meetings additionally get a calendar entry at creation time
    Meeting,
}

/// Raw work item ("task") record from the work-item store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkItemRecord {
    pub id: String,

    pub title: String,

    pub description: Option<String>,

    #[serde(default = "default_assignee")]
    pub assignee: String,

    pub sector: String,

    pub tags: BTreeSet<String>,

    pub kind: WorkItemKind,

    /// Shared schedule date, kept in sync with a linked conversation
    pub scheduled_at: Option<DateTime<Utc>>,

    /// Completion flag; completed items normalize to resolved threads
    pub completed: bool,

    /// Back-reference to the conversation this item was created from
    pub linked_conversation_id: Option<String>,

    /// Last modification, epoch milliseconds
    pub updated_at_ts: i64,
}

impl Default for WorkItemRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: None,
            assignee: default_assignee(),
            sector: String::new(),
            tags: BTreeSet::new(),
            kind: WorkItemKind::default(),
            scheduled_at: None,
            completed: false,
            linked_conversation_id: None,
            updated_at_ts: 0,
        }
    }
}

/// Canonical contact profile from the read-only directory feed
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactProfile {
    /// Contact id, matching conversation ids on the same channel
    pub id: String,

    /// Curated display name; overrides anything the channel provides
    pub name: Option<String>,

    /// Curated avatar URL
    pub avatar_url: Option<String>,

    /// Directory tags
    pub tags: BTreeSet<String>,
}
