use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UNASSIGNED;

/// Conversation status in the operator queue
///
/// - `Bot`: an automated flow is handling the contact; no operator yet.
/// - `Waiting`: the contact is waiting for an operator response.
/// - `Active`: an operator is engaged.
/// - `Resolved`: closed; reopening is the only way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    Bot,
    Waiting,
    #[default]
    Active,
    Resolved,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bot => "bot",
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Resolved => "resolved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bot" => Some(Self::Bot),
            "waiting" => Some(Self::Waiting),
            "active" => Some(Self::Active),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified inbox entry derived from a conversation or work-item record
///
/// Threads are recomputed wholesale from the current source snapshots on
/// every change; nothing here is persisted separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    /// Stable id, shared with the underlying source record
    pub id: String,

    /// Resolved display name (profile name > record display name > id)
    pub display_name: String,

    /// Resolved avatar URL (profile > record > generated placeholder)
    pub avatar_url: String,

    /// Preview of the latest message, possibly emoji-prefixed
    pub last_message_preview: String,

    /// Timestamp of the latest activity
    pub last_activity: DateTime<Utc>,

    /// Human label for the latest activity, relative to "now" at read time
    pub last_activity_label: String,

    /// Responsible operator, or [`UNASSIGNED`]
    pub assignee: String,

    /// Categorical grouping tag
    pub sector: String,

    /// Free-form tags, unordered
    pub tags: BTreeSet<String>,

    /// Unread message count; authoritative on the raw conversation record
    pub unread_count: u32,

    /// Queue status
    pub status: ThreadStatus,

    /// Multi-participant group channel
    pub is_group: bool,

    /// Derived from a work item rather than a conversation
    pub is_work_item: bool,

    /// Back-reference to a linked work item (conversation side only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_work_item_id: Option<String>,
}

impl Thread {
    /// Whether no operator has claimed this thread
    pub fn is_unassigned(&self) -> bool {
        self.assignee == UNASSIGNED
    }

    /// Case-insensitive substring match on display name or raw id
    ///
    /// Message bodies are deliberately not searched here; full-text search
    /// belongs to an indexed service outside this core.
    pub fn matches_search(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        self.display_name.to_lowercase().contains(&query)
            || self.id.to_lowercase().contains(&query)
    }
}
