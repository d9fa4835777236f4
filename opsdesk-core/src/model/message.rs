use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    /// Sent from this desk (any operator)
    Me,
    /// Sent by the contact on the other end
    Contact,
}

/// Transport-level kind of an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    /// Plain text chat message
    #[default]
    Chat,
    /// Message carrying a media reference
    Media,
}

/// A single message inside a conversation thread
///
/// Messages are ordered by timestamp ascending and append-only from this
/// core's perspective; external edits and deletes arrive as separate
/// mutation events handled upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message id; optimistic local copies and the canonical echo
    /// converge on this id
    pub id: String,

    /// Text content
    pub text: String,

    /// Sender side
    pub sender: SenderKind,

    /// When the message was produced
    pub timestamp: DateTime<Utc>,

    /// Transport kind
    #[serde(default)]
    pub kind: DeliveryKind,

    /// Reference to an uploaded media object, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<String>,

    /// Id of the message this one quotes, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_message_id: Option<String>,
}

impl Message {
    /// Build an outbound message with a fresh id, stamped now
    pub fn outbound(
        text: String,
        media_ref: Option<String>,
        quoted_message_id: Option<String>,
    ) -> Self {
        let kind = if media_ref.is_some() {
            DeliveryKind::Media
        } else {
            DeliveryKind::Chat
        };
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            sender: SenderKind::Me,
            timestamp: Utc::now(),
            kind,
            media_ref,
            quoted_message_id,
        }
    }
}
