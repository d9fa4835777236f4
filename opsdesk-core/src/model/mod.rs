//! Inbox data model
//!
//! Two layers live here:
//!
//! - **Raw records** ([`ConversationRecord`], [`WorkItemRecord`],
//!   [`ContactProfile`]): the wire shape of the three independently mutated
//!   source collections. Every optional field carries a serde default so a
//!   malformed upstream record degrades to safe values instead of failing
//!   the merge path.
//! - **Derived entities** ([`Thread`], [`Message`]): what the rest of the
//!   core and the UI consume. A `Thread` is a materialized view, rebuilt on
//!   every source change, never patched in place, with no identity beyond
//!   its source record id.

mod message;
mod record;
mod thread;

pub use message::{DeliveryKind, Message, SenderKind};
pub use record::{ContactProfile, ConversationRecord, WorkItemKind, WorkItemRecord};
pub use thread::{Thread, ThreadStatus};

/// Sentinel assignee for threads nobody has claimed
pub const UNASSIGNED: &str = "Unassigned";

/// Id suffix marking a multi-participant group channel
pub const GROUP_ID_SUFFIX: &str = "@g.us";
