//! Opsdesk inbox core
//!
//! This library implements the reconciliation core of an operator-facing
//! support-desk inbox: three independently mutated collections
//! (conversations, work items, contact profiles) are merged into one
//! consistent, filterable, real-time list of conversation threads, and
//! outbound messages are sent through an asynchronous external channel
//! while local state stays optimistic yet eventually consistent.
//!
//! Storage technology, authentication and UI rendering live outside this
//! crate, behind narrow contracts: full-snapshot source subscriptions
//! ([`source::SourceFeed`]), the [`send::DeliveryChannel`] /
//! [`send::Persistence`] traits, and the [`link`] store traits.

pub mod error;
pub mod filter;
pub mod link;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod profiles;
pub mod send;
pub mod service;
pub mod source;
pub mod status;

pub use error::{DeskError, Result};
pub use filter::{Category, FilterContext, Scope, UnreadCounts};
pub use link::{CalendarEntry, CalendarStore, ConversationStore, LinkSync, WorkItemStore};
pub use merge::{merge_snapshots, StreamMerger};
pub use model::{
    ContactProfile, ConversationRecord, DeliveryKind, Message, SenderKind, Thread, ThreadStatus,
    WorkItemKind, WorkItemRecord, GROUP_ID_SUFFIX, UNASSIGNED,
};
pub use normalize::{activity_label, placeholder_avatar, ThreadNormalizer};
pub use profiles::ProfileIndex;
pub use send::{
    DeliveryChannel, DeliveryRequest, DeliveryResponse, Draft, PendingOverlay, Persistence,
    SendOutcome, SendPipeline,
};
pub use service::{InboxService, ThreadSession};
pub use source::{InMemoryMessageSource, MessageSource, SourceFeed};
pub use status::{apply_send_effects, can_transition, transition, SendEffects, Transition};
