//! Error handling for the inbox core
//!
//! This module provides the error type shared by all inbox operations.
//! Errors from underlying libraries are converted automatically using
//! `thiserror`.
//!
//! Two families of failures deliberately do *not* surface here:
//!
//! - The pure view computations (stream merge, filtering) never fail on
//!   well-typed input; malformed records are normalized defensively instead
//!   of rejected.
//! - Canonical persistence writes issued after a successful delivery are
//!   fire-and-forget: their failures are logged by the caller and swallowed,
//!   because the message already reached the remote channel and the
//!   authoritative copy will arrive through the normal snapshot stream.

use crate::model::ThreadStatus;
use thiserror::Error;

/// Result type for inbox operations
pub type Result<T> = std::result::Result<T, DeskError>;

/// Errors that can occur during inbox operations
#[derive(Error, Debug)]
pub enum DeskError {
    /// Nothing to send: empty text and no media reference
    ///
    /// Rejected before any side effect, per the send pipeline contract.
    #[error("empty message: nothing to send")]
    EmptyMessage,

    /// A send is already in flight for this thread
    ///
    /// The pipeline is single-flight per open thread; callers wait for the
    /// current attempt to complete or fail.
    #[error("send already in flight for thread {0}")]
    SendInFlight(String),

    /// The external delivery channel rejected the message
    ///
    /// The pipeline aborts before any local mutation; the draft has been
    /// restored to the composer for retry.
    #[error("delivery rejected: {0}")]
    DeliveryRejected(String),

    /// Requested thread is not present in the unified set
    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    /// Illegal status transition
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: ThreadStatus,
        to: ThreadStatus,
    },

    /// Store collaborator failure (work items, conversations, calendar)
    #[error("store error: {0}")]
    Store(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeskError {
    /// Whether retrying the same operation may succeed
    ///
    /// Delivery and store failures are transient from this core's point of
    /// view; validation and state errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeskError::DeliveryRejected(_)
                | DeskError::SendInFlight(_)
                | DeskError::Store(_)
                | DeskError::Io(_)
        )
    }

    /// User-facing message suitable for an operator notification
    pub fn user_message(&self) -> String {
        match self {
            DeskError::EmptyMessage => "Type a message or attach a file before sending.".into(),
            DeskError::SendInFlight(_) => {
                "A message is still being sent. Wait for it to finish.".into()
            }
            DeskError::DeliveryRejected(reason) => {
                format!("Message not sent: {}. Your draft was kept.", reason)
            }
            DeskError::ThreadNotFound(id) => {
                format!("Conversation '{}' is no longer in the inbox.", id)
            }
            DeskError::InvalidTransition { from, to } => {
                format!("Cannot move a {} conversation to {}.", from, to)
            }
            DeskError::Store(msg) => format!("Storage error: {}.", msg),
            DeskError::Io(e) => format!("I/O error: {}.", e),
            DeskError::Json(e) => format!("Data format error: {}.", e),
        }
    }
}
