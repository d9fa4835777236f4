//! Conversation status state machine
//!
//! Legal transitions:
//!
//! ```text
//! bot      → waiting | active
//! waiting  → active  | resolved
//! active   → waiting | resolved
//! resolved → active            (explicit reopen only)
//! ```
//!
//! All transitions are operator- or send-triggered; the system never moves a
//! thread out of `resolved` on its own. Entering `resolved` clears the
//! assignee. The two send-triggered side effects (auto-assign the sender on
//! an unassigned thread, `waiting → active` on an outbound send) are applied
//! by the send pipeline strictly *after* a confirmed delivery, so a failed
//! send never mutates assignment or status.

use crate::error::{DeskError, Result};
use crate::model::{Thread, ThreadStatus, UNASSIGNED};

/// Outcome of an applied transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ThreadStatus,
    pub to: ThreadStatus,
    /// Entering `resolved` released the assignee
    pub cleared_assignee: bool,
}

/// What a confirmed outbound send changed on the thread
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SendEffects {
    /// The sender was auto-assigned to the previously unassigned thread
    pub assigned: Option<String>,
    /// The thread left `waiting` for `active`
    pub activated: bool,
}

impl SendEffects {
    pub fn is_empty(&self) -> bool {
        self.assigned.is_none() && !self.activated
    }
}

/// Whether the transition `from → to` is legal
pub fn can_transition(from: ThreadStatus, to: ThreadStatus) -> bool {
    use ThreadStatus::{Active, Bot, Resolved, Waiting};
    matches!(
        (from, to),
        (Bot, Waiting) | (Bot, Active) | (Waiting, Active) | (Waiting, Resolved)
            | (Active, Waiting)
            | (Active, Resolved)
            | (Resolved, Active)
    )
}

/// Apply an operator-triggered transition, with its side effects
pub fn transition(thread: &mut Thread, to: ThreadStatus) -> Result<Transition> {
    let from = thread.status;
    if !can_transition(from, to) {
        return Err(DeskError::InvalidTransition { from, to });
    }

    thread.status = to;
    let cleared_assignee = to == ThreadStatus::Resolved && !thread.is_unassigned();
    if to == ThreadStatus::Resolved {
        thread.assignee = UNASSIGNED.to_string();
    }

    Ok(Transition {
        from,
        to,
        cleared_assignee,
    })
}

/// Apply the send-triggered side effects after a confirmed delivery
///
/// Unconditional once delivery succeeded: an unassigned thread adopts the
/// sender as assignee regardless of status, and a waiting thread becomes
/// active.
pub fn apply_send_effects(thread: &mut Thread, sender: &str) -> SendEffects {
    let mut effects = SendEffects::default();

    if thread.is_unassigned() && !sender.is_empty() {
        thread.assignee = sender.to_string();
        effects.assigned = Some(sender.to_string());
    }

    if thread.status == ThreadStatus::Waiting {
        thread.status = ThreadStatus::Active;
        effects.activated = true;
    }

    effects
}
