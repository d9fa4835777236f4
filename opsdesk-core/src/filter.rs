//! Filtering and counting engine
//!
//! Pure functions from (unified threads, filter context) to the visible
//! subset and the per-category unread counters. Nothing here performs I/O
//! or fails: malformed values were already normalized away upstream.
//!
//! ## Scoping
//!
//! Personal scoping runs before category and search filters. Group and
//! work-item threads bypass it: a group conversation is never auto-scoped
//! to "mine", and work items carry their own viewer rule: only items
//! assigned to the viewer are visible unless a privileged operator looks at
//! the `All` scope.

use serde::{Deserialize, Serialize};

use crate::model::{Thread, ThreadStatus};

/// Viewer-level scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only threads assigned to the viewer
    Mine,
    /// Everything the viewer may see
    #[default]
    All,
}

/// Inbox category tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bot,
    Waiting,
    #[default]
    Chats,
    Groups,
    Tasks,
}

/// Explicit, injected filter state
///
/// Persisting the operator's last-used filter across sessions is an
/// external concern; this core only ever receives the context as a value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterContext {
    pub scope: Scope,
    pub is_privileged: bool,
    pub identity: String,
    pub sector: Option<String>,
    pub assignee: Option<String>,
    pub search_text: String,
    pub active_category: Category,
    pub show_resolved: bool,
}

/// Per-category unread counters
///
/// `bot`, `waiting`, `chats` and `groups` are sums of unread messages;
/// `tasks` counts open work items visible to the viewer, since work items
/// carry no unread messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnreadCounts {
    pub bot: u32,
    pub waiting: u32,
    pub chats: u32,
    pub groups: u32,
    pub tasks: u32,
}

/// Visible subset of the unified thread set under the given context
pub fn visible(threads: &[Thread], ctx: &FilterContext) -> Vec<Thread> {
    threads
        .iter()
        .filter(|thread| in_personal_scope(thread, ctx))
        .filter(|thread| matches_sector(thread, ctx))
        .filter(|thread| matches_assignee_filter(thread, ctx))
        .filter(|thread| thread.matches_search(&ctx.search_text))
        .filter(|thread| in_category(thread, ctx.active_category, ctx))
        .cloned()
        .collect()
}

/// Per-category counters under the same scope/sector/assignee filters as
/// the visible list, independent of the active category and search text
pub fn counts(threads: &[Thread], ctx: &FilterContext) -> UnreadCounts {
    let mut counts = UnreadCounts::default();
    for thread in threads {
        if !in_personal_scope(thread, ctx)
            || !matches_sector(thread, ctx)
            || !matches_assignee_filter(thread, ctx)
        {
            continue;
        }

        // Group threads count toward the groups bucket regardless of
        // status; everything else buckets by status or work-item kind.
        if thread.is_group {
            counts.groups += thread.unread_count;
        } else if thread.is_work_item {
            if thread.status != ThreadStatus::Resolved && task_scope_allows(thread, ctx) {
                counts.tasks += 1;
            }
        } else {
            match thread.status {
                ThreadStatus::Bot => counts.bot += thread.unread_count,
                ThreadStatus::Waiting => counts.waiting += thread.unread_count,
                ThreadStatus::Active => counts.chats += thread.unread_count,
                ThreadStatus::Resolved => {}
            }
        }
    }
    counts
}

fn in_personal_scope(thread: &Thread, ctx: &FilterContext) -> bool {
    // Groups and work items bypass personal scoping; work items apply
    // their own rule at category time.
    if thread.is_group || thread.is_work_item {
        return true;
    }
    match ctx.scope {
        Scope::Mine => thread.assignee == ctx.identity,
        Scope::All => {
            ctx.is_privileged || thread.assignee == ctx.identity || thread.is_unassigned()
        }
    }
}

fn matches_sector(thread: &Thread, ctx: &FilterContext) -> bool {
    match &ctx.sector {
        Some(sector) => thread.sector == *sector,
        None => true,
    }
}

fn matches_assignee_filter(thread: &Thread, ctx: &FilterContext) -> bool {
    match &ctx.assignee {
        Some(assignee) => thread.assignee == *assignee,
        None => true,
    }
}

fn task_scope_allows(thread: &Thread, ctx: &FilterContext) -> bool {
    if ctx.scope == Scope::All && ctx.is_privileged {
        return true;
    }
    thread.assignee == ctx.identity
}

/// Resolved/live split shared by the chats and groups categories
///
/// With `show_resolved` the category shows the resolved archive instead of
/// the live queue; otherwise it shows active threads plus waiting threads
/// that have unread messages (an attention signal surfacing in the main
/// queue).
fn live_or_resolved(thread: &Thread, show_resolved: bool) -> bool {
    if show_resolved {
        thread.status == ThreadStatus::Resolved
    } else {
        match thread.status {
            ThreadStatus::Active => true,
            ThreadStatus::Waiting => thread.unread_count > 0,
            ThreadStatus::Bot | ThreadStatus::Resolved => false,
        }
    }
}

fn in_category(thread: &Thread, category: Category, ctx: &FilterContext) -> bool {
    match category {
        Category::Bot => !thread.is_work_item && thread.status == ThreadStatus::Bot,
        Category::Waiting => !thread.is_work_item && thread.status == ThreadStatus::Waiting,
        Category::Chats => {
            !thread.is_group
                && !thread.is_work_item
                && live_or_resolved(thread, ctx.show_resolved)
        }
        Category::Groups => thread.is_group && live_or_resolved(thread, ctx.show_resolved),
        Category::Tasks => {
            thread.is_work_item
                && task_scope_allows(thread, ctx)
                && if ctx.show_resolved {
                    thread.status == ThreadStatus::Resolved
                } else {
                    thread.status != ThreadStatus::Resolved
                }
        }
    }
}
