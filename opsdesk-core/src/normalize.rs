//! Thread normalization
//!
//! Converts one raw conversation or work-item record into a canonical
//! [`Thread`], applying the profile override chain and computing the human
//! activity label. Everything here is a pure function of its inputs: "now"
//! is injected by the caller, never read from the wall clock, so labels are
//! reproducible and testable.
//!
//! ## Resolution precedence
//!
//! - Name: profile name → record display name → channel push name → raw id
//! - Avatar: profile avatar → record avatar → generated placeholder keyed by
//!   the resolved name
//!
//! ## Activity label
//!
//! Evaluated strictly in this order, so "today" can never be misclassified
//! as "this week":
//!
//! 1. same calendar day as now → `HH:MM`
//! 2. previous calendar day → `Yesterday`
//! 3. same calendar week as now → capitalized weekday name
//! 4. anything older → `DD/MM/YYYY`

use chrono::{DateTime, Datelike, Days, Utc, Weekday};

use crate::model::{ConversationRecord, Thread, ThreadStatus, WorkItemRecord};
use crate::profiles::ProfileIndex;

/// Preview prefix for threads derived from work items
const WORK_ITEM_PREVIEW_PREFIX: &str = "\u{1F4CC}"; // 📌

/// Normalizes raw source records into canonical threads
#[derive(Debug, Clone, Copy)]
pub struct ThreadNormalizer {
    week_start: Weekday,
}

impl Default for ThreadNormalizer {
    fn default() -> Self {
        Self::new(Weekday::Mon)
    }
}

impl ThreadNormalizer {
    /// Create a normalizer with the given week-start convention
    pub fn new(week_start: Weekday) -> Self {
        Self { week_start }
    }

    /// Normalize a raw conversation record
    pub fn conversation(
        &self,
        record: &ConversationRecord,
        profiles: &ProfileIndex,
        now: DateTime<Utc>,
    ) -> Thread {
        let display_name = profiles
            .name_for(&record.id)
            .or(non_empty(record.display_name.as_deref()))
            .or(non_empty(record.push_name.as_deref()))
            .unwrap_or(&record.id)
            .to_string();

        let avatar_url = profiles
            .avatar_for(&record.id)
            .or(non_empty(record.avatar_url.as_deref()))
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_avatar(&display_name));

        let last_activity =
            DateTime::from_timestamp_millis(record.last_activity_ts).unwrap_or_default();

        Thread {
            id: record.id.clone(),
            display_name,
            avatar_url,
            last_message_preview: record.last_message_preview.clone(),
            last_activity,
            last_activity_label: activity_label(last_activity, now, self.week_start),
            assignee: record.assignee.clone(),
            sector: record.sector.clone(),
            tags: record.tags.clone(),
            unread_count: record.unread_count,
            status: record.status,
            is_group: record.is_group_channel(),
            is_work_item: false,
            linked_work_item_id: record.linked_work_item_id.clone(),
        }
    }

    /// Normalize a raw work-item record
    ///
    /// Work items carry no explicit status field; completion maps to
    /// `Resolved`, everything else is `Active`.
    pub fn work_item(&self, record: &WorkItemRecord, now: DateTime<Utc>) -> Thread {
        let display_name = if record.title.trim().is_empty() {
            record.id.clone()
        } else {
            record.title.clone()
        };

        let status = if record.completed {
            ThreadStatus::Resolved
        } else {
            ThreadStatus::Active
        };

        let last_activity =
            DateTime::from_timestamp_millis(record.updated_at_ts).unwrap_or_default();

        Thread {
            id: record.id.clone(),
            avatar_url: placeholder_avatar(&display_name),
            last_message_preview: format!("{} {}", WORK_ITEM_PREVIEW_PREFIX, display_name),
            display_name,
            last_activity,
            last_activity_label: activity_label(last_activity, now, self.week_start),
            assignee: record.assignee.clone(),
            sector: record.sector.clone(),
            tags: record.tags.clone(),
            unread_count: 0,
            status,
            is_group: false,
            is_work_item: true,
            linked_work_item_id: None,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Generated placeholder avatar keyed by the resolved name
pub fn placeholder_avatar(name: &str) -> String {
    // Conservative query encoding; names are display strings, not URLs.
    let encoded: String = name
        .chars()
        .map(|c| if c.is_whitespace() { '+' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '+' || *c == '-' || *c == '.')
        .collect();
    format!("https://ui-avatars.com/api/?name={}", encoded)
}

/// Human time label for a timestamp relative to `now`
///
/// The same-day check runs first; the week window starts at `week_start`
/// and only ever reaches backwards from `now`.
pub fn activity_label(ts: DateTime<Utc>, now: DateTime<Utc>, week_start: Weekday) -> String {
    let day = ts.date_naive();
    let today = now.date_naive();

    if day == today {
        return ts.format("%H:%M").to_string();
    }

    if today.pred_opt() == Some(day) {
        return "Yesterday".to_string();
    }

    let days_into_week = (today.weekday().number_from_monday() + 7
        - week_start.number_from_monday())
        % 7;
    let week_start_date = today - Days::new(u64::from(days_into_week));
    if day >= week_start_date && day < today {
        return ts.format("%A").to_string();
    }

    ts.format("%d/%m/%Y").to_string()
}
