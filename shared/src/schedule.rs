//! Visibility state machine for articles.
//!
//! The stored representation is `(hidden, scheduled_at)`; the state is
//! derived, never persisted. Only forward transitions exist: the periodic
//! tick flips due `Scheduled` articles to `Published`, and never the
//! reverse. An article hidden again after publication is indistinguishable
//! from a never-published draft in storage.

use serde::{Deserialize, Serialize};

/// How far back a tick will look for overdue scheduled articles. Anything
/// scheduled earlier than this stays hidden until edited.
pub const PUBLISH_LOOKBACK_MS: i64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleState {
    Draft,
    Scheduled,
    Published,
}

impl ScheduleState {
    pub fn derive(hidden: bool, scheduled_at: Option<i64>) -> Self {
        match (hidden, scheduled_at) {
            (false, _) => ScheduleState::Published,
            (true, Some(_)) => ScheduleState::Scheduled,
            (true, None) => ScheduleState::Draft,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleState::Draft => "draft",
            ScheduleState::Scheduled => "scheduled",
            ScheduleState::Published => "published",
        }
    }
}

/// The tick's transition predicate: hidden articles whose `scheduled_at`
/// falls within `(now − 1h, now]` become visible. Already-published
/// articles never match, which makes the tick idempotent.
pub fn is_due_for_publish(hidden: bool, scheduled_at: Option<i64>, now_ms: i64) -> bool {
    if !hidden {
        return false;
    }
    match scheduled_at {
        Some(at) => now_ms - PUBLISH_LOOKBACK_MS < at && at <= now_ms,
        None => false,
    }
}
