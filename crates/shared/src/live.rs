//! Countdown derivation shared by the controller and the stage display.
//!
//! Remaining time is always recomputed from the stored start timestamp rather
//! than decremented locally, so re-deriving any number of times never drifts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Event, EventStatus, Section, DEFAULT_SECTION_SECONDS};

/// What the deriver needs to know about the active section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionClock {
    pub planned_duration: i64,
    pub count_up: bool,
}

impl SectionClock {
    pub fn new(planned_duration: i64, count_up: bool) -> Self {
        Self {
            planned_duration,
            count_up,
        }
    }

    pub fn for_section(section: Option<&Section>, default_duration: i64) -> Self {
        match section {
            Some(section) => Self::new(section.duration, section.is_unplanned),
            None => Self::new(default_duration, false),
        }
    }
}

impl Default for SectionClock {
    fn default() -> Self {
        Self::new(DEFAULT_SECTION_SECONDS, false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveTimer {
    pub status: EventStatus,
    pub time_left: i64,
    pub is_overtime: bool,
    pub formatted_time: String,
}

impl LiveTimer {
    /// True while a one-second refresh is needed.
    pub fn is_ticking(&self) -> bool {
        self.status == EventStatus::Playing
    }
}

pub fn derive_timer(event: &Event, section: SectionClock, now: DateTime<Utc>) -> LiveTimer {
    let time_left = time_left(event, section.planned_duration, now);
    let running = event.status == EventStatus::Playing && event.section_timer_start.is_some();
    let is_overtime = running && !section.count_up && time_left < 0;
    let formatted_time = if section.count_up {
        format_clock(section.planned_duration - time_left)
    } else {
        format_clock(time_left)
    };

    LiveTimer {
        status: event.status,
        time_left,
        is_overtime,
        formatted_time,
    }
}

/// Signed seconds left in the active section.
pub fn time_left(event: &Event, fallback_duration: i64, now: DateTime<Utc>) -> i64 {
    let initial = event.section_timer_initial_duration;
    match (event.status, event.section_timer_start) {
        (EventStatus::Playing, Some(started_at)) => initial - elapsed_seconds(started_at, now),
        (EventStatus::Planned | EventStatus::Finished, _) if initial == 0 => fallback_duration,
        _ => initial,
    }
}

/// Whole seconds since `started_at`, floored (a start slightly in the future
/// yields -1, not 0).
pub fn elapsed_seconds(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - started_at).num_milliseconds().div_euclid(1000)
}

/// `MM:SS` with a leading minus for negative values.
pub fn format_clock(seconds: i64) -> String {
    let abs = seconds.unsigned_abs();
    let sign = if seconds < 0 { "-" } else { "" };
    format!("{sign}{:02}:{:02}", abs / 60, abs % 60)
}

#[cfg(test)]
#[path = "tests/live_tests.rs"]
mod tests;
