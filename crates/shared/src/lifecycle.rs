//! Event lifecycle state machine.
//!
//! ```text
//! PLANNED --play--> PLAYING --pause--> PAUSED --play--> PLAYING
//! PLAYING --advance (not last)--> PLAYING
//! PLANNED | PLAYING | PAUSED --advance (last, confirmed)--> FINISHED
//! FINISHED --play--> PLAYING (restart from section 0)
//! ```
//!
//! Planning is pure: given the current row, the ordered sections and `now`,
//! [`plan_command`] returns the writes to perform. Applying them is the
//! storage layer's job.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    domain::{Event, EventPatch, EventStatus, Section, SectionId, DEFAULT_SECTION_SECONDS},
    live::time_left,
    protocol::ControlCommand,
};

pub const DEFAULT_MAX_STAGE_MESSAGE_CHARS: usize = 280;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("advancing past the last section finishes the event and must be confirmed")]
    ConfirmationRequired,
    #[error("unplanned section title must not be empty")]
    EmptyTitle,
    #[error("stage message must not be empty")]
    EmptyMessage,
    #[error("stage message exceeds {max} characters")]
    MessageTooLong { max: usize },
}

/// Tunables for command planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRules {
    pub default_section_seconds: i64,
    pub max_stage_message_chars: usize,
}

impl Default for LiveRules {
    fn default() -> Self {
        Self {
            default_section_seconds: DEFAULT_SECTION_SECONDS,
            max_stage_message_chars: DEFAULT_MAX_STAGE_MESSAGE_CHARS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActualDuration {
    pub section_id: SectionId,
    pub seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnplannedInsert {
    pub title: String,
    pub order_index: i64,
}

/// Writes produced by one control command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlPlan {
    pub patch: EventPatch,
    pub actual_duration: Option<ActualDuration>,
    pub unplanned: Option<UnplannedInsert>,
}

impl ControlPlan {
    pub fn is_noop(&self) -> bool {
        self.patch.is_empty() && self.actual_duration.is_none() && self.unplanned.is_none()
    }

    fn from_patch(patch: EventPatch) -> Self {
        Self {
            patch,
            ..Self::default()
        }
    }
}

pub fn plan_command(
    command: &ControlCommand,
    event: &Event,
    sections: &[Section],
    rules: LiveRules,
    now: DateTime<Utc>,
) -> Result<ControlPlan, TransitionError> {
    match command {
        ControlCommand::Play => Ok(ControlPlan::from_patch(
            play(event, sections, rules, now).unwrap_or_default(),
        )),
        ControlCommand::Pause => Ok(ControlPlan::from_patch(
            pause(event, sections, rules, now).unwrap_or_default(),
        )),
        ControlCommand::Advance { confirm } => advance(event, sections, rules, now, *confirm),
        ControlCommand::InsertUnplanned { title } => {
            let title = title.trim();
            if title.is_empty() {
                return Err(TransitionError::EmptyTitle);
            }
            Ok(ControlPlan {
                unplanned: Some(UnplannedInsert {
                    title: title.to_string(),
                    order_index: unplanned_insert_position(event, sections),
                }),
                ..ControlPlan::default()
            })
        }
        ControlCommand::BroadcastMessage { text } => Ok(ControlPlan::from_patch(
            broadcast_message(text, rules.max_stage_message_chars)?,
        )),
        ControlCommand::ClearMessage => Ok(ControlPlan::from_patch(clear_message())),
    }
}

/// Planned duration of the active section, or the default when the pointer
/// is past the list.
pub fn active_planned_duration(event: &Event, sections: &[Section], rules: LiveRules) -> i64 {
    event
        .active_section(sections)
        .map(|section| section.duration)
        .unwrap_or(rules.default_section_seconds)
}

/// Start or resume the countdown. Returns `None` when already playing.
pub fn play(
    event: &Event,
    sections: &[Section],
    rules: LiveRules,
    now: DateTime<Utc>,
) -> Option<EventPatch> {
    let mut patch = EventPatch {
        status: Some(EventStatus::Playing),
        section_timer_start: Some(Some(now)),
        ..EventPatch::default()
    };

    match event.status {
        EventStatus::Playing => return None,
        EventStatus::Planned | EventStatus::Finished => {
            patch.current_section_index = Some(0);
            patch.section_timer_initial_duration = Some(
                sections
                    .first()
                    .map(|section| section.duration)
                    .unwrap_or(rules.default_section_seconds),
            );
        }
        EventStatus::Paused => {
            let fallback = active_planned_duration(event, sections, rules);
            patch.section_timer_initial_duration = Some(time_left(event, fallback, now));
        }
    }

    Some(patch)
}

/// Freeze the remaining time. Returns `None` unless the event is playing.
pub fn pause(
    event: &Event,
    sections: &[Section],
    rules: LiveRules,
    now: DateTime<Utc>,
) -> Option<EventPatch> {
    if event.status != EventStatus::Playing {
        return None;
    }
    let fallback = active_planned_duration(event, sections, rules);
    Some(EventPatch {
        status: Some(EventStatus::Paused),
        section_timer_start: Some(None),
        section_timer_initial_duration: Some(time_left(event, fallback, now)),
        ..EventPatch::default()
    })
}

/// Record the active section's actual duration and move to the next one, or
/// finish the event when on the last section and `confirmed` is set.
pub fn advance(
    event: &Event,
    sections: &[Section],
    rules: LiveRules,
    now: DateTime<Utc>,
    confirmed: bool,
) -> Result<ControlPlan, TransitionError> {
    if sections.is_empty() || event.status == EventStatus::Finished {
        return Ok(ControlPlan::default());
    }

    let current = event.active_section(sections);
    let planned = current
        .map(|section| section.duration)
        .unwrap_or(rules.default_section_seconds);
    let remaining = time_left(event, planned, now);
    let actual_duration = current.map(|section| ActualDuration {
        section_id: section.id,
        seconds: (section.duration - remaining).max(0),
    });

    let last_index = sections.len() as i64 - 1;
    if event.current_section_index >= last_index {
        if !confirmed {
            return Err(TransitionError::ConfirmationRequired);
        }
        return Ok(ControlPlan {
            patch: EventPatch {
                status: Some(EventStatus::Finished),
                section_timer_start: Some(None),
                stage_message: Some(None),
                ..EventPatch::default()
            },
            actual_duration,
            unplanned: None,
        });
    }

    let next_index = event.current_section_index.max(-1) + 1;
    let next_duration = usize::try_from(next_index)
        .ok()
        .and_then(|index| sections.get(index))
        .map(|section| section.duration)
        .unwrap_or(rules.default_section_seconds);

    Ok(ControlPlan {
        patch: EventPatch {
            status: Some(EventStatus::Playing),
            current_section_index: Some(next_index),
            section_timer_start: Some(Some(now)),
            section_timer_initial_duration: Some(next_duration),
            ..EventPatch::default()
        },
        actual_duration,
        unplanned: None,
    })
}

/// Order index for a section inserted live: right after the active section,
/// or at the end of the list when there is none.
pub fn unplanned_insert_position(event: &Event, sections: &[Section]) -> i64 {
    match event.active_section(sections) {
        Some(section) => section.order_index + 1,
        None => sections
            .iter()
            .map(|section| section.order_index + 1)
            .max()
            .unwrap_or(0),
    }
}

pub fn broadcast_message(text: &str, max_chars: usize) -> Result<EventPatch, TransitionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TransitionError::EmptyMessage);
    }
    if text.chars().count() > max_chars {
        return Err(TransitionError::MessageTooLong { max: max_chars });
    }
    Ok(EventPatch {
        stage_message: Some(Some(text.to_string())),
        ..EventPatch::default()
    })
}

pub fn clear_message() -> EventPatch {
    EventPatch {
        stage_message: Some(None),
        ..EventPatch::default()
    }
}

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod tests;
