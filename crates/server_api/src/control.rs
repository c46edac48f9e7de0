//! Controller Surface: every command is a read-modify-write of the event row.

use chrono::{DateTime, Utc};
use shared::{
    domain::{EventId, EventStatus, SectionKind},
    error::{ApiError, ErrorCode},
    lifecycle::{plan_command, LiveRules},
    live::{derive_timer, SectionClock},
    protocol::{ControlCommand, ControlRequest, LiveSnapshot, ServerEvent},
};
use storage::EventRecordStore;
use tracing::{debug, info};

use crate::{store_error, ApiContext, Applied};

pub async fn apply_control(
    ctx: &ApiContext,
    event_id: EventId,
    request: &ControlRequest,
) -> Result<Applied<LiveSnapshot>, ApiError> {
    apply_control_with(&ctx.storage, ctx.rules, ctx.clock.now(), event_id, request).await
}

/// Plan `request` against the stored row at `now` and perform the resulting
/// writes through `store`.
///
/// The actual duration of the section being left is written before the event
/// row moves on. A stale `expected_version` is rejected before anything is
/// written, and so is playing an event while another one is PLAYING.
pub async fn apply_control_with<S>(
    store: &S,
    rules: LiveRules,
    now: DateTime<Utc>,
    event_id: EventId,
    request: &ControlRequest,
) -> Result<Applied<LiveSnapshot>, ApiError>
where
    S: EventRecordStore + ?Sized,
{
    let event = store
        .load_event(event_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::not_found(format!("event {event_id}")))?;
    let sections = store.load_sections(event_id).await.map_err(store_error)?;

    if let Some(expected) = request.expected_version {
        if expected != event.version {
            return Err(ApiError::new(
                ErrorCode::Conflict,
                format!(
                    "event {event_id} is at version {}, expected {expected}",
                    event.version
                ),
            ));
        }
    }

    if matches!(request.command, ControlCommand::Play) && event.status != EventStatus::Playing {
        if let Some(playing) = store.find_playing_event().await.map_err(store_error)? {
            if playing.id != event_id {
                return Err(ApiError::new(
                    ErrorCode::Conflict,
                    format!(
                        "event {} is already PLAYING; pause or finish it before playing event {event_id}",
                        playing.id
                    ),
                ));
            }
        }
    }

    let plan = plan_command(&request.command, &event, &sections, rules, now)?;
    if plan.is_noop() {
        debug!(
            event_id = event_id.0,
            command = command_name(&request.command),
            status = %event.status,
            "control command changes nothing"
        );
        return Ok(Applied::quiet(LiveSnapshot { event, sections }));
    }

    let mut changes = Vec::new();
    let mut sections_changed = false;

    if let Some(actual) = plan.actual_duration {
        store
            .record_actual_duration(actual.section_id, actual.seconds)
            .await
            .map_err(store_error)?;
        info!(
            event_id = event_id.0,
            section_id = actual.section_id.0,
            actual_duration = actual.seconds,
            "recorded actual duration"
        );
        sections_changed = true;
    }

    if let Some(unplanned) = &plan.unplanned {
        let section = store
            .insert_unplanned_section(event_id, &unplanned.title, unplanned.order_index)
            .await
            .map_err(store_error)?;
        info!(
            event_id = event_id.0,
            section_id = section.id.0,
            order_index = section.order_index,
            "inserted unplanned section"
        );
        sections_changed = true;
    }

    let event = if plan.patch.is_empty() {
        event
    } else {
        let written = store
            .write_event(event_id, &plan.patch, request.expected_version)
            .await
            .map_err(store_error)?;
        changes.push(ServerEvent::EventUpdated {
            event: written.clone(),
        });
        written
    };

    let sections = if sections_changed {
        let sections = store.load_sections(event_id).await.map_err(store_error)?;
        changes.push(ServerEvent::SectionsChanged {
            event_id,
            sections: sections.clone(),
        });
        sections
    } else {
        sections
    };

    let active = event.active_section(&sections);
    let timer = derive_timer(
        &event,
        SectionClock::for_section(active, rules.default_section_seconds),
        now,
    );
    info!(
        event_id = event_id.0,
        command = command_name(&request.command),
        status = %event.status,
        section_index = event.current_section_index,
        section_kind = active.map(|s| s.kind).unwrap_or(SectionKind::Generic).as_str(),
        time_left = timer.time_left,
        version = event.version,
        "applied control command"
    );

    Ok(Applied::new(LiveSnapshot { event, sections }, changes))
}

fn command_name(command: &ControlCommand) -> &'static str {
    match command {
        ControlCommand::Play => "play",
        ControlCommand::Pause => "pause",
        ControlCommand::Advance { .. } => "advance",
        ControlCommand::InsertUnplanned { .. } => "insert_unplanned",
        ControlCommand::BroadcastMessage { .. } => "broadcast_message",
        ControlCommand::ClearMessage => "clear_message",
    }
}

#[cfg(test)]
#[path = "tests/control_tests.rs"]
mod tests;
