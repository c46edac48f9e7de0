use std::sync::Arc;

use chrono::{TimeZone, Utc};
use shared::{
    clock::{Clock, ManualClock},
    domain::{Event, EventStatus, SectionDraft},
    live::{derive_timer, SectionClock},
};
use storage::Storage;

use super::*;

struct Harness {
    ctx: ApiContext,
    clock: Arc<ManualClock>,
    event: Event,
}

async fn harness(durations: &[i64]) -> Harness {
    let start = Utc
        .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .expect("timestamp");
    let clock = Arc::new(ManualClock::new(start));
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let event = storage.create_event("Culte", start).await.expect("event");
    for (index, duration) in durations.iter().enumerate() {
        storage
            .append_section(
                event.id,
                &SectionDraft {
                    title: Some(format!("S{index}")),
                    duration: Some(*duration),
                    ..SectionDraft::default()
                },
            )
            .await
            .expect("section");
    }
    let ctx = ApiContext::new(storage, LiveRules::default()).with_clock(clock.clone());
    Harness { ctx, clock, event }
}

impl Harness {
    async fn send(&self, command: ControlCommand) -> Result<Applied<LiveSnapshot>, ApiError> {
        apply_control(&self.ctx, self.event.id, &command.into()).await
    }

    async fn snapshot(&self) -> LiveSnapshot {
        crate::live_snapshot(&self.ctx, self.event.id)
            .await
            .expect("snapshot")
    }

    fn time_left(&self, snapshot: &LiveSnapshot) -> i64 {
        let clock = SectionClock::for_section(
            snapshot.event.active_section(&snapshot.sections),
            self.ctx.rules.default_section_seconds,
        );
        derive_timer(&snapshot.event, clock, self.clock.now()).time_left
    }
}

#[tokio::test]
async fn play_from_planned_loads_first_section() {
    let h = harness(&[600, 900]).await;
    let applied = h.send(ControlCommand::Play).await.expect("play");
    let event = &applied.value.event;

    assert_eq!(event.status, EventStatus::Playing);
    assert_eq!(event.current_section_index, 0);
    assert_eq!(event.section_timer_initial_duration, 600);
    assert_eq!(event.section_timer_start, Some(h.clock.now()));
    assert!(event.is_timer_consistent());
    assert_eq!(
        applied.changes,
        vec![ServerEvent::EventUpdated {
            event: event.clone()
        }]
    );
}

#[tokio::test]
async fn countdown_follows_wall_clock_without_drift() {
    let h = harness(&[600]).await;
    h.send(ControlCommand::Play).await.expect("play");

    for second in 1..=5 {
        h.clock.advance_secs(1);
        let snapshot = h.snapshot().await;
        assert_eq!(h.time_left(&snapshot), 600 - second);
        assert_eq!(h.time_left(&snapshot), 600 - second);
    }
}

#[tokio::test]
async fn pause_then_resume_keeps_remaining_time() {
    let h = harness(&[600]).await;
    h.send(ControlCommand::Play).await.expect("play");
    h.clock.advance_secs(100);

    let paused = h.send(ControlCommand::Pause).await.expect("pause");
    assert_eq!(paused.value.event.status, EventStatus::Paused);
    assert_eq!(paused.value.event.section_timer_start, None);
    assert_eq!(paused.value.event.section_timer_initial_duration, 500);

    h.clock.advance_secs(1_000);
    let resumed = h.send(ControlCommand::Play).await.expect("resume");
    assert_eq!(resumed.value.event.section_timer_initial_duration, 500);
    assert_eq!(h.time_left(&resumed.value), 500);

    h.clock.advance_secs(10);
    assert_eq!(h.time_left(&h.snapshot().await), 490);
}

#[tokio::test]
async fn pause_in_overtime_freezes_negative_time() {
    let h = harness(&[60]).await;
    h.send(ControlCommand::Play).await.expect("play");
    h.clock.advance_secs(75);

    let paused = h.send(ControlCommand::Pause).await.expect("pause");
    assert_eq!(paused.value.event.section_timer_initial_duration, -15);
}

#[tokio::test]
async fn advance_records_overtime_in_actual_duration() {
    let h = harness(&[600, 900]).await;
    h.send(ControlCommand::Play).await.expect("play");
    h.clock.advance_secs(630);

    let applied = h
        .send(ControlCommand::Advance { confirm: false })
        .await
        .expect("advance");
    let snapshot = &applied.value;

    assert_eq!(snapshot.sections[0].actual_duration, Some(630));
    assert_eq!(snapshot.event.current_section_index, 1);
    assert_eq!(snapshot.event.section_timer_initial_duration, 900);
    assert_eq!(snapshot.event.section_timer_start, Some(h.clock.now()));
    assert!(applied
        .changes
        .iter()
        .any(|change| matches!(change, ServerEvent::SectionsChanged { .. })));
}

#[tokio::test]
async fn last_advance_needs_confirmation_and_writes_nothing_without_it() {
    let h = harness(&[600]).await;
    let played = h.send(ControlCommand::Play).await.expect("play");
    h.clock.advance_secs(300);

    let err = h
        .send(ControlCommand::Advance { confirm: false })
        .await
        .expect_err("confirmation");
    assert_eq!(err.code, ErrorCode::ConfirmationRequired);

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.event.version, played.value.event.version);
    assert_eq!(snapshot.sections[0].actual_duration, None);
}

#[tokio::test]
async fn confirmed_last_advance_finishes_and_clears_message() {
    let h = harness(&[600]).await;
    h.send(ControlCommand::Play).await.expect("play");
    h.send(ControlCommand::BroadcastMessage {
        text: "Conclure".into(),
    })
    .await
    .expect("message");
    h.clock.advance_secs(550);

    let applied = h
        .send(ControlCommand::Advance { confirm: true })
        .await
        .expect("finish");
    let snapshot = &applied.value;
    assert_eq!(snapshot.event.status, EventStatus::Finished);
    assert_eq!(snapshot.event.section_timer_start, None);
    assert_eq!(snapshot.event.stage_message, None);
    assert_eq!(snapshot.sections[0].actual_duration, Some(550));
}

#[tokio::test]
async fn play_after_finish_restarts_from_first_section() {
    let h = harness(&[600, 900]).await;
    h.send(ControlCommand::Play).await.expect("play");
    h.send(ControlCommand::Advance { confirm: false })
        .await
        .expect("advance");
    h.send(ControlCommand::Advance { confirm: true })
        .await
        .expect("finish");

    let restarted = h.send(ControlCommand::Play).await.expect("restart");
    assert_eq!(restarted.value.event.status, EventStatus::Playing);
    assert_eq!(restarted.value.event.current_section_index, 0);
    assert_eq!(restarted.value.event.section_timer_initial_duration, 600);
}

#[tokio::test]
async fn unplanned_section_lands_after_active_one_and_counts_up() {
    let h = harness(&[600, 600, 600]).await;
    h.send(ControlCommand::Play).await.expect("play");
    h.send(ControlCommand::Advance { confirm: false })
        .await
        .expect("advance to 1");
    let before = h.snapshot().await.sections;

    let applied = h
        .send(ControlCommand::InsertUnplanned {
            title: "Témoignage".into(),
        })
        .await
        .expect("insert");
    let sections = &applied.value.sections;
    assert_eq!(sections.len(), 4);
    assert_eq!(sections[2].title, "Témoignage");
    assert!(sections[2].is_unplanned);
    assert_eq!(sections[2].duration, 0);
    assert_eq!(sections[3].id, before[2].id);
    assert_eq!(sections[3].order_index, before[2].order_index + 1);
    assert!(matches!(
        applied.changes.as_slice(),
        [ServerEvent::SectionsChanged { .. }]
    ));

    h.send(ControlCommand::Advance { confirm: false })
        .await
        .expect("advance into unplanned");
    h.clock.advance_secs(45);
    let snapshot = h.snapshot().await;
    let active = snapshot.event.active_section(&snapshot.sections);
    let timer = derive_timer(
        &snapshot.event,
        SectionClock::for_section(active, 300),
        h.clock.now(),
    );
    assert_eq!(timer.formatted_time, "00:45");
    assert!(!timer.is_overtime);
}

#[tokio::test]
async fn stage_message_is_validated_and_clearable() {
    let h = harness(&[600]).await;
    let err = h
        .send(ControlCommand::BroadcastMessage { text: "   ".into() })
        .await
        .expect_err("empty");
    assert_eq!(err.code, ErrorCode::Validation);

    let set = h
        .send(ControlCommand::BroadcastMessage {
            text: "  Il reste 5 minutes ".into(),
        })
        .await
        .expect("broadcast");
    assert_eq!(
        set.value.event.stage_message.as_deref(),
        Some("Il reste 5 minutes")
    );

    let cleared = h.send(ControlCommand::ClearMessage).await.expect("clear");
    assert_eq!(cleared.value.event.stage_message, None);
}

#[tokio::test]
async fn stale_expected_version_is_a_conflict() {
    let h = harness(&[600]).await;
    let request = ControlRequest {
        command: ControlCommand::Play,
        expected_version: Some(h.event.version + 7),
    };
    let err = apply_control(&h.ctx, h.event.id, &request)
        .await
        .expect_err("stale");
    assert_eq!(err.code, ErrorCode::Conflict);
    assert_eq!(h.snapshot().await.event.status, EventStatus::Planned);

    let request = ControlRequest {
        command: ControlCommand::Play,
        expected_version: Some(h.event.version),
    };
    let applied = apply_control(&h.ctx, h.event.id, &request)
        .await
        .expect("current version");
    assert_eq!(applied.value.event.version, h.event.version + 1);
}

#[tokio::test]
async fn advance_without_sections_is_a_noop() {
    let h = harness(&[]).await;
    let applied = h
        .send(ControlCommand::Advance { confirm: true })
        .await
        .expect("noop");
    assert!(applied.changes.is_empty());
    assert_eq!(applied.value.event, h.event);
}

#[tokio::test]
async fn commands_on_missing_event_are_not_found() {
    let h = harness(&[600]).await;
    let err = apply_control(&h.ctx, EventId(9_999), &ControlCommand::Play.into())
        .await
        .expect_err("missing");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn second_event_cannot_play_while_another_is_playing() {
    let h = harness(&[600]).await;
    h.send(ControlCommand::Play).await.expect("play first");
    let other = h
        .ctx
        .storage
        .create_event("Répétition", h.clock.now())
        .await
        .expect("other event");

    let err = apply_control(&h.ctx, other.id, &ControlCommand::Play.into())
        .await
        .expect_err("one playing event at a time");
    assert_eq!(err.code, ErrorCode::Conflict);
    let untouched = crate::live_snapshot(&h.ctx, other.id)
        .await
        .expect("other snapshot");
    assert_eq!(untouched.event.status, EventStatus::Planned);
    assert_eq!(untouched.event.version, other.version);

    let shown = crate::discover_snapshot(&h.ctx, shared::protocol::Surface::Display)
        .await
        .expect("display discovery")
        .expect("playing event");
    assert_eq!(shown.event.id, h.event.id);

    h.send(ControlCommand::Pause).await.expect("pause first");
    let played = apply_control(&h.ctx, other.id, &ControlCommand::Play.into())
        .await
        .expect("play once the first is paused");
    assert_eq!(played.value.event.status, EventStatus::Playing);
}

#[tokio::test]
async fn replaying_the_playing_event_is_not_a_conflict() {
    let h = harness(&[600]).await;
    h.send(ControlCommand::Play).await.expect("play");
    h.clock.advance_secs(5);
    let again = h
        .send(ControlCommand::Play)
        .await
        .expect("play again on the same event");
    assert!(again.changes.is_empty());
    assert_eq!(again.value.event.status, EventStatus::Playing);
}
