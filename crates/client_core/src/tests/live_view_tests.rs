use super::*;
use chrono::{Duration, TimeZone};
use shared::domain::{SectionId, SectionKind};

fn nine_am() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .expect("timestamp")
}

fn event(status: EventStatus) -> Event {
    Event {
        id: EventId(1),
        title: "Culte du dimanche".to_string(),
        date: nine_am(),
        status,
        current_section_index: 0,
        section_timer_start: None,
        section_timer_initial_duration: 0,
        stage_message: None,
        stage_message_expires_at: None,
        version: 1,
    }
}

fn section(id: i64, title: &str, duration: i64, actual: Option<i64>) -> Section {
    Section {
        id: SectionId(id),
        event_id: EventId(1),
        order_index: id - 1,
        title: title.to_string(),
        duration,
        actual_duration: actual,
        kind: SectionKind::Speech,
        is_unplanned: false,
        member_id: None,
    }
}

fn playing_at(started: DateTime<Utc>, initial: i64, index: i64) -> Event {
    Event {
        status: EventStatus::Playing,
        current_section_index: index,
        section_timer_start: Some(started),
        section_timer_initial_duration: initial,
        ..event(EventStatus::Playing)
    }
}

fn live(frame: StageFrame) -> LiveFrame {
    match frame {
        StageFrame::Live(frame) => frame,
        other => panic!("expected live frame, got {other:?}"),
    }
}

#[test]
fn empty_view_is_offline() {
    let mut view = LiveView::new(300);
    assert_eq!(view.frame(nine_am()), StageFrame::Offline);
    assert_eq!(view.apply(LiveInput::Snapshot(None), nine_am()), StageFrame::Offline);
    assert!(!view.is_ticking());
}

#[test]
fn planned_event_shows_first_section_duration() {
    let mut view = LiveView::new(300);
    let frame = live(view.apply(
        LiveInput::Snapshot(Some(LiveSnapshot {
            event: event(EventStatus::Planned),
            sections: vec![section(1, "Louange", 1200, None), section(2, "Message", 1800, None)],
        })),
        nine_am(),
    ));

    assert_eq!(frame.timer.formatted_time, "20:00");
    assert_eq!(frame.section_title.as_deref(), Some("Louange"));
    assert_eq!(frame.position, 1);
    assert_eq!(frame.section_count, 2);
    assert_eq!(frame.next_section_title.as_deref(), Some("Message"));
    assert!(!frame.is_last_section());
}

#[test]
fn ticks_rederive_from_the_stored_start() {
    let mut view = LiveView::new(300);
    view.apply(
        LiveInput::Snapshot(Some(LiveSnapshot {
            event: playing_at(nine_am(), 600, 0),
            sections: vec![section(1, "Annonces", 600, None)],
        })),
        nine_am(),
    );
    assert!(view.is_ticking());

    let frame = live(view.apply(LiveInput::Tick, nine_am() + Duration::seconds(90)));
    assert_eq!(frame.timer.time_left, 510);
    assert_eq!(frame.timer.formatted_time, "08:30");
    assert!(frame.is_last_section());
    assert!(frame.next_section_title.is_none());

    let late = live(view.apply(LiveInput::Tick, nine_am() + Duration::seconds(615)));
    assert!(late.timer.is_overtime);
    assert_eq!(late.timer.formatted_time, "-00:15");
}

#[test]
fn unplanned_section_counts_up() {
    let mut unplanned = section(2, "Témoignage", 0, None);
    unplanned.is_unplanned = true;
    let mut view = LiveView::new(300);
    view.apply(
        LiveInput::Snapshot(Some(LiveSnapshot {
            event: playing_at(nine_am(), 0, 1),
            sections: vec![section(1, "Louange", 1200, Some(1250)), unplanned],
        })),
        nine_am(),
    );

    let frame = live(view.apply(LiveInput::Tick, nine_am() + Duration::seconds(45)));
    assert!(frame.is_unplanned);
    assert!(!frame.timer.is_overtime);
    assert_eq!(frame.timer.formatted_time, "00:45");
    assert_eq!(frame.position, 2);
}

#[test]
fn section_changes_keep_the_event_row() {
    let mut view = LiveView::new(300);
    view.apply(LiveInput::Event(event(EventStatus::Planned)), nine_am());
    let frame = live(view.frame(nine_am()));
    assert_eq!(frame.section_count, 0);
    assert_eq!(frame.timer.formatted_time, "05:00");

    let frame = live(view.apply(
        LiveInput::Sections(vec![section(1, "Louange", 1200, None)]),
        nine_am(),
    ));
    assert_eq!(frame.event_title, "Culte du dimanche");
    assert_eq!(frame.timer.formatted_time, "20:00");
}

#[test]
fn stage_message_is_carried_to_the_frame() {
    let mut view = LiveView::new(300);
    let mut row = playing_at(nine_am(), 600, 0);
    row.stage_message = Some("Conclure svp".to_string());
    let frame = live(view.apply(
        LiveInput::Snapshot(Some(LiveSnapshot {
            event: row,
            sections: vec![section(1, "Message", 600, None)],
        })),
        nine_am(),
    ));
    assert_eq!(frame.stage_message.as_deref(), Some("Conclure svp"));
}

#[test]
fn finished_event_shows_summary() {
    let mut view = LiveView::new(300);
    let frame = view.apply(
        LiveInput::Snapshot(Some(LiveSnapshot {
            event: event(EventStatus::Finished),
            sections: vec![
                section(1, "Louange", 600, Some(650)),
                section(2, "Message", 1800, Some(1700)),
            ],
        })),
        nine_am(),
    );

    match frame {
        StageFrame::Finished {
            event_title,
            summary,
        } => {
            assert_eq!(event_title, "Culte du dimanche");
            assert_eq!(summary.total_planned, 2400);
            assert_eq!(summary.total_actual, 2350);
            assert!(summary.on_time);
        }
        other => panic!("expected summary, got {other:?}"),
    }
    assert!(!view.is_ticking());
}

#[test]
fn deletion_goes_offline() {
    let mut view = LiveView::new(300);
    view.apply(LiveInput::Event(event(EventStatus::Planned)), nine_am());
    assert_eq!(view.apply(LiveInput::Deleted, nine_am()), StageFrame::Offline);
    assert!(view.event_id().is_none());
}

#[test]
fn notifications_for_other_events_are_ignored() {
    let mine = EventId(1);
    let other = Event {
        id: EventId(2),
        ..event(EventStatus::Playing)
    };

    assert!(LiveInput::from_server_event(mine, ServerEvent::EventUpdated { event: other }).is_none());
    assert!(LiveInput::from_server_event(
        mine,
        ServerEvent::SectionsChanged {
            event_id: EventId(2),
            sections: Vec::new(),
        }
    )
    .is_none());
    assert_eq!(
        LiveInput::from_server_event(mine, ServerEvent::EventDeleted { event_id: mine }),
        Some(LiveInput::Deleted)
    );
    assert!(matches!(
        LiveInput::from_server_event(
            mine,
            ServerEvent::EventUpdated {
                event: event(EventStatus::Paused)
            }
        ),
        Some(LiveInput::Event(_))
    ));
}

#[test]
fn switching_events_drops_stale_sections() {
    let mut view = LiveView::new(300);
    view.apply(
        LiveInput::Snapshot(Some(LiveSnapshot {
            event: event(EventStatus::Planned),
            sections: vec![section(1, "Louange", 1200, None)],
        })),
        nine_am(),
    );
    let next = Event {
        id: EventId(9),
        ..event(EventStatus::Planned)
    };
    let frame = live(view.apply(LiveInput::Event(next), nine_am()));
    assert_eq!(frame.section_count, 0);
    assert_eq!(frame.event_id, EventId(9));
}

#[test]
fn older_event_row_does_not_replace_a_newer_one() {
    let mut view = LiveView::new(300);
    let playing = Event {
        version: 4,
        ..playing_at(nine_am(), 600, 0)
    };
    view.apply(
        LiveInput::Snapshot(Some(LiveSnapshot {
            event: playing,
            sections: vec![section(1, "Annonces", 600, None)],
        })),
        nine_am(),
    );

    let stale = Event {
        version: 3,
        ..event(EventStatus::Planned)
    };
    let frame = live(view.apply(LiveInput::Event(stale), nine_am() + Duration::seconds(30)));
    assert_eq!(view.status(), Some(EventStatus::Playing));
    assert_eq!(frame.timer.time_left, 570);

    let paused = Event {
        version: 5,
        section_timer_initial_duration: 560,
        ..event(EventStatus::Paused)
    };
    let frame = live(view.apply(LiveInput::Event(paused), nine_am() + Duration::seconds(40)));
    assert_eq!(view.status(), Some(EventStatus::Paused));
    assert_eq!(frame.timer.time_left, 560);
}
