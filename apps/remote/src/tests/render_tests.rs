use super::*;
use shared::{
    domain::{EventId, EventStatus, SectionId},
    live::LiveTimer,
    summary::SectionDelta,
};

fn frame(status: EventStatus, time: &str, overtime: bool) -> LiveFrame {
    LiveFrame {
        event_id: EventId(1),
        event_title: "Culte".to_string(),
        timer: LiveTimer {
            status,
            time_left: 0,
            is_overtime: overtime,
            formatted_time: time.to_string(),
        },
        section_title: Some("Louange".to_string()),
        position: 1,
        section_count: 3,
        is_unplanned: false,
        next_section_title: Some("Annonces".to_string()),
        stage_message: None,
    }
}

#[test]
fn offline_stage_says_so() {
    assert_eq!(stage(&StageFrame::Offline), "No live event\n");
    assert_eq!(status(&StageFrame::Offline), "No live event\n");
}

#[test]
fn stage_shows_time_section_and_message() {
    let mut live = frame(EventStatus::Playing, "-00:15", true);
    live.stage_message = Some("Conclure".to_string());
    let text = stage(&StageFrame::Live(live));

    assert!(text.contains("-00:15"));
    assert!(text.contains("OVERTIME"));
    assert!(text.contains("1/3 Louange"));
    assert!(text.contains(">>> Conclure <<<"));
    assert!(!text.contains("Annonces"));
}

#[test]
fn status_previews_next_section() {
    let text = status(&StageFrame::Live(frame(EventStatus::Paused, "08:20", false)));
    assert!(text.starts_with("Culte [PAUSED] 08:20\n"));
    assert!(text.contains("next: Annonces"));
    assert!(!text.contains("OVERTIME"));
}

#[test]
fn status_marks_last_and_unplanned_sections() {
    let mut live = frame(EventStatus::Playing, "01:05", false);
    live.position = 3;
    live.is_unplanned = true;
    live.next_section_title = None;
    let text = status(&StageFrame::Live(live));

    assert!(text.contains("3/3 Louange [UNPLANNED]"));
    assert!(text.contains("last section"));
}

#[test]
fn finished_stage_lists_deltas() {
    let summary = EventSummary {
        total_planned: 10_500,
        total_actual: 10_800,
        unplanned_count: 1,
        on_time: false,
        sections: vec![
            SectionDelta {
                section_id: SectionId(1),
                title: "Louange".to_string(),
                planned: 2700,
                actual: 3000,
                is_unplanned: false,
            },
            SectionDelta {
                section_id: SectionId(2),
                title: "Témoignage".to_string(),
                planned: 0,
                actual: 0,
                is_unplanned: true,
            },
        ],
    };
    let text = stage(&StageFrame::Finished {
        event_title: "Culte".to_string(),
        summary,
    });

    assert!(text.starts_with("Culte - finished\nOverran by 5 min\n"));
    assert!(text.contains("planned 2h 55m  actual 3h 0m  unplanned 1"));
    assert!(text.contains("  +5m  Louange\n"));
    assert!(text.contains("   0m  Témoignage *\n"));
}
