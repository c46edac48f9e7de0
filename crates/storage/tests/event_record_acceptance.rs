use chrono::{TimeZone, Utc};
use shared::domain::{EventPatch, EventStatus, SectionDraft};
use storage::{EventRecordStore, Storage};

#[tokio::test]
async fn controller_writes_through_the_record_store_seam() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let date = Utc
        .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .expect("date");
    let event = storage.create_event("Culte", date).await.expect("event");
    for (title, duration) in [("Louange", 1200), ("Message", 1800)] {
        storage
            .append_section(
                event.id,
                &SectionDraft {
                    title: Some(title.into()),
                    duration: Some(duration),
                    ..SectionDraft::default()
                },
            )
            .await
            .expect("section");
    }

    let store: &dyn EventRecordStore = &storage;
    let started = store
        .write_event(
            event.id,
            &EventPatch {
                status: Some(EventStatus::Playing),
                current_section_index: Some(0),
                section_timer_start: Some(Some(date)),
                section_timer_initial_duration: Some(1200),
                ..EventPatch::default()
            },
            Some(event.version),
        )
        .await
        .expect("play");
    assert_eq!(
        store
            .find_playing_event()
            .await
            .expect("lookup")
            .map(|found| found.id),
        Some(event.id)
    );

    let sections = store.load_sections(event.id).await.expect("sections");
    store
        .record_actual_duration(sections[0].id, 1250)
        .await
        .expect("actual");
    let unplanned = store
        .insert_unplanned_section(event.id, "Annonce spéciale", 1)
        .await
        .expect("unplanned");

    let sections = store.load_sections(event.id).await.expect("sections");
    assert_eq!(sections.len(), 3);
    assert_eq!(sections[0].actual_duration, Some(1250));
    assert_eq!(sections[1].id, unplanned.id);
    assert_eq!(sections[2].title, "Message");

    let finished = store
        .write_event(
            event.id,
            &EventPatch {
                status: Some(EventStatus::Finished),
                section_timer_start: Some(None),
                ..EventPatch::default()
            },
            Some(started.version),
        )
        .await
        .expect("finish");
    assert!(finished.is_timer_consistent());
    assert!(store.find_playing_event().await.expect("lookup").is_none());
}
