use super::*;
use crate::fake_client::{snapshot, FakeClient};
use chrono::{Duration, TimeZone};
use client_core::LiveFrame;
use shared::domain::{Event, Section, SectionId, SectionKind};

fn nine_am() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .expect("timestamp")
}

fn playing(id: i64, initial: i64) -> shared::protocol::LiveSnapshot {
    let mut live = snapshot(id, EventStatus::Playing);
    live.event.section_timer_start = Some(nine_am());
    live.event.section_timer_initial_duration = initial;
    live.sections = vec![Section {
        id: SectionId(id * 10),
        event_id: EventId(id),
        order_index: 0,
        title: format!("Louange {id}"),
        duration: initial,
        actual_duration: None,
        kind: SectionKind::Song,
        is_unplanned: false,
        member_id: None,
    }];
    live
}

fn live(frame: StageFrame) -> LiveFrame {
    match frame {
        StageFrame::Live(frame) => frame,
        other => panic!("expected live frame, got {other:?}"),
    }
}

fn updated(event: Event) -> ClientEvent {
    ClientEvent::Server(ServerEvent::EventUpdated { event })
}

#[tokio::test]
async fn connect_shows_the_playing_event_and_subscribes_for_it() {
    let client = FakeClient::new(Some(playing(1, 600)));
    let mut stage = Stage::new(300);

    let frame = live(stage.connect(&client, nine_am()).await.expect("connect"));
    assert_eq!(frame.timer.time_left, 600);
    assert_eq!(stage.event_id(), Some(EventId(1)));

    let script = client.script();
    assert_eq!(script.surfaces, vec![Surface::Display]);
    assert_eq!(script.subscriptions, vec![display_filter(Some(EventId(1)))]);
}

#[tokio::test]
async fn offline_display_still_listens_for_playing_events() {
    let client = FakeClient::new(None);
    let mut stage = Stage::new(300);

    let frame = stage.connect(&client, nine_am()).await.expect("connect");
    assert_eq!(frame, StageFrame::Offline);
    assert_eq!(
        client.script().subscriptions,
        vec![ChangeFilter::default().with_status(EventStatus::Playing)]
    );
}

#[tokio::test]
async fn unreachable_server_is_an_error_without_subscription() {
    let client = FakeClient::new(Some(playing(1, 600)));
    client.script().failing_discovers = 1;
    let mut stage = Stage::new(300);

    stage
        .connect(&client, nine_am())
        .await
        .expect_err("discover fails");
    assert!(client.script().subscriptions.is_empty());

    stage.connect(&client, nine_am()).await.expect("second try");
    assert_eq!(client.script().subscriptions.len(), 1);
}

#[tokio::test]
async fn failed_subscribe_is_retried_on_the_next_connect() {
    let client = FakeClient::new(Some(playing(1, 600)));
    client.script().failing_subscribes = 1;
    let mut stage = Stage::new(300);

    stage
        .connect(&client, nine_am())
        .await
        .expect_err("subscribe fails");
    stage.connect(&client, nine_am()).await.expect("reconnect");
    assert_eq!(
        client.script().subscriptions,
        vec![display_filter(Some(EventId(1)))]
    );
}

#[tokio::test]
async fn newly_playing_event_replaces_the_observed_one() {
    let client = FakeClient::new(Some(playing(1, 600)));
    client.script().snapshots.insert(EventId(2), playing(2, 900));
    let mut stage = Stage::new(300);
    stage.connect(&client, nine_am()).await.expect("connect");

    let frame = stage
        .handle(&client, updated(playing(2, 900).event), nine_am())
        .await
        .expect("switch")
        .expect("redrawn");
    let frame = live(frame);
    assert_eq!(frame.section_title.as_deref(), Some("Louange 2"));
    assert_eq!(frame.timer.time_left, 900);
    assert_eq!(
        client.script().subscriptions,
        vec![
            display_filter(Some(EventId(1))),
            display_filter(Some(EventId(2))),
        ]
    );
}

#[tokio::test]
async fn snapshot_failure_while_switching_is_an_error() {
    let client = FakeClient::new(Some(playing(1, 600)));
    let mut stage = Stage::new(300);
    stage.connect(&client, nine_am()).await.expect("connect");
    client.script().failing_snapshots = 1;

    stage
        .handle(&client, updated(playing(2, 900).event), nine_am())
        .await
        .expect_err("snapshot fails");
    assert_eq!(stage.event_id(), Some(EventId(1)));
    assert_eq!(client.script().subscriptions.len(), 1);
}

#[tokio::test]
async fn disconnect_is_an_error_and_reconnect_resubscribes() {
    let client = FakeClient::new(Some(playing(1, 600)));
    let mut stage = Stage::new(300);
    stage.connect(&client, nine_am()).await.expect("connect");

    stage
        .handle(&client, ClientEvent::Disconnected, nine_am())
        .await
        .expect_err("feed lost");
    stage.connect(&client, nine_am()).await.expect("reconnect");

    let script = client.script();
    assert_eq!(script.surfaces, vec![Surface::Display, Surface::Display]);
    assert_eq!(
        script.subscriptions,
        vec![
            display_filter(Some(EventId(1))),
            display_filter(Some(EventId(1))),
        ]
    );
}

#[tokio::test]
async fn feed_errors_and_unrelated_changes_leave_the_screen_alone() {
    let client = FakeClient::new(Some(playing(1, 600)));
    let mut stage = Stage::new(300);
    stage.connect(&client, nine_am()).await.expect("connect");

    let redraw = stage
        .handle(&client, ClientEvent::Error("bad frame".to_string()), nine_am())
        .await
        .expect("tolerated");
    assert!(redraw.is_none());

    let redraw = stage
        .handle(
            &client,
            ClientEvent::Server(ServerEvent::EventDeleted {
                event_id: EventId(9),
            }),
            nine_am(),
        )
        .await
        .expect("ignored");
    assert!(redraw.is_none());
    assert_eq!(client.script().subscriptions.len(), 1);
}

#[tokio::test]
async fn deleted_event_goes_offline_and_narrows_the_subscription() {
    let client = FakeClient::new(Some(playing(1, 600)));
    let mut stage = Stage::new(300);
    stage.connect(&client, nine_am()).await.expect("connect");

    let frame = stage
        .handle(
            &client,
            ClientEvent::Server(ServerEvent::EventDeleted {
                event_id: EventId(1),
            }),
            nine_am(),
        )
        .await
        .expect("deleted")
        .expect("redrawn");
    assert_eq!(frame, StageFrame::Offline);
    assert_eq!(stage.status(), None);
    assert_eq!(
        client.script().subscriptions.last(),
        Some(&display_filter(None))
    );
}

#[tokio::test]
async fn ticks_rederive_the_countdown() {
    let client = FakeClient::new(Some(playing(1, 600)));
    let mut stage = Stage::new(300);
    stage.connect(&client, nine_am()).await.expect("connect");

    let frame = live(stage.tick(nine_am() + Duration::seconds(90)));
    assert_eq!(frame.timer.formatted_time, "08:30");
}
