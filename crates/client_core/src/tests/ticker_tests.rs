use super::*;

fn drain(rx: &mut mpsc::UnboundedReceiver<LiveInput>) -> usize {
    let mut count = 0;
    while let Ok(input) = rx.try_recv() {
        assert_eq!(input, LiveInput::Tick);
        count += 1;
    }
    count
}

#[tokio::test(start_paused = true)]
async fn ticks_once_per_period_while_playing() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut ticker = Ticker::new(tx);

    ticker.sync(Some(EventStatus::Playing));
    assert!(ticker.is_running());
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    assert_eq!(drain(&mut rx), 3);
}

#[tokio::test(start_paused = true)]
async fn resyncing_while_playing_keeps_a_single_task() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut ticker = Ticker::new(tx);

    ticker.sync(Some(EventStatus::Playing));
    ticker.sync(Some(EventStatus::Playing));
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    assert_eq!(drain(&mut rx), 2);
}

#[tokio::test(start_paused = true)]
async fn stops_when_status_leaves_playing() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut ticker = Ticker::with_period(tx, Duration::from_millis(500));

    ticker.sync(Some(EventStatus::Playing));
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert_eq!(drain(&mut rx), 2);

    ticker.sync(Some(EventStatus::Paused));
    assert!(!ticker.is_running());
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(drain(&mut rx), 0);

    ticker.sync(None);
    assert!(!ticker.is_running());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_ticker_closes_the_channel() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut ticker = Ticker::new(tx);
    ticker.sync(Some(EventStatus::Playing));

    drop(ticker);
    assert_eq!(rx.recv().await, None);
}
