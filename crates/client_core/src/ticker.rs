use std::time::Duration;

use shared::domain::EventStatus;
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};
use tracing::debug;

use crate::live_view::LiveInput;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Emits [`LiveInput::Tick`] once per period while the observed event is
/// PLAYING. The task is aborted when the status leaves PLAYING and when the
/// ticker is dropped.
pub struct Ticker {
    period: Duration,
    tx: mpsc::UnboundedSender<LiveInput>,
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new(tx: mpsc::UnboundedSender<LiveInput>) -> Self {
        Self::with_period(tx, TICK_PERIOD)
    }

    pub fn with_period(tx: mpsc::UnboundedSender<LiveInput>, period: Duration) -> Self {
        Self {
            period,
            tx,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start or stop ticking to match `status`.
    pub fn sync(&mut self, status: Option<EventStatus>) {
        if status == Some(EventStatus::Playing) {
            self.start();
        } else {
            self.stop();
        }
    }

    fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let tx = self.tx.clone();
        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(LiveInput::Tick).is_err() {
                    break;
                }
            }
        }));
        debug!("ticker started");
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("ticker stopped");
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "tests/ticker_tests.rs"]
mod tests;
