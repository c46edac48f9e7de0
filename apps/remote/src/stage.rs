//! Stage display state between the change feed and the screen.
//!
//! [`Stage::connect`] and [`Stage::handle`] report transport failures as
//! `Err`; the display loop logs them and calls `connect` again.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use client_core::{ClientEvent, ClientHandle, LiveInput, LiveView, StageFrame};
use shared::{
    domain::{EventId, EventStatus},
    protocol::{ChangeFilter, ServerEvent, Surface},
};
use tracing::{debug, info, warn};

pub struct Stage {
    view: LiveView,
    subscribed: Option<ChangeFilter>,
}

impl Stage {
    pub fn new(default_section_seconds: i64) -> Self {
        Self {
            view: LiveView::new(default_section_seconds),
            subscribed: None,
        }
    }

    pub fn event_id(&self) -> Option<EventId> {
        self.view.event_id()
    }

    pub fn status(&self) -> Option<EventStatus> {
        self.view.status()
    }

    /// Rediscover the displayed event and open a fresh subscription for it.
    pub async fn connect<C: ClientHandle + ?Sized>(
        &mut self,
        client: &C,
        now: DateTime<Utc>,
    ) -> Result<StageFrame> {
        self.subscribed = None;
        let snapshot = client.discover(Surface::Display).await?;
        let frame = self.view.apply(LiveInput::Snapshot(snapshot), now);
        self.ensure_subscribed(client).await?;
        Ok(frame)
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> StageFrame {
        self.view.apply(LiveInput::Tick, now)
    }

    /// Fold one change-feed event into the view. `Ok(None)` means nothing on
    /// screen changed. A new PLAYING event replaces the observed one.
    pub async fn handle<C: ClientHandle + ?Sized>(
        &mut self,
        client: &C,
        change: ClientEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<StageFrame>> {
        let input = match change {
            ClientEvent::Server(ServerEvent::EventUpdated { event })
                if event.status == EventStatus::Playing && self.event_id() != Some(event.id) =>
            {
                info!(event_id = %event.id, "switching to playing event");
                LiveInput::Snapshot(Some(client.snapshot(event.id).await?))
            }
            ClientEvent::Server(message) => {
                let Some(event_id) = self.event_id() else {
                    return Ok(None);
                };
                match LiveInput::from_server_event(event_id, message) {
                    Some(input) => input,
                    None => return Ok(None),
                }
            }
            ClientEvent::Error(err) => {
                warn!(%err, "change feed error");
                return Ok(None);
            }
            ClientEvent::Disconnected => {
                self.subscribed = None;
                bail!("change feed disconnected");
            }
        };

        let frame = self.view.apply(input, now);
        self.ensure_subscribed(client).await?;
        Ok(Some(frame))
    }

    async fn ensure_subscribed<C: ClientHandle + ?Sized>(&mut self, client: &C) -> Result<()> {
        let filter = display_filter(self.event_id());
        if self.subscribed == Some(filter) {
            return Ok(());
        }
        self.subscribed = None;
        client.subscribe(filter).await?;
        debug!(event_id = ?filter.event_id, "display subscribed");
        self.subscribed = Some(filter);
        Ok(())
    }
}

/// The observed event, plus any event that starts playing.
pub fn display_filter(event_id: Option<EventId>) -> ChangeFilter {
    let mut filter = ChangeFilter::default().with_status(EventStatus::Playing);
    filter.event_id = event_id;
    filter
}

#[cfg(test)]
#[path = "tests/stage_tests.rs"]
mod tests;
