//! Display Surface model.
//!
//! Subscription messages and one-second ticks are two independent inputs
//! that both end in [`LiveView::apply`], which re-derives the frame from the
//! latest observed row and the supplied `now`.

use chrono::{DateTime, Utc};
use shared::{
    domain::{Event, EventId, EventStatus, Section},
    live::{derive_timer, LiveTimer, SectionClock},
    protocol::{LiveSnapshot, ServerEvent},
    summary::EventSummary,
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveInput {
    Tick,
    Snapshot(Option<LiveSnapshot>),
    Event(Event),
    Sections(Vec<Section>),
    Deleted,
}

impl LiveInput {
    /// Inputs carried by a change notification for `event_id`; messages for
    /// other events yield `None`.
    pub fn from_server_event(event_id: EventId, message: ServerEvent) -> Option<Self> {
        match message {
            ServerEvent::EventUpdated { event } if event.id == event_id => {
                Some(LiveInput::Event(event))
            }
            ServerEvent::SectionsChanged {
                event_id: changed,
                sections,
            } if changed == event_id => Some(LiveInput::Sections(sections)),
            ServerEvent::EventDeleted { event_id: deleted } if deleted == event_id => {
                Some(LiveInput::Deleted)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFrame {
    pub event_id: EventId,
    pub event_title: String,
    pub timer: LiveTimer,
    pub section_title: Option<String>,
    /// One-based position of the active section.
    pub position: usize,
    pub section_count: usize,
    pub is_unplanned: bool,
    pub next_section_title: Option<String>,
    pub stage_message: Option<String>,
}

impl LiveFrame {
    pub fn is_last_section(&self) -> bool {
        self.position >= self.section_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageFrame {
    /// Nothing live or upcoming; not an error.
    Offline,
    Live(LiveFrame),
    Finished {
        event_title: String,
        summary: EventSummary,
    },
}

#[derive(Debug, Clone)]
pub struct LiveView {
    event: Option<Event>,
    sections: Vec<Section>,
    default_section_seconds: i64,
}

impl LiveView {
    pub fn new(default_section_seconds: i64) -> Self {
        Self {
            event: None,
            sections: Vec::new(),
            default_section_seconds,
        }
    }

    pub fn event_id(&self) -> Option<EventId> {
        self.event.as_ref().map(|event| event.id)
    }

    pub fn status(&self) -> Option<EventStatus> {
        self.event.as_ref().map(|event| event.status)
    }

    /// True while the frame changes every second on its own.
    pub fn is_ticking(&self) -> bool {
        self.status() == Some(EventStatus::Playing)
    }

    pub fn apply(&mut self, input: LiveInput, now: DateTime<Utc>) -> StageFrame {
        match input {
            LiveInput::Tick => {}
            LiveInput::Snapshot(Some(snapshot)) => {
                self.event = Some(snapshot.event);
                self.sections = snapshot.sections;
            }
            LiveInput::Snapshot(None) | LiveInput::Deleted => {
                self.event = None;
                self.sections.clear();
            }
            LiveInput::Event(event) => {
                let current = self.event.as_ref().map(|current| (current.id, current.version));
                match current {
                    // Out-of-order delivery: an older row never replaces a newer one.
                    Some((id, version)) if id == event.id && event.version < version => {
                        debug!(
                            event_id = event.id.0,
                            stale = event.version,
                            current = version,
                            "dropping stale event row"
                        );
                    }
                    Some((id, _)) if id != event.id => {
                        self.sections.clear();
                        self.event = Some(event);
                    }
                    _ => self.event = Some(event),
                }
            }
            LiveInput::Sections(sections) => self.sections = sections,
        }
        self.frame(now)
    }

    pub fn frame(&self, now: DateTime<Utc>) -> StageFrame {
        let Some(event) = &self.event else {
            return StageFrame::Offline;
        };
        if event.status == EventStatus::Finished {
            return StageFrame::Finished {
                event_title: event.title.clone(),
                summary: EventSummary::from_sections(&self.sections),
            };
        }

        let active = event.active_section(&self.sections);
        let timer = derive_timer(
            event,
            SectionClock::for_section(active, self.default_section_seconds),
            now,
        );
        let index = usize::try_from(event.current_section_index).unwrap_or(0);

        StageFrame::Live(LiveFrame {
            event_id: event.id,
            event_title: event.title.clone(),
            timer,
            section_title: active.map(|section| section.title.clone()),
            position: index + 1,
            section_count: self.sections.len(),
            is_unplanned: active.is_some_and(|section| section.is_unplanned),
            next_section_title: self
                .sections
                .get(index + 1)
                .map(|section| section.title.clone()),
            stage_message: event.stage_message.clone(),
        })
    }
}

#[cfg(test)]
#[path = "tests/live_view_tests.rs"]
mod tests;
