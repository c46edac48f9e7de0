use serde::{Deserialize, Serialize};

use crate::{
    domain::{Event, EventId, EventStatus, Section},
    error::ApiError,
};

/// Operations the controller surface can issue against a live event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ControlCommand {
    Play,
    Pause,
    Advance {
        #[serde(default)]
        confirm: bool,
    },
    InsertUnplanned {
        title: String,
    },
    BroadcastMessage {
        text: String,
    },
    ClearMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub command: ControlCommand,
    /// When set, the write only succeeds if the stored row is still at this
    /// version. Absent means last writer wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<i64>,
}

impl From<ControlCommand> for ControlRequest {
    fn from(command: ControlCommand) -> Self {
        Self {
            command,
            expected_version: None,
        }
    }
}

/// Which client is looking for "the" event; only the controller falls back
/// to the most recent event when nothing is live or upcoming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    #[default]
    Display,
    Controller,
}

impl Surface {
    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Display => "display",
            Surface::Controller => "controller",
        }
    }
}

/// Event row together with its ordered program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub event: Event,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    EventUpdated {
        event: Event,
    },
    SectionsChanged {
        event_id: EventId,
        sections: Vec<Section>,
    },
    EventDeleted {
        event_id: EventId,
    },
    Error(ApiError),
}

impl ServerEvent {
    pub fn event_id(&self) -> Option<EventId> {
        match self {
            ServerEvent::EventUpdated { event } => Some(event.id),
            ServerEvent::SectionsChanged { event_id, .. }
            | ServerEvent::EventDeleted { event_id } => Some(*event_id),
            ServerEvent::Error(_) => None,
        }
    }
}

/// Equality predicates a subscriber can attach to the change feed. A message
/// is delivered when it matches any predicate that is set; with none set
/// everything is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
}

impl ChangeFilter {
    pub fn for_event(event_id: EventId) -> Self {
        Self {
            event_id: Some(event_id),
            status: None,
        }
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.event_id.is_none() && self.status.is_none()
    }

    pub fn matches(&self, message: &ServerEvent) -> bool {
        if self.is_unfiltered() {
            return true;
        }
        if let (Some(wanted), Some(actual)) = (self.event_id, message.event_id()) {
            if wanted == actual {
                return true;
            }
        }
        match (self.status, message) {
            (Some(status), ServerEvent::EventUpdated { event }) => event.status == status,
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
