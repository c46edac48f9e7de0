use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(EventId);
id_newtype!(SectionId);
id_newtype!(MemberId);
id_newtype!(TemplateId);
id_newtype!(TemplateItemId);

/// Fallback countdown used when no section duration is known.
pub const DEFAULT_SECTION_SECONDS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    #[default]
    Planned,
    Playing,
    Paused,
    Finished,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Planned => "PLANNED",
            EventStatus::Playing => "PLAYING",
            EventStatus::Paused => "PAUSED",
            EventStatus::Finished => "FINISHED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PLANNED" => Some(EventStatus::Planned),
            "PLAYING" => Some(EventStatus::Playing),
            "PAUSED" => Some(EventStatus::Paused),
            "FINISHED" => Some(EventStatus::Finished),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SectionKind {
    #[default]
    #[serde(rename = "GENERIC")]
    Generic,
    #[serde(rename = "SONG")]
    Song,
    #[serde(rename = "SPEECH")]
    Speech,
    #[serde(rename = "VIDEO")]
    Video,
    #[serde(rename = "unplanned")]
    Unplanned,
}

impl SectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Generic => "GENERIC",
            SectionKind::Song => "SONG",
            SectionKind::Speech => "SPEECH",
            SectionKind::Video => "VIDEO",
            SectionKind::Unplanned => "unplanned",
        }
    }

    /// Unknown values read back from storage degrade to `Generic`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "SONG" => SectionKind::Song,
            "SPEECH" => SectionKind::Speech,
            "VIDEO" => SectionKind::Video,
            "unplanned" => SectionKind::Unplanned,
            _ => SectionKind::Generic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Pasteur,
    Chantre,
    Moderateur,
    Responsable,
    Leader,
    #[default]
    Serviteur,
    Media,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberRole::Pasteur => "PASTEUR",
            MemberRole::Chantre => "CHANTRE",
            MemberRole::Moderateur => "MODERATEUR",
            MemberRole::Responsable => "RESPONSABLE",
            MemberRole::Leader => "LEADER",
            MemberRole::Serviteur => "SERVITEUR",
            MemberRole::Media => "MEDIA",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let role = match raw.trim().to_ascii_uppercase().as_str() {
            "PASTEUR" => MemberRole::Pasteur,
            "CHANTRE" => MemberRole::Chantre,
            "MODERATEUR" => MemberRole::Moderateur,
            "RESPONSABLE" => MemberRole::Responsable,
            "LEADER" => MemberRole::Leader,
            "SERVITEUR" => MemberRole::Serviteur,
            "MEDIA" => MemberRole::Media,
            _ => return None,
        };
        Some(role)
    }

    /// Prefix of generated matricules, e.g. `PAS-123`.
    pub fn matricule_prefix(self) -> &'static str {
        match self {
            MemberRole::Pasteur => "PAS",
            MemberRole::Chantre => "CHA",
            MemberRole::Moderateur => "MOD",
            MemberRole::Responsable => "RES",
            MemberRole::Leader => "LEA",
            MemberRole::Serviteur => "SER",
            MemberRole::Media => "MED",
        }
    }
}

/// One scheduled service and its live-run state.
///
/// `section_timer_start` is set exactly when `status` is `Playing`.
/// `section_timer_initial_duration` holds the seconds remaining at the moment
/// the timer was (re)started, or the frozen remainder while paused; it goes
/// negative when a section is paused in overtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub date: DateTime<Utc>,
    pub status: EventStatus,
    pub current_section_index: i64,
    pub section_timer_start: Option<DateTime<Utc>>,
    pub section_timer_initial_duration: i64,
    pub stage_message: Option<String>,
    #[serde(default)]
    pub stage_message_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: i64,
}

impl Event {
    /// Section the pointer designates, if the list is long enough.
    pub fn active_section<'a>(&self, sections: &'a [Section]) -> Option<&'a Section> {
        usize::try_from(self.current_section_index)
            .ok()
            .and_then(|index| sections.get(index))
    }

    pub fn is_timer_consistent(&self) -> bool {
        (self.status == EventStatus::Playing) == self.section_timer_start.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub event_id: EventId,
    pub order_index: i64,
    pub title: String,
    pub duration: i64,
    pub actual_duration: Option<i64>,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub is_unplanned: bool,
    pub member_id: Option<MemberId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub full_name: String,
    pub role: MemberRole,
    pub phone: Option<String>,
    pub matricule: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateItem {
    pub id: TemplateItemId,
    pub template_id: TemplateId,
    pub order_index: i64,
    pub title: String,
    pub duration: i64,
    #[serde(rename = "type")]
    pub kind: SectionKind,
}

/// Partial update of an [`Event`]. `None` leaves a field untouched; nullable
/// fields use a nested option so they can be cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_section_index: Option<i64>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub section_timer_start: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_timer_initial_duration: Option<i64>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub stage_message: Option<Option<String>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        *self == EventPatch::default()
    }

    pub fn apply_to(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(status) = self.status {
            event.status = status;
        }
        if let Some(index) = self.current_section_index {
            event.current_section_index = index;
        }
        if let Some(start) = self.section_timer_start {
            event.section_timer_start = start;
        }
        if let Some(initial) = self.section_timer_initial_duration {
            event.section_timer_initial_duration = initial;
        }
        if let Some(message) = &self.stage_message {
            event.stage_message = message.clone();
            event.stage_message_expires_at = None;
        }
    }
}

/// Input of the "create event" authoring action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub date: DateTime<Utc>,
    /// Template whose items are copied into the new event's sections.
    #[serde(default)]
    pub template_id: Option<TemplateId>,
}

/// Authoring edit of an event; the live-run fields are not reachable here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl From<&EventDetails> for EventPatch {
    fn from(details: &EventDetails) -> Self {
        EventPatch {
            title: details.title.as_ref().map(|title| title.trim().to_string()),
            date: details.date,
            ..EventPatch::default()
        }
    }
}

/// Fields accepted when a section is appended or edited in the authoring view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default, rename = "type")]
    pub kind: Option<SectionKind>,
    #[serde(default, deserialize_with = "double_option")]
    pub member_id: Option<Option<MemberId>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub full_name: String,
    #[serde(default)]
    pub role: MemberRole,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub matricule: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTemplateItem {
    pub title: String,
    pub duration: i64,
    #[serde(default, rename = "type")]
    pub kind: SectionKind,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
