use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, Transaction,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tracing::debug;

use shared::domain::{
    Event, EventId, EventPatch, EventStatus, Member, MemberId, MemberRole, NewMember,
    NewTemplateItem, Section, SectionDraft, SectionId, SectionKind, Template, TemplateId,
    TemplateItem, TemplateItemId,
};

/// Items every new template starts with.
pub const DEFAULT_TEMPLATE_ITEMS: [(&str, i64, SectionKind); 3] = [
    ("Louange", 1200, SectionKind::Song),
    ("Annonces", 300, SectionKind::Speech),
    ("Message", 1800, SectionKind::Speech),
];

/// Duration given to a section appended from the authoring editor.
pub const NEW_SECTION_SECONDS: i64 = 300;

/// Unconditional `write_event` calls re-read and retry this many times when
/// another writer bumps the version between read and update.
const WRITE_EVENT_ATTEMPTS: u32 = 8;

const EVENT_COLUMNS: &str = "id, title, date, status, current_section_index, section_timer_start, \
     section_timer_initial_duration, stage_message, stage_message_expires_at, version";

const SECTION_COLUMNS: &str =
    "id, event_id, order_index, title, duration, actual_duration, type, is_unplanned, member_id";

/// Failures callers are expected to tell apart from plain I/O errors; they
/// travel inside `anyhow::Error` and are recovered with `downcast_ref`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("event {0} not found")]
    EventNotFound(EventId),
    #[error("section {0} not found")]
    SectionNotFound(SectionId),
    #[error("template {0} not found")]
    TemplateNotFound(TemplateId),
    #[error("event {id} is at version {actual}, expected {expected}")]
    VersionConflict { id: EventId, expected: i64, actual: i64 },
    #[error("{count} events are PLAYING at once")]
    AmbiguousPlaying { count: usize },
    #[error("reorder must list every section of event {0} exactly once")]
    IncompleteReorder(EventId),
}

/// The shared event record as the live controller and display see it.
///
/// `write_event` is a versioned write: with `expected_version` unset it is an
/// unconditional overwrite of the patched fields (last writer wins); with it
/// set, a row that moved on in the meantime is rejected with
/// [`StoreError::VersionConflict`]. Either way the row's version only ever
/// moves by one per successful write.
#[async_trait]
pub trait EventRecordStore: Send + Sync {
    async fn load_event(&self, event_id: EventId) -> Result<Option<Event>>;
    async fn load_sections(&self, event_id: EventId) -> Result<Vec<Section>>;
    async fn write_event(
        &self,
        event_id: EventId,
        patch: &EventPatch,
        expected_version: Option<i64>,
    ) -> Result<Event>;
    async fn record_actual_duration(&self, section_id: SectionId, seconds: i64) -> Result<()>;
    /// Shift every section at or after `order_index` up by one and insert an
    /// unplanned, zero-duration section there, atomically.
    async fn insert_unplanned_section(
        &self,
        event_id: EventId,
        title: &str,
        order_index: i64,
    ) -> Result<Section>;
    /// Zero or one: more than one PLAYING event is reported as
    /// [`StoreError::AmbiguousPlaying`].
    async fn find_playing_event(&self) -> Result<Option<Event>>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    // ── events ──────────────────────────────────────────────────────────

    pub async fn create_event(&self, title: &str, date: DateTime<Utc>) -> Result<Event> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO events (title, date, status) VALUES (?, ?, 'PLANNED') RETURNING id",
        )
        .bind(title)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        self.get_event(EventId(id))
            .await?
            .ok_or_else(|| anyhow!(StoreError::EventNotFound(EventId(id))))
    }

    /// Create an event and copy the template's items into its sections.
    pub async fn create_event_from_template(
        &self,
        title: &str,
        date: DateTime<Utc>,
        template_id: TemplateId,
    ) -> Result<Event> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM templates WHERE id = ?")
            .bind(template_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::TemplateNotFound(template_id).into());
        }

        let event_id: i64 = sqlx::query_scalar(
            "INSERT INTO events (title, date, status) VALUES (?, ?, 'PLANNED') RETURNING id",
        )
        .bind(title)
        .bind(date)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO sections (event_id, order_index, title, duration, type, is_unplanned)
             SELECT ?, order_index, title, duration, type, 0
             FROM template_items
             WHERE template_id = ?",
        )
        .bind(event_id)
        .bind(template_id.0)
        .execute(&mut *tx)
        .await
        .context("failed to copy template items into sections")?;
        tx.commit().await?;

        self.get_event(EventId(event_id))
            .await?
            .ok_or_else(|| anyhow!(StoreError::EventNotFound(EventId(event_id))))
    }

    pub async fn get_event(&self, event_id: EventId) -> Result<Option<Event>> {
        let row = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"))
            .bind(event_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    /// Newest first.
    pub async fn list_events(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY date DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(event_from_row).collect()
    }

    pub async fn delete_event(&self, event_id: EventId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(event_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Nearest PLANNED event scheduled at or after `now`.
    pub async fn next_planned_event(&self, now: DateTime<Utc>) -> Result<Option<Event>> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE status = 'PLANNED' AND date >= ?
             ORDER BY date ASC, id ASC
             LIMIT 1"
        ))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    pub async fn latest_event(&self) -> Result<Option<Event>> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY date DESC, id DESC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    // ── sections ────────────────────────────────────────────────────────

    pub async fn list_sections(&self, event_id: EventId) -> Result<Vec<Section>> {
        let rows = sqlx::query(&format!(
            "SELECT {SECTION_COLUMNS} FROM sections WHERE event_id = ? ORDER BY order_index ASC"
        ))
        .bind(event_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(section_from_row).collect()
    }

    pub async fn get_section(&self, section_id: SectionId) -> Result<Option<Section>> {
        let row = sqlx::query(&format!(
            "SELECT {SECTION_COLUMNS} FROM sections WHERE id = ?"
        ))
        .bind(section_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(section_from_row).transpose()
    }

    /// Append a section at the end of the event's program.
    pub async fn append_section(&self, event_id: EventId, draft: &SectionDraft) -> Result<Section> {
        let mut tx = self.pool.begin().await?;
        let next_index: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(order_index) + 1, 0) FROM sections WHERE event_id = ?",
        )
        .bind(event_id.0)
        .fetch_one(&mut *tx)
        .await?;
        let kind = draft.kind.unwrap_or_default();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO sections (event_id, order_index, title, duration, type, is_unplanned, member_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(event_id.0)
        .bind(next_index)
        .bind(draft.title.as_deref().unwrap_or_default())
        .bind(draft.duration.unwrap_or(NEW_SECTION_SECONDS))
        .bind(kind.as_str())
        .bind(kind == SectionKind::Unplanned)
        .bind(draft.member_id.flatten().map(|member| member.0))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        self.get_section(SectionId(id))
            .await?
            .ok_or_else(|| anyhow!(StoreError::SectionNotFound(SectionId(id))))
    }

    pub async fn update_section(&self, section_id: SectionId, draft: &SectionDraft) -> Result<Section> {
        let mut section = self
            .get_section(section_id)
            .await?
            .ok_or(StoreError::SectionNotFound(section_id))?;
        if let Some(title) = &draft.title {
            section.title = title.clone();
        }
        if let Some(duration) = draft.duration {
            section.duration = duration;
        }
        if let Some(kind) = draft.kind {
            section.kind = kind;
        }
        if let Some(member_id) = draft.member_id {
            section.member_id = member_id;
        }

        sqlx::query("UPDATE sections SET title = ?, duration = ?, type = ?, member_id = ? WHERE id = ?")
            .bind(&section.title)
            .bind(section.duration)
            .bind(section.kind.as_str())
            .bind(section.member_id.map(|member| member.0))
            .bind(section_id.0)
            .execute(&self.pool)
            .await?;
        Ok(section)
    }

    /// Delete a section and close the gap it leaves in the ordering.
    pub async fn delete_section(&self, section_id: SectionId) -> Result<EventId> {
        let section = self
            .get_section(section_id)
            .await?
            .ok_or(StoreError::SectionNotFound(section_id))?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM sections WHERE id = ?")
            .bind(section_id.0)
            .execute(&mut *tx)
            .await?;
        let remaining: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM sections WHERE event_id = ? ORDER BY order_index")
                .bind(section.event_id.0)
                .fetch_all(&mut *tx)
                .await?;
        rewrite_order(&mut tx, section.event_id, &remaining).await?;
        tx.commit().await?;
        Ok(section.event_id)
    }

    /// Rewrite every order index of the event so that `ordered[i]` gets `i`.
    pub async fn reorder_sections(&self, event_id: EventId, ordered: &[SectionId]) -> Result<Vec<Section>> {
        let mut tx = self.pool.begin().await?;
        let mut current: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM sections WHERE event_id = ?")
                .bind(event_id.0)
                .fetch_all(&mut *tx)
                .await?;
        let mut requested: Vec<i64> = ordered.iter().map(|id| id.0).collect();
        current.sort_unstable();
        requested.sort_unstable();
        if current != requested {
            return Err(StoreError::IncompleteReorder(event_id).into());
        }

        let ids: Vec<i64> = ordered.iter().map(|id| id.0).collect();
        rewrite_order(&mut tx, event_id, &ids).await?;
        tx.commit().await?;
        self.list_sections(event_id).await
    }

    // ── members ─────────────────────────────────────────────────────────

    pub async fn create_member(&self, member: &NewMember) -> Result<Member> {
        let matricule = member
            .matricule
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| generate_matricule(member.role));
        let phone = member
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO members (full_name, role, phone, matricule) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(member.full_name.trim())
        .bind(member.role.as_str())
        .bind(phone)
        .bind(&matricule)
        .fetch_one(&self.pool)
        .await?;

        Ok(Member {
            id: MemberId(id),
            full_name: member.full_name.trim().to_string(),
            role: member.role,
            phone: phone.map(str::to_string),
            matricule,
        })
    }

    /// Members ordered by name, optionally filtered on name or matricule.
    pub async fn list_members(&self, search: Option<&str>) -> Result<Vec<Member>> {
        let pattern = search
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| format!("%{}%", term.to_lowercase()));
        let rows = sqlx::query(
            "SELECT id, full_name, role, phone, matricule
             FROM members
             WHERE ?1 IS NULL OR lower(full_name) LIKE ?1 OR lower(matricule) LIKE ?1
             ORDER BY lower(full_name) ASC",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Member {
                id: MemberId(r.get::<i64, _>(0)),
                full_name: r.get::<String, _>(1),
                role: MemberRole::parse(&r.get::<String, _>(2)).unwrap_or_default(),
                phone: r.get::<Option<String>, _>(3),
                matricule: r.get::<String, _>(4),
            })
            .collect())
    }

    pub async fn delete_member(&self, member_id: MemberId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM members WHERE id = ?")
            .bind(member_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── templates ───────────────────────────────────────────────────────

    /// Create a template pre-filled with [`DEFAULT_TEMPLATE_ITEMS`].
    pub async fn create_template(&self, name: &str, description: Option<&str>) -> Result<Template> {
        let defaults: Vec<NewTemplateItem> = DEFAULT_TEMPLATE_ITEMS
            .iter()
            .map(|(title, duration, kind)| NewTemplateItem {
                title: (*title).to_string(),
                duration: *duration,
                kind: *kind,
            })
            .collect();
        self.create_template_with_items(name, description, &defaults)
            .await
    }

    pub async fn create_template_with_items(
        &self,
        name: &str,
        description: Option<&str>,
        items: &[NewTemplateItem],
    ) -> Result<Template> {
        let mut tx = self.pool.begin().await?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO templates (name, description) VALUES (?, ?) RETURNING id",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;
        for (index, item) in items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO template_items (template_id, order_index, title, duration, type)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(index as i64)
            .bind(&item.title)
            .bind(item.duration)
            .bind(item.kind.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(Template {
            id: TemplateId(id),
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        let rows = sqlx::query("SELECT id, name, description FROM templates ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| Template {
                id: TemplateId(r.get::<i64, _>(0)),
                name: r.get::<String, _>(1),
                description: r.get::<Option<String>, _>(2),
            })
            .collect())
    }

    pub async fn list_template_items(&self, template_id: TemplateId) -> Result<Vec<TemplateItem>> {
        let rows = sqlx::query(
            "SELECT id, template_id, order_index, title, duration, type
             FROM template_items
             WHERE template_id = ?
             ORDER BY order_index ASC",
        )
        .bind(template_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| TemplateItem {
                id: TemplateItemId(r.get::<i64, _>(0)),
                template_id: TemplateId(r.get::<i64, _>(1)),
                order_index: r.get::<i64, _>(2),
                title: r.get::<String, _>(3),
                duration: r.get::<i64, _>(4),
                kind: SectionKind::parse(&r.get::<String, _>(5)),
            })
            .collect())
    }

    pub async fn add_template_item(
        &self,
        template_id: TemplateId,
        item: &NewTemplateItem,
    ) -> Result<TemplateItem> {
        let row = sqlx::query(
            "INSERT INTO template_items (template_id, order_index, title, duration, type)
             VALUES (?1, (SELECT COALESCE(MAX(order_index) + 1, 0) FROM template_items WHERE template_id = ?1), ?2, ?3, ?4)
             RETURNING id, order_index",
        )
        .bind(template_id.0)
        .bind(&item.title)
        .bind(item.duration)
        .bind(item.kind.as_str())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to add item to template {template_id}"))?;

        Ok(TemplateItem {
            id: TemplateItemId(row.get::<i64, _>(0)),
            template_id,
            order_index: row.get::<i64, _>(1),
            title: item.title.clone(),
            duration: item.duration,
            kind: item.kind,
        })
    }

    pub async fn delete_template(&self, template_id: TemplateId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM templates WHERE id = ?")
            .bind(template_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl EventRecordStore for Storage {
    async fn load_event(&self, event_id: EventId) -> Result<Option<Event>> {
        self.get_event(event_id).await
    }

    async fn load_sections(&self, event_id: EventId) -> Result<Vec<Section>> {
        self.list_sections(event_id).await
    }

    async fn write_event(
        &self,
        event_id: EventId,
        patch: &EventPatch,
        expected_version: Option<i64>,
    ) -> Result<Event> {
        // Compare-and-swap on `version`. Each attempt is a plain read and a
        // single-statement UPDATE; no transaction upgrades a read lock.
        let mut attempt = 0;
        let event = loop {
            attempt += 1;
            let mut event = self
                .get_event(event_id)
                .await?
                .ok_or(StoreError::EventNotFound(event_id))?;
            let read_version = event.version;

            if let Some(expected) = expected_version {
                if expected != read_version {
                    return Err(StoreError::VersionConflict {
                        id: event_id,
                        expected,
                        actual: read_version,
                    }
                    .into());
                }
            }

            patch.apply_to(&mut event);
            event.version = read_version + 1;
            let result = sqlx::query(
                "UPDATE events SET
                    title = ?, date = ?, status = ?, current_section_index = ?,
                    section_timer_start = ?, section_timer_initial_duration = ?,
                    stage_message = ?, stage_message_expires_at = ?, version = ?
                 WHERE id = ? AND version = ?",
            )
            .bind(&event.title)
            .bind(event.date)
            .bind(event.status.as_str())
            .bind(event.current_section_index)
            .bind(event.section_timer_start)
            .bind(event.section_timer_initial_duration)
            .bind(&event.stage_message)
            .bind(event.stage_message_expires_at)
            .bind(event.version)
            .bind(event_id.0)
            .bind(read_version)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 1 {
                break event;
            }

            let actual = self
                .get_event(event_id)
                .await?
                .ok_or(StoreError::EventNotFound(event_id))?
                .version;
            if expected_version.is_some() || attempt >= WRITE_EVENT_ATTEMPTS {
                return Err(StoreError::VersionConflict {
                    id: event_id,
                    expected: read_version,
                    actual,
                }
                .into());
            }
            debug!(
                event_id = event_id.0,
                read_version, actual, attempt, "event row moved during write, retrying"
            );
        };

        debug!(event_id = event_id.0, version = event.version, "event row written");
        Ok(event)
    }

    async fn record_actual_duration(&self, section_id: SectionId, seconds: i64) -> Result<()> {
        let result = sqlx::query("UPDATE sections SET actual_duration = ? WHERE id = ?")
            .bind(seconds.max(0))
            .bind(section_id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::SectionNotFound(section_id).into());
        }
        Ok(())
    }

    async fn insert_unplanned_section(
        &self,
        event_id: EventId,
        title: &str,
        order_index: i64,
    ) -> Result<Section> {
        let order_index = order_index.max(0);
        let mut tx = self.pool.begin().await?;
        // Park the shifted rows on negative indices first so the unique
        // (event_id, order_index) key never sees two rows at once.
        sqlx::query(
            "UPDATE sections SET order_index = -(order_index + 1)
             WHERE event_id = ? AND order_index >= ?",
        )
        .bind(event_id.0)
        .bind(order_index)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE sections SET order_index = -order_index WHERE event_id = ? AND order_index < 0")
            .bind(event_id.0)
            .execute(&mut *tx)
            .await?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO sections (event_id, order_index, title, duration, type, is_unplanned)
             VALUES (?, ?, ?, 0, 'unplanned', 1)
             RETURNING id",
        )
        .bind(event_id.0)
        .bind(order_index)
        .bind(title)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to insert unplanned section into event {event_id}"))?;
        tx.commit().await?;

        self.get_section(SectionId(id))
            .await?
            .ok_or_else(|| anyhow!(StoreError::SectionNotFound(SectionId(id))))
    }

    async fn find_playing_event(&self) -> Result<Option<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE status = 'PLAYING' ORDER BY id LIMIT 2"
        ))
        .fetch_all(&self.pool)
        .await?;
        match rows.len() {
            0 => Ok(None),
            1 => event_from_row(&rows[0]).map(Some),
            _ => {
                let count: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE status = 'PLAYING'")
                        .fetch_one(&self.pool)
                        .await?;
                Err(StoreError::AmbiguousPlaying {
                    count: count as usize,
                }
                .into())
            }
        }
    }
}

async fn rewrite_order(
    tx: &mut Transaction<'_, Sqlite>,
    event_id: EventId,
    ordered_ids: &[i64],
) -> Result<()> {
    sqlx::query("UPDATE sections SET order_index = -(order_index + 1) WHERE event_id = ?")
        .bind(event_id.0)
        .execute(&mut **tx)
        .await?;
    for (index, id) in ordered_ids.iter().enumerate() {
        sqlx::query("UPDATE sections SET order_index = ? WHERE id = ? AND event_id = ?")
            .bind(index as i64)
            .bind(id)
            .bind(event_id.0)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

fn generate_matricule(role: MemberRole) -> String {
    let suffix: u16 = rand::rng().random_range(100..1000);
    format!("{}-{suffix}", role.matricule_prefix())
}

fn event_from_row(r: &SqliteRow) -> Result<Event> {
    let raw_status = r.get::<String, _>("status");
    let status = EventStatus::parse(&raw_status)
        .ok_or_else(|| anyhow!("unknown event status '{raw_status}'"))?;
    Ok(Event {
        id: EventId(r.get::<i64, _>("id")),
        title: r.get::<String, _>("title"),
        date: r.get::<DateTime<Utc>, _>("date"),
        status,
        current_section_index: r.get::<i64, _>("current_section_index"),
        section_timer_start: r.get::<Option<DateTime<Utc>>, _>("section_timer_start"),
        section_timer_initial_duration: r.get::<i64, _>("section_timer_initial_duration"),
        stage_message: r.get::<Option<String>, _>("stage_message"),
        stage_message_expires_at: r.get::<Option<DateTime<Utc>>, _>("stage_message_expires_at"),
        version: r.get::<i64, _>("version"),
    })
}

fn section_from_row(r: &SqliteRow) -> Result<Section> {
    Ok(Section {
        id: SectionId(r.get::<i64, _>("id")),
        event_id: EventId(r.get::<i64, _>("event_id")),
        order_index: r.get::<i64, _>("order_index"),
        title: r.get::<String, _>("title"),
        duration: r.get::<i64, _>("duration"),
        actual_duration: r.get::<Option<i64>, _>("actual_duration"),
        kind: SectionKind::parse(&r.get::<String, _>("type")),
        is_unplanned: r.get::<bool, _>("is_unplanned"),
        member_id: r.get::<Option<i64>, _>("member_id").map(MemberId),
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_file_path(database_url) else {
        return Ok(());
    };
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })
}

fn sqlite_file_path(database_url: &str) -> Option<PathBuf> {
    if !database_url.starts_with("sqlite:") || database_url.starts_with("sqlite::memory:") {
        return None;
    }
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
