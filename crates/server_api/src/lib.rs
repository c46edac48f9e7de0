use std::sync::Arc;

use shared::{
    clock::{Clock, SystemClock},
    domain::{Event, EventId},
    error::{ApiError, ErrorCode},
    lifecycle::LiveRules,
    protocol::{LiveSnapshot, ServerEvent, Surface},
    summary::EventSummary,
};
use storage::{EventRecordStore, Storage, StoreError};

pub mod admin;
pub mod control;

pub use control::apply_control;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub clock: Arc<dyn Clock>,
    pub rules: LiveRules,
}

impl ApiContext {
    pub fn new(storage: Storage, rules: LiveRules) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            rules,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Result of a write together with the change notifications to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<T> {
    pub value: T,
    pub changes: Vec<ServerEvent>,
}

impl<T> Applied<T> {
    pub fn new(value: T, changes: Vec<ServerEvent>) -> Self {
        Self { value, changes }
    }

    pub fn quiet(value: T) -> Self {
        Self::new(value, Vec::new())
    }
}

pub async fn discover_event(ctx: &ApiContext, surface: Surface) -> Result<Option<Event>, ApiError> {
    if let Some(event) = ctx
        .storage
        .find_playing_event()
        .await
        .map_err(store_error)?
    {
        return Ok(Some(event));
    }
    if let Some(event) = ctx
        .storage
        .next_planned_event(ctx.clock.now())
        .await
        .map_err(store_error)?
    {
        return Ok(Some(event));
    }
    match surface {
        Surface::Display => Ok(None),
        Surface::Controller => ctx.storage.latest_event().await.map_err(store_error),
    }
}

/// Snapshot of the discovered event, `None` meaning "offline".
pub async fn discover_snapshot(
    ctx: &ApiContext,
    surface: Surface,
) -> Result<Option<LiveSnapshot>, ApiError> {
    match discover_event(ctx, surface).await? {
        Some(event) => {
            let sections = ctx
                .storage
                .list_sections(event.id)
                .await
                .map_err(store_error)?;
            Ok(Some(LiveSnapshot { event, sections }))
        }
        None => Ok(None),
    }
}

pub async fn live_snapshot(ctx: &ApiContext, event_id: EventId) -> Result<LiveSnapshot, ApiError> {
    let event = ctx
        .storage
        .get_event(event_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::not_found(format!("event {event_id}")))?;
    let sections = ctx
        .storage
        .list_sections(event_id)
        .await
        .map_err(store_error)?;
    Ok(LiveSnapshot { event, sections })
}

pub async fn event_summary(ctx: &ApiContext, event_id: EventId) -> Result<EventSummary, ApiError> {
    let snapshot = live_snapshot(ctx, event_id).await?;
    Ok(EventSummary::from_sections(&snapshot.sections))
}

/// Map a storage failure onto the wire error, keeping the typed cases apart
/// from plain I/O errors.
pub(crate) fn store_error(err: anyhow::Error) -> ApiError {
    match err.downcast_ref::<StoreError>() {
        Some(
            StoreError::EventNotFound(_)
            | StoreError::SectionNotFound(_)
            | StoreError::TemplateNotFound(_),
        ) => ApiError::new(ErrorCode::NotFound, err.to_string()),
        Some(StoreError::VersionConflict { .. } | StoreError::AmbiguousPlaying { .. }) => {
            ApiError::new(ErrorCode::Conflict, err.to_string())
        }
        Some(StoreError::IncompleteReorder(_)) => {
            ApiError::new(ErrorCode::Validation, err.to_string())
        }
        None => internal(err),
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}
