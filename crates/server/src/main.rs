use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use server_api::{
    admin, apply_control, discover_snapshot, event_summary, live_snapshot, ApiContext,
};
use shared::{
    domain::{
        Event, EventDetails, EventId, Member, MemberId, NewEvent, NewMember, NewTemplateItem,
        Section, SectionDraft, SectionId, Template, TemplateId, TemplateItem,
    },
    error::{ApiError, ErrorCode},
    lifecycle::LiveRules,
    protocol::{ChangeFilter, ControlRequest, LiveSnapshot, ServerEvent, Surface},
    summary::EventSummary,
};
use storage::Storage;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, prepare_database_url};

const MAX_REQUEST_BYTES: usize = 64 * 1024;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
    events: broadcast::Sender<ServerEvent>,
}

impl AppState {
    fn publish(&self, changes: Vec<ServerEvent>) {
        for change in changes {
            // No subscriber is not an error.
            let _ = self.events.send(change);
        }
    }
}

type HttpError = (StatusCode, Json<ApiError>);

#[derive(Debug, Deserialize)]
struct LiveQuery {
    #[serde(default)]
    surface: Surface,
}

#[derive(Debug, Deserialize)]
struct MemberQuery {
    search: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReorderRequest {
    section_ids: Vec<SectionId>,
}

#[derive(Debug, Deserialize)]
struct NewTemplateRequest {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext::new(
        storage,
        LiveRules {
            default_section_seconds: settings.default_section_seconds,
            max_stage_message_chars: settings.max_stage_message_chars,
        },
    );
    let (events, _) = broadcast::channel(settings.event_channel_capacity);

    let state = AppState { api, events };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, %database_url, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/events", get(http_list_events).post(http_create_event))
        .route("/events/live", get(http_live_event))
        .route(
            "/events/:event_id",
            get(http_get_event)
                .patch(http_update_event)
                .delete(http_delete_event),
        )
        .route(
            "/events/:event_id/sections",
            get(http_list_sections).post(http_append_section),
        )
        .route("/events/:event_id/sections/order", put(http_reorder_sections))
        .route("/events/:event_id/control", post(http_control))
        .route("/events/:event_id/summary", get(http_summary))
        .route(
            "/sections/:section_id",
            patch(http_update_section).delete(http_delete_section),
        )
        .route("/members", get(http_list_members).post(http_create_member))
        .route("/members/:member_id", axum::routing::delete(http_delete_member))
        .route("/templates", get(http_list_templates).post(http_create_template))
        .route("/templates/:template_id", axum::routing::delete(http_delete_template))
        .route(
            "/templates/:template_id/items",
            get(http_list_template_items).post(http_add_template_item),
        )
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.api.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            warn!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::ConfirmationRequired => StatusCode::PRECONDITION_REQUIRED,
        ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn http_error(err: ApiError) -> HttpError {
    let status = status_for(err.code);
    if status.is_server_error() {
        error!(code = ?err.code, message = %err.message, "request failed");
    } else {
        debug!(code = ?err.code, message = %err.message, "request rejected");
    }
    (status, Json(err))
}

async fn http_list_events(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Event>>, HttpError> {
    let events = admin::list_events(&state.api).await.map_err(http_error)?;
    Ok(Json(events))
}

async fn http_create_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewEvent>,
) -> Result<(StatusCode, Json<Event>), HttpError> {
    let applied = admin::create_event(&state.api, &req)
        .await
        .map_err(http_error)?;
    state.publish(applied.changes);
    Ok((StatusCode::CREATED, Json(applied.value)))
}

/// `null` when there is nothing live or upcoming.
async fn http_live_event(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LiveQuery>,
) -> Result<Json<Option<LiveSnapshot>>, HttpError> {
    let snapshot = discover_snapshot(&state.api, q.surface)
        .await
        .map_err(http_error)?;
    Ok(Json(snapshot))
}

async fn http_get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<Json<LiveSnapshot>, HttpError> {
    let snapshot = live_snapshot(&state.api, EventId(event_id))
        .await
        .map_err(http_error)?;
    Ok(Json(snapshot))
}

async fn http_update_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Json(req): Json<EventDetails>,
) -> Result<Json<Event>, HttpError> {
    let applied = admin::update_event_details(&state.api, EventId(event_id), &req)
        .await
        .map_err(http_error)?;
    state.publish(applied.changes);
    Ok(Json(applied.value))
}

async fn http_delete_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    let applied = admin::delete_event(&state.api, EventId(event_id))
        .await
        .map_err(http_error)?;
    state.publish(applied.changes);
    Ok(StatusCode::NO_CONTENT)
}

async fn http_list_sections(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<Json<Vec<Section>>, HttpError> {
    let sections = admin::list_sections(&state.api, EventId(event_id))
        .await
        .map_err(http_error)?;
    Ok(Json(sections))
}

async fn http_append_section(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Json(req): Json<SectionDraft>,
) -> Result<(StatusCode, Json<Section>), HttpError> {
    let applied = admin::append_section(&state.api, EventId(event_id), &req)
        .await
        .map_err(http_error)?;
    state.publish(applied.changes);
    Ok((StatusCode::CREATED, Json(applied.value)))
}

async fn http_reorder_sections(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<Vec<Section>>, HttpError> {
    let applied = admin::reorder_sections(&state.api, EventId(event_id), &req.section_ids)
        .await
        .map_err(http_error)?;
    state.publish(applied.changes);
    Ok(Json(applied.value))
}

async fn http_update_section(
    State(state): State<Arc<AppState>>,
    Path(section_id): Path<i64>,
    Json(req): Json<SectionDraft>,
) -> Result<Json<Section>, HttpError> {
    let applied = admin::update_section(&state.api, SectionId(section_id), &req)
        .await
        .map_err(http_error)?;
    state.publish(applied.changes);
    Ok(Json(applied.value))
}

async fn http_delete_section(
    State(state): State<Arc<AppState>>,
    Path(section_id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    let applied = admin::delete_section(&state.api, SectionId(section_id))
        .await
        .map_err(http_error)?;
    state.publish(applied.changes);
    Ok(StatusCode::NO_CONTENT)
}

async fn http_control(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Json(req): Json<ControlRequest>,
) -> Result<Json<LiveSnapshot>, HttpError> {
    let applied = apply_control(&state.api, EventId(event_id), &req)
        .await
        .map_err(http_error)?;
    state.publish(applied.changes);
    Ok(Json(applied.value))
}

async fn http_summary(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<Json<EventSummary>, HttpError> {
    let summary = event_summary(&state.api, EventId(event_id))
        .await
        .map_err(http_error)?;
    Ok(Json(summary))
}

async fn http_list_members(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MemberQuery>,
) -> Result<Json<Vec<Member>>, HttpError> {
    let members = admin::list_members(&state.api, q.search.as_deref())
        .await
        .map_err(http_error)?;
    Ok(Json(members))
}

async fn http_create_member(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewMember>,
) -> Result<(StatusCode, Json<Member>), HttpError> {
    let member = admin::create_member(&state.api, &req)
        .await
        .map_err(http_error)?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn http_delete_member(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    admin::delete_member(&state.api, MemberId(member_id))
        .await
        .map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_list_templates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Template>>, HttpError> {
    let templates = admin::list_templates(&state.api)
        .await
        .map_err(http_error)?;
    Ok(Json(templates))
}

async fn http_create_template(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewTemplateRequest>,
) -> Result<(StatusCode, Json<Template>), HttpError> {
    let template = admin::create_template(&state.api, &req.name, req.description.as_deref())
        .await
        .map_err(http_error)?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn http_delete_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    admin::delete_template(&state.api, TemplateId(template_id))
        .await
        .map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_list_template_items(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<i64>,
) -> Result<Json<Vec<TemplateItem>>, HttpError> {
    let items = admin::list_template_items(&state.api, TemplateId(template_id))
        .await
        .map_err(http_error)?;
    Ok(Json(items))
}

async fn http_add_template_item(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<i64>,
    Json(req): Json<NewTemplateItem>,
) -> Result<(StatusCode, Json<TemplateItem>), HttpError> {
    let item = admin::add_template_item(&state.api, TemplateId(template_id), &req)
        .await
        .map_err(http_error)?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ChangeFilter>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket, filter))
}

async fn ws_connection(
    state: Arc<AppState>,
    socket: axum::extract::ws::WebSocket,
    filter: ChangeFilter,
) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};
    use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.events.subscribe());
    debug!(?filter, "change feed subscriber connected");

    let send_task = tokio::spawn(async move {
        while let Some(next) = events.next().await {
            let event = match next {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, ?filter, "change feed subscriber lagged; skipping");
                    continue;
                }
            };
            if !filter.matches(&event) {
                continue;
            }
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
    debug!(?filter, "change feed subscriber disconnected");
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
