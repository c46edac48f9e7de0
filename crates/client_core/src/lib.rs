use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::EventId,
    error::{ApiError, ApiException, ErrorCode},
    protocol::{ChangeFilter, ControlRequest, LiveSnapshot, ServerEvent, Surface},
    summary::EventSummary,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};
use url::Url;

pub mod live_view;
pub mod ticker;

pub use live_view::{LiveFrame, LiveInput, LiveView, StageFrame};
pub use ticker::Ticker;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Server(ServerEvent),
    Disconnected,
    Error(String),
}

/// Operations the remote and the stage display need from the server.
#[async_trait]
pub trait ClientHandle: Send + Sync {
    async fn discover(&self, surface: Surface) -> Result<Option<LiveSnapshot>>;
    async fn snapshot(&self, event_id: EventId) -> Result<LiveSnapshot>;
    async fn send_command(&self, event_id: EventId, request: &ControlRequest)
        -> Result<LiveSnapshot>;
    async fn summary(&self, event_id: EventId) -> Result<EventSummary>;
    async fn subscribe(&self, filter: ChangeFilter) -> Result<()>;
    fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent>;
}

pub struct LiveClient {
    http: Client,
    server_url: Url,
    events: broadcast::Sender<ClientEvent>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl LiveClient {
    pub fn new(server_url: &str) -> Result<Arc<Self>> {
        let server_url = Url::parse(server_url.trim_end_matches('/'))
            .with_context(|| format!("invalid server url: {server_url}"))?;
        if !matches!(server_url.scheme(), "http" | "https") {
            return Err(anyhow!("server_url must start with http:// or https://"));
        }
        let (events, _) = broadcast::channel(256);
        Ok(Arc::new(Self {
            http: Client::new(),
            server_url,
            events,
            subscription: Mutex::new(None),
        }))
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.server_url
            .join(path)
            .with_context(|| format!("invalid endpoint path: {path}"))
    }

    fn ws_url(&self, filter: ChangeFilter) -> Result<Url> {
        let mut url = self.endpoint("/ws")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| anyhow!("cannot derive websocket url from {}", self.server_url))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(event_id) = filter.event_id {
                query.append_pair("event_id", &event_id.to_string());
            }
            if let Some(status) = filter.status {
                query.append_pair("status", status.as_str());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    pub async fn unsubscribe(&self) {
        if let Some(task) = self.subscription.lock().await.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl ClientHandle for LiveClient {
    async fn discover(&self, surface: Surface) -> Result<Option<LiveSnapshot>> {
        let mut url = self.endpoint("/events/live")?;
        url.query_pairs_mut().append_pair("surface", surface.as_str());
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("failed to reach server")?;
        decode(response).await
    }

    async fn snapshot(&self, event_id: EventId) -> Result<LiveSnapshot> {
        let response = self
            .http
            .get(self.endpoint(&format!("/events/{event_id}"))?)
            .send()
            .await
            .context("failed to reach server")?;
        decode(response).await
    }

    async fn send_command(
        &self,
        event_id: EventId,
        request: &ControlRequest,
    ) -> Result<LiveSnapshot> {
        let response = self
            .http
            .post(self.endpoint(&format!("/events/{event_id}/control"))?)
            .json(request)
            .send()
            .await
            .context("failed to reach server")?;
        decode(response).await
    }

    async fn summary(&self, event_id: EventId) -> Result<EventSummary> {
        let response = self
            .http
            .get(self.endpoint(&format!("/events/{event_id}/summary"))?)
            .send()
            .await
            .context("failed to reach server")?;
        decode(response).await
    }

    /// Replace any running subscription with one for `filter`. Messages are
    /// re-emitted as [`ClientEvent::Server`].
    async fn subscribe(&self, filter: ChangeFilter) -> Result<()> {
        let ws_url = self.ws_url(filter)?;
        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
        let (_, mut ws_reader) = ws_stream.split();
        info!(%ws_url, "subscribed to change feed");

        let events = self.events.clone();
        let task = tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            let _ = events.send(ClientEvent::Server(event));
                        }
                        Err(err) => {
                            warn!(%err, "undecodable change notification");
                            let _ = events.send(ClientEvent::Error(err.to_string()));
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        let _ = events.send(ClientEvent::Error(err.to_string()));
                        break;
                    }
                }
            }
            warn!("change feed closed");
            let _ = events.send(ClientEvent::Disconnected);
        });

        if let Some(previous) = self.subscription.lock().await.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

/// Decode a success body, or turn the server's `ApiError` body into an
/// [`ApiException`] inside the returned error.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .context("failed to decode server response");
    }

    let body = response.text().await.unwrap_or_default();
    let api_error = serde_json::from_str::<ApiError>(&body).unwrap_or_else(|_| {
        ApiError::new(
            ErrorCode::Internal,
            format!("server returned {status}: {body}"),
        )
    });
    Err(ApiException::from(api_error).into())
}

/// Error code carried by a failed request, if the server sent one.
pub fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.downcast_ref::<ApiException>().map(|exception| exception.code)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
