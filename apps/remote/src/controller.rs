use anyhow::{anyhow, Result};
use client_core::{error_code, ClientHandle};
use shared::{
    domain::EventId,
    error::ErrorCode,
    protocol::{ControlCommand, ControlRequest, LiveSnapshot, Surface},
};
use tracing::info;

/// Event the remote acts on: the explicit id, or whatever controller
/// discovery returns.
pub async fn resolve_event<C: ClientHandle + ?Sized>(
    client: &C,
    event_id: Option<EventId>,
) -> Result<LiveSnapshot> {
    match event_id {
        Some(event_id) => client.snapshot(event_id).await,
        None => client
            .discover(Surface::Controller)
            .await?
            .ok_or_else(|| anyhow!("no event to control")),
    }
}

/// Send `command`. A refused final advance is retried with confirmation only
/// when `confirm` agrees; otherwise the refusal is returned.
pub async fn send<C, F>(
    client: &C,
    event_id: EventId,
    command: ControlCommand,
    confirm: F,
) -> Result<LiveSnapshot>
where
    C: ClientHandle + ?Sized,
    F: FnOnce() -> Result<bool>,
{
    let request = ControlRequest::from(command.clone());
    match client.send_command(event_id, &request).await {
        Err(err) if error_code(&err) == Some(ErrorCode::ConfirmationRequired) => {
            if !matches!(command, ControlCommand::Advance { confirm: false }) || !confirm()? {
                return Err(err);
            }
            info!(%event_id, "finishing event after confirmation");
            client
                .send_command(event_id, &ControlCommand::Advance { confirm: true }.into())
                .await
        }
        other => other,
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
