use std::{io::Write, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client_core::{ClientHandle, LiveClient, LiveInput, LiveView, StageFrame, Ticker};
use shared::{
    domain::{EventId, DEFAULT_SECTION_SECONDS},
    protocol::ControlCommand,
};
use stage::Stage;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod controller;
mod render;
mod stage;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(about = "Live service remote and stage display")]
struct Cli {
    #[arg(long, env = "SERVICE_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    /// Event to act on; discovered when omitted.
    #[arg(long, global = true)]
    event_id: Option<i64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the stage display until interrupted.
    Stage {
        #[arg(long, default_value_t = DEFAULT_SECTION_SECONDS)]
        default_section_seconds: i64,
    },
    Play,
    Pause,
    /// Advance to the next section; on the last one this finishes the event.
    Next {
        #[arg(long)]
        yes: bool,
    },
    Unplanned {
        title: String,
    },
    Message {
        text: String,
    },
    ClearMessage,
    Status,
    /// Planned versus actual timing of the event.
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();
    let client = LiveClient::new(&cli.server_url)?;
    let event_id = cli.event_id.map(EventId);

    let command = match cli.command {
        Command::Stage {
            default_section_seconds,
        } => return run_stage(client, default_section_seconds).await,
        Command::Status => {
            let snapshot = controller::resolve_event(client.as_ref(), event_id).await?;
            let mut view = LiveView::new(DEFAULT_SECTION_SECONDS);
            print!(
                "{}",
                render::status(&view.apply(LiveInput::Snapshot(Some(snapshot)), Utc::now()))
            );
            return Ok(());
        }
        Command::Summary => {
            let snapshot = controller::resolve_event(client.as_ref(), event_id).await?;
            let summary = client.summary(snapshot.event.id).await?;
            print!(
                "{}",
                render::stage(&StageFrame::Finished {
                    event_title: snapshot.event.title,
                    summary,
                })
            );
            return Ok(());
        }
        Command::Play => ControlCommand::Play,
        Command::Pause => ControlCommand::Pause,
        Command::Next { yes } => ControlCommand::Advance { confirm: yes },
        Command::Unplanned { title } => ControlCommand::InsertUnplanned { title },
        Command::Message { text } => ControlCommand::BroadcastMessage { text },
        Command::ClearMessage => ControlCommand::ClearMessage,
    };

    let target = controller::resolve_event(client.as_ref(), event_id).await?;
    let snapshot = controller::send(client.as_ref(), target.event.id, command, || {
        tokio::task::block_in_place(prompt_finish)
    })
    .await?;
    let mut view = LiveView::new(DEFAULT_SECTION_SECONDS);
    print!(
        "{}",
        render::status(&view.apply(LiveInput::Snapshot(Some(snapshot)), Utc::now()))
    );
    Ok(())
}

fn prompt_finish() -> Result<bool> {
    print!("This is the last section. Finish the event? [y/N] ");
    std::io::stdout().flush().context("failed to flush stdout")?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "oui"))
}

/// Display loop: change notifications and ticks both redraw the stage. Losing
/// the server never ends the loop; it reconnects until interrupted.
async fn run_stage(client: Arc<LiveClient>, default_section_seconds: i64) -> Result<()> {
    let (tick_tx, mut ticks) = mpsc::unbounded_channel();
    let mut ticker = Ticker::new(tick_tx);
    let mut stage = Stage::new(default_section_seconds);
    let mut changes = client.subscribe_events();
    let mut connected = false;

    loop {
        if !connected {
            match stage.connect(client.as_ref(), Utc::now()).await {
                Ok(frame) => {
                    draw(&frame);
                    ticker.sync(stage.status());
                    connected = true;
                }
                Err(err) => {
                    warn!(%err, "server unreachable, retrying");
                    if !wait_to_reconnect().await {
                        break;
                    }
                    continue;
                }
            }
        }

        let frame = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(_) = ticks.recv() => Some(stage.tick(Utc::now())),
            change = changes.recv() => match change {
                Ok(change) => match stage.handle(client.as_ref(), change, Utc::now()).await {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(%err, "lost the server, reconnecting");
                        connected = false;
                        if !wait_to_reconnect().await {
                            break;
                        }
                        continue;
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "display lagged behind change feed, resyncing");
                    connected = false;
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        if let Some(frame) = frame {
            draw(&frame);
            ticker.sync(stage.status());
        }
    }

    client.unsubscribe().await;
    Ok(())
}

fn draw(frame: &StageFrame) {
    print!("{}{}", render::CLEAR_SCREEN, render::stage(frame));
}

/// Sleep before the next connection attempt; false when interrupted.
async fn wait_to_reconnect() -> bool {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => false,
        _ = tokio::time::sleep(RECONNECT_DELAY) => true,
    }
}

#[cfg(test)]
#[path = "tests/fake_client.rs"]
mod fake_client;
