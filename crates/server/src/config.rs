use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use shared::{domain::DEFAULT_SECTION_SECONDS, lifecycle::DEFAULT_MAX_STAGE_MESSAGE_CHARS};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub default_section_seconds: i64,
    pub event_channel_capacity: usize,
    pub max_stage_message_chars: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/service.db".into(),
            default_section_seconds: DEFAULT_SECTION_SECONDS,
            event_channel_capacity: 256,
            max_stage_message_chars: DEFAULT_MAX_STAGE_MESSAGE_CHARS,
        }
    }
}

/// Defaults, then `server.toml` in the working directory, then environment.
pub fn load_settings() -> Settings {
    let file = fs::read_to_string("server.toml").ok();
    resolve_settings(file.as_deref(), |key| std::env::var(key).ok())
}

pub(crate) fn resolve_settings(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, String>>(raw) {
            Ok(file_cfg) => {
                let lookup = |key: &str| file_cfg.get(key).cloned();
                apply(&mut settings, "bind_addr", &lookup);
                apply(&mut settings, "database_url", &lookup);
                apply(&mut settings, "default_section_seconds", &lookup);
                apply(&mut settings, "event_channel_capacity", &lookup);
                apply(&mut settings, "max_stage_message_chars", &lookup);
            }
            Err(error) => warn!(%error, "ignoring unreadable server.toml"),
        }
    }

    // Later keys win, so the APP__ spelling overrides the short one.
    for (key, field) in [
        ("SERVER_BIND", "bind_addr"),
        ("APP__BIND_ADDR", "bind_addr"),
        ("DATABASE_URL", "database_url"),
        ("APP__DATABASE_URL", "database_url"),
        ("APP__DEFAULT_SECTION_SECONDS", "default_section_seconds"),
        ("APP__EVENT_CHANNEL_CAPACITY", "event_channel_capacity"),
        ("APP__MAX_STAGE_MESSAGE_CHARS", "max_stage_message_chars"),
    ] {
        apply(&mut settings, field, &|_: &str| env(key));
    }

    settings
}

fn apply(settings: &mut Settings, field: &str, lookup: &dyn Fn(&str) -> Option<String>) {
    let Some(value) = lookup(field) else {
        return;
    };
    match field {
        "bind_addr" => settings.server_bind = value,
        "database_url" => settings.database_url = value,
        "default_section_seconds" => match value.trim().parse::<i64>() {
            Ok(parsed) if parsed >= 0 => settings.default_section_seconds = parsed,
            _ => warn!(%value, "ignoring invalid default_section_seconds"),
        },
        "event_channel_capacity" => match value.trim().parse::<usize>() {
            Ok(parsed) if parsed > 0 => settings.event_channel_capacity = parsed,
            _ => warn!(%value, "ignoring invalid event_channel_capacity"),
        },
        "max_stage_message_chars" => match value.trim().parse::<usize>() {
            Ok(parsed) if parsed > 0 => settings.max_stage_message_chars = parsed,
            _ => warn!(%value, "ignoring invalid max_stage_message_chars"),
        },
        _ => {}
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

pub(crate) fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }
    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }
    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        return sqlite_url_for_path(&path.replace('\\', "/"));
    }
    if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url
        .strip_prefix("sqlite:")
        .unwrap_or(raw_database_url)
        .replace('\\', "/");
    sqlite_url_for_path(&path)
}

/// Drive-letter paths keep a single colon (`sqlite:C:/db`), everything else
/// uses the `sqlite://` form.
fn sqlite_url_for_path(path: &str) -> String {
    let bytes = path.as_bytes();
    let has_drive_letter = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if has_drive_letter {
        format!("sqlite:{path}")
    } else {
        format!("sqlite://{path}")
    }
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
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
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
