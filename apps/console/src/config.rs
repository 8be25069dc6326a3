use std::{collections::HashMap, fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;

pub const CONFIG_FILE: &str = "balloon.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub current_poll: Duration,
    pub list_poll: Duration,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://blinken.local:5050".into(),
            current_poll: client_core::CURRENT_GIF_POLL_INTERVAL,
            list_poll: client_core::GIF_LIST_POLL_INTERVAL,
            request_timeout: client_core::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    current_poll_ms: Option<u64>,
    list_poll_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
}

/// Reads `balloon.toml` (or `config_path`) and the process environment.
pub fn load_settings(config_path: Option<&Path>) -> Settings {
    let path = config_path.unwrap_or(Path::new(CONFIG_FILE));
    let raw = match fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(err) => {
            if config_path.is_some() {
                warn!(path = %path.display(), error = %err, "config: could not read file, using defaults");
            }
            None
        }
    };
    let env: HashMap<String, String> = std::env::vars().collect();
    resolve_settings(raw.as_deref(), &env)
}

/// Defaults, then file values, then environment. Unparseable values are skipped.
pub fn resolve_settings(file_contents: Option<&str>, env: &HashMap<String, String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<FileSettings>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.server_url {
                    settings.server_url = v;
                }
                if let Some(v) = file_cfg.current_poll_ms.filter(|v| *v > 0) {
                    settings.current_poll = Duration::from_millis(v);
                }
                if let Some(v) = file_cfg.list_poll_ms.filter(|v| *v > 0) {
                    settings.list_poll = Duration::from_millis(v);
                }
                if let Some(v) = file_cfg.request_timeout_secs.filter(|v| *v > 0) {
                    settings.request_timeout = Duration::from_secs(v);
                }
            }
            Err(err) => warn!(error = %err, "config: ignoring malformed {CONFIG_FILE}"),
        }
    }

    if let Some(v) = env.get("BALLOON_SERVER_URL") {
        settings.server_url = v.clone();
    }
    if let Some(v) = env.get("APP__SERVER_URL") {
        settings.server_url = v.clone();
    }

    if let Some(ms) = env_u64(env, "APP__CURRENT_POLL_MS") {
        settings.current_poll = Duration::from_millis(ms);
    }
    if let Some(ms) = env_u64(env, "APP__LIST_POLL_MS") {
        settings.list_poll = Duration::from_millis(ms);
    }
    if let Some(secs) = env_u64(env, "APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout = Duration::from_secs(secs);
    }

    settings
}

fn env_u64(env: &HashMap<String, String>, key: &str) -> Option<u64> {
    let raw = env.get(key)?;
    match raw.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => Some(parsed),
        _ => {
            warn!(key, value = %raw, "config: ignoring invalid number");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
