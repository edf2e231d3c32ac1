use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Result};
use tracing::warn;

use crate::reconnect::{ReconnectPolicy, DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_INITIAL};

pub const DEFAULT_CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub ws_path: String,
    pub session_path: PathBuf,
    pub http_timeout: Option<Duration>,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".into(),
            ws_path: "/ws".into(),
            session_path: default_session_path(),
            http_timeout: None,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

fn default_session_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chat-client")
        .join("session.json")
}

impl ClientSettings {
    /// Real-time endpoint derived from the HTTP base URL.
    pub fn ws_url(&self) -> Result<String> {
        let base = self.server_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(anyhow!("server_url must start with http:// or https://"));
        };
        let path = if self.ws_path.starts_with('/') {
            self.ws_path.clone()
        } else {
            format!("/{}", self.ws_path)
        };
        Ok(format!("{ws_base}{path}"))
    }
}

/// Defaults, then `client.toml` (or `config_path`), then environment.
pub fn load_settings(config_path: Option<&Path>) -> ClientSettings {
    let mut settings = ClientSettings::default();
    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => apply_file_values(&mut settings, &file_cfg),
            Err(err) => warn!(path = %path.display(), "config: ignoring malformed file: {err}"),
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn value_as_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(v) => Some(v.clone()),
        toml::Value::Integer(v) => Some(v.to_string()),
        toml::Value::Boolean(v) => Some(v.to_string()),
        _ => None,
    }
}

fn apply_file_values(settings: &mut ClientSettings, file_cfg: &HashMap<String, toml::Value>) {
    let lookup = |key: &str| file_cfg.get(key).and_then(value_as_string);
    apply_values(settings, lookup, "");
}

pub(crate) fn apply_env_overrides(
    settings: &mut ClientSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("CHAT_SERVER_URL") {
        settings.server_url = v;
    }
    apply_values(settings, lookup, "APP__");
}

fn apply_values(
    settings: &mut ClientSettings,
    lookup: impl Fn(&str) -> Option<String>,
    prefix: &str,
) {
    let key = |name: &str| format!("{prefix}{}", name.to_ascii_uppercase());
    let get = |name: &str| {
        if prefix.is_empty() {
            lookup(name)
        } else {
            lookup(&key(name))
        }
    };

    if let Some(v) = get("server_url") {
        settings.server_url = v;
    }
    if let Some(v) = get("ws_path") {
        settings.ws_path = v;
    }
    if let Some(v) = get("session_path") {
        settings.session_path = PathBuf::from(v);
    }
    if let Some(v) = get("http_timeout_secs") {
        match v.parse::<u64>() {
            Ok(0) => settings.http_timeout = None,
            Ok(secs) => settings.http_timeout = Some(Duration::from_secs(secs)),
            Err(_) => warn!(value = %v, "config: invalid http_timeout_secs"),
        }
    }

    if let Some(v) = get("reconnect") {
        match v.trim().to_ascii_lowercase().as_str() {
            "never" | "off" | "false" => settings.reconnect = ReconnectPolicy::Never,
            "backoff" | "on" | "true" => {
                if settings.reconnect == ReconnectPolicy::Never {
                    settings.reconnect = ReconnectPolicy::default();
                }
            }
            other => warn!(value = other, "config: unknown reconnect mode"),
        }
    }

    if let ReconnectPolicy::Backoff {
        mut initial,
        mut max,
        mut max_attempts,
    } = settings.reconnect
    {
        if let Some(ms) = get("reconnect_initial_ms").and_then(|v| v.parse::<u64>().ok()) {
            initial = Duration::from_millis(ms);
        }
        if let Some(ms) = get("reconnect_max_ms").and_then(|v| v.parse::<u64>().ok()) {
            max = Duration::from_millis(ms);
        }
        if let Some(n) = get("reconnect_max_attempts").and_then(|v| v.parse::<u32>().ok()) {
            max_attempts = n;
        }
        if initial.is_zero() {
            initial = DEFAULT_RECONNECT_INITIAL;
        }
        settings.reconnect = ReconnectPolicy::Backoff {
            initial,
            max: max.max(initial),
            max_attempts: if max_attempts == 0 {
                DEFAULT_RECONNECT_ATTEMPTS
            } else {
                max_attempts
            },
        };
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
