use std::{collections::HashMap, fs, path::Path, time::Duration};

use tracing::warn;
use url::Url;

use crate::error::{ChatError, ChatResult};

pub const DEFAULT_SETTINGS_FILE: &str = "chat_client.toml";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub api_prefix: String,
    pub ws_path: String,
    pub connect_timeout_ms: u64,
    pub store_url: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            api_prefix: "/api".into(),
            ws_path: "/ws/chat".into(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            store_url: None,
        }
    }
}

impl ClientSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// REST base, e.g. `http://host:8080/api`.
    pub fn api_base_url(&self) -> String {
        format!(
            "{}{}",
            self.server_url.trim_end_matches('/'),
            normalize_path(&self.api_prefix)
        )
    }

    /// Live channel base, e.g. `ws://host:8080/ws/chat`.
    pub fn ws_base_url(&self) -> ChatResult<String> {
        let parsed = Url::parse(&self.server_url)
            .map_err(|err| ChatError::Config(format!("invalid server_url: {err}")))?;
        let scheme = match parsed.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(ChatError::Config(format!(
                    "server_url must start with http:// or https://, got {other}://"
                )))
            }
        };
        let rest = self
            .server_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or_default()
            .trim_end_matches('/');
        Ok(format!("{scheme}://{rest}{}", normalize_path(&self.ws_path)))
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file_overrides(settings: &mut ClientSettings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!("ignoring unreadable settings file: {err}");
            return;
        }
    };
    let text = |key: &str| match file_cfg.get(key) {
        Some(toml::Value::String(v)) => Some(v.clone()),
        Some(toml::Value::Integer(v)) => Some(v.to_string()),
        _ => None,
    };

    if let Some(v) = text("server_url") {
        settings.server_url = v;
    }
    if let Some(v) = text("api_prefix") {
        settings.api_prefix = v;
    }
    if let Some(v) = text("ws_path") {
        settings.ws_path = v;
    }
    if let Some(v) = text("connect_timeout_ms").and_then(|v| v.parse().ok()) {
        settings.connect_timeout_ms = v;
    }
    if let Some(v) = text("store_url") {
        settings.store_url = Some(v);
    }
}

fn apply_env_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("CHAT_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__API_PREFIX") {
        settings.api_prefix = v;
    }
    if let Some(v) = lookup("APP__WS_PATH") {
        settings.ws_path = v;
    }
    if let Some(v) = lookup("APP__CONNECT_TIMEOUT_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.connect_timeout_ms = parsed;
        }
    }
    if let Some(v) = lookup("APP__STORE_URL") {
        settings.store_url = Some(v);
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
