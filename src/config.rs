use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_auth_refresh_path")]
    pub auth_refresh_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeConfig {
    pub url: String,
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_expires_in_secs")]
    pub expires_in_secs: u64,
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_messages_table")]
    pub messages_table: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            refresh_token: String::new(),
            expires_in_secs: default_expires_in_secs(),
            refresh_margin_secs: default_refresh_margin_secs(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            messages_table: default_messages_table(),
        }
    }
}

impl ApiConfig {
    pub fn auth_refresh_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.auth_refresh_path
        )
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&content).context("failed to parse config toml")?;

        if cfg.api.base_url.trim().is_empty() || cfg.realtime.url.trim().is_empty() {
            bail!("api.base_url and realtime.url are required");
        }
        Ok(cfg)
    }
}

fn default_auth_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay_ms() -> u64 {
    2_000
}

fn default_expires_in_secs() -> u64 {
    3_600
}

fn default_refresh_margin_secs() -> u64 {
    60
}

fn default_messages_table() -> String {
    "chat_messages".to_string()
}
