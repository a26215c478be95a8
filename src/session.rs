use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::SessionConfig;

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct SessionState {
    access_token: String,
    expires_at: Instant,
}

/// Single owner of the session token. Every data-fetching path reads the
/// bearer through here instead of looking the session up ambiently; the
/// token is refreshed when it is within the configured margin of expiry.
pub struct SessionProvider {
    http: reqwest::Client,
    refresh_url: String,
    refresh_token: String,
    refresh_margin: Duration,
    state: Mutex<SessionState>,
}

impl SessionProvider {
    pub fn new(cfg: &SessionConfig, refresh_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            refresh_url: refresh_url.into(),
            refresh_token: cfg.refresh_token.clone(),
            refresh_margin: Duration::from_secs(cfg.refresh_margin_secs),
            state: Mutex::new(SessionState {
                access_token: cfg.access_token.clone(),
                expires_at: Instant::now() + Duration::from_secs(cfg.expires_in_secs),
            }),
        }
    }

    pub async fn bearer(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        let stale = state.access_token.is_empty()
            || Instant::now() + self.refresh_margin >= state.expires_at;
        if stale {
            if self.refresh_token.is_empty() {
                bail!("session expired and no refresh token is configured");
            }
            let refreshed = self.refresh().await?;
            state.access_token = refreshed.access_token;
            state.expires_at = Instant::now() + Duration::from_secs(refreshed.expires_in);
            debug!("session: token refreshed expires_in={}s", refreshed.expires_in);
        }
        Ok(state.access_token.clone())
    }

    async fn refresh(&self) -> Result<RefreshResponse> {
        let response = self
            .http
            .post(&self.refresh_url)
            .json(&serde_json::json!({ "refresh_token": self.refresh_token }))
            .send()
            .await
            .context("failed to reach the auth refresh endpoint")?;

        if !response.status().is_success() {
            bail!("auth refresh failed with status: {}", response.status());
        }
        response
            .json()
            .await
            .context("failed to parse the auth refresh response")
    }
}
