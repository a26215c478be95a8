use anyhow::{anyhow, Context, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::session::SessionProvider;
use crate::types::{Message, NewMessage, Thread, UserRole};

/// JSON request/response client for the marketplace API. Failure bodies
/// carry a `detail` message which becomes the error text.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionProvider>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Arc<SessionProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None::<&()>).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn patch<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path, None::<&()>).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let token = self.session.bearer().await?;

        let mut request = self.http.request(method.clone(), &url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request failed: {method} {url}"))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read response body: {method} {url}"))?;

        if !status.is_success() {
            return Err(anyhow!(error_detail(status.as_u16(), &bytes)));
        }
        serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse response body: {method} {url}"))
    }
}

fn error_detail(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("request failed with status {status}"))
}

/// Chat endpoints behind a capability trait so the synchronizer can be
/// driven by fakes in tests.
#[allow(async_fn_in_trait)]
pub trait ChatStore {
    /// Active threads where the user is a participant, most recent activity
    /// first. Ordering is owned by the server.
    async fn list_threads(&self, user_id: &str, role: UserRole) -> Result<Vec<Thread>>;

    /// Full message history for one thread, ascending by creation time.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>>;

    async fn send_message(&self, message: &NewMessage) -> Result<()>;

    /// Marks a thread inactive. Threads are never deleted.
    async fn close_thread(&self, thread_id: &str) -> Result<()>;
}

impl ChatStore for ApiClient {
    async fn list_threads(&self, user_id: &str, role: UserRole) -> Result<Vec<Thread>> {
        self.get(&format!(
            "/chat/threads?user_id={user_id}&role={}",
            role.as_str()
        ))
        .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        self.get(&format!("/chat/threads/{thread_id}/messages")).await
    }

    async fn send_message(&self, message: &NewMessage) -> Result<()> {
        let _: Value = self.post("/chat/messages", message).await?;
        Ok(())
    }

    async fn close_thread(&self, thread_id: &str) -> Result<()> {
        let _: Value = self
            .patch(
                &format!("/chat/threads/{thread_id}"),
                &serde_json::json!({ "is_active": false }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_detail_prefers_the_detail_field() {
        assert_eq!(
            error_detail(403, br#"{"detail": "assessment not completed"}"#),
            "assessment not completed"
        );
    }

    #[test]
    fn error_detail_falls_back_to_the_status() {
        assert_eq!(
            error_detail(500, b"<html>gateway error</html>"),
            "request failed with status 500"
        );
        assert_eq!(
            error_detail(404, br#"{"message": "no detail here"}"#),
            "request failed with status 404"
        );
    }
}
