pub mod messages;

use crate::domain::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";
const SERVICE: &str = "slack";

/// A `chat.postMessage` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackMessage {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

#[async_trait]
pub trait SlackGateway: Send + Sync {
    /// Posts a message and returns its `ts`, usable as a thread parent.
    async fn post_message(&self, token: &str, message: &SlackMessage) -> Result<String>;
}

#[derive(Deserialize)]
struct PostMessageResponse {
    #[serde(default)]
    ok: bool,
    ts: Option<String>,
    error: Option<String>,
}

pub struct SlackClient {
    client: reqwest::Client,
    base_url: String,
}

impl SlackClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SlackGateway for SlackClient {
    async fn post_message(&self, token: &str, message: &SlackMessage) -> Result<String> {
        let url = format!("{}/chat.postMessage", self.base_url);
        debug!(channel = %message.channel, threaded = message.thread_ts.is_some(), "Slack post");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token.trim())
            .json(message)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Slack request failed: {}", e)))?;

        let status = response.status();
        let body: PostMessageResponse = response.json().await.map_err(|e| {
            AppError::remote(SERVICE, format!("Slack API error ({}): {}", status, e))
        })?;
        interpret(body)
    }
}

/// Slack answers 200 even for failures; `ok` is the only reliable signal.
fn interpret(body: PostMessageResponse) -> Result<String> {
    if !body.ok {
        return Err(AppError::remote(
            SERVICE,
            body.error.unwrap_or_else(|| "Slack API error".to_string()),
        ));
    }
    body.ts
        .filter(|ts| !ts.is_empty())
        .ok_or_else(|| AppError::remote(SERVICE, "missing ts"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ok_maps_to_the_slack_error_code() {
        let body: PostMessageResponse =
            serde_json::from_str(r#"{"ok":false,"error":"channel_not_found"}"#).unwrap();
        let err = interpret(body).unwrap_err();
        assert_eq!(err.to_string(), "channel_not_found");
    }

    #[test]
    fn ok_without_a_timestamp_is_rejected() {
        let body: PostMessageResponse = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        let err = interpret(body).unwrap_err();
        assert!(matches!(err, AppError::RemoteRejected { .. }));
        assert_eq!(err.to_string(), "missing ts");
    }

    #[test]
    fn ok_returns_the_thread_timestamp() {
        let body: PostMessageResponse =
            serde_json::from_str(r#"{"ok":true,"ts":"1700000000.000100"}"#).unwrap();
        assert_eq!(interpret(body).unwrap(), "1700000000.000100");
    }

    #[test]
    fn thread_ts_and_empty_blocks_are_omitted() {
        let message = SlackMessage {
            channel: "C1".to_string(),
            text: "hello".to_string(),
            blocks: Vec::new(),
            thread_ts: None,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert!(value.get("blocks").is_none());
        assert!(value.get("thread_ts").is_none());
    }
}
