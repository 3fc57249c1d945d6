//! Wire types and transport for the chat backend.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::history::{ChatMessage, Thread};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "X-Request-Id";

// --- Wire Structures ---

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub thread_id: Option<String>,
}

/// Token usage as reported by the backend.
///
/// Older backends send a label such as `"Tokens used: 57"` (or
/// `"Tokens used: unknown"`) instead of a bare integer; both are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenUsage {
    Count(u64),
    #[default]
    Unknown,
}

impl TokenUsage {
    fn from_label(label: &str) -> Self {
        label
            .split(|c: char| !c.is_ascii_digit())
            .filter(|part| !part.is_empty())
            .last()
            .and_then(|digits| digits.parse().ok())
            .map_or(TokenUsage::Unknown, TokenUsage::Count)
    }
}

impl<'de> Deserialize<'de> for TokenUsage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(u64),
            Label(String),
            Missing(()),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Count(n) => TokenUsage::Count(n),
            Raw::Label(label) => TokenUsage::from_label(&label),
            Raw::Missing(()) => TokenUsage::Unknown,
        })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub tokens_used: TokenUsage,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ThreadList {
    #[serde(default)]
    threads: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ThreadHistory {
    messages: Vec<ChatMessage>,
    #[serde(default)]
    updated_at: Option<u64>,
}

// --- Backend Contract ---

/// The three calls the session client makes against a chat backend.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn send_turn(&self, request: &ChatRequest) -> Result<ChatReply>;

    async fn list_threads(&self) -> Result<Vec<String>>;

    async fn load_thread(&self, thread_id: &str) -> Result<Thread>;
}

// --- HTTP Implementation ---

pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ClientError::Config(format!("Invalid base URL '{}': {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "Base URL '{}' cannot carry a path",
                base_url
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            config.request_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `cannot_be_a_base` was rejected in `new`, so the segments are always writable.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let request_id = Uuid::new_v4();
        let response = builder
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(%request_id, %status, bytes = body.len(), "Backend responded");
        decode_body(status, &body)
    }
}

/// Maps a backend body to `T`, surfacing `{"error": ...}` as an application error
/// regardless of the HTTP status it arrived with.
pub(crate) fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T> {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) if !status.is_success() => {
            return Err(ClientError::Application(format!("Backend returned {}", status)))
        }
        Err(e) => return Err(e.into()),
    };

    match value.get("error") {
        None | Some(serde_json::Value::Null) => {}
        Some(serde_json::Value::String(message)) => {
            return Err(ClientError::Application(message.clone()))
        }
        Some(other) => return Err(ClientError::Application(other.to_string())),
    }

    if !status.is_success() {
        return Err(ClientError::Application(format!("Backend returned {}", status)));
    }
    Ok(serde_json::from_value(value)?)
}

#[async_trait]
impl Backend for HttpBackend {
    #[instrument(skip(self, request), fields(thread_id = ?request.thread_id))]
    async fn send_turn(&self, request: &ChatRequest) -> Result<ChatReply> {
        let url = self.endpoint(&["chat"]);
        self.execute(self.client.post(url).json(request)).await
    }

    #[instrument(skip(self))]
    async fn list_threads(&self) -> Result<Vec<String>> {
        let url = self.endpoint(&["get_threads"]);
        let list: ThreadList = self.execute(self.client.get(url)).await?;
        if list.threads.is_none() {
            warn!("Thread list response carried no 'threads' field; treating as empty");
        }
        Ok(list.threads.unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn load_thread(&self, thread_id: &str) -> Result<Thread> {
        let url = self.endpoint(&["load_thread", thread_id]);
        let history: ThreadHistory = self.execute(self.client.get(url)).await?;
        let mut thread = Thread::new(thread_id, history.messages);
        if history.updated_at.is_some() {
            thread.updated_at = history.updated_at;
        }
        Ok(thread)
    }
}
