//! HTTP client for the analysis backend (`/upload`, `/chat`, `/health`).
//!
//! Success bodies are endpoint-specific JSON; every non-2xx body is `{ "detail": "..." }`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{self, Config};
use crate::debug_log::DebugLogEntry;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Raw bytes of one candidate file, as picked or dropped by the user.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Connect, timeout, or body read failure.
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    /// Server answered non-2xx; `detail` is taken from the error payload.
    #[error("{detail}")]
    Server { status: u16, detail: String },
    /// Body was not the JSON we expect.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// `POST /upload` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub rows: u64,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// `POST /chat` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_logs: Option<Vec<DebugLogEntry>>,
}

/// `GET /health` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// The two calls the session driver makes. Implemented by [`AnalystClient`]; tests use fakes.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn upload(
        &self,
        files: &[RawFile],
        password: Option<&str>,
    ) -> Result<UploadResponse, ApiError>;

    async fn chat(&self, message: &str) -> Result<ChatReply, ApiError>;
}

/// Client for the analysis backend.
#[derive(Clone)]
pub struct AnalystClient {
    base_url: String,
    client: reqwest::Client,
}

impl AnalystClient {
    /// Every request (upload and chat) is bounded by `timeout`.
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    /// Client for the configured backend (ANALYST_SERVER_URL wins over the config file).
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            Some(config::resolve_server_url(config)),
            config.server.timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /health
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let url = format!("{}/health", self.base_url);
        let res = self.client.get(&url).send().await?;
        decode(res).await
    }
}

#[async_trait]
impl Backend for AnalystClient {
    /// POST /upload: one multipart request with a `files` part per file and an optional `password`.
    async fn upload(
        &self,
        files: &[RawFile],
        password: Option<&str>,
    ) -> Result<UploadResponse, ApiError> {
        let url = format!("{}/upload", self.base_url);
        let mut form = reqwest::multipart::Form::new();
        for f in files {
            let part = reqwest::multipart::Part::bytes(f.bytes.clone()).file_name(f.name.clone());
            form = form.part("files", part);
        }
        if let Some(pw) = password.filter(|p| !p.is_empty()) {
            form = form.text("password", pw.to_string());
        }
        log::debug!("uploading {} file(s) to {}", files.len(), url);
        let res = self.client.post(&url).multipart(form).send().await?;
        decode(res).await
    }

    /// POST /chat
    async fn chat(&self, message: &str) -> Result<ChatReply, ApiError> {
        let url = format!("{}/chat", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await?;
        decode(res).await
    }
}

async fn decode<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, ApiError> {
    let status = res.status();
    let body = res.bytes().await?;
    if status.is_success() {
        return serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()));
    }
    Err(server_error(status, &body))
}

fn server_error(status: reqwest::StatusCode, body: &[u8]) -> ApiError {
    let detail = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(|r| format!("{} {}", status.as_u16(), r))
                .unwrap_or_else(|| status.as_u16().to_string())
        });
    ApiError::Server {
        status: status.as_u16(),
        detail,
    }
}
