//! HTTP client for OpenAI-compatible `/moderations` and `/chat/completions`
//! endpoints.
//!
//! Every request carries the configured timeout. Transient failures
//! (timeouts, connection errors, HTTP 429 and 5xx) are retried with jittered
//! exponential backoff up to `request_retries` times; everything else is
//! reported on the first failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{CounselError, Result};
use crate::model::conversation_turn::ConversationTurn;
use crate::services::{GenerationParams, GenerativeFallback, ModerationGate};

const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Error)]
enum RequestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RequestError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Malformed(_) => false,
        }
    }
}

#[derive(Serialize)]
struct ModerationRequest<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Deserialize)]
struct ModerationResult {
    flagged: bool,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    moderation_model: Option<String>,
    retries: usize,
}

impl OpenAiClient {
    /// Build a client from configuration.
    ///
    /// # Returns
    /// `MissingCredentials` when no API key is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.openai_api_key.trim();
        if api_key.is_empty() {
            return Err(CounselError::MissingCredentials);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            moderation_model: config.moderation_model.clone(),
            retries: config.request_retries,
        })
    }

    async fn post_once<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            return Err(RequestError::Status { status, body });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RequestError::Malformed(e.to_string()))
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(100)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.retries);
        RetryIf::start(
            strategy,
            || self.post_once(path, body),
            |e: &RequestError| {
                let transient = e.is_transient();
                if transient {
                    debug!(path, error = %e, "transient request failure, retrying");
                }
                transient
            },
        )
        .await
    }
}

#[async_trait]
impl ModerationGate for OpenAiClient {
    async fn is_flagged(&self, text: &str) -> Result<bool> {
        let request = ModerationRequest {
            input: text,
            model: self.moderation_model.as_deref(),
        };
        let response: ModerationResponse = self
            .post("moderations", &request)
            .await
            .map_err(|e| CounselError::ModerationUnavailable(e.to_string()))?;
        if response.results.is_empty() {
            return Err(CounselError::ModerationUnavailable(
                "malformed response: no moderation results".to_string(),
            ));
        }
        Ok(response.results.iter().any(|r| r.flagged))
    }
}

#[async_trait]
impl GenerativeFallback for OpenAiClient {
    async fn complete(
        &self,
        context: &[ConversationTurn],
        params: &GenerationParams,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: context,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };
        let response: ChatResponse = self
            .post("chat/completions", &request)
            .await
            .map_err(|e| CounselError::FallbackUnavailable(e.to_string()))?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                CounselError::FallbackUnavailable(
                    "malformed response: completion has no content".to_string(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_rejected_at_construction() {
        let config = AppConfig {
            openai_api_key: "   ".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            OpenAiClient::from_config(&config),
            Err(CounselError::MissingCredentials)
        ));
    }

    #[test]
    fn only_rate_limits_and_server_errors_are_transient() {
        let status = |code: u16| RequestError::Status {
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        };
        assert!(status(429).is_transient());
        assert!(status(503).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(401).is_transient());
        assert!(!RequestError::Malformed("x".into()).is_transient());
    }
}
