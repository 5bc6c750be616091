//! Error taxonomy shared by every layer of the assistant.
//!
//! Corpus and snapshot errors are fatal at startup; the two remote-service
//! variants are recovered locally by the assistant and turned into
//! user-visible messages. An empty retrieval result is never an error: it is
//! the `Unmatched` policy decision.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounselError {
    #[error("corpus load error: {0}")]
    CorpusLoad(String),
    #[error("corpus is empty: at least one answered question is required to build the index")]
    EmptyCorpus,
    #[error("index snapshot error: {0}")]
    Snapshot(String),
    #[error("moderation service unavailable: {0}")]
    ModerationUnavailable(String),
    #[error("generative fallback unavailable: {0}")]
    FallbackUnavailable(String),
    #[error("missing API key: set OPENAI_API_KEY or `openai_api_key` in the config file")]
    MissingCredentials,
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, CounselError>;
