//! Remote collaborators: the moderation classifier and the generative
//! fallback. Both are opaque services behind async traits so the assistant
//! can be driven by the HTTP client in production and by mocks in tests.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::conversation_turn::ConversationTurn;

/// Pre-screens user input.
#[async_trait]
pub trait ModerationGate: Send + Sync {
    /// `Ok(true)` when the classifier flags `text`. Transport or parse
    /// failures are `Err(ModerationUnavailable)`.
    async fn is_flagged(&self, text: &str) -> Result<bool>;
}

/// Produces a completion from an ordered list of turns.
#[async_trait]
pub trait GenerativeFallback: Send + Sync {
    async fn complete(&self, context: &[ConversationTurn], params: &GenerationParams)
        -> Result<String>;
}

/// Sampling parameters sent with every fallback call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

/// Gate used when moderation is disabled: nothing is ever flagged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughModeration;

#[async_trait]
impl ModerationGate for PassThroughModeration {
    async fn is_flagged(&self, _text: &str) -> Result<bool> {
        Ok(false)
    }
}
