#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use counsel::services::{GenerationParams, GenerativeFallback, ModerationGate};
use counsel::{ConversationTurn, CounselError, Result};

/// Mock moderation gate: flags any input containing `flag_substring`, or
/// fails every call when `fail` is set.
#[derive(Default)]
pub struct MockModeration {
    pub flag_substring: Option<String>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl MockModeration {
    pub fn flagging(substring: &str) -> Self {
        Self {
            flag_substring: Some(substring.to_string()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModerationGate for MockModeration {
    async fn is_flagged(&self, text: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CounselError::ModerationUnavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(self
            .flag_substring
            .as_deref()
            .is_some_and(|needle| text.contains(needle)))
    }
}

/// Mock generative fallback recording every context it receives.
pub struct MockFallback {
    /// `None` makes every call fail.
    pub reply: Option<String>,
    pub contexts: Mutex<Vec<Vec<ConversationTurn>>>,
    pub params: Mutex<Vec<GenerationParams>>,
}

impl MockFallback {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            contexts: Mutex::new(Vec::new()),
            params: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            contexts: Mutex::new(Vec::new()),
            params: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    pub fn last_context(&self) -> Option<Vec<ConversationTurn>> {
        self.contexts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerativeFallback for MockFallback {
    async fn complete(
        &self,
        context: &[ConversationTurn],
        params: &GenerationParams,
    ) -> Result<String> {
        self.contexts.lock().unwrap().push(context.to_vec());
        self.params.lock().unwrap().push(*params);
        self.reply
            .clone()
            .ok_or_else(|| CounselError::FallbackUnavailable("HTTP 429: rate limited".to_string()))
    }
}
