//! Turn orchestration: moderation, retrieval, threshold decision, and either
//! the provenance-formatted corpus answer or the generative fallback.
//!
//! Remote failures never escape `respond`; they become user-visible replies
//! and leave the session well-formed:
//! - flagged input, or a moderation error under `block`: nothing recorded;
//! - fallback error: the user turn and the apology are both recorded.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{AppConfig, ModerationFailureMode, Prompts};
use crate::error::Result;
use crate::knowledge::{CorpusHandle, MatchResult};
use crate::policy::{format_corpus_answer, Decision, RetrievalPolicy};
use crate::services::openai::OpenAiClient;
use crate::services::{GenerationParams, GenerativeFallback, ModerationGate, PassThroughModeration};
use crate::session::{as_context_with_system, ConversationSession, SessionStore};

/// How a reply was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Matched(MatchResult),
    Generated,
    Rejected,
    ModerationUnavailable,
    FallbackFailed,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Matched(_) => "matched",
            Self::Generated => "generated",
            Self::Rejected => "rejected",
            Self::ModerationUnavailable => "moderation_unavailable",
            Self::FallbackFailed => "fallback_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub outcome: Outcome,
}

pub struct Assistant {
    corpus: Arc<CorpusHandle>,
    policy: RetrievalPolicy,
    moderation: Arc<dyn ModerationGate>,
    fallback: Arc<dyn GenerativeFallback>,
    params: GenerationParams,
    prompts: Prompts,
    moderation_on_error: ModerationFailureMode,
}

impl Assistant {
    pub fn new(
        corpus: Arc<CorpusHandle>,
        moderation: Arc<dyn ModerationGate>,
        fallback: Arc<dyn GenerativeFallback>,
        config: &AppConfig,
    ) -> Self {
        Self {
            corpus,
            policy: config.policy(),
            moderation,
            fallback,
            params: config.generation_params(),
            prompts: config.prompts.clone(),
            moderation_on_error: config.moderation_on_error,
        }
    }

    /// Wire the assistant to the configured OpenAI-compatible endpoint. When
    /// moderation is disabled every input passes the gate.
    pub fn from_config(corpus: Arc<CorpusHandle>, config: &AppConfig) -> Result<Self> {
        let client = Arc::new(OpenAiClient::from_config(config)?);
        let moderation: Arc<dyn ModerationGate> = if config.moderation_enabled {
            client.clone()
        } else {
            Arc::new(PassThroughModeration)
        };
        Ok(Self::new(corpus, moderation, client, config))
    }

    pub fn corpus(&self) -> &Arc<CorpusHandle> {
        &self.corpus
    }

    pub fn policy(&self) -> RetrievalPolicy {
        self.policy
    }

    pub fn start_session(&self) -> ConversationSession {
        ConversationSession::start(
            Some(self.prompts.instructions.clone()),
            self.prompts.greeting.clone(),
        )
    }

    pub fn session_store(&self) -> SessionStore {
        SessionStore::new(
            Some(self.prompts.instructions.clone()),
            self.prompts.greeting.clone(),
        )
    }

    /// Answer one user turn, appending to `session` as documented above.
    pub async fn respond(&self, session: &mut ConversationSession, text: &str) -> Reply {
        let input_chars = text.chars().count();

        match self.moderation.is_flagged(text).await {
            Ok(false) => {}
            Ok(true) => {
                info!(input_chars, "input flagged by moderation");
                return Reply {
                    text: self.prompts.moderation_rejection.clone(),
                    outcome: Outcome::Rejected,
                };
            }
            Err(e) => match self.moderation_on_error {
                ModerationFailureMode::Block => {
                    warn!(
                        collaborator = "moderation",
                        input_chars,
                        error = %e,
                        "moderation unavailable, turn blocked"
                    );
                    return Reply {
                        text: self.prompts.moderation_unavailable.clone(),
                        outcome: Outcome::ModerationUnavailable,
                    };
                }
                ModerationFailureMode::Allow => {
                    warn!(
                        collaborator = "moderation",
                        input_chars,
                        error = %e,
                        "moderation unavailable, continuing unmoderated"
                    );
                }
            },
        }

        let base = self.corpus.snapshot();
        let decision = self.policy.decide(base.best_match(text));
        session.append_user(text);

        match decision {
            Decision::Matched(m) => {
                debug!(position = m.position, score = m.score, "answered from corpus");
                let answer = format_corpus_answer(&m);
                session.append_assistant(answer.clone());
                Reply {
                    text: answer,
                    outcome: Outcome::Matched(m),
                }
            }
            Decision::Unmatched { best_score } => {
                debug!(
                    best_score = ?best_score,
                    threshold = self.policy.threshold,
                    "deferring to fallback"
                );
                let context =
                    as_context_with_system(session.as_context(), &self.prompts.instructions);
                match self.fallback.complete(&context, &self.params).await {
                    Ok(completion) => {
                        session.append_assistant(completion.clone());
                        Reply {
                            text: completion,
                            outcome: Outcome::Generated,
                        }
                    }
                    Err(e) => {
                        warn!(
                            collaborator = "fallback",
                            input_chars,
                            error = %e,
                            "generative fallback failed"
                        );
                        let apology = self.prompts.fallback_failure.clone();
                        session.append_assistant(apology.clone());
                        Reply {
                            text: apology,
                            outcome: Outcome::FallbackFailed,
                        }
                    }
                }
            }
        }
    }
}
