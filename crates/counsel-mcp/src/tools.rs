// Rust guideline compliant 2026-10-18

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    schemars,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use counsel::utils::text::snippet;
use counsel::{open_knowledge_base, AppConfig, Assistant, Outcome, SessionStore};

const DEFAULT_TOP_K: usize = 5;
const DEFAULT_SNIPPET_CHARS: usize = 140;

/// Input for one conversational turn.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AskInput {
    #[schemars(description = "Stable identifier of the conversation (one per user)")]
    pub session_id: String,
    #[schemars(description = "The user's message")]
    pub message: String,
}

/// Input for clearing a conversation.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ClearConversationInput {
    #[schemars(description = "Identifier of the conversation to reset")]
    pub session_id: String,
}

/// Input for a raw corpus search.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchCorpusInput {
    #[schemars(description = "Text query to match against the interview answers")]
    pub query: String,
    #[schemars(description = "Number of rows to return (default: 5)")]
    pub top_k: Option<usize>,
    #[schemars(description = "Maximum characters per snippet (default: 140)")]
    pub snippet_chars: Option<usize>,
}

struct ServerState {
    assistant: Assistant,
    sessions: SessionStore,
    config: AppConfig,
}

/// MCP server owning the per-session conversations.
#[derive(Clone)]
pub struct CounselMcpServer {
    pub tool_router: ToolRouter<Self>,
    state: Arc<ServerState>,
}

#[rmcp::tool_router]
impl CounselMcpServer {
    pub fn new(assistant: Assistant, config: AppConfig) -> Self {
        let sessions = assistant.session_store();
        Self {
            tool_router: Self::tool_router(),
            state: Arc::new(ServerState {
                assistant,
                sessions,
                config,
            }),
        }
    }

    /// Answer one message within a session.
    #[rmcp::tool(
        description = "Send a message in a conversation. Answers from the interview corpus name their respondent; otherwise a generated answer is returned"
    )]
    async fn ask(&self, Parameters(input): Parameters<AskInput>) -> String {
        self.ask_impl(input).await
    }

    /// Reset a session to its greeting. Idempotent.
    #[rmcp::tool(description = "Clear a conversation and return the greeting")]
    async fn clear_conversation(
        &self,
        Parameters(input): Parameters<ClearConversationInput>,
    ) -> String {
        self.clear_conversation_impl(input).await
    }

    /// Rank corpus records against a query without touching any session.
    #[rmcp::tool(description = "Search the interview corpus and return a compact markdown table")]
    async fn search_corpus(&self, Parameters(input): Parameters<SearchCorpusInput>) -> String {
        self.search_corpus_impl(input)
    }

    /// Corpus size, respondents and the active threshold.
    #[rmcp::tool(description = "Return compact summary metadata for the loaded corpus")]
    async fn corpus_summary(&self) -> String {
        self.corpus_summary_impl()
    }

    /// Reload the corpus the way startup resolved it (persisted index when
    /// configured, CSV sources otherwise) and swap it in.
    #[rmcp::tool(
        description = "Reload the interview corpus from the configured index file or CSV sources"
    )]
    async fn reload_corpus(&self) -> String {
        match self.reload_corpus_impl().await {
            Ok(output) => output,
            Err(err) => format!("Error: {err:#}"),
        }
    }
}

impl CounselMcpServer {
    fn clamp(value: Option<usize>, default: usize, min: usize, max: usize) -> usize {
        value.unwrap_or(default).clamp(min, max)
    }

    fn cell(text: &str, max_chars: usize) -> String {
        snippet(&text.replace('\n', " "), max_chars).replace('|', "\\|")
    }

    async fn ask_impl(&self, input: AskInput) -> String {
        let session = self.state.sessions.session(&input.session_id);
        let mut session = session.lock().await;
        let reply = self
            .state
            .assistant
            .respond(&mut session, &input.message)
            .await;

        let mut out = reply.text;
        out.push_str("\n\n---\n");
        out.push_str(&format!("- outcome: {}\n", reply.outcome.label()));
        if let Outcome::Matched(m) = &reply.outcome {
            out.push_str(&format!("- score: {:.4}\n", m.score));
            out.push_str(&format!("- position: {}\n", m.position));
        }
        out
    }

    async fn clear_conversation_impl(&self, input: ClearConversationInput) -> String {
        let dropped = self.state.sessions.reset(&input.session_id);
        debug!(session_id = %input.session_id, dropped, "conversation cleared");
        self.state.sessions.greeting().to_string()
    }

    fn search_corpus_impl(&self, input: SearchCorpusInput) -> String {
        let top_k = Self::clamp(input.top_k, DEFAULT_TOP_K, 1, 50);
        let snippet_chars = Self::clamp(input.snippet_chars, DEFAULT_SNIPPET_CHARS, 40, 300);
        let base = self.state.assistant.corpus().snapshot();
        let policy = self.state.assistant.policy();
        let hits = base.search(&input.query, top_k);

        let mut out = String::new();
        out.push_str(&format!("# Query: `{}`\n", input.query));
        out.push_str(&format!("- hits: {}\n", hits.len()));
        out.push_str(&format!("- threshold: {:.3}\n\n", policy.threshold));
        if hits.is_empty() {
            out.push_str("No record shares vocabulary with the query.\n");
            return out;
        }

        out.push_str("| # | position | score | accepted | respondent | question | answer |\n");
        out.push_str("|---|----------|-------|----------|------------|----------|--------|\n");
        for (idx, m) in hits.iter().enumerate() {
            out.push_str(&format!(
                "| {} | {} | {:.4} | {} | {} | {} | {} |\n",
                idx + 1,
                m.position,
                m.score,
                if policy.accepts(m.score) { "yes" } else { "no" },
                Self::cell(&m.record.source_label, snippet_chars),
                Self::cell(&m.record.question, snippet_chars),
                Self::cell(&m.record.answer, snippet_chars),
            ));
        }
        out
    }

    fn corpus_summary_impl(&self) -> String {
        let base = self.state.assistant.corpus().snapshot();
        let mut out = String::new();
        out.push_str("# Corpus Summary\n");
        out.push_str(&format!("- records: {}\n", base.len()));
        out.push_str(&format!(
            "- vocabulary: {}\n",
            base.index().vectorizer().vocabulary_len()
        ));
        out.push_str(&format!(
            "- threshold: {:.3}\n",
            self.state.assistant.policy().threshold
        ));
        out.push_str(&format!("- sessions: {}\n\n", self.state.sessions.len()));
        out.push_str("| respondent | records |\n");
        out.push_str("|------------|---------|\n");
        for (label, count) in base.label_counts() {
            out.push_str(&format!("| {} | {} |\n", label.replace('|', "\\|"), count));
        }
        out
    }

    async fn reload_corpus_impl(&self) -> anyhow::Result<String> {
        let config = self.state.config.clone();
        let rebuilt = tokio::task::spawn_blocking(move || open_knowledge_base(&config)).await?;
        let base = match rebuilt {
            Ok(base) => base,
            Err(err) => {
                warn!(error = %err, "corpus reload failed; keeping current corpus");
                return Err(err.into());
            }
        };
        let records = base.len();
        let previous = self.state.assistant.corpus().replace(base);
        info!(previous = previous.len(), records, "corpus reloaded");
        Ok(format!(
            "Reloaded corpus: {} records (previously {}).",
            records,
            previous.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use async_trait::async_trait;
    use counsel::services::{GenerationParams, GenerativeFallback, PassThroughModeration};
    use counsel::{
        save_knowledge_json, ConversationTurn, CorpusHandle, CorpusRecord, CorpusSource,
        KnowledgeBase,
    };

    struct FixedFallback;

    #[async_trait]
    impl GenerativeFallback for FixedFallback {
        async fn complete(
            &self,
            context: &[ConversationTurn],
            _params: &GenerationParams,
        ) -> counsel::Result<String> {
            Ok(format!("respuesta generada ({} turnos)", context.len()))
        }
    }

    fn server(config: AppConfig) -> CounselMcpServer {
        let base = KnowledgeBase::build(vec![
            CorpusRecord::new(
                "¿Qué es Machine Learning?",
                "Es un área de IA...",
                "Profesor A",
            ),
            CorpusRecord::new(
                "¿Qué especialidad tiene más salida laboral?",
                "Redes | ciberseguridad.",
                "Profesor B",
            ),
        ])
        .unwrap();
        let assistant = Assistant::new(
            Arc::new(CorpusHandle::new(base)),
            Arc::new(PassThroughModeration),
            Arc::new(FixedFallback),
            &config,
        );
        CounselMcpServer::new(assistant, config)
    }

    #[tokio::test]
    async fn ask_keeps_sessions_separate_and_clear_resets() {
        let server = server(AppConfig::default());
        let ask = |session: &str, message: &str| AskInput {
            session_id: session.to_string(),
            message: message.to_string(),
        };

        let out = server
            .ask_impl(ask("ana", "Cuéntame sobre Machine Learning"))
            .await;
        assert!(out.contains("**Profesor A**"));
        assert!(out.contains("- outcome: matched"));

        let out = server.ask_impl(ask("ana", "xyzzy")).await;
        assert!(out.contains("respuesta generada (5 turnos)"));
        let out = server.ask_impl(ask("luis", "xyzzy")).await;
        assert!(out.contains("respuesta generada (3 turnos)"));

        let clear = |session: &str| ClearConversationInput {
            session_id: session.to_string(),
        };
        assert_eq!(server.state.sessions.len(), 2);
        let greeting = server.clear_conversation_impl(clear("ana")).await;
        assert_eq!(greeting, AppConfig::default().prompts.greeting);
        assert_eq!(server.state.sessions.len(), 1);
        assert!(server.corpus_summary_impl().contains("- sessions: 1"));

        let out = server.ask_impl(ask("ana", "xyzzy")).await;
        assert!(out.contains("respuesta generada (3 turnos)"));
        assert_eq!(server.state.sessions.len(), 2);
    }

    #[tokio::test]
    async fn clearing_unknown_sessions_does_not_grow_the_store() {
        let server = server(AppConfig::default());
        for i in 0..100 {
            let greeting = server
                .clear_conversation_impl(ClearConversationInput {
                    session_id: format!("s{i}"),
                })
                .await;
            assert_eq!(greeting, AppConfig::default().prompts.greeting);
        }
        assert!(server.state.sessions.is_empty());
    }

    #[tokio::test]
    async fn search_escapes_table_cells_and_marks_acceptance() {
        let server = server(AppConfig::default());
        let out = server.search_corpus_impl(SearchCorpusInput {
            query: "especialidad salida laboral".to_string(),
            top_k: Some(3),
            snippet_chars: None,
        });
        assert!(out.contains("- hits: 1"));
        assert!(out.contains("Redes \\| ciberseguridad."));
        assert!(out.contains("| yes |"));
    }

    #[tokio::test]
    async fn reload_swaps_corpus_and_failure_keeps_it() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("estudiantes.csv");
        fs::write(
            &csv,
            "Pregunta,Estudiante A\n¿Curso favorito?,Algoritmos\n¿Lenguaje favorito?,Rust\n¿Área?,Redes\n",
        )
        .unwrap();
        let config = AppConfig {
            corpus_sources: vec![CorpusSource::new("estudiantes", &csv)],
            ..AppConfig::default()
        };
        let server = server(config);

        let out = server.reload_corpus_impl().await.unwrap();
        assert!(out.contains("3 records (previously 2)"));
        assert!(server.corpus_summary_impl().contains("| Estudiante A | 3 |"));

        fs::remove_file(&csv).unwrap();
        assert!(server.reload_corpus_impl().await.is_err());
        assert!(server.corpus_summary_impl().contains("- records: 3"));
    }

    #[tokio::test]
    async fn reload_prefers_the_persisted_index_like_startup() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.json");
        let persisted = KnowledgeBase::build(vec![
            CorpusRecord::new("¿Curso favorito?", "Algoritmos", "Estudiante A"),
            CorpusRecord::new("¿Lenguaje favorito?", "Rust", "Estudiante A"),
            CorpusRecord::new("¿Área?", "Redes", "Estudiante B"),
        ])
        .unwrap();
        save_knowledge_json(&persisted, &index).unwrap();
        let missing_csv = dir.path().join("no-existe.csv");

        let config = AppConfig {
            index_path: Some(index.clone()),
            corpus_sources: vec![CorpusSource::new("estudiantes", &missing_csv)],
            ..AppConfig::default()
        };
        let server = server(config);

        let out = server.reload_corpus_impl().await.unwrap();
        assert!(out.contains("3 records (previously 2)"));
        assert!(server.corpus_summary_impl().contains("| Estudiante B | 1 |"));

        fs::remove_file(&index).unwrap();
        assert!(server.reload_corpus_impl().await.is_err());
        assert!(server.corpus_summary_impl().contains("- records: 3"));
    }
}
