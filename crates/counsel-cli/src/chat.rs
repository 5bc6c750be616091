//! Interactive conversation over stdin/stdout.
//!
//! `/clear` resets the session to its greeting, `/quit` (or end of input)
//! leaves the loop.

use std::io::{BufRead, Write};

use anyhow::Result;
use counsel::{Assistant, Outcome};

const CLEAR_COMMAND: &str = "/clear";
const QUIT_COMMAND: &str = "/quit";

pub async fn run_chat<R, W>(assistant: &Assistant, input: R, mut out: W) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut session = assistant.start_session();
    writeln!(out, "{}", session.greeting())?;
    writeln!(out, "({CLEAR_COMMAND} para reiniciar, {QUIT_COMMAND} para salir)")?;
    out.flush()?;

    for line in input.lines() {
        let line = line?;
        let text = line.trim();
        match text {
            "" => continue,
            QUIT_COMMAND => break,
            CLEAR_COMMAND => {
                session.reset();
                writeln!(out, "{}", session.greeting())?;
                out.flush()?;
                continue;
            }
            _ => {}
        }

        let reply = assistant.respond(&mut session, text).await;
        if let Outcome::Matched(m) = &reply.outcome {
            tracing::debug!(position = m.position, score = m.score, "corpus answer");
        }
        writeln!(out, "\n{}\n", reply.text)?;
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use counsel::services::{GenerationParams, GenerativeFallback, PassThroughModeration};
    use counsel::{AppConfig, ConversationTurn, CorpusHandle, CorpusRecord, KnowledgeBase};

    /// Echoes the number of turns it was given.
    struct CountingFallback;

    #[async_trait]
    impl GenerativeFallback for CountingFallback {
        async fn complete(
            &self,
            context: &[ConversationTurn],
            _params: &GenerationParams,
        ) -> counsel::Result<String> {
            Ok(format!("turnos={}", context.len()))
        }
    }

    fn assistant() -> Assistant {
        let base = KnowledgeBase::build(vec![CorpusRecord::new(
            "¿Qué es Machine Learning?",
            "Es un área de IA...",
            "Profesor A",
        )])
        .unwrap();
        Assistant::new(
            Arc::new(CorpusHandle::new(base)),
            Arc::new(PassThroughModeration),
            Arc::new(CountingFallback),
            &AppConfig::default(),
        )
    }

    #[tokio::test]
    async fn clear_resets_context_and_quit_stops_reading() {
        let input = "xyzzy\nplugh\n/clear\nxyzzy\n/quit\nnunca leído\n";
        let mut out = Vec::new();
        run_chat(&assistant(), input.as_bytes(), &mut out).await.unwrap();
        let transcript = String::from_utf8(out).unwrap();

        // system + greeting + user, then two more turns before the clear.
        assert!(transcript.contains("turnos=3"));
        assert!(transcript.contains("turnos=5"));
        assert_eq!(transcript.matches("turnos=3").count(), 2);
        assert!(!transcript.contains("turnos=7"));
    }

    #[tokio::test]
    async fn corpus_answers_name_their_source() {
        let input = "Cuéntame sobre Machine Learning\n";
        let mut out = Vec::new();
        run_chat(&assistant(), input.as_bytes(), &mut out).await.unwrap();
        let transcript = String::from_utf8(out).unwrap();
        assert!(transcript.contains("**Profesor A**"));
        assert!(transcript.contains("Es un área de IA..."));
    }
}
