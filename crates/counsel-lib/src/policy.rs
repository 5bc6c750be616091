/*
Retrieval policy: the single threshold decision between answering from the
corpus and deferring to the generative fallback.

- A match is accepted iff `score > threshold` (strict). A score exactly at the
  threshold goes to the fallback.
- An absent match (empty query, no shared vocabulary) is always unmatched.
- Corpus answers are formatted with their provenance: respondent label and
  the matched question, then the answer verbatim.
*/

use serde::{Deserialize, Serialize};

use crate::knowledge::MatchResult;

/// Default acceptance threshold for cosine similarity.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct RetrievalPolicy {
    pub threshold: f32,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Outcome of applying the policy to a query's best match.
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    Matched(MatchResult),
    Unmatched { best_score: Option<f32> },
}

impl RetrievalPolicy {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn accepts(&self, score: f32) -> bool {
        score > self.threshold
    }

    pub fn decide(&self, best: Option<MatchResult>) -> Decision {
        match best {
            Some(m) if self.accepts(m.score) => Decision::Matched(m),
            Some(m) => Decision::Unmatched {
                best_score: Some(m.score),
            },
            None => Decision::Unmatched { best_score: None },
        }
    }
}

/// Render a corpus answer with its provenance. The answer text is never
/// altered.
pub fn format_corpus_answer(m: &MatchResult) -> String {
    format!(
        "**{}** respondió a «{}»:\n\n{}",
        m.record.source_label, m.record.question, m.record.answer
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::corpus_record::CorpusRecord;

    fn scored(score: f32) -> MatchResult {
        MatchResult {
            record: CorpusRecord::new(
                "¿Qué es Machine Learning?",
                "Es un área de IA...",
                "Profesor A",
            ),
            score,
            position: 0,
        }
    }

    #[test]
    fn boundary_is_strict() {
        let policy = RetrievalPolicy::default();
        assert!(matches!(
            policy.decide(Some(scored(0.3))),
            Decision::Unmatched { best_score: Some(s) } if s == 0.3
        ));
        assert!(matches!(policy.decide(Some(scored(0.3001))), Decision::Matched(_)));
        assert!(matches!(policy.decide(Some(scored(0.2999))), Decision::Unmatched { .. }));
    }

    #[test]
    fn absent_match_is_unmatched() {
        assert_eq!(
            RetrievalPolicy::new(0.0).decide(None),
            Decision::Unmatched { best_score: None }
        );
    }

    #[test]
    fn formatted_answer_discloses_provenance() {
        let text = format_corpus_answer(&scored(0.9));
        assert!(text.contains("Profesor A"));
        assert!(text.contains("¿Qué es Machine Learning?"));
        assert!(text.ends_with("Es un área de IA..."));
    }
}
