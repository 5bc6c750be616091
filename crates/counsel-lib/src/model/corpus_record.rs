use serde::{Deserialize, Serialize};

/// One answered question: the row's shared prompt, one respondent's answer and
/// the respondent column it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub question: String,
    pub answer: String,
    /// Respondent label (column header), e.g. `Profesor A`.
    pub source_label: String,
}

impl CorpusRecord {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        source_label: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            source_label: source_label.into(),
        }
    }

    /// Text indexed for this record: question and answer separated by a space.
    pub fn document_text(&self) -> String {
        format!("{} {}", self.question, self.answer)
    }
}
