use crate::error::{CounselError, Result};

/// One row of a corpus table: the shared question plus one answer cell per
/// respondent column (empty string when the respondent did not answer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRow {
    pub question: String,
    pub answers: Vec<String>,
}

/// A loaded interview table (e.g. teachers or students): one question column
/// and N respondent columns, rows in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusTable {
    pub name: String,
    pub respondents: Vec<String>,
    pub rows: Vec<CorpusRow>,
}

impl CorpusTable {
    pub fn new(name: impl Into<String>, respondents: Vec<String>) -> Self {
        Self {
            name: name.into(),
            respondents,
            rows: Vec::new(),
        }
    }

    /// Append a row. The answer cells must line up with the respondent columns.
    pub fn push_row(&mut self, question: impl Into<String>, answers: Vec<String>) -> Result<()> {
        if answers.len() != self.respondents.len() {
            return Err(CounselError::CorpusLoad(format!(
                "table '{}': row has {} answer cells but {} respondent columns",
                self.name,
                answers.len(),
                self.respondents.len()
            )));
        }
        self.rows.push(CorpusRow {
            question: question.into(),
            answers,
        });
        Ok(())
    }

    /// Number of non-empty (after trimming) answer cells.
    pub fn answered_cells(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.answers.iter())
            .filter(|cell| !cell.trim().is_empty())
            .count()
    }
}
