//! Corpus flattening: interview tables → positional list of `CorpusRecord`s.
//!
//! Records are produced row-major, then in respondent-column order, and only
//! for answer cells that are non-empty after trimming. Blank cells never become
//! records: an empty answer would still carry the row's question terms and
//! could win a similarity query with no content behind it.

pub mod loader;

use crate::model::corpus_record::CorpusRecord;
use crate::model::corpus_table::CorpusTable;

/// Flatten one table into records.
pub fn flatten(table: &CorpusTable) -> Vec<CorpusRecord> {
    let mut records = Vec::with_capacity(table.answered_cells());
    for row in &table.rows {
        let question = row.question.trim();
        for (label, cell) in table.respondents.iter().zip(row.answers.iter()) {
            let answer = cell.trim();
            if answer.is_empty() {
                continue;
            }
            records.push(CorpusRecord::new(question, answer, label.trim()));
        }
    }
    records
}

/// Flatten several tables, preserving table order.
pub fn flatten_all<'a, I>(tables: I) -> Vec<CorpusRecord>
where
    I: IntoIterator<Item = &'a CorpusTable>,
{
    tables.into_iter().flat_map(flatten).collect()
}
