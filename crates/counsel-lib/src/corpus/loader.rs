//! CSV loading for interview tables.
//!
//! The header row must contain exactly one question column (`Pregunta` or
//! `Question`, case-insensitive); every other column is a respondent.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::CorpusSource;
use crate::error::{CounselError, Result};
use crate::model::corpus_table::CorpusTable;

const QUESTION_HEADERS: [&str; 2] = ["pregunta", "question"];

fn is_question_header(header: &str) -> bool {
    let header = header.trim().to_lowercase();
    QUESTION_HEADERS.iter().any(|candidate| *candidate == header)
}

/// Parse a corpus table from any CSV reader.
///
/// # Arguments
/// * `reader` - CSV input with a header row.
/// * `name` - Table name used in log lines and error messages.
///
/// # Returns
/// The parsed table, or `CorpusLoad` when the header layout is invalid or the
/// input cannot be read.
pub fn read_table<R: Read>(reader: R, name: &str) -> Result<CorpusTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| CounselError::CorpusLoad(format!("table '{name}': unreadable header: {e}")))?
        .clone();

    let question_columns: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| is_question_header(h))
        .map(|(i, _)| i)
        .collect();
    let question_idx = match question_columns.as_slice() {
        [idx] => *idx,
        [] => {
            return Err(CounselError::CorpusLoad(format!(
                "table '{name}': no 'Pregunta'/'Question' column in header"
            )))
        }
        _ => {
            return Err(CounselError::CorpusLoad(format!(
                "table '{name}': {} question columns in header, expected exactly one",
                question_columns.len()
            )))
        }
    };

    let mut respondent_columns = Vec::new();
    let mut respondents = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        if idx == question_idx {
            continue;
        }
        let label = header.trim();
        if label.is_empty() {
            return Err(CounselError::CorpusLoad(format!(
                "table '{name}': column {} has an empty respondent header",
                idx + 1
            )));
        }
        respondent_columns.push(idx);
        respondents.push(label.to_string());
    }

    let mut table = CorpusTable::new(name, respondents);
    for (line, row) in csv_reader.records().enumerate() {
        let row = row.map_err(|e| {
            CounselError::CorpusLoad(format!("table '{name}': row {}: {e}", line + 2))
        })?;
        if row.len() > headers.len() {
            return Err(CounselError::CorpusLoad(format!(
                "table '{name}': row {} has {} cells but the header has {}",
                line + 2,
                row.len(),
                headers.len()
            )));
        }
        let question = row.get(question_idx).unwrap_or("").trim();
        if question.is_empty() {
            warn!(table = name, row = line + 2, "skipping row with empty question");
            continue;
        }
        // Short rows are padded with empty answers.
        let answers = respondent_columns
            .iter()
            .map(|&idx| row.get(idx).unwrap_or("").to_string())
            .collect();
        table.push_row(question, answers)?;
    }

    debug!(
        table = name,
        rows = table.rows.len(),
        respondents = table.respondents.len(),
        "parsed corpus table"
    );
    Ok(table)
}

/// Load a corpus table from a CSV file on disk.
pub fn load_table_csv(path: &Path, name: &str) -> Result<CorpusTable> {
    let file = File::open(path).map_err(|e| {
        CounselError::CorpusLoad(format!("table '{name}': cannot open {}: {e}", path.display()))
    })?;
    read_table(file, name)
}

/// Load every configured source, in order. Any failure aborts the whole load.
pub fn load_sources(sources: &[CorpusSource]) -> Result<Vec<CorpusTable>> {
    if sources.is_empty() {
        return Err(CounselError::CorpusLoad(
            "no corpus sources configured".to_string(),
        ));
    }
    let mut tables = Vec::with_capacity(sources.len());
    for source in sources {
        let table = load_table_csv(&source.path, &source.name)?;
        info!(
            table = %source.name,
            path = %source.path.display(),
            rows = table.rows.len(),
            answers = table.answered_cells(),
            "loaded corpus table"
        );
        tables.push(table);
    }
    Ok(tables)
}
