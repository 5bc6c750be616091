//! Library entry point for the corpus-first counselling assistant.
//!
//! This file re-exports the core types and provides helpers to persist and
//! restore a `KnowledgeBase` to/from JSON, plus `open_knowledge_base`, which
//! resolves the configured corpus (persisted index or CSV sources).
//
// Public modules
pub mod assistant;
pub mod config;
pub mod corpus;
pub mod error;
pub mod index;
pub mod knowledge;
pub mod model;
pub mod policy;
pub mod services;
pub mod session;
pub mod utils;

// Re-export primary types for ergonomic use.
pub use crate::assistant::{Assistant, Outcome, Reply};
pub use crate::config::{AppConfig, CorpusSource};
pub use crate::error::{CounselError, Result};
pub use crate::knowledge::{CorpusHandle, KnowledgeBase, MatchResult};
pub use crate::model::{
    conversation_turn::{ConversationTurn, Role},
    corpus_record::CorpusRecord,
    corpus_table::CorpusTable,
};
pub use crate::policy::{Decision, RetrievalPolicy};
pub use crate::session::{ConversationSession, SessionStore};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

use crate::index::tfidf::TfidfVectorizer;

/// Current on-disk format of a persisted knowledge base.
pub const INDEX_FORMAT_VERSION: &str = "counsel-index-1";

/// Top-level serialisable knowledge base.
///
/// The document matrix is omitted: it is recomputed from `records` with the
/// stored vocabulary on load, which keeps rows aligned with records by
/// construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SerializableKnowledgeBase {
    pub metadata: HashMap<String, String>,
    pub records: Vec<CorpusRecord>,
    /// Vocabulary terms in column order.
    pub vocabulary: Vec<String>,
    /// Smoothed idf weight per vocabulary column.
    pub idf: Vec<f32>,
}

impl From<&KnowledgeBase> for SerializableKnowledgeBase {
    fn from(base: &KnowledgeBase) -> Self {
        let vectorizer = base.index().vectorizer();
        let mut metadata = HashMap::new();
        metadata.insert(
            "format_version".to_string(),
            INDEX_FORMAT_VERSION.to_string(),
        );
        metadata.insert("record_count".to_string(), base.len().to_string());
        Self {
            metadata,
            records: base.records().to_vec(),
            vocabulary: vectorizer.terms(),
            idf: vectorizer.idf().to_vec(),
        }
    }
}

/// Save `base` as JSON.
///
/// # Arguments
///
/// * `base` - knowledge base to persist
/// * `path` - filesystem path to write JSON to
pub fn save_knowledge_json(base: &KnowledgeBase, path: &Path) -> Result<()> {
    let serial = SerializableKnowledgeBase::from(base);
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &serial)?;
    info!(
        path = %path.display(),
        records = serial.records.len(),
        vocabulary = serial.vocabulary.len(),
        "saved knowledge base"
    );
    Ok(())
}

/// Load a knowledge base previously written with `save_knowledge_json`.
///
/// # Returns
///
/// `Snapshot` when the format version is unknown or the stored vocabulary and
/// idf weights disagree; `EmptyCorpus` when the file holds no records.
pub fn load_knowledge_json(path: &Path) -> Result<KnowledgeBase> {
    let file = BufReader::new(File::open(path)?);
    let serial: SerializableKnowledgeBase = serde_json::from_reader(file)?;

    match serial.metadata.get("format_version").map(String::as_str) {
        Some(INDEX_FORMAT_VERSION) => {}
        other => {
            return Err(CounselError::Snapshot(format!(
                "unsupported format_version {:?} (expected {INDEX_FORMAT_VERSION})",
                other
            )))
        }
    }

    let vectorizer = TfidfVectorizer::from_parts(serial.vocabulary, serial.idf)?;
    let base = KnowledgeBase::from_parts(serial.records, vectorizer)?;
    info!(path = %path.display(), records = base.len(), "loaded knowledge base");
    Ok(base)
}

/// Build the knowledge base from configured CSV sources.
pub fn build_from_sources(sources: &[CorpusSource]) -> Result<KnowledgeBase> {
    let tables = corpus::loader::load_sources(sources)?;
    KnowledgeBase::from_tables(&tables)
}

/// Resolve the corpus described by `config`: the persisted index when
/// `index_path` is set, otherwise the CSV sources.
pub fn open_knowledge_base(config: &AppConfig) -> Result<KnowledgeBase> {
    match &config.index_path {
        Some(path) => load_knowledge_json(path),
        None => build_from_sources(&config.corpus_sources),
    }
}
