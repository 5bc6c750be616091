//! The searchable knowledge base: flattened records plus their similarity
//! index, always built together, and a handle that swaps whole bases
//! atomically on reload.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::corpus;
use crate::error::Result;
use crate::index::tfidf::TfidfVectorizer;
use crate::index::{ScoredDocument, SimilarityIndex};
use crate::model::corpus_record::CorpusRecord;
use crate::model::corpus_table::CorpusTable;

/// Best-scoring record for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub record: CorpusRecord,
    pub score: f32,
    /// Position of the record in the flattened corpus.
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    records: Vec<CorpusRecord>,
    index: SimilarityIndex,
}

impl KnowledgeBase {
    pub fn build(records: Vec<CorpusRecord>) -> Result<Self> {
        let index = SimilarityIndex::build(&records)?;
        info!(
            records = records.len(),
            vocabulary = index.vectorizer().vocabulary_len(),
            "knowledge base ready"
        );
        Ok(Self { records, index })
    }

    /// Flatten `tables` in order and build the base over the result.
    pub fn from_tables(tables: &[CorpusTable]) -> Result<Self> {
        Self::build(corpus::flatten_all(tables))
    }

    /// Restore a base from persisted records and a persisted vectorizer.
    pub fn from_parts(records: Vec<CorpusRecord>, vectorizer: TfidfVectorizer) -> Result<Self> {
        let index = SimilarityIndex::with_vectorizer(vectorizer, &records)?;
        Ok(Self { records, index })
    }

    pub fn records(&self) -> &[CorpusRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&CorpusRecord> {
        self.records.get(position)
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    fn to_match(&self, doc: ScoredDocument) -> Option<MatchResult> {
        self.records.get(doc.position).map(|record| MatchResult {
            record: record.clone(),
            score: doc.score,
            position: doc.position,
        })
    }

    /// Arg-max record for `query`, or `None` when nothing scores above zero.
    pub fn best_match(&self, query: &str) -> Option<MatchResult> {
        self.index.best(query).and_then(|doc| self.to_match(doc))
    }

    /// Ranked top-`k` records for `query` (zero scores omitted).
    pub fn search(&self, query: &str, k: usize) -> Vec<MatchResult> {
        self.index
            .top_k(query, k)
            .into_iter()
            .filter_map(|doc| self.to_match(doc))
            .collect()
    }

    /// Records most similar to the record at `position`, excluding itself.
    pub fn similar_records(&self, position: usize, k: usize) -> Option<Vec<MatchResult>> {
        self.index.neighbours(position, k).map(|docs| {
            docs.into_iter()
                .filter_map(|doc| self.to_match(doc))
                .collect()
        })
    }

    /// Record count per respondent label.
    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.source_label.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Shared, swappable reference to the current knowledge base.
///
/// Readers take an `Arc` snapshot and query it without holding the lock;
/// `replace` installs a fully built base in a single write.
#[derive(Debug)]
pub struct CorpusHandle {
    current: RwLock<Arc<KnowledgeBase>>,
}

impl CorpusHandle {
    pub fn new(base: KnowledgeBase) -> Self {
        Self {
            current: RwLock::new(Arc::new(base)),
        }
    }

    pub fn snapshot(&self) -> Arc<KnowledgeBase> {
        Arc::clone(&self.current.read())
    }

    /// Install `base`, returning the one it replaced.
    pub fn replace(&self, base: KnowledgeBase) -> Arc<KnowledgeBase> {
        let next = Arc::new(base);
        let previous = std::mem::replace(&mut *self.current.write(), next);
        info!(
            previous = previous.len(),
            current = self.current.read().len(),
            "knowledge base swapped"
        );
        previous
    }
}
