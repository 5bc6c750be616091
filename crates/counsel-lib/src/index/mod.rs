//! Similarity index over the flattened corpus.
//!
//! Row `i` of the document matrix always belongs to record `i`; the index is
//! built in one pass from the full record list and never mutated afterwards.

pub mod tfidf;

use std::cmp::Ordering;
use std::time::Instant;

use ndarray::{Array1, Array2, ArrayView1};
use tracing::debug;

use crate::error::{CounselError, Result};
use crate::model::corpus_record::CorpusRecord;
use tfidf::TfidfVectorizer;

/// Score of one corpus position against a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDocument {
    pub position: usize,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    vectorizer: TfidfVectorizer,
    matrix: Array2<f32>,
}

impl SimilarityIndex {
    /// Fit a new vectorizer over `records` and vectorise every record.
    ///
    /// # Returns
    /// `EmptyCorpus` when `records` is empty.
    pub fn build(records: &[CorpusRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(CounselError::EmptyCorpus);
        }
        let start = Instant::now();
        let documents: Vec<String> = records.iter().map(CorpusRecord::document_text).collect();
        let vectorizer = TfidfVectorizer::fit(&documents);
        let matrix = vectorizer.transform_many(&documents);
        debug!(
            documents = documents.len(),
            vocabulary = vectorizer.vocabulary_len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "built similarity index"
        );
        Ok(Self { vectorizer, matrix })
    }

    /// Vectorise `records` with an already-fitted vectorizer (used when
    /// restoring a persisted index).
    pub fn with_vectorizer(vectorizer: TfidfVectorizer, records: &[CorpusRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(CounselError::EmptyCorpus);
        }
        let documents: Vec<String> = records.iter().map(CorpusRecord::document_text).collect();
        let matrix = vectorizer.transform_many(&documents);
        Ok(Self { vectorizer, matrix })
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.nrows() == 0
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    fn scores_for(&self, query: ArrayView1<f32>) -> Array1<f32> {
        self.matrix.dot(&query).mapv(|s| s.clamp(0.0, 1.0))
    }

    /// Cosine similarity of `query` against every record, each in [0, 1].
    pub fn scores(&self, query: &str) -> Array1<f32> {
        let q = self.vectorizer.transform(query);
        self.scores_for(q.view())
    }

    /// Arg-max over the scores. Ties resolve to the earliest position; a query
    /// with no positive score (e.g. empty or fully out-of-vocabulary) yields
    /// `None`.
    pub fn best(&self, query: &str) -> Option<ScoredDocument> {
        let scores = self.scores(query);
        let mut best: Option<ScoredDocument> = None;
        for (position, &score) in scores.iter().enumerate() {
            if score <= 0.0 {
                continue;
            }
            match best {
                Some(current) if score <= current.score => {}
                _ => best = Some(ScoredDocument { position, score }),
            }
        }
        best
    }

    /// Top `k` positive-scoring positions, score descending, ties by position.
    pub fn top_k(&self, query: &str, k: usize) -> Vec<ScoredDocument> {
        rank(self.scores(query), k, None)
    }

    /// Top `k` records most similar to the record at `position`, excluding
    /// itself. `None` when `position` is out of range.
    pub fn neighbours(&self, position: usize, k: usize) -> Option<Vec<ScoredDocument>> {
        if position >= self.len() {
            return None;
        }
        let scores = self.scores_for(self.matrix.row(position));
        Some(rank(scores, k, Some(position)))
    }
}

fn rank(scores: Array1<f32>, k: usize, exclude: Option<usize>) -> Vec<ScoredDocument> {
    let mut ranked: Vec<ScoredDocument> = scores
        .iter()
        .enumerate()
        .filter(|(position, score)| **score > 0.0 && Some(*position) != exclude)
        .map(|(position, &score)| ScoredDocument { position, score })
        .collect();
    // Stable sort keeps corpus order among equal scores.
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked.truncate(k);
    ranked
}
