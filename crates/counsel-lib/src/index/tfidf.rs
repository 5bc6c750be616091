/*
TF-IDF vectorizer.

- Text is NFC-normalised and lower-cased before tokenisation.
- Tokens are runs of two or more word characters; no stop-word list.
- Weight = raw term count * smoothed idf, idf = ln((1 + n) / (1 + df)) + 1.
- Every vector is L2-normalised, so cosine similarity is a plain dot product.
- Vocabulary columns are sorted lexicographically, which keeps the fitted
  model (and its persisted form) deterministic for a given corpus.
*/

use std::collections::{BTreeMap, HashMap, HashSet};

use ndarray::{Array1, Array2};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::{CounselError, Result};

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("token pattern is a valid regex"));

/// NFC-normalise and lower-case `text`.
pub fn normalize(text: &str) -> String {
    text.nfc().collect::<String>().to_lowercase()
}

/// Split `text` into normalised tokens, in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = normalize(text);
    TOKEN_PATTERN
        .find_iter(&normalized)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Fitted vocabulary plus per-term idf weights.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    /// Fit the vocabulary and idf weights over `documents`.
    pub fn fit<S: AsRef<str> + Sync>(documents: &[S]) -> Self {
        let tokenized: Vec<Vec<String>> = documents
            .par_iter()
            .map(|doc| tokenize(doc.as_ref()))
            .collect();

        let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let n = documents.len() as f32;
        let mut vocabulary = HashMap::with_capacity(doc_freq.len());
        let mut idf = Vec::with_capacity(doc_freq.len());
        for (column, (term, df)) in doc_freq.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), column);
            idf.push(((1.0 + n) / (1.0 + df as f32)).ln() + 1.0);
        }
        Self { vocabulary, idf }
    }

    /// Rebuild a vectorizer from persisted parts (`terms[i]` owns column `i`).
    pub fn from_parts(terms: Vec<String>, idf: Vec<f32>) -> Result<Self> {
        if terms.len() != idf.len() {
            return Err(CounselError::Snapshot(format!(
                "vocabulary has {} terms but {} idf weights",
                terms.len(),
                idf.len()
            )));
        }
        if let Some(bad) = idf.iter().find(|w| !w.is_finite() || **w <= 0.0) {
            return Err(CounselError::Snapshot(format!("invalid idf weight {bad}")));
        }
        let mut vocabulary = HashMap::with_capacity(terms.len());
        for (column, term) in terms.into_iter().enumerate() {
            if let Some(previous) = vocabulary.insert(term, column) {
                return Err(CounselError::Snapshot(format!(
                    "duplicate vocabulary term at columns {previous} and {column}"
                )));
            }
        }
        Ok(Self { vocabulary, idf })
    }

    pub fn vocabulary_len(&self) -> usize {
        self.idf.len()
    }

    /// Terms in column order.
    pub fn terms(&self) -> Vec<String> {
        let mut terms = vec![String::new(); self.idf.len()];
        for (term, &column) in &self.vocabulary {
            terms[column] = term.clone();
        }
        terms
    }

    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    /// Project `text` into the fitted space. Unknown terms are dropped; a text
    /// with no known terms yields the zero vector.
    pub fn transform(&self, text: &str) -> Array1<f32> {
        let mut vector = Array1::<f32>::zeros(self.idf.len());
        for token in tokenize(text) {
            if let Some(&column) = self.vocabulary.get(&token) {
                vector[column] += 1.0;
            }
        }
        for (weight, idf) in vector.iter_mut().zip(self.idf.iter()) {
            *weight *= idf;
        }
        let norm = vector.dot(&vector).sqrt();
        if norm > 0.0 {
            vector.mapv_inplace(|w| w / norm);
        }
        vector
    }

    /// Transform every document; row `i` of the result belongs to `documents[i]`.
    pub fn transform_many<S: AsRef<str> + Sync>(&self, documents: &[S]) -> Array2<f32> {
        let rows: Vec<Array1<f32>> = documents
            .par_iter()
            .map(|doc| self.transform(doc.as_ref()))
            .collect();
        let mut matrix = Array2::<f32>::zeros((rows.len(), self.idf.len()));
        for (i, row) in rows.into_iter().enumerate() {
            matrix.row_mut(i).assign(&row);
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_drops_single_chars() {
        assert_eq!(
            tokenize("¿Qué es Machine Learning? Y la IA, o C"),
            vec!["qué", "es", "machine", "learning", "la", "ia"]
        );
    }

    #[test]
    fn tokenize_normalizes_composed_and_decomposed_accents() {
        // "qué" precomposed vs "que" + combining acute accent.
        assert_eq!(tokenize("Qu\u{e9}"), tokenize("Que\u{301}"));
    }

    #[test]
    fn vocabulary_is_sorted_and_idf_is_smoothed() {
        let vectorizer = TfidfVectorizer::fit(&["beta alfa", "alfa gamma"]);
        assert_eq!(vectorizer.terms(), vec!["alfa", "beta", "gamma"]);
        let idf = vectorizer.idf();
        // alfa appears in both documents: ln(3/3) + 1 = 1.
        assert!((idf[0] - 1.0).abs() < 1e-6);
        // beta appears in one: ln(3/2) + 1.
        assert!((idf[1] - ((3.0f32 / 2.0).ln() + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn transform_is_unit_length_or_zero() {
        let vectorizer = TfidfVectorizer::fit(&["redes de computadoras", "bases de datos"]);
        let v = vectorizer.transform("Redes y bases");
        assert!((v.dot(&v) - 1.0).abs() < 1e-5);
        let zero = vectorizer.transform("   ");
        assert!(zero.iter().all(|w| *w == 0.0));
        let unknown = vectorizer.transform("xyzzy plugh");
        assert!(unknown.iter().all(|w| *w == 0.0));
    }

    #[test]
    fn from_parts_reproduces_transform() {
        let fitted = TfidfVectorizer::fit(&["software libre", "hardware abierto"]);
        let rebuilt = TfidfVectorizer::from_parts(fitted.terms(), fitted.idf().to_vec()).unwrap();
        assert_eq!(
            fitted.transform("software abierto"),
            rebuilt.transform("software abierto")
        );
    }

    #[test]
    fn from_parts_rejects_inconsistent_snapshots() {
        let err = TfidfVectorizer::from_parts(vec!["a1".into()], vec![]).unwrap_err();
        assert!(matches!(err, CounselError::Snapshot(_)));
        let err = TfidfVectorizer::from_parts(vec!["a1".into(), "a1".into()], vec![1.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, CounselError::Snapshot(_)));
    }
}
