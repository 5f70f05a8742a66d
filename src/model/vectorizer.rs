//! Bag-of-words count vectorization
//!
//! Documents become sparse vectors of token counts over a vocabulary learned
//! from the fitted corpus. The vocabulary is rebuilt from scratch on every fit.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::ModelError;

/// Tokens are runs of two or more word characters.
static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("static pattern"));

/// One document as `(feature index, count)` pairs sorted by feature index.
pub type SparseRow = Vec<(usize, f64)>;

/// Document-term count matrix in row-sparse form.
#[derive(Debug, Clone, PartialEq)]
pub struct CountMatrix {
    pub rows: Vec<SparseRow>,
    pub n_features: usize,
}

impl CountMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of stored non-zero entries.
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

pub fn tokenize(document: &str) -> Vec<String> {
    let lowered = document.to_lowercase();
    TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct CountVectorizer {
    /// term -> feature index
    vocabulary: HashMap<String, usize>,
    /// feature index -> term
    terms: Vec<String>,
}

impl CountVectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<(), ModelError> {
        if documents.is_empty() {
            return Err(ModelError::EmptyDataset);
        }

        // Sorted for a deterministic feature order
        let terms: BTreeSet<String> = documents
            .iter()
            .flat_map(|doc| tokenize(doc.as_ref()))
            .collect();
        if terms.is_empty() {
            return Err(ModelError::EmptyVocabulary);
        }

        self.terms = terms.into_iter().collect();
        self.vocabulary = self
            .terms
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();
        Ok(())
    }

    /// Count known tokens; tokens outside the vocabulary are dropped.
    pub fn transform_one(&self, document: &str) -> SparseRow {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(document) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        counts.into_iter().collect()
    }

    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> CountMatrix {
        CountMatrix {
            rows: documents
                .iter()
                .map(|doc| self.transform_one(doc.as_ref()))
                .collect(),
            n_features: self.terms.len(),
        }
    }

    pub fn fit_transform<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<CountMatrix, ModelError> {
        self.fit(documents)?;
        Ok(self.transform(documents))
    }

    pub fn vocabulary(&self) -> &HashMap<String, usize> {
        &self.vocabulary
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn n_features(&self) -> usize {
        self.terms.len()
    }
}
