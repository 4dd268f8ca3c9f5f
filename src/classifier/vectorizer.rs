use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SafaaError};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("valid token pattern"));

/// Sparse feature row: `(feature index, weight)` pairs sorted by index.
pub type SparseRow = Vec<(usize, f64)>;

/// TF-IDF vectorizer over word tokens of two or more characters.
///
/// Weights are raw term counts scaled by smoothed inverse document frequency,
/// `ln((1 + n) / (1 + df)) + 1`, and each row is L2-normalized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Term → feature index, in lexicographic order.
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        !self.vocabulary.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<()> {
        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        for doc in documents {
            let unique: BTreeSet<&str> = tokenize(doc.as_ref()).collect();
            for token in unique {
                *document_frequency.entry(token).or_insert(0) += 1;
            }
        }

        if document_frequency.is_empty() {
            return Err(SafaaError::InvalidTrainingData(
                "no tokens found in training documents".to_string(),
            ));
        }

        let mut terms: Vec<&str> = document_frequency.keys().copied().collect();
        terms.sort_unstable();

        let n = documents.len() as f64;
        self.idf = terms
            .iter()
            .map(|t| ((1.0 + n) / (1.0 + document_frequency[t] as f64)).ln() + 1.0)
            .collect();
        self.vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(idx, t)| (t.to_string(), idx))
            .collect();
        Ok(())
    }

    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<Vec<SparseRow>> {
        if !self.is_fitted() {
            return Err(SafaaError::NotFitted);
        }
        Ok(documents.iter().map(|d| self.transform_one(d.as_ref())).collect())
    }

    pub fn fit_transform<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<Vec<SparseRow>> {
        self.fit(documents)?;
        self.transform(documents)
    }

    /// Check that a deserialized vectorizer is internally consistent: every
    /// feature index is unique and has a finite idf weight.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = BTreeSet::new();
        for (term, &idx) in &self.vocabulary {
            if idx >= self.idf.len() {
                return Err(format!(
                    "term {:?} has index {} but there are {} idf weights",
                    term,
                    idx,
                    self.idf.len()
                ));
            }
            if !seen.insert(idx) {
                return Err(format!("feature index {} is used more than once", idx));
            }
        }
        if let Some(idx) = self.idf.iter().position(|w| !w.is_finite()) {
            return Err(format!("idf weight {} is not finite", idx));
        }
        Ok(())
    }

    fn transform_one(&self, document: &str) -> SparseRow {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(document) {
            if let Some(&idx) = self.vocabulary.get(token) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseRow = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();

        let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut row {
                *w /= norm;
            }
        }
        row
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    TOKEN.find_iter(text).map(|m| m.as_str())
}
