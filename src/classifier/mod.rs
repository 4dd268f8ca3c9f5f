//! False-positive detection over preprocessed copyright text.
//!
//! - [`vectorizer`]: TF-IDF features.
//! - [`logistic`]: probabilistic detector.
//! - [`centroid`]: hard-label detector.
//!
//! [`FalsePositiveDetector`] is the serialized model; [`label`] turns its
//! output into [`Label`]s.

pub mod centroid;
pub mod logistic;
pub mod vectorizer;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SafaaError};
use crate::models::Label;

use centroid::NearestCentroid;
use logistic::LogisticRegression;
use vectorizer::SparseRow;

/// Detector model file inside a model directory.
pub const DETECTOR_FILE: &str = "false_positive_detection_model.pkl";
/// Vectorizer file inside a model directory.
pub const VECTORIZER_FILE: &str = "false_positive_detection_vectorizer.pkl";

pub use vectorizer::TfidfVectorizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Logistic,
    Centroid,
}

/// A fitted (or fit-ready) binary detector. Class 1 is [`Label::FalsePositive`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FalsePositiveDetector {
    Logistic(LogisticRegression),
    Centroid(NearestCentroid),
}

impl Default for FalsePositiveDetector {
    fn default() -> Self {
        FalsePositiveDetector::Logistic(LogisticRegression::default())
    }
}

impl FalsePositiveDetector {
    pub fn kind(&self) -> DetectorKind {
        match self {
            FalsePositiveDetector::Logistic(_) => DetectorKind::Logistic,
            FalsePositiveDetector::Centroid(_) => DetectorKind::Centroid,
        }
    }

    /// Fit on feature rows and their labels.
    pub fn fit(&mut self, rows: &[SparseRow], labels: &[Label], n_features: usize) -> Result<()> {
        if rows.len() != labels.len() {
            return Err(SafaaError::ShapeMismatch {
                data: rows.len(),
                predictions: labels.len(),
            });
        }
        if rows.is_empty() {
            return Err(SafaaError::InvalidTrainingData("no training examples".to_string()));
        }
        let targets: Vec<usize> = labels.iter().map(|l| l.class()).collect();
        if !targets.contains(&0) || !targets.contains(&1) {
            return Err(SafaaError::InvalidTrainingData(
                "training labels must contain both 't' and 'f' examples".to_string(),
            ));
        }

        match self {
            FalsePositiveDetector::Logistic(model) => model.fit(rows, &targets, n_features),
            FalsePositiveDetector::Centroid(model) => model.fit(rows, &targets, n_features),
        }
        Ok(())
    }

    /// Probability of the false-positive class, when the detector has one.
    pub fn predict_proba(&self, rows: &[SparseRow]) -> Option<Vec<f64>> {
        match self {
            FalsePositiveDetector::Logistic(model) => Some(model.predict_proba(rows)),
            FalsePositiveDetector::Centroid(_) => None,
        }
    }

    /// Hard class predictions.
    pub fn predict(&self, rows: &[SparseRow]) -> Vec<usize> {
        match self {
            FalsePositiveDetector::Logistic(model) => model
                .predict_proba(rows)
                .into_iter()
                .map(|p| usize::from(p >= 0.5))
                .collect(),
            FalsePositiveDetector::Centroid(model) => model.predict(rows),
        }
    }

    /// Label rows. With probabilities, a row is a false positive when its
    /// probability is at least `threshold`; otherwise the hard prediction is used.
    /// A NaN threshold is rejected when probabilities are available.
    pub fn label(&self, rows: &[SparseRow], threshold: f64) -> Result<Vec<Label>> {
        Ok(match self.predict_proba(rows) {
            Some(_) if threshold.is_nan() => return Err(SafaaError::InvalidThreshold(threshold)),
            Some(probs) => probs
                .into_iter()
                .map(|p| {
                    if p >= threshold {
                        Label::FalsePositive
                    } else {
                        Label::Genuine
                    }
                })
                .collect(),
            None => self.predict(rows).into_iter().map(Label::from_class).collect(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_json(path)
    }
}

impl TfidfVectorizer {
    pub fn load(path: &Path) -> Result<Self> {
        let vectorizer: Self = load_json(path)?;
        vectorizer
            .validate()
            .map_err(|reason| SafaaError::model_load(path, reason))?;
        Ok(vectorizer)
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| SafaaError::model_load(path, e))?;
    serde_json::from_str(&content).map_err(|e| SafaaError::model_load(path, e))
}
