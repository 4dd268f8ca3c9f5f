use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SafaaError {
    #[error("failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("length mismatch: {data} input items but {predictions} predictions")]
    ShapeMismatch { data: usize, predictions: usize },

    #[error("vectorizer has not been fitted")]
    NotFitted,

    #[error("threshold must be a number, got {0}")]
    InvalidThreshold(f64),

    #[error("invalid training data: {0}")]
    InvalidTrainingData(String),

    #[error("invalid label '{0}' (expected t/f, true/false or 0/1)")]
    InvalidLabel(String),

    #[error("record {index} has no '{column}' field")]
    MissingColumn { index: usize, column: String },

    #[error("invalid entity pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("training failed: {0}")]
    TrainingFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SafaaError {
    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SafaaError::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SafaaError>;
