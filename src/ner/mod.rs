//! Entity recognition: the recognizer seam, the rule-based model, the
//! external trainer hook, and annotation-record helpers.
//!
//! - [`recognizer`]: [`PatternRecognizer`](recognizer::PatternRecognizer), loaded from a model directory.
//! - [`trainer`]: rewrites the training config and runs an external trainer.
//! - [`records`]: JSONL annotation batches used to train and inspect models.

pub mod recognizer;
pub mod records;
pub mod trainer;

use crate::models::EntitySpan;

/// Anything that can find entity spans in a sentence.
///
/// Spans are returned sorted by start offset and never overlap.
pub trait EntityRecognizer {
    fn recognize(&self, text: &str) -> Vec<EntitySpan>;
}
