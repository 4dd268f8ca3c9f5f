//! Report renderers for prediction results.
//!
//! - [`terminal`]: colored, tabular output with a summary line; respects `--quiet`.

pub mod terminal;

use serde::Serialize;

use crate::models::Label;

/// One scored input line, as shown in reports.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub text: String,
    pub label: Label,
    /// Decluttered notice; absent when only prediction was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decluttered: Option<String>,
}

/// Zip inputs with their labels and optional decluttered output.
pub fn verdicts(
    texts: &[String],
    labels: &[Label],
    decluttered: Option<&[String]>,
) -> Vec<Verdict> {
    texts
        .iter()
        .zip(labels)
        .enumerate()
        .map(|(i, (text, label))| Verdict {
            text: text.clone(),
            label: *label,
            decluttered: decluttered.and_then(|d| d.get(i).cloned()),
        })
        .collect()
}
