use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SafaaError};

/// Verdict for a single copyright-notice candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// A genuine copyright notice (`t`).
    #[serde(rename = "t")]
    Genuine,
    /// Text mistakenly flagged as a copyright notice (`f`).
    #[serde(rename = "f")]
    FalsePositive,
}

impl Label {
    /// Class index used by the detectors: `1` is the false-positive class.
    pub fn class(self) -> usize {
        match self {
            Label::Genuine => 0,
            Label::FalsePositive => 1,
        }
    }

    pub fn from_class(class: usize) -> Self {
        if class == 1 {
            Label::FalsePositive
        } else {
            Label::Genuine
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Label::Genuine => 't',
            Label::FalsePositive => 'f',
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Label {
    type Err = SafaaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "0" => Ok(Label::Genuine),
            "f" | "false" | "1" => Ok(Label::FalsePositive),
            _ => Err(SafaaError::InvalidLabel(s.to_string())),
        }
    }
}

/// A detected entity. `start`/`end` are byte offsets into the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub label: String,
    pub text: String,
}

/// One line of an annotation batch: `{"text": ..., "labels": [[start, end, category], ...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedRecord {
    pub text: String,
    #[serde(default)]
    pub labels: Vec<(usize, usize, String)>,
}

/// One line of a classifier training file: `{"text": ..., "label": "f"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    #[serde(deserialize_with = "deserialize_label")]
    pub label: Label,
}

fn deserialize_label<'de, D>(deserializer: D) -> std::result::Result<Label, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let text = match &raw {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        other => other.to_string(),
    };
    text.parse().map_err(serde::de::Error::custom)
}

/// Input shapes accepted by the preprocessing pipeline.
#[derive(Debug, Clone)]
pub enum TextSource {
    /// Plain strings, used as-is.
    Strings(Vec<String>),
    /// Arbitrary JSON values; anything that is not a string is stringified.
    Values(Vec<Value>),
    /// A single field of tabular records.
    Column { records: Vec<Value>, column: String },
}

impl TextSource {
    /// Coerce the source into an ordered sequence of strings.
    pub fn into_strings(self) -> Result<Vec<String>> {
        match self {
            TextSource::Strings(items) => Ok(items),
            TextSource::Values(values) => Ok(values.into_iter().map(value_to_string).collect()),
            TextSource::Column { records, column } => records
                .into_iter()
                .enumerate()
                .map(|(index, record)| match record {
                    Value::Object(mut fields) => fields
                        .remove(&column)
                        .map(value_to_string)
                        .ok_or(SafaaError::MissingColumn {
                            index,
                            column: column.clone(),
                        }),
                    _ => Err(SafaaError::MissingColumn {
                        index,
                        column: column.clone(),
                    }),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TextSource::Strings(items) => items.len(),
            TextSource::Values(values) => values.len(),
            TextSource::Column { records, .. } => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl From<Vec<String>> for TextSource {
    fn from(items: Vec<String>) -> Self {
        TextSource::Strings(items)
    }
}

impl From<&[String]> for TextSource {
    fn from(items: &[String]) -> Self {
        TextSource::Strings(items.to_vec())
    }
}

impl From<Vec<&str>> for TextSource {
    fn from(items: Vec<&str>) -> Self {
        TextSource::Strings(items.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for TextSource {
    fn from(items: &[&str]) -> Self {
        TextSource::Strings(items.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TextSource {
    fn from(items: [&str; N]) -> Self {
        TextSource::Strings(items.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<Value>> for TextSource {
    fn from(values: Vec<Value>) -> Self {
        TextSource::Values(values)
    }
}
