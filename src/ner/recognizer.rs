use std::collections::HashSet;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SafaaError};
use crate::models::{AnnotatedRecord, EntitySpan};
use crate::ner::records::char_slice;
use crate::ner::EntityRecognizer;

/// File holding the rules inside an entity model directory.
pub const MODEL_FILE: &str = "model.json";

/// A single recognition rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRule {
    /// Category assigned to every match (e.g. `ENT`).
    pub label: String,
    /// Regular expression, or plain text when `literal` is set.
    pub pattern: String,
    /// Match `pattern` as exact text, bounded by word boundaries at word characters.
    #[serde(default)]
    pub literal: bool,
    #[serde(default)]
    pub case_insensitive: bool,
}

impl EntityRule {
    pub fn literal(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pattern: text.into(),
            literal: true,
            case_insensitive: false,
        }
    }

    pub fn regex(label: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pattern: pattern.into(),
            literal: false,
            case_insensitive: false,
        }
    }

    fn compile(&self) -> Result<Regex> {
        let source = if self.literal {
            let mut escaped = regex::escape(&self.pattern);
            if self.pattern.chars().next().is_some_and(is_word_char) {
                escaped.insert_str(0, r"\b");
            }
            if self.pattern.chars().last().is_some_and(is_word_char) {
                escaped.push_str(r"\b");
            }
            escaped
        } else {
            self.pattern.clone()
        };

        RegexBuilder::new(&source)
            .case_insensitive(self.case_insensitive)
            .build()
            .map_err(|source| SafaaError::InvalidPattern {
                pattern: self.pattern.clone(),
                source,
            })
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    rules: Vec<EntityRule>,
}

/// Rule and gazetteer based entity recognizer.
///
/// Every rule contributes its matches; overlaps are resolved in favour of the
/// longest span, then the earliest start, then the earlier rule.
#[derive(Debug, Clone)]
pub struct PatternRecognizer {
    rules: Vec<EntityRule>,
    compiled: Vec<Regex>,
}

impl PatternRecognizer {
    pub fn new(rules: Vec<EntityRule>) -> Result<Self> {
        let compiled = rules.iter().map(EntityRule::compile).collect::<Result<_>>()?;
        Ok(Self { rules, compiled })
    }

    /// Load `<dir>/model.json`. Any failure is reported as a model load error.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MODEL_FILE);
        let content =
            std::fs::read_to_string(&path).map_err(|e| SafaaError::model_load(&path, e))?;
        let model: ModelFile =
            serde_json::from_str(&content).map_err(|e| SafaaError::model_load(&path, e))?;
        let recognizer =
            Self::new(model.rules).map_err(|e| SafaaError::model_load(&path, e))?;
        debug!(path = %path.display(), rules = recognizer.rules.len(), "loaded entity model");
        Ok(recognizer)
    }

    /// Write the rules to `<dir>/model.json`, creating `dir` if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let model = ModelFile {
            rules: self.rules.clone(),
        };
        std::fs::write(dir.join(MODEL_FILE), serde_json::to_string_pretty(&model)?)?;
        Ok(())
    }

    /// Build a gazetteer: one literal rule per distinct annotated (category, text).
    ///
    /// Offsets in the records are character offsets; spans that fall outside
    /// the text are skipped.
    pub fn from_records(records: &[AnnotatedRecord]) -> Result<Self> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut rules = Vec::new();

        for record in records {
            for (start, end, label) in &record.labels {
                let Some(text) = char_slice(&record.text, *start, *end) else {
                    debug!(start, end, text = %record.text, "skipping out-of-range span");
                    continue;
                };
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if seen.insert((label.clone(), text.to_string())) {
                    rules.push(EntityRule::literal(label.as_str(), text));
                }
            }
        }

        Self::new(rules)
    }

    pub fn rules(&self) -> &[EntityRule] {
        &self.rules
    }
}

impl EntityRecognizer for PatternRecognizer {
    fn recognize(&self, text: &str) -> Vec<EntitySpan> {
        // (start, end, rule index)
        let mut candidates: Vec<(usize, usize, usize)> = Vec::new();
        for (idx, regex) in self.compiled.iter().enumerate() {
            for m in regex.find_iter(text) {
                if !m.is_empty() {
                    candidates.push((m.start(), m.end(), idx));
                }
            }
        }

        candidates.sort_by(|a, b| {
            (b.1 - b.0)
                .cmp(&(a.1 - a.0))
                .then(a.0.cmp(&b.0))
                .then(a.2.cmp(&b.2))
        });

        let mut kept: Vec<(usize, usize, usize)> = Vec::new();
        for candidate in candidates {
            let overlaps = kept
                .iter()
                .any(|k| candidate.0 < k.1 && k.0 < candidate.1);
            if !overlaps {
                kept.push(candidate);
            }
        }
        kept.sort_by_key(|k| k.0);

        kept.into_iter()
            .map(|(start, end, idx)| EntitySpan {
                start,
                end,
                label: self.rules[idx].label.clone(),
                text: text[start..end].to_string(),
            })
            .collect()
    }
}
