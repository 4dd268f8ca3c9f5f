//! Canonical input transform for the false-positive classifier.
//!
//! - [`redactor`]: masks copyright-holder entities as ` ENTITY `.
//! - [`normalizer`]: deterministic regex substitutions, lowercasing, trimming.
//!
//! [`preprocess`] composes the two: coerce input, redact, normalize.

pub mod normalizer;
pub mod redactor;

use crate::error::Result;
use crate::models::TextSource;
use crate::ner::EntityRecognizer;

pub use normalizer::normalize;
pub use redactor::{redact, HOLDER_LABEL};

/// Coerce `data` to strings, redact holder entities, then normalize.
pub fn preprocess(
    data: impl Into<TextSource>,
    recognizer: &dyn EntityRecognizer,
) -> Result<Vec<String>> {
    let sentences = data.into().into_strings()?;
    let redacted = redact(&sentences, recognizer);
    Ok(normalize(&redacted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ner::recognizer::{EntityRule, PatternRecognizer};

    #[test]
    fn test_entity_then_normalize() {
        let ner = PatternRecognizer::new(vec![EntityRule::literal("ENT", "Acme Corp.")]).unwrap();
        let out = preprocess(["All rights reserved. Copyright 2020 Acme Corp."], &ner).unwrap();
        let tokens: Vec<&str> = out[0].split_whitespace().collect();
        assert_eq!(
            tokens,
            vec!["all", "rights", "reserved", "copyright", "date", "entity"]
        );
        assert!(!out[0].chars().any(|c| c.is_ascii_digit() || c.is_ascii_punctuation()));
    }

    #[test]
    fn test_redaction_happens_before_digit_removal() {
        // The entity contains digits; it must be masked before they are blanked.
        let ner = PatternRecognizer::new(vec![EntityRule::literal("ENT", "3Com")]).unwrap();
        let out = preprocess(["(c) 3Com"], &ner).unwrap();
        assert_eq!(out, vec!["copyrightsymbol   entity"]);
    }
}
