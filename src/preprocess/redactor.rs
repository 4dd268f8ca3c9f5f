use crate::ner::EntityRecognizer;

/// Entity category that marks a copyright holder.
pub const HOLDER_LABEL: &str = "ENT";

const ENTITY_TOKEN: &str = " ENTITY ";

/// Replace copyright-holder entities with ` ENTITY `.
///
/// Entities are detected on the original sentence, but each replacement is a
/// global substitution of the entity's surface text over the sentence as
/// rewritten so far. When two entities share text, a later substitution can
/// hit text produced by (or already consumed by) an earlier one.
pub fn redact_one(sentence: &str, recognizer: &dyn EntityRecognizer) -> String {
    let mut redacted = sentence.to_string();
    for entity in recognizer.recognize(sentence) {
        if entity.label == HOLDER_LABEL && !entity.text.is_empty() {
            redacted = redacted.replace(&entity.text, ENTITY_TOKEN);
        }
    }
    redacted
}

pub fn redact<S: AsRef<str>>(sentences: &[S], recognizer: &dyn EntityRecognizer) -> Vec<String> {
    sentences
        .iter()
        .map(|s| redact_one(s.as_ref(), recognizer))
        .collect()
}
