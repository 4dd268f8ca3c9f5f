use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::Regex;

use crate::error::{Result, SafaaError};
use crate::models::AnnotatedRecord;
use crate::ner::EntityRecognizer;

/// Records with no annotations, ready for manual labelling.
pub fn records_from_sentences<S: AsRef<str>>(sentences: &[S]) -> Vec<AnnotatedRecord> {
    sentences
        .iter()
        .map(|s| AnnotatedRecord {
            text: s.as_ref().to_string(),
            labels: Vec::new(),
        })
        .collect()
}

/// Records pre-labelled with whatever `recognizer` finds, for review.
pub fn records_from_model<S: AsRef<str>>(
    sentences: &[S],
    recognizer: &dyn EntityRecognizer,
) -> Vec<AnnotatedRecord> {
    sentences
        .iter()
        .map(|s| {
            let text = s.as_ref();
            let labels = recognizer
                .recognize(text)
                .into_iter()
                .map(|e| (byte_to_char(text, e.start), byte_to_char(text, e.end), e.label))
                .collect();
            AnnotatedRecord {
                text: text.to_string(),
                labels,
            }
        })
        .collect()
}

/// Records built from a parallel column of expected entity text.
///
/// Pairs whose label is empty, or whose label does not occur as a whole word
/// in the sentence, are skipped. Only the first occurrence is annotated.
pub fn records_from_label_column<S: AsRef<str>, L: AsRef<str>>(
    sentences: &[S],
    labels: &[L],
    category: &str,
) -> Result<Vec<AnnotatedRecord>> {
    if sentences.len() != labels.len() {
        return Err(SafaaError::ShapeMismatch {
            data: sentences.len(),
            predictions: labels.len(),
        });
    }

    let mut records = Vec::new();
    for (sentence, label) in sentences.iter().zip(labels) {
        let (sentence, label) = (sentence.as_ref(), label.as_ref());
        if label.is_empty() {
            continue;
        }
        let pattern = format!(r"\b{}\b", regex::escape(label));
        let re = Regex::new(&pattern).map_err(|source| SafaaError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        let Some(m) = re.find(sentence) else {
            continue;
        };
        records.push(AnnotatedRecord {
            text: sentence.to_string(),
            labels: vec![(
                byte_to_char(sentence, m.start()),
                byte_to_char(sentence, m.end()),
                category.to_string(),
            )],
        });
    }
    Ok(records)
}

/// Split `records` into `(train, test)` sets, with `ceil(test_ratio * n)`
/// records in the test set.
///
/// With `shuffle`, records are permuted by a generator seeded with `seed`, so
/// the same seed always yields the same split. Without it, the last records
/// form the test set. Both sets must end up non-empty.
pub fn split_records<T>(
    mut records: Vec<T>,
    test_ratio: f64,
    seed: u64,
    shuffle: bool,
) -> Result<(Vec<T>, Vec<T>)> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(SafaaError::InvalidTrainingData(format!(
            "test ratio must be between 0 and 1, got {}",
            test_ratio
        )));
    }

    let n_test = (test_ratio * records.len() as f64).ceil() as usize;
    if n_test == 0 || n_test >= records.len() {
        return Err(SafaaError::InvalidTrainingData(format!(
            "cannot split {} records with test ratio {} into two non-empty sets",
            records.len(),
            test_ratio
        )));
    }

    if shuffle {
        records.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    let test = records.split_off(records.len() - n_test);
    Ok((records, test))
}

/// `<dir>/<stem>-train.jsonl` and `<dir>/<stem>-test.jsonl` for `path`.
pub fn split_paths(path: &Path) -> (PathBuf, PathBuf) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    (
        dir.join(format!("{}-train.jsonl", stem)),
        dir.join(format!("{}-test.jsonl", stem)),
    )
}

/// Read newline-delimited JSON records. Blank lines are ignored.
pub fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        items.push(serde_json::from_str(&line)?);
    }
    Ok(items)
}

/// Write one JSON object per line.
pub fn write_jsonl<T: serde::Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Character offset of byte offset `byte` (which must be a char boundary).
pub fn byte_to_char(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// Substring between two character offsets, if both are in range.
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start >= end {
        return None;
    }
    let mut indices = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
    let from = indices.nth(start)?;
    let to = indices.nth(end - start - 1)?;
    Some(&text[from..to])
}
