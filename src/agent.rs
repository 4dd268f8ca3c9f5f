//! The agent: owns every loaded model and exposes the pipeline.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::classifier::{FalsePositiveDetector, TfidfVectorizer, DETECTOR_FILE, VECTORIZER_FILE};
use crate::config::AgentConfig;
use crate::error::{Result, SafaaError};
use crate::models::{Label, TextSource};
use crate::ner::recognizer::PatternRecognizer;
use crate::ner::trainer::{self, ExternalTrainer, NerTarget, NerTrainingJob};
use crate::ner::EntityRecognizer;
use crate::preprocess;

/// Sub-directory of a model directory holding the holder-entity recognizer.
pub const ENTITY_RECOGNIZER_DIR: &str = "entity_recognizer";
/// Sub-directory of a model directory holding the declutter model.
pub const DECLUTTER_MODEL_DIR: &str = "declutter_model";

/// Result of [`SafaaAgent::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// The directory could not be written; nothing was saved.
    NotWritable(PathBuf),
}

/// Detects false-positive copyright notices and declutters genuine ones.
pub struct SafaaAgent {
    model_dir: PathBuf,
    local_model_dir: PathBuf,
    configs_dir: PathBuf,
    detector: FalsePositiveDetector,
    vectorizer: TfidfVectorizer,
    entity_recognizer: Box<dyn EntityRecognizer>,
    declutter_model: Box<dyn EntityRecognizer>,
}

impl SafaaAgent {
    /// Load all four models from the directory `config` resolves to.
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let model_dir = config.resolve_model_dir();
        info!(path = %model_dir.display(), "loading models");

        let detector = FalsePositiveDetector::load(&model_dir.join(DETECTOR_FILE))?;
        let vectorizer = TfidfVectorizer::load(&model_dir.join(VECTORIZER_FILE))?;
        if !vectorizer.is_fitted() {
            return Err(SafaaError::model_load(
                model_dir.join(VECTORIZER_FILE),
                "vectorizer has an empty vocabulary",
            ));
        }
        let entity_recognizer = PatternRecognizer::load(&model_dir.join(ENTITY_RECOGNIZER_DIR))?;
        let declutter_model = PatternRecognizer::load(&model_dir.join(DECLUTTER_MODEL_DIR))?;

        Ok(Self {
            model_dir,
            local_model_dir: config.local_model_dir.clone(),
            configs_dir: config.configs_dir.clone(),
            detector,
            vectorizer,
            entity_recognizer: Box::new(entity_recognizer),
            declutter_model: Box::new(declutter_model),
        })
    }

    /// Assemble an agent from models that are already in memory.
    pub fn from_parts(
        config: &AgentConfig,
        detector: FalsePositiveDetector,
        vectorizer: TfidfVectorizer,
        entity_recognizer: Box<dyn EntityRecognizer>,
        declutter_model: Box<dyn EntityRecognizer>,
    ) -> Self {
        Self {
            model_dir: config.resolve_model_dir(),
            local_model_dir: config.local_model_dir.clone(),
            configs_dir: config.configs_dir.clone(),
            detector,
            vectorizer,
            entity_recognizer,
            declutter_model,
        }
    }

    /// Directory the models were loaded from.
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn detector(&self) -> &FalsePositiveDetector {
        &self.detector
    }

    pub fn entity_recognizer(&self) -> &dyn EntityRecognizer {
        self.entity_recognizer.as_ref()
    }

    pub fn declutter_model(&self) -> &dyn EntityRecognizer {
        self.declutter_model.as_ref()
    }

    /// Coerce, redact holder entities, and normalize.
    pub fn preprocess(&self, data: impl Into<TextSource>) -> Result<Vec<String>> {
        preprocess::preprocess(data, self.entity_recognizer.as_ref())
    }

    /// Label each item `t` (genuine) or `f` (false positive).
    ///
    /// With a probabilistic detector an item is `f` when its false-positive
    /// probability is at least `threshold`, so raising the threshold leaves
    /// more items `t`.
    pub fn predict(&self, data: impl Into<TextSource>, threshold: f64) -> Result<Vec<Label>> {
        let preprocessed = self.preprocess(data)?;
        let rows = self.vectorizer.transform(&preprocessed)?;
        let labels = self.detector.label(&rows, threshold)?;
        debug!(
            items = labels.len(),
            false_positives = labels.iter().filter(|l| **l == Label::FalsePositive).count(),
            "predicted"
        );
        Ok(labels)
    }

    /// Strip false positives to `""` and reduce the rest to their entity spans.
    ///
    /// The declutter model runs on the original text, not the preprocessed one.
    pub fn declutter(
        &self,
        data: impl Into<TextSource>,
        predictions: &[Label],
    ) -> Result<Vec<String>> {
        let data = data.into();
        if data.len() != predictions.len() {
            return Err(SafaaError::ShapeMismatch {
                data: data.len(),
                predictions: predictions.len(),
            });
        }

        let sentences = data.into_strings()?;
        Ok(sentences
            .iter()
            .zip(predictions)
            .map(|(sentence, label)| match label {
                Label::FalsePositive => String::new(),
                Label::Genuine => self
                    .declutter_model
                    .recognize(sentence)
                    .into_iter()
                    .map(|e| e.text)
                    .collect::<Vec<_>>()
                    .join(" "),
            })
            .collect())
    }

    /// Refit the vectorizer and detector from scratch on `data`.
    ///
    /// Both are replaced together; on error the agent keeps its previous models.
    pub fn train_false_positive_detector(
        &mut self,
        data: impl Into<TextSource>,
        labels: &[Label],
    ) -> Result<()> {
        let preprocessed = self.preprocess(data)?;
        if preprocessed.len() != labels.len() {
            return Err(SafaaError::ShapeMismatch {
                data: preprocessed.len(),
                predictions: labels.len(),
            });
        }

        let mut vectorizer = TfidfVectorizer::new();
        let rows = vectorizer.fit_transform(&preprocessed)?;
        let mut detector = self.detector.clone();
        detector.fit(&rows, labels, vectorizer.vocabulary_size())?;

        info!(
            examples = rows.len(),
            vocabulary = vectorizer.vocabulary_size(),
            kind = ?detector.kind(),
            "trained false-positive detector"
        );
        self.vectorizer = vectorizer;
        self.detector = detector;
        Ok(())
    }

    /// Replace the detector (unfitted) before training, e.g. to switch kinds.
    pub fn set_detector(&mut self, detector: FalsePositiveDetector) {
        self.detector = detector;
    }

    /// Train an entity model with `trainer` and install it under the local
    /// model directory. The loaded entity models are not reloaded; the new
    /// model is used by agents loaded afterwards.
    pub fn train_ner_model(
        &self,
        train_path: &Path,
        dev_path: &Path,
        declutter_model: bool,
        configs_dir: Option<&Path>,
        trainer: &dyn ExternalTrainer,
    ) -> Result<PathBuf> {
        let job = NerTrainingJob {
            train_path,
            dev_path,
            target: if declutter_model {
                NerTarget::DeclutterModel
            } else {
                NerTarget::EntityRecognizer
            },
            configs_dir: configs_dir.unwrap_or(&self.configs_dir),
            model_root: &self.local_model_dir,
        };
        trainer::train_ner_model(&job, trainer)
    }

    /// Persist the detector and vectorizer to `path` (default: the local model
    /// directory). Entity models are not written.
    ///
    /// Both files are staged next to their targets and only moved into place
    /// once both were written, so a failed save never leaves a mismatched pair.
    pub fn save(&self, path: Option<&Path>) -> Result<SaveOutcome> {
        let dir = path.unwrap_or(&self.local_model_dir).to_path_buf();
        self.save_checked(dir, check_writable)
    }

    fn save_checked(
        &self,
        dir: PathBuf,
        check: impl FnOnce(&Path) -> std::io::Result<()>,
    ) -> Result<SaveOutcome> {
        let prepared = std::fs::create_dir_all(&dir).and_then(|_| check(&dir));
        match prepared {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!(path = %dir.display(), "write permission is not granted for the directory");
                return Ok(SaveOutcome::NotWritable(dir));
            }
            Err(e) => return Err(e.into()),
        }

        let detector = stage_json(&dir, &self.detector)?;
        let vectorizer = stage_json(&dir, &self.vectorizer)?;
        persist(detector, &dir.join(DETECTOR_FILE))?;
        persist(vectorizer, &dir.join(VECTORIZER_FILE))?;
        info!(path = %dir.display(), "saved detector and vectorizer");
        Ok(SaveOutcome::Saved(dir))
    }
}

/// Probe `dir` by creating (and dropping) an anonymous temporary file.
fn check_writable(dir: &Path) -> std::io::Result<()> {
    tempfile::tempfile_in(dir).map(|_| ())
}

fn stage_json<T: serde::Serialize>(dir: &Path, value: &T) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut file, value)?;
    file.flush()?;
    Ok(file)
}

fn persist(file: NamedTempFile, target: &Path) -> Result<()> {
    file.persist(target).map_err(|e| SafaaError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::centroid::NearestCentroid;
    use crate::ner::recognizer::EntityRule;
    use serde_json::json;

    const GENUINE: [&str; 4] = [
        "Copyright (c) 2019 Acme Corp.",
        "© 2020 Initech Inc.",
        "Copyright 2001-2005 Acme Corp.",
        "(C) 1998 Initech Inc.",
    ];

    const FALSE_POSITIVES: [&str; 4] = [
        "copyright holder field is null",
        "if copyright notice missing then fail",
        "return copyright string value",
        "print copyright header here",
    ];

    fn holders() -> PatternRecognizer {
        PatternRecognizer::new(vec![
            EntityRule::literal("ENT", "Acme Corp."),
            EntityRule::literal("ENT", "Initech Inc."),
        ])
        .unwrap()
    }

    fn test_config(dir: &Path) -> AgentConfig {
        AgentConfig {
            model_directory: Some(dir.to_path_buf()),
            use_local_override: false,
            local_model_dir: dir.join("local"),
            default_model_dir: dir.to_path_buf(),
            configs_dir: dir.join("configs"),
        }
    }

    fn training_set() -> (Vec<String>, Vec<Label>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for g in GENUINE {
            data.push(g.to_string());
            labels.push(Label::Genuine);
        }
        for f in FALSE_POSITIVES {
            data.push(f.to_string());
            labels.push(Label::FalsePositive);
        }
        (data, labels)
    }

    fn trained_agent(dir: &Path) -> SafaaAgent {
        let mut agent = SafaaAgent::from_parts(
            &test_config(dir),
            FalsePositiveDetector::default(),
            TfidfVectorizer::new(),
            Box::new(holders()),
            Box::new(holders()),
        );
        let (data, labels) = training_set();
        agent.train_false_positive_detector(data, &labels).unwrap();
        agent
    }

    fn write_model_dir(agent: &SafaaAgent, dir: &Path) {
        assert_eq!(
            agent.save(Some(dir)).unwrap(),
            SaveOutcome::Saved(dir.to_path_buf())
        );
        holders().save(&dir.join(ENTITY_RECOGNIZER_DIR)).unwrap();
        holders().save(&dir.join(DECLUTTER_MODEL_DIR)).unwrap();
    }

    #[test]
    fn test_end_to_end_acme() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let data = ["All rights reserved. Copyright 2020 Acme Corp."];

        let pre = agent.preprocess(data).unwrap();
        assert!(pre[0].contains("entity"));
        assert!(pre[0].contains("date"));
        assert!(!pre[0].chars().any(|c| c.is_ascii_digit() || c.is_ascii_punctuation()));

        let predictions = agent.predict(data, 0.5).unwrap();
        assert_eq!(predictions, vec![Label::Genuine]);

        let decluttered = agent.declutter(data, &predictions).unwrap();
        assert_eq!(decluttered, vec!["Acme Corp."]);
    }

    #[test]
    fn test_predicts_training_labels() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let (data, labels) = training_set();
        assert_eq!(agent.predict(data, 0.5).unwrap(), labels);
    }

    #[test]
    fn test_predict_is_deterministic_and_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let data = vec![
            json!("Copyright 2021 Initech Inc."),
            json!(12345),
            json!("copyright holder value"),
        ];
        let first = agent.predict(data.clone(), 0.5).unwrap();
        let second = agent.predict(data, 0.5).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_threshold_extremes() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let (data, _) = training_set();
        // Probabilities lie in [0, 1].
        assert!(agent
            .predict(data.clone(), 0.0)
            .unwrap()
            .iter()
            .all(|l| *l == Label::FalsePositive));
        assert!(agent
            .predict(data, 1.01)
            .unwrap()
            .iter()
            .all(|l| *l == Label::Genuine));
    }

    #[test]
    fn test_declutter_false_positive_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let data = ["© 2020 Initech Inc.", "print copyright header here", "no entities"];
        let out = agent
            .declutter(data, &[Label::Genuine, Label::FalsePositive, Label::Genuine])
            .unwrap();
        assert_eq!(out, vec!["Initech Inc.", "", ""]);
    }

    #[test]
    fn test_declutter_keeps_every_span_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let trained = trained_agent(dir.path());
        let declutter = PatternRecognizer::new(vec![
            EntityRule::regex("COPYRIGHT", r"(?:©|\([cC]\)|Copyright)\s*\d{4}(?:-\d{4})?"),
            EntityRule::literal("ENT", "Acme Corp."),
        ])
        .unwrap();
        let agent = SafaaAgent::from_parts(
            &test_config(dir.path()),
            trained.detector().clone(),
            TfidfVectorizer::new(),
            Box::new(holders()),
            Box::new(declutter),
        );
        let out = agent
            .declutter(
                ["Copyright 2001-2005 Acme Corp. and Acme Corp., see LICENSE"],
                &[Label::Genuine],
            )
            .unwrap();
        assert_eq!(out, vec!["Copyright 2001-2005 Acme Corp. Acme Corp."]);
    }

    #[test]
    fn test_declutter_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let err = agent
            .declutter(["a", "b"], &[Label::Genuine])
            .unwrap_err();
        assert!(matches!(
            err,
            SafaaError::ShapeMismatch {
                data: 2,
                predictions: 1
            }
        ));
    }

    #[test]
    fn test_failed_training_keeps_previous_models() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = trained_agent(dir.path());
        let before = agent.predict(GENUINE, 0.5).unwrap();
        let err = agent
            .train_false_positive_detector(["only one"], &[Label::Genuine])
            .unwrap_err();
        assert!(matches!(err, SafaaError::InvalidTrainingData(_)));
        assert_eq!(agent.predict(GENUINE, 0.5).unwrap(), before);
    }

    #[test]
    fn test_training_label_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = trained_agent(dir.path());
        let err = agent
            .train_false_positive_detector(["a b", "c d"], &[Label::Genuine])
            .unwrap_err();
        assert!(matches!(err, SafaaError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_centroid_detector_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = trained_agent(dir.path());
        agent.set_detector(FalsePositiveDetector::Centroid(NearestCentroid::new()));
        let (data, labels) = training_set();
        agent.train_false_positive_detector(data.clone(), &labels).unwrap();
        assert!(agent.detector().predict_proba(&[]).is_none());
        assert_eq!(agent.predict(data, 0.99).unwrap(), labels);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let model_dir = dir.path().join("saved");
        write_model_dir(&agent, &model_dir);

        let loaded = SafaaAgent::new(&AgentConfig::with_model_directory(&model_dir)).unwrap();
        assert_eq!(loaded.model_dir(), model_dir.as_path());
        let (data, _) = training_set();
        assert_eq!(
            loaded.predict(data.clone(), 0.5).unwrap(),
            agent.predict(data, 0.5).unwrap()
        );
    }

    #[test]
    fn test_save_defaults_to_local_dir() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let outcome = agent.save(None).unwrap();
        assert_eq!(outcome, SaveOutcome::Saved(dir.path().join("local")));
        assert!(dir.path().join("local").join(DETECTOR_FILE).exists());
        assert!(!dir.path().join("local").join(ENTITY_RECOGNIZER_DIR).exists());
    }

    #[test]
    fn test_load_missing_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let model_dir = dir.path().join("saved");
        write_model_dir(&agent, &model_dir);
        std::fs::remove_dir_all(model_dir.join(DECLUTTER_MODEL_DIR)).unwrap();

        let err = SafaaAgent::new(&AgentConfig::with_model_directory(&model_dir))
            .err()
            .unwrap();
        match err {
            SafaaError::ModelLoad { path, .. } => {
                assert!(path.starts_with(model_dir.join(DECLUTTER_MODEL_DIR)))
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_load_unfitted_vectorizer_fails() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let model_dir = dir.path().join("saved");
        write_model_dir(&agent, &model_dir);
        std::fs::write(
            model_dir.join(VECTORIZER_FILE),
            serde_json::to_string(&TfidfVectorizer::new()).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            SafaaAgent::new(&AgentConfig::with_model_directory(&model_dir)),
            Err(SafaaError::ModelLoad { .. })
        ));
    }

    #[test]
    fn test_load_inconsistent_vectorizer_fails() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let model_dir = dir.path().join("saved");
        write_model_dir(&agent, &model_dir);
        std::fs::write(
            model_dir.join(VECTORIZER_FILE),
            r#"{"vocabulary":{"copyright":5},"idf":[1.0]}"#,
        )
        .unwrap();
        match SafaaAgent::new(&AgentConfig::with_model_directory(&model_dir)) {
            Err(SafaaError::ModelLoad { path, .. }) => {
                assert_eq!(path, model_dir.join(VECTORIZER_FILE))
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("inconsistent vectorizer was accepted"),
        }
    }

    #[test]
    fn test_infinite_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let (data, _) = training_set();
        assert!(agent
            .predict(data.clone(), f64::INFINITY)
            .unwrap()
            .iter()
            .all(|l| *l == Label::Genuine));
        assert!(agent
            .predict(data.clone(), f64::NEG_INFINITY)
            .unwrap()
            .iter()
            .all(|l| *l == Label::FalsePositive));
        assert!(matches!(
            agent.predict(data, f64::NAN),
            Err(SafaaError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_save_permission_denied_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let target = dir.path().join("readonly");

        let outcome = agent
            .save_checked(target.clone(), |_| {
                Err(std::io::Error::from(ErrorKind::PermissionDenied))
            })
            .unwrap();
        assert_eq!(outcome, SaveOutcome::NotWritable(target.clone()));
        assert!(!target.join(DETECTOR_FILE).exists());
        assert!(!target.join(VECTORIZER_FILE).exists());
    }

    #[test]
    fn test_save_other_io_errors_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let result = agent.save_checked(dir.path().join("out"), |_| {
            Err(std::io::Error::from(ErrorKind::Other))
        });
        assert!(matches!(result, Err(SafaaError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_to_read_only_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let target = dir.path().join("readonly");
        std::fs::create_dir(&target).unwrap();
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users bypass directory permissions.
        if check_writable(&target).is_ok() {
            return;
        }
        assert_eq!(
            agent.save(Some(&target)).unwrap(),
            SaveOutcome::NotWritable(target.clone())
        );
        assert!(!target.join(DETECTOR_FILE).exists());
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_save_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        let target = dir.path().join("saved");
        agent.save(Some(&target)).unwrap();
        let mut names: Vec<String> = std::fs::read_dir(&target)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![DETECTOR_FILE, VECTORIZER_FILE]);
    }

    /// Leaves a pattern model for "Globex Ltd" in `<output>/model-best`.
    struct InstallingTrainer;

    impl ExternalTrainer for InstallingTrainer {
        fn run(&self, _config: &Path, output: &Path) -> Result<()> {
            PatternRecognizer::new(vec![EntityRule::literal("ENT", "Globex Ltd")])?
                .save(&output.join(trainer::BEST_MODEL_DIR))
        }
    }

    #[test]
    fn test_trained_entity_model_applies_from_next_load() {
        let dir = tempfile::tempdir().unwrap();
        let agent = trained_agent(dir.path());
        std::fs::create_dir_all(dir.path().join("configs")).unwrap();
        std::fs::write(
            dir.path().join("configs").join(trainer::CONFIG_TEMPLATE),
            "[paths]\ntrain = \"\"\ndev = \"\"\n",
        )
        .unwrap();

        let installed = agent
            .train_ner_model(
                Path::new("holders-train.jsonl"),
                Path::new("holders-test.jsonl"),
                false,
                None,
                &InstallingTrainer,
            )
            .unwrap();
        assert_eq!(installed, dir.path().join("local").join(ENTITY_RECOGNIZER_DIR));

        let text = "Copyright 2020 Globex Ltd";
        assert!(agent.entity_recognizer().recognize(text).is_empty());
        let reloaded = PatternRecognizer::load(&installed).unwrap();
        assert_eq!(reloaded.recognize(text)[0].text, "Globex Ltd");
    }
}
