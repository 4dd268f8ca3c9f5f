use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use tracing::{debug, info};

use crate::error::{Result, SafaaError};

/// Name of the training configuration template inside the configs directory.
pub const CONFIG_TEMPLATE: &str = "train.cfg";

/// Directory the trainer leaves its best checkpoint in, under its output path.
pub const BEST_MODEL_DIR: &str = "model-best";

static TRAIN_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"train\s*=\s*".*""#).expect("valid train field pattern"));
static DEV_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"dev\s*=\s*".*""#).expect("valid dev field pattern"));

/// Which entity model a training run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NerTarget {
    EntityRecognizer,
    DeclutterModel,
}

impl NerTarget {
    pub fn dir_name(self) -> &'static str {
        match self {
            NerTarget::EntityRecognizer => "entity_recognizer",
            NerTarget::DeclutterModel => "declutter_model",
        }
    }
}

/// An out-of-process entity-model trainer.
///
/// `run` must block until training is finished and leave the trained model in
/// `<output>/model-best`.
pub trait ExternalTrainer {
    fn run(&self, config: &Path, output: &Path) -> Result<()>;
}

/// Runs a command line, substituting `{config}` and `{output}` in its arguments.
#[derive(Debug, Clone)]
pub struct CommandTrainer {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for CommandTrainer {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: ["-m", "spacy", "train", "{config}", "--output", "{output}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ExternalTrainer for CommandTrainer {
    fn run(&self, config: &Path, output: &Path) -> Result<()> {
        let config = config.to_string_lossy();
        let output = output.to_string_lossy();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{config}", &config).replace("{output}", &output))
            .collect();

        debug!(program = %self.program, ?args, "running external trainer");
        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|e| {
                SafaaError::TrainingFailed(format!("could not start '{}': {}", self.program, e))
            })?;

        if !status.success() {
            return Err(SafaaError::TrainingFailed(format!(
                "'{}' exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}

/// Point the `train` and `dev` fields of a training config at new corpora.
///
/// Paths are inserted verbatim; `$` and `\` are not treated specially.
pub fn rewrite_config(contents: &str, train_path: &str, dev_path: &str) -> String {
    let dev = format!(r#"dev = "{}""#, dev_path);
    let train = format!(r#"train = "{}""#, train_path);
    let with_dev = DEV_FIELD.replace_all(contents, NoExpand(&dev));
    TRAIN_FIELD.replace_all(&with_dev, NoExpand(&train)).into_owned()
}

/// Inputs for a single entity-model training run.
#[derive(Debug, Clone)]
pub struct NerTrainingJob<'a> {
    pub train_path: &'a Path,
    pub dev_path: &'a Path,
    pub target: NerTarget,
    /// Directory holding `train.cfg`; the temporary config is written here too.
    pub configs_dir: &'a Path,
    /// Directory receiving `tmp/` during training and the finished model.
    pub model_root: &'a Path,
}

/// Rewrite the config, run the trainer, and move the result into
/// `<model_root>/<target>`. Returns the path of the installed model.
pub fn train_ner_model(job: &NerTrainingJob<'_>, trainer: &dyn ExternalTrainer) -> Result<PathBuf> {
    let template = job.configs_dir.join(CONFIG_TEMPLATE);
    let contents = std::fs::read_to_string(&template)?;
    let updated = rewrite_config(
        &contents,
        &job.train_path.to_string_lossy(),
        &job.dev_path.to_string_lossy(),
    );

    // Removed when dropped, whether or not training succeeds.
    let mut tmp_config = tempfile::Builder::new()
        .prefix("tmp")
        .suffix(".cfg")
        .tempfile_in(job.configs_dir)?;
    tmp_config.write_all(updated.as_bytes())?;
    tmp_config.flush()?;

    let tmp_model = job.model_root.join("tmp");
    let target = job.model_root.join(job.target.dir_name());
    std::fs::create_dir_all(&target)?;

    info!(
        config = %tmp_config.path().display(),
        output = %tmp_model.display(),
        "training {} model",
        job.target.dir_name()
    );
    let outcome = trainer
        .run(tmp_config.path(), &tmp_model)
        .and_then(|()| install_best_model(&tmp_model, &target));

    if tmp_model.exists() {
        if let Err(e) = std::fs::remove_dir_all(&tmp_model) {
            debug!(path = %tmp_model.display(), error = %e, "could not remove trainer output");
        }
    }

    outcome?;
    info!(path = %target.display(), "installed trained model");
    Ok(target)
}

fn install_best_model(tmp_model: &Path, target: &Path) -> Result<()> {
    let best = tmp_model.join(BEST_MODEL_DIR);
    if !best.is_dir() {
        return Err(SafaaError::TrainingFailed(format!(
            "trainer produced no model at {}",
            best.display()
        )));
    }
    move_entries(&best, target)
}

/// Move every entry of `src` into `dst`, replacing entries of the same name.
fn move_entries(src: &Path, dst: &Path) -> Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let dest = dst.join(entry.file_name());
        if dest.is_dir() {
            std::fs::remove_dir_all(&dest)?;
        } else if dest.exists() {
            std::fs::remove_file(&dest)?;
        }
        std::fs::rename(entry.path(), &dest)?;
    }
    Ok(())
}
