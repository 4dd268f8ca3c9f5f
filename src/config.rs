use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

use crate::classifier::centroid::NearestCentroid;
use crate::classifier::logistic::LogisticRegression;
use crate::classifier::{DetectorKind, FalsePositiveDetector};
use crate::ner::trainer::CommandTrainer;

/// Model directory used in local mode when it exists.
pub const DEFAULT_LOCAL_MODEL_DIR: &str = "/home/fossy/Safaa";

/// Root configuration structure, deserialized from `.safaa/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub trainer: TrainerConfig,
}

/// Where models are loaded from and saved to.
#[derive(Debug, Deserialize)]
pub struct ModelsConfig {
    /// Explicit model directory. Takes precedence over everything else.
    pub directory: Option<PathBuf>,
    /// Prefer `local_directory` when it exists. Defaults to `true`.
    #[serde(default = "default_true")]
    pub use_local: bool,
    #[serde(default = "default_local_directory")]
    pub local_directory: PathBuf,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            use_local: true,
            local_directory: default_local_directory(),
        }
    }
}

/// Prediction threshold and the detector trained by `safaa train`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_kind")]
    pub kind: DetectorKind,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_l2")]
    pub l2: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            kind: default_kind(),
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
            l2: default_l2(),
        }
    }
}

impl ClassifierConfig {
    /// An unfitted detector of the configured kind.
    pub fn detector(&self) -> FalsePositiveDetector {
        match self.kind {
            DetectorKind::Logistic => FalsePositiveDetector::Logistic(LogisticRegression::new(
                self.learning_rate,
                self.epochs,
                self.l2,
            )),
            DetectorKind::Centroid => FalsePositiveDetector::Centroid(NearestCentroid::new()),
        }
    }
}

/// External entity-model trainer invocation.
#[derive(Debug, Deserialize)]
pub struct TrainerConfig {
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments; `{config}` and `{output}` are substituted.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Directory holding `train.cfg`.
    pub configs_dir: Option<PathBuf>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            configs_dir: None,
        }
    }
}

impl TrainerConfig {
    pub fn command(&self) -> CommandTrainer {
        CommandTrainer {
            program: self.program.clone(),
            args: self.args.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_local_directory() -> PathBuf {
    PathBuf::from(DEFAULT_LOCAL_MODEL_DIR)
}

fn default_threshold() -> f64 {
    0.5
}

fn default_kind() -> DetectorKind {
    DetectorKind::Logistic
}

fn default_learning_rate() -> f64 {
    1.0
}

fn default_epochs() -> usize {
    300
}

fn default_l2() -> f64 {
    1e-4
}

fn default_program() -> String {
    CommandTrainer::default().program
}

fn default_args() -> Vec<String> {
    CommandTrainer::default().args
}

/// Construction parameters for [`SafaaAgent`](crate::agent::SafaaAgent).
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Caller-supplied model directory; wins when set.
    pub model_directory: Option<PathBuf>,
    /// Use `local_model_dir` when it exists.
    pub use_local_override: bool,
    pub local_model_dir: PathBuf,
    /// Packaged models, used when nothing else applies.
    pub default_model_dir: PathBuf,
    /// Directory holding the entity trainer's `train.cfg`.
    pub configs_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model_directory: None,
            use_local_override: true,
            local_model_dir: default_local_directory(),
            default_model_dir: default_model_dir(),
            configs_dir: default_configs_dir(),
        }
    }
}

impl AgentConfig {
    /// Agent configuration that loads from exactly `dir`.
    pub fn with_model_directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            model_directory: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Pick the model directory: explicit directory, then the local override
    /// (when requested and present), then the packaged default.
    pub fn resolve_model_dir(&self) -> PathBuf {
        if let Some(dir) = &self.model_directory {
            return dir.clone();
        }
        if self.use_local_override && self.local_model_dir.exists() {
            return self.local_model_dir.clone();
        }
        self.default_model_dir.clone()
    }
}

impl From<&Config> for AgentConfig {
    fn from(config: &Config) -> Self {
        Self {
            model_directory: config.models.directory.clone(),
            use_local_override: config.models.use_local,
            local_model_dir: config.models.local_directory.clone(),
            default_model_dir: default_model_dir(),
            configs_dir: config
                .trainer
                .configs_dir
                .clone()
                .unwrap_or_else(default_configs_dir),
        }
    }
}

/// `<data dir>/safaa/models`, or `./models` when there is no data directory.
pub fn default_model_dir() -> PathBuf {
    data_root().join("models")
}

/// `<data dir>/safaa/configs`, or `./configs` when there is no data directory.
pub fn default_configs_dir() -> PathBuf {
    data_root().join("configs")
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("safaa"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`: path passed via `--config`
/// 2. `<project_path>/.safaa/config.toml`
/// 3. `~/.config/safaa/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        let content = std::fs::read_to_string(path)?;
        return Ok(toml::from_str(&content)?);
    }

    let project_config = project_path.join(".safaa").join("config.toml");
    if project_config.exists() {
        let content = std::fs::read_to_string(&project_config)?;
        return Ok(toml::from_str(&content)?);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("safaa").join("config.toml");
        if home_config.exists() {
            let content = std::fs::read_to_string(&home_config)?;
            return Ok(toml::from_str(&content)?);
        }
    }

    Ok(Config::default())
}
