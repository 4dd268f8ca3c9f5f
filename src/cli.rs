use std::path::PathBuf;

use clap::{Parser, Subcommand};

use safaa::classifier::DetectorKind;

#[derive(Parser, Debug)]
#[command(
    name = "safaa",
    about = "Detect false-positive copyright notices and declutter genuine ones",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Model directory [default: local override if present, else packaged models]
    #[arg(long, global = true, value_name = "DIR")]
    pub models: Option<PathBuf>,

    /// Ignore the local model override directory
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Config file [default: ./.safaa/config.toml, fallback ~/.config/safaa/config.toml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log progress (sets the log level to info unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the normalized form of each input line
    Preprocess {
        /// Input file, one notice per line; `-` reads stdin
        input: PathBuf,
    },

    /// Label each input line as genuine (t) or false positive (f)
    Predict {
        /// Input file, one notice per line; `-` reads stdin
        input: PathBuf,

        /// Minimum false-positive probability to label a line `f` [default: from config]
        #[arg(long)]
        threshold: Option<f64>,

        /// Report format
        #[arg(long, default_value = "terminal", value_name = "FORMAT")]
        report: ReportFormat,
    },

    /// Predict, then reduce genuine notices to their entities
    Declutter {
        /// Input file, one notice per line; `-` reads stdin
        input: PathBuf,

        /// Minimum false-positive probability to label a line `f` [default: from config]
        #[arg(long)]
        threshold: Option<f64>,

        /// Report format
        #[arg(long, default_value = "terminal", value_name = "FORMAT")]
        report: ReportFormat,
    },

    /// Retrain the false-positive detector from JSONL `{"text", "label"}` examples and save it
    Train {
        /// Training examples
        input: PathBuf,

        /// Where to save the detector and vectorizer [default: local model directory]
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Detector to train [default: from config]
        #[arg(long)]
        kind: Option<DetectorKind>,
    },

    /// Train an entity model with the external trainer
    TrainNer {
        /// Training corpus passed to the trainer
        #[arg(long)]
        train: PathBuf,

        /// Development corpus passed to the trainer
        #[arg(long)]
        dev: PathBuf,

        /// Train the declutter model instead of the entity recognizer
        #[arg(long)]
        declutter: bool,

        /// Directory holding train.cfg [default: from config]
        #[arg(long, value_name = "DIR")]
        config_dir: Option<PathBuf>,
    },

    /// Write JSONL annotation records, pre-labelled by an entity model
    Annotate {
        /// Input file, one sentence per line; `-` reads stdin
        input: PathBuf,

        /// Output JSONL file
        #[arg(long, short)]
        output: PathBuf,

        /// Label with the declutter model instead of the entity recognizer
        #[arg(long)]
        declutter_model: bool,

        /// Write records without labels instead of running a model
        #[arg(long, conflicts_with = "declutter_model")]
        blank: bool,
    },

    /// Split JSONL annotation records into `<stem>-train.jsonl` and `<stem>-test.jsonl`
    Split {
        /// Annotation records
        input: PathBuf,

        /// Share of records written to the test set
        #[arg(long, default_value_t = 0.2)]
        test_ratio: f64,

        /// Seed for the shuffle
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Keep the input order; the last records form the test set
        #[arg(long)]
        no_shuffle: bool,
    },

    /// Build an entity model from JSONL annotation records
    Gazetteer {
        /// Annotation records
        input: PathBuf,

        /// Model directory to write
        #[arg(long, short)]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}
