//! `safaa` CLI: classify copyright-notice candidates and declutter them.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load config ([`safaa::config::load_config`]).
//! 3. Resolve the model directory and load the agent (except for `annotate --blank`, `split`
//!    and `gazetteer`).
//! 4. Run the subcommand and render the requested report.

mod cli;

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, ReportFormat};
use safaa::config::{load_config, AgentConfig, Config};
use safaa::models::{AnnotatedRecord, Label, TrainingExample};
use safaa::ner::recognizer::PatternRecognizer;
use safaa::ner::records::{
    read_jsonl, records_from_model, records_from_sentences, split_paths, split_records, write_jsonl,
};
use safaa::report::{self, verdicts};
use safaa::{SafaaAgent, SaveOutcome};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir()?;
    let config = load_config(&cwd, cli.config.as_deref())?;

    let mut agent_config = AgentConfig::from(&config);
    if let Some(models) = &cli.models {
        agent_config.model_directory = Some(models.clone());
    }
    if cli.no_local {
        agent_config.use_local_override = false;
    }

    match &cli.command {
        Command::Preprocess { input } => {
            let agent = load_agent(&agent_config)?;
            for line in agent.preprocess(read_lines(input)?)? {
                println!("{}", line);
            }
        }
        Command::Predict {
            input,
            threshold,
            report,
        } => {
            let agent = load_agent(&agent_config)?;
            let texts = read_lines(input)?;
            let labels = agent.predict(texts.clone(), threshold.unwrap_or(config.classifier.threshold))?;
            render(&verdicts(&texts, &labels, None), report, cli.quiet)?;
        }
        Command::Declutter {
            input,
            threshold,
            report,
        } => {
            let agent = load_agent(&agent_config)?;
            let texts = read_lines(input)?;
            let labels = agent.predict(texts.clone(), threshold.unwrap_or(config.classifier.threshold))?;
            let decluttered = agent.declutter(texts.clone(), &labels)?;
            render(&verdicts(&texts, &labels, Some(&decluttered)), report, cli.quiet)?;
        }
        Command::Train {
            input,
            output,
            kind,
        } => train(&config, &agent_config, input, output.as_deref(), *kind, cli.quiet)?,
        Command::TrainNer {
            train,
            dev,
            declutter,
            config_dir,
        } => {
            let agent = load_agent(&agent_config)?;
            let progress = (!cli.quiet).then(|| spinner("Running external trainer..."));
            let result = agent.train_ner_model(
                train,
                dev,
                *declutter,
                config_dir.as_deref(),
                &config.trainer.command(),
            );
            if let Some(pb) = progress {
                pb.finish_and_clear();
            }
            let installed = result?;
            if !cli.quiet {
                eprintln!(
                    "  {} model installed at {}; it is used from the next run",
                    "✓".green(),
                    installed.display()
                );
            }
        }
        Command::Annotate {
            input,
            output,
            declutter_model,
            blank,
        } => {
            let sentences = read_lines(input)?;
            let records = if *blank {
                records_from_sentences(&sentences)
            } else {
                let agent = load_agent(&agent_config)?;
                let model = if *declutter_model {
                    agent.declutter_model()
                } else {
                    agent.entity_recognizer()
                };
                records_from_model(&sentences, model)
            };
            write_jsonl(output, &records)?;
            if !cli.quiet {
                eprintln!(
                    "  {} {} records written to {}",
                    "→".cyan(),
                    records.len(),
                    output.display()
                );
            }
        }
        Command::Split {
            input,
            test_ratio,
            seed,
            no_shuffle,
        } => {
            let records: Vec<AnnotatedRecord> = read_jsonl(input)
                .with_context(|| format!("reading annotation records from {}", input.display()))?;
            let (train, test) = split_records(records, *test_ratio, *seed, !*no_shuffle)?;
            let (train_path, test_path) = split_paths(input);
            write_jsonl(&train_path, &train)?;
            write_jsonl(&test_path, &test)?;
            if !cli.quiet {
                eprintln!(
                    "  {} {} train records written to {}",
                    "→".cyan(),
                    train.len(),
                    train_path.display()
                );
                eprintln!(
                    "  {} {} test records written to {}",
                    "→".cyan(),
                    test.len(),
                    test_path.display()
                );
            }
        }
        Command::Gazetteer { input, output } => {
            let records: Vec<AnnotatedRecord> = read_jsonl(input)
                .with_context(|| format!("reading annotation records from {}", input.display()))?;
            let recognizer = PatternRecognizer::from_records(&records)?;
            recognizer.save(output)?;
            if !cli.quiet {
                eprintln!(
                    "  {} {} rules written to {}",
                    "→".cyan(),
                    recognizer.rules().len(),
                    output.display()
                );
            }
        }
    }

    Ok(())
}

fn train(
    config: &Config,
    agent_config: &AgentConfig,
    input: &Path,
    output: Option<&Path>,
    kind: Option<safaa::classifier::DetectorKind>,
    quiet: bool,
) -> Result<()> {
    let examples: Vec<TrainingExample> = read_jsonl(input)
        .with_context(|| format!("reading training examples from {}", input.display()))?;
    let (texts, labels): (Vec<String>, Vec<Label>) =
        examples.into_iter().map(|e| (e.text, e.label)).unzip();

    let mut agent = load_agent(agent_config)?;
    let mut classifier = config.classifier.clone();
    if let Some(kind) = kind {
        classifier.kind = kind;
    }
    agent.set_detector(classifier.detector());

    let progress = (!quiet).then(|| spinner("Training false-positive detector..."));
    let result = agent.train_false_positive_detector(texts, &labels);
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    result?;

    match agent.save(output)? {
        SaveOutcome::Saved(dir) => {
            if !quiet {
                eprintln!("  {} detector saved to {}", "✓".green(), dir.display());
            }
        }
        SaveOutcome::NotWritable(dir) => {
            eprintln!(
                "  {} write permissions are not granted for {}",
                "✗".red(),
                dir.display()
            );
            std::process::exit(1);
        }
    }
    Ok(())
}

fn load_agent(agent_config: &AgentConfig) -> Result<SafaaAgent> {
    SafaaAgent::new(agent_config).with_context(|| {
        format!(
            "loading models from {}",
            agent_config.resolve_model_dir().display()
        )
    })
}

/// Non-empty lines of `path`, or of stdin when `path` is `-`.
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let reader: Box<dyn BufRead> = if path == Path::new("-") {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn render(verdicts: &[report::Verdict], format: &ReportFormat, quiet: bool) -> Result<()> {
    match format {
        ReportFormat::Terminal => report::terminal::render(verdicts, quiet),
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(verdicts)?);
            Ok(())
        }
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
