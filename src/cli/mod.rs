//! Thyroid diagnosis CLI module
//!
//! Command-line interface for training, prediction, and data inspection.

use clap::{Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::inference::Predictor;
use crate::preprocessing::{DomainRules, Preprocessor};
use crate::training::{ModelKind, ModelMetrics, PipelineConfig, TrainEngine, TrainingReport};
use crate::utils::{DataLoader, DataSaver, FrameSummary};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "thyroid-dx")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Thyroid disease classification pipeline")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Preprocess, balance and train every classifier, then persist them
    Train {
        /// Patient-record CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Directory for model artifacts
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// JSON pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skip SMOTE+ENN balancing of the training partition
        #[arg(long)]
        no_balance: bool,

        /// Comma-separated models to train (default: all)
        #[arg(short, long, value_delimiter = ',')]
        models: Option<Vec<String>>,
    },

    /// Label unseen records with a trained model
    Predict {
        /// Model artifact
        #[arg(short, long)]
        model: PathBuf,

        /// Patient-record CSV without targets
        #[arg(short, long)]
        data: PathBuf,

        /// Output predictions CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Predictions shown on screen
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Write the cleaned records with their derived class
    Preprocess {
        /// Patient-record CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show data information
    Info {
        /// Patient-record CSV
        #[arg(short, long)]
        data: PathBuf,
    },
}

/// Options of the `train` subcommand
#[derive(Debug, Default)]
pub struct TrainArgs {
    pub data: PathBuf,
    pub model_dir: Option<PathBuf>,
    pub seed: Option<u64>,
    pub config: Option<PathBuf>,
    pub no_balance: bool,
    pub models: Option<Vec<String>>,
}

impl TrainArgs {
    /// Config file first, then flags on top
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.no_balance {
            config.balancer.enabled = false;
        }
        if let Some(names) = &self.models {
            config.models = names
                .iter()
                .map(|n| n.parse::<ModelKind>())
                .collect::<Result<Vec<_>, _>>()?;
        }
        config.validate()?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(args: &TrainArgs) -> anyhow::Result<()> {
    section("Train");
    let config = args.pipeline_config()?;

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_csv(&args.data)?;
    step_done(&format!("{} rows × {} cols in {:.2?}", df.height(), df.width(), start.elapsed()));

    step_run(&format!("Training {} models", config.models.len()));
    let start = Instant::now();
    let mut engine = TrainEngine::new(config.clone());
    engine.fit(&df)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    let report = engine
        .report()
        .ok_or_else(|| anyhow::anyhow!("training produced no report"))?;
    print_data_summary(report);
    print_validation_summary(report);
    print_test_summary(report);

    section("Artifacts");
    for path in engine.save_artifacts(&config.model_dir)? {
        step_ok(&path.display().to_string());
    }
    println!();
    Ok(())
}

fn print_data_summary(report: &TrainingReport) {
    section("Data");
    kv("Input rows", &report.n_input.to_string());
    kv("After cleaning", &report.n_prepared.to_string());
    kv("Features", &report.n_features.to_string());
    kv(
        "Train / val / test",
        &format!(
            "{} / {} / {}",
            report.partitions.train, report.partitions.validation, report.partitions.test
        ),
    );
    kv("Train balanced", &report.partitions.train_balanced.to_string());

    println!();
    println!("  {:<22} {:>8} {:>8}", muted("Class"), muted("Before"), muted("After"));
    for (code, before) in &report.train_counts_before {
        let after = report.train_counts_after.get(code).copied().unwrap_or(0);
        println!("  {:<22} {:>8} {:>8}", report.class_name(*code), before, after);
    }
}

fn print_validation_summary(report: &TrainingReport) {
    section("Validation");
    println!(
        "  {:<28} {:>9} {:>9} {:>9} {:>8}",
        muted("Model"),
        muted("Accuracy"),
        muted("Wtd F1"),
        muted("Macro F1"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(67)));
    for m in report.ranked() {
        println!(
            "  {:<28} {:>9.4} {:>9.4} {:>9.4} {:>7.2}s",
            m.kind.display_name(),
            m.validation.accuracy,
            m.validation.weighted_f1,
            m.validation.macro_f1,
            m.training_time_secs
        );
    }

    if let Some(best) = report.best() {
        println!();
        println!(
            "  {} {} {} {:.4}",
            ok("best"),
            best.kind.display_name().white().bold(),
            muted("weighted F1:"),
            best.validation.weighted_f1
        );
        print_per_class(report, &best.validation);
    }
}

fn print_per_class(report: &TrainingReport, metrics: &ModelMetrics) {
    println!();
    println!(
        "  {:<22} {:>9} {:>9} {:>9} {:>8}",
        muted("Class"),
        muted("Precision"),
        muted("Recall"),
        muted("F1"),
        muted("Support")
    );
    for c in &metrics.per_class {
        println!(
            "  {:<22} {:>9.4} {:>9.4} {:>9.4} {:>8}",
            report.class_name(c.label),
            c.precision,
            c.recall,
            c.f1,
            c.support
        );
    }
}

fn print_test_summary(report: &TrainingReport) {
    section("Test");
    println!("  {:<28} {:>9} {:>9}", muted("Model"), muted("Accuracy"), muted("Wtd F1"));
    for m in report.ranked() {
        println!(
            "  {:<28} {:>9.4} {:>9.4}",
            m.kind.display_name(),
            m.test.accuracy,
            m.test.weighted_f1
        );
    }
}

pub fn cmd_predict(
    model_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
    limit: usize,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let predictor = Predictor::load(model_path)?;
    let meta = &predictor.artifact().metadata;
    step_done(&format!("{} trained {}", meta.name, meta.trained_at.format("%Y-%m-%d %H:%M")));

    step_run("Predicting");
    let start = Instant::now();
    let result = predictor.predict_csv(data_path)?;
    step_done(&format!("{} records in {:.2?}", result.predictions.len(), start.elapsed()));
    if result.n_dropped > 0 {
        println!("  {} {} records outside the age range skipped", "!".yellow(), result.n_dropped);
    }

    println!();
    println!("  {:<20} {}", muted("Patient"), muted("Predicted class"));
    for p in result.predictions.iter().take(limit) {
        println!("  {:<20} {}", p.patient_id, p.class.name().white());
    }
    if result.predictions.len() > limit {
        println!("  {}", dim(&format!("… {} more", result.predictions.len() - limit)));
    }

    section("Distribution");
    for share in result.distribution() {
        println!(
            "  {:<22} {:>7} {:>7.2}%",
            share.class.name(),
            share.count,
            share.percentage
        );
    }

    if let Some(path) = output {
        let mut frame = result.to_frame()?;
        DataSaver::save_csv(&mut frame, path)?;
        println!();
        step_ok(&format!("Saved → {}", path.display()));
    }
    println!();
    Ok(())
}

pub fn cmd_preprocess(data_path: &Path, output_path: &Path) -> anyhow::Result<()> {
    section("Preprocess");

    step_run("Loading data");
    let df = DataLoader::new().load_csv(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    step_run("Processing");
    let start = Instant::now();
    let rules = DomainRules::standard();
    let prepared = Preprocessor::new(&rules).prepare(&df)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    step_run(&format!("Saving → {}", output_path.display()));
    let mut cleaned = prepared.cleaned;
    DataSaver::save_csv(&mut cleaned, output_path)?;
    step_done(&format!("{} rows × {} cols", cleaned.height(), cleaned.width()));

    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = DataLoader::new().load_csv(data_path)?;
    let summary = FrameSummary::from_frame(&df)?;
    kv("File", &data_path.display().to_string());
    kv("Rows", &summary.n_rows.to_string());
    kv("Columns", &summary.n_cols.to_string());

    println!();
    println!("  {:<20} {:>8}", muted("Column"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(30)));
    for (name, nulls) in &summary.null_counts {
        let count = if *nulls > 0 { nulls.to_string().yellow() } else { nulls.to_string().normal() };
        println!("  {:<20} {:>8}", name, count);
    }

    if !summary.target_counts.is_empty() {
        section("Targets");
        let rules = DomainRules::standard();
        let mut classes: BTreeMap<String, usize> = BTreeMap::new();
        for (code, count) in &summary.target_counts {
            println!("  {:<20} {:>8}", code, count);
            let class = rules
                .targets
                .derive_class(code)
                .map(|c| c.name().to_string())
                .unwrap_or_else(|_| "unknown code".to_string());
            *classes.entry(class).or_insert(0) += count;
        }

        section("Classes");
        for (class, count) in &classes {
            println!("  {:<22} {:>8}", class, count);
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_flags() {
        let cli = Cli::try_parse_from([
            "thyroid-dx",
            "train",
            "--data",
            "thyroid.csv",
            "--seed",
            "7",
            "--no-balance",
            "--models",
            "random_forest,svc",
        ])
        .unwrap();

        match cli.command {
            Commands::Train { data, seed, no_balance, models, .. } => {
                assert_eq!(data, PathBuf::from("thyroid.csv"));
                assert_eq!(seed, Some(7));
                assert!(no_balance);
                assert_eq!(models.unwrap(), vec!["random_forest", "svc"]);
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_train_args_override_defaults() {
        let args = TrainArgs {
            seed: Some(3),
            no_balance: true,
            models: Some(vec!["Decision Tree".to_string()]),
            model_dir: Some(PathBuf::from("out")),
            ..Default::default()
        };
        let config = args.pipeline_config().unwrap();
        assert_eq!(config.seed, 3);
        assert!(!config.balancer.enabled);
        assert_eq!(config.models, vec![ModelKind::DecisionTree]);
        assert_eq!(config.model_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_unknown_model_rejected() {
        let args = TrainArgs {
            models: Some(vec!["xgboost".to_string()]),
            ..Default::default()
        };
        assert!(args.pipeline_config().is_err());
    }

    #[test]
    fn test_predict_default_limit() {
        let cli = Cli::try_parse_from([
            "thyroid-dx", "predict", "--model", "m.model", "--data", "new.csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Predict { limit, output, .. } => {
                assert_eq!(limit, 10);
                assert!(output.is_none());
            }
            _ => panic!("expected predict"),
        }
    }
}
