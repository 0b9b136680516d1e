//! Diabetes MLOps CLI Module
//!
//! Command-line interface for validation, training, batch prediction and serving.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::AppConfig;
use crate::error::MlopsError;
use crate::export::PersistedModel;
use crate::inference::Predictor;
use crate::training::{format_params, BaselinePolicy, ModelSelector, TrialResult};
use crate::tracking::tracker_from_uri;
use crate::utils::{DataLoader, DataSaver};
use crate::validation::{DataValidator, ValidationMode};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_fail(msg: &str) {
    println!("  {} {}", "✗".red(), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "diabetes-mlops")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate, train, track and serve a diabetes-risk classifier")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check the raw table against the schema and store a processed copy
    Validate {
        /// Raw input CSV
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Where the validated copy is written
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// fail-fast or accumulate
        #[arg(long)]
        mode: Option<ValidationMode>,
    },

    /// Grid-search every model family and persist the best model
    Train {
        /// Raw input CSV
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output model file
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// MLflow URL, local directory, or `none`
        #[arg(long)]
        tracking_uri: Option<String>,

        /// Experiment name
        #[arg(long)]
        experiment: Option<String>,

        /// warn or reject trials that do not beat the all-positive baseline
        #[arg(long)]
        baseline_policy: Option<BaselinePolicy>,
    },

    /// Make predictions for a CSV using the trained model
    Predict {
        /// Trained model file
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Input data file
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output predictions file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the prediction server
    Serve {
        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Server host
        #[arg(long)]
        host: Option<String>,

        /// Trained model file
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

impl Commands {
    /// Layer this command's flags over `config`
    pub fn apply(&self, mut config: AppConfig) -> AppConfig {
        match self {
            Commands::Validate { data, output, mode } => {
                if let Some(p) = data { config = config.with_data_path(p); }
                if let Some(p) = output { config = config.with_processed_path(p); }
                if let Some(m) = mode { config = config.with_validation_mode(*m); }
            }
            Commands::Train { data, model, tracking_uri, experiment, baseline_policy } => {
                if let Some(p) = data { config = config.with_data_path(p); }
                if let Some(p) = model { config = config.with_model_path(p); }
                if let Some(u) = tracking_uri { config = config.with_tracking_uri(u); }
                if let Some(e) = experiment { config = config.with_experiment_name(e); }
                if let Some(b) = baseline_policy { config = config.with_baseline_policy(*b); }
            }
            Commands::Predict { model, data, output } => {
                if let Some(p) = model { config = config.with_model_path(p); }
                if let Some(p) = data { config = config.with_processed_path(p); }
                if let Some(p) = output { config = config.with_predictions_path(p); }
            }
            Commands::Serve { port, host, model } => {
                if let Some(p) = port { config = config.with_port(*p); }
                if let Some(h) = host { config = config.with_host(h); }
                if let Some(p) = model { config = config.with_model_path(p); }
            }
        }
        config
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_validate(config: &AppConfig) -> anyhow::Result<()> {
    section("Validate");

    step_run("Loading data");
    let start = Instant::now();
    let mut df = DataLoader::new().load_csv(&config.data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let report = DataValidator::new(config.schema.clone())
        .with_mode(config.validation_mode)
        .validate(&df)?;

    println!();
    println!("  {:<16} {}", muted("Type errors"), report.type_error_count());
    println!("  {:<16} {}", muted("Content errors"), report.content_error_count());
    for violation in report.type_errors.iter().chain(report.content_errors.iter()) {
        step_fail(&violation.to_string());
    }
    println!();

    report.into_result()?;
    step_ok("Schema checks passed");

    step_run(&format!("Saving → {}", config.processed_path.display()));
    DataSaver::save_csv(&mut df, &config.processed_path)?;
    step_done(&format!("{} rows", df.height()));
    println!();
    Ok(())
}

/// Blocking: talks to the tracker over blocking HTTP
pub fn cmd_train(config: &AppConfig) -> anyhow::Result<()> {
    section("Train");
    config.validate()?;

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_csv(&config.data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let report = DataValidator::new(config.schema.clone())
        .with_mode(config.validation_mode)
        .validate(&df)?;
    for violation in report.type_errors.iter().chain(report.content_errors.iter()) {
        step_fail(&violation.to_string());
    }
    report.into_result()?;
    step_ok("Schema checks passed");

    let mut tracker = tracker_from_uri(&config.tracking_uri, &config.experiment_name)?;
    println!("  {:<16} {}", muted("Tracking"), format!("{} ({})", config.tracking_uri, tracker.backend()).white());

    let start = Instant::now();
    let outcome = ModelSelector::new(config).run(&df, tracker.as_mut())?;
    let elapsed = start.elapsed();

    println!();
    println!(
        "  {:<20} {:>8} {:>8} {:>8}   {}",
        muted("Model"), muted("CV acc"), muted("Acc"), muted("F1"), muted("Params")
    );
    println!("  {}", dim(&"─".repeat(56)));
    let best_name = outcome.best().map(|t| t.model_name.clone());
    for trial in &outcome.trials {
        print_trial(trial, best_name.as_deref() == Some(trial.model_name.as_str()));
    }
    for failure in &outcome.failures {
        println!("  {:<20} {}", failure.family.name(), format!("err: {}", failure.reason).red());
    }
    println!("  {}", dim(&"─".repeat(56)));
    println!("  {:<16} {:.2?}", muted("Time"), elapsed);

    let best = match outcome.into_best() {
        Ok(best) => best,
        Err(MlopsError::NoModelFound) => {
            println!();
            println!("  {}", "No model qualified; nothing was saved".yellow());
            println!();
            return Err(MlopsError::NoModelFound.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!();
    println!(
        "  {} {} {} {:.4}",
        ok("best"),
        best.model_name.white().bold(),
        muted("f1:"),
        best.f1_score()
    );

    step_run(&format!("Saving → {}", config.model_path.display()));
    let persisted = PersistedModel::from_trial(best)?;
    persisted.save(&config.model_path)?;
    step_done(&persisted.checksum[..12]);
    println!();
    Ok(())
}

fn print_trial(trial: &TrialResult, is_best: bool) {
    let marker = if trial.disqualified {
        "rejected".red()
    } else if is_best {
        ok("best")
    } else if !trial.warnings.is_empty() {
        "warn".yellow()
    } else {
        dim("")
    };
    println!(
        "  {:<20} {:>8.4} {:>8.4} {:>8.4}   {} {}",
        trial.model_name,
        trial.cv_score,
        trial.accuracy(),
        trial.f1_score(),
        dim(&format_params(&trial.best_params)),
        marker
    );
}

pub fn cmd_predict(config: &AppConfig) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let predictor = Predictor::load(&config.model_path)?;
    step_done(predictor.model_name());

    step_run("Loading data");
    let df = DataLoader::new().load_csv(&config.processed_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    step_run(&format!("Predicting → {}", config.predictions_path.display()));
    let start = Instant::now();
    let n = predictor.predict_batch_to_csv(&df, &config.predictions_path)?;
    step_done(&format!("{} rows in {:?}", n, start.elapsed()));
    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(config: &AppConfig) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let host = &config.host;
    let port = config.port;

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Diabetes MLOps".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Predict", &format!("http://{}:{}/predict", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/health", host, port)));
    line_box(&kv("Model  ", &config.model_path.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(ServerConfig::from(config)).await
}

pub fn show_help() {
    section("Commands");

    let cmds: &[(&str, &str)] = &[
        ("diabetes-mlops validate", "Check the raw CSV against the schema"),
        ("diabetes-mlops train", "Grid-search models, save the best"),
        ("diabetes-mlops predict", "Batch predictions to CSV"),
        ("diabetes-mlops serve", "Start the prediction API"),
    ];

    for (cmd, desc) in cmds {
        println!("  {:<36} {}", cmd.white(), muted(desc));
    }

    section("Endpoints");

    let endpoints: &[(&str, &str)] = &[
        ("GET  http://localhost:8000/", "Greeting"),
        ("GET  http://localhost:8000/health", "Health check"),
        ("POST http://localhost:8000/predict", "Predict one record"),
    ];

    for (url, desc) in endpoints {
        println!("  {:<36} {}", url.truecolor(120, 170, 255), muted(desc));
    }

    println!();
}
