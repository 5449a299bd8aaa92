use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use premium_model::{Classifier, ColumnSpec};
use premium_server::{load_classifier, validate, Predictor};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_MODEL: &str = "model/artifacts/premium_category.json";

#[derive(Parser)]
#[command(name = "premium-cli")]
#[command(about = "Score applicants against a premium category model without running the server")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log derived features and model details on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Validate one applicant and print the prediction as JSON
    Predict {
        /// Path to the classifier artifact (.json)
        #[arg(short, long, default_value = DEFAULT_MODEL)]
        model: PathBuf,

        /// Applicant JSON, or @path to read it from a file
        #[arg(short, long)]
        input: String,
    },
    /// Print the artifact's classes and columns
    Inspect {
        /// Path to the classifier artifact (.json)
        #[arg(short, long, default_value = DEFAULT_MODEL)]
        model: PathBuf,
    },
}

#[derive(Serialize)]
struct ModelSummary<'a> {
    model_name: &'a str,
    version: Option<&'a str>,
    classes: &'a [String],
    columns: &'a [ColumnSpec],
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise --verbose turns on this tool's info lines
    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    run(args.command, &mut io::stdout().lock())
}

fn run(command: Command, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Predict { model, input } => {
            let raw = read_input(&input)?;
            let raw: serde_json::Value =
                serde_json::from_str(&raw).context("applicant input is not valid JSON")?;

            // Same validation the HTTP endpoint applies
            let applicant = match validate(&raw) {
                Ok(applicant) => applicant,
                Err(errors) => {
                    let detail = json!({ "detail": errors });
                    writeln!(out, "{}", serde_json::to_string_pretty(&detail)?)?;
                    bail!("{}", errors);
                }
            };

            tracing::info!(city = %applicant.city, "normalized city");
            let derived = serde_json::to_string(&applicant.derived())?;
            tracing::info!(features = %derived, "derived features");

            let classifier = open_model(&model)?;
            let predictor = Predictor::new(Arc::new(classifier));
            let result = predictor.predict(&applicant)?;

            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
        }
        Command::Inspect { model } => {
            let classifier = open_model(&model)?;
            tracing::info!(artifact = %model.display(), "inspecting model");

            let summary = ModelSummary {
                model_name: classifier.name(),
                version: classifier.version(),
                classes: classifier.classes(),
                columns: classifier.columns(),
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        }
    }

    Ok(())
}

fn open_model(path: &Path) -> anyhow::Result<premium_model::SoftmaxClassifier> {
    load_classifier(path).with_context(|| format!("loading model artifact {}", path.display()))
}

// "@file.json" reads the applicant from disk, anything else is inline JSON
fn read_input(arg: &str) -> anyhow::Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading applicant file {}", path))
        }
        None => Ok(arg.to_string()),
    }
}
