//! Transform commands: run a saved pipeline or create a new one.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use crate::context::SettingsCache;
use crate::data::transformation::Transformation;
use crate::llm::LlmError;
use crate::pipeline::{CancellationFlag, PipelineRunner, RunOutcome, Step, StepProgress, StepStatus};
use crate::utils::Settings;

/// Transformation operations.
#[derive(Parser)]
pub struct TransformCommand {
    /// Transform subcommand to execute.
    #[command(subcommand)]
    pub command: TransformSubcommands,
}

/// Transform subcommands.
#[derive(Subcommand)]
pub enum TransformSubcommands {
    /// Runs a saved transformation and prints the result.
    Run(RunCommand),
    /// Creates a transformation file.
    New(NewCommand),
}

/// Run command options.
#[derive(Parser)]
pub struct RunCommand {
    /// Transformation file to run.
    pub document: PathBuf,

    /// Input text, replacing the one stored in the file.
    #[arg(long)]
    pub input: Option<String>,

    /// Writes the transformation with its results to this file.
    #[arg(long)]
    pub save: Option<PathBuf>,
}

/// New command options.
#[derive(Parser)]
pub struct NewCommand {
    /// Title of the transformation.
    #[arg(long)]
    pub title: String,

    /// Input text.
    #[arg(long, default_value = "")]
    pub input: String,

    /// Step as MODEL=INSTRUCTIONS; repeat in execution order.
    #[arg(long = "step", value_parser = parse_step_spec)]
    pub steps: Vec<Step>,

    /// Output file (defaults to a name derived from the title).
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Parses `MODEL=INSTRUCTIONS`.
fn parse_step_spec(spec: &str) -> Result<Step, String> {
    let (model, instructions) = spec
        .split_once('=')
        .ok_or_else(|| format!("expected MODEL=INSTRUCTIONS, got '{spec}'"))?;
    let model = model.trim();
    if model.is_empty() {
        return Err(format!("missing model in '{spec}'"));
    }
    Ok(Step::new(instructions.trim(), model))
}

impl TransformCommand {
    /// Executes the transform command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            TransformSubcommands::Run(run_cmd) => run_cmd.execute().await,
            TransformSubcommands::New(new_cmd) => new_cmd.execute(),
        }
    }
}

impl RunCommand {
    /// Executes the run command.
    pub async fn execute(self) -> Result<()> {
        let config = Settings::load()?;
        let mut transformation = Transformation::load_from_file(&self.document)?;
        if let Some(input) = self.input {
            transformation.input = input;
        }
        if transformation.input.trim().is_empty() {
            return Err(LlmError::Config("Input text cannot be empty".to_string()).into());
        }

        let mut cache = SettingsCache::new();
        let client = super::connect(&mut cache)?;

        let cancel = CancellationFlag::new();
        let listener = {
            let flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("\nCancelling after the current step...");
                    flag.cancel();
                }
            })
        };

        let runner = PipelineRunner::new(&client)
            .with_max_tokens(config.max_tokens())
            .with_cancellation(cancel);
        let input = transformation.input.clone();
        let result = runner
            .run_sequential(transformation.steps_mut(), &input, report_progress)
            .await;
        listener.abort();
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                if let Some(path) = &self.save {
                    save_partial(&transformation, path);
                }
                return Err(e);
            }
        };

        debug!(
            executed = report.executed,
            skipped = report.skipped,
            "Transformation finished"
        );
        if let RunOutcome::Cancelled { completed } = report.outcome {
            eprintln!(
                "Cancelled after {completed} of {} steps.",
                transformation.steps().len()
            );
        }

        if let Some(output) = report.output {
            println!("{output}");
            transformation.output = output;
        } else {
            eprintln!("No steps produced output.");
        }

        if let Some(path) = &self.save {
            transformation.save_to_file(path)?;
            eprintln!("Saved transformation to {}", path.display());
        }
        Ok(())
    }
}

/// Keeps the replies of the steps that finished before a failure.
fn save_partial(transformation: &Transformation, path: &Path) {
    match transformation.save_to_file(path) {
        Ok(()) => eprintln!("Saved partial results to {}", path.display()),
        Err(e) => warn!("Failed to save partial results: {e:#}"),
    }
}

fn report_progress(progress: StepProgress) {
    let status = match progress.status {
        StepStatus::Succeeded => "done",
        StepStatus::Failed => "failed",
        StepStatus::Skipped => "skipped (missing instructions or model)",
        StepStatus::Idle | StepStatus::Running => return,
    };
    eprintln!("[{}/{}] {status}", progress.current, progress.total);
}

impl NewCommand {
    /// Executes the new command.
    pub fn execute(self) -> Result<()> {
        let transformation = self.build();
        let path = self
            .out
            .unwrap_or_else(|| PathBuf::from(transformation.default_filename()));
        transformation.save_to_file(&path)?;
        println!(
            "Saved transformation with {} step(s) to {}",
            transformation.steps().len(),
            path.display()
        );
        Ok(())
    }

    fn build(&self) -> Transformation {
        Transformation::with_steps(self.title.as_str(), self.input.as_str(), self.steps.clone())
    }
}
