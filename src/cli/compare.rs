//! Compare command: one prompt, several models.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use crate::compare::run_comparison;
use crate::context::SettingsCache;
use crate::data::comparison::Comparison;
use crate::utils::Settings;

/// Sends one prompt to several models and prints the replies.
#[derive(Parser)]
pub struct CompareCommand {
    /// User prompt sent to every model.
    #[arg(long, required_unless_present = "file")]
    pub prompt: Option<String>,

    /// Model to query; repeat for each column (defaults to AI_SLOP_DEFAULT_MODEL).
    #[arg(long = "model", conflicts_with = "file")]
    pub models: Vec<String>,

    /// System prompt (defaults to a generic assistant prompt).
    #[arg(long, conflicts_with = "file")]
    pub system: Option<String>,

    /// Title stored with the comparison.
    #[arg(long, conflicts_with = "file")]
    pub title: Option<String>,

    /// Re-runs a saved comparison file.
    #[arg(long, conflicts_with = "prompt")]
    pub file: Option<PathBuf>,

    /// Writes the comparison with its replies to this file.
    #[arg(long)]
    pub save: Option<PathBuf>,
}

impl CompareCommand {
    /// Executes the compare command.
    pub async fn execute(self) -> Result<()> {
        let config = Settings::load()?;
        let mut comparison = self.build_comparison(&config.default_model())?;

        let mut cache = SettingsCache::new();
        let client = super::connect(&mut cache)?;

        let attempted = comparison
            .responses
            .iter()
            .filter(|r| !r.model_name.trim().is_empty())
            .count();
        let failures = run_comparison(&mut comparison, &client, config.max_tokens()).await?;

        for (index, response) in comparison.responses.iter().enumerate() {
            if response.model_name.trim().is_empty() {
                continue;
            }
            println!("=== {} ===", response.model_name);
            if let Some(failure) = failures.iter().find(|f| f.index == index) {
                println!("(failed: {})\n", failure.error);
            } else {
                println!("{}\n", response.llm_response);
            }
        }

        if let Some(path) = &self.save {
            comparison.save_to_file(path)?;
            eprintln!("Saved comparison to {}", path.display());
        }

        if attempted > 0 && failures.len() == attempted {
            bail!("All {attempted} comparison requests failed");
        }
        Ok(())
    }

    fn build_comparison(&self, default_model: &str) -> Result<Comparison> {
        if let Some(path) = &self.file {
            return Comparison::load_from_file(path);
        }

        let models: Vec<String> = if self.models.is_empty() {
            vec![default_model.to_string()]
        } else {
            self.models.clone()
        };
        let mut comparison = Comparison::new(
            self.title.clone().unwrap_or_default(),
            self.prompt.clone().unwrap_or_default(),
            models,
        );
        if let Some(system) = &self.system {
            comparison.system_prompt.clone_from(system);
        }
        Ok(comparison)
    }
}
