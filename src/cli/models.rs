//! Model catalog commands.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::context::SettingsCache;
use crate::llm::catalog::filter_models;
use crate::llm::ModelRecord;

/// Model catalog operations.
#[derive(Parser)]
pub struct ModelsCommand {
    /// Models subcommand to execute.
    #[command(subcommand)]
    pub command: ModelsSubcommands,
}

/// Models subcommands.
#[derive(Subcommand)]
pub enum ModelsSubcommands {
    /// Lists the models offered by the configured API.
    List(ListCommand),
}

/// List command options.
#[derive(Parser)]
pub struct ListCommand {
    /// Only show models whose id or name contains this text.
    #[arg(long)]
    pub search: Option<String>,
}

impl ModelsCommand {
    /// Executes the models command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            ModelsSubcommands::List(list_cmd) => list_cmd.execute().await,
        }
    }
}

impl ListCommand {
    /// Executes the list command.
    pub async fn execute(self) -> Result<()> {
        let mut cache = SettingsCache::new();
        let client = super::connect(&mut cache)?;
        let models = cache.models(&client).await?;

        let term = self.search.as_deref().unwrap_or_default();
        let shown = filter_models(models, term);
        if shown.is_empty() {
            if term.is_empty() {
                eprintln!("The API returned no models.");
            } else {
                eprintln!("No models match '{term}'.");
            }
            return Ok(());
        }

        for record in shown {
            println!("{}", format_record(record));
        }
        Ok(())
    }
}

fn format_record(record: &ModelRecord) -> String {
    let mut line = record.id.clone();
    if record.display_name != record.id {
        line.push_str(&format!("  {}", record.display_name));
    }
    if let Some(context) = &record.context_length {
        line.push_str(&format!("  [{context} ctx]"));
    }
    if let Some(pricing) = &record.pricing_label {
        line.push_str(&format!("  [{pricing}]"));
    }
    line
}
