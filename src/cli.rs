//! CLI interface for ai-slop.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::context::SettingsCache;
use crate::credentials::CredentialStore;
use crate::llm::OpenAiCompatClient;
use crate::utils::check_api_settings;

pub mod compare;
pub mod models;
pub mod settings;
pub mod transform;

/// ai-slop: small LLM utilities over an OpenAI-compatible API.
#[derive(Parser)]
#[command(name = "ai-slop")]
#[command(
    about = "Compare models, run multi-step text transformations and manage API settings",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// API base URL and key management.
    Settings(settings::SettingsCommand),
    /// Model catalog operations.
    Models(models::ModelsCommand),
    /// Sends one prompt to several models.
    Compare(compare::CompareCommand),
    /// Multi-step text transformations.
    Transform(transform::TransformCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Settings(settings_cmd) => settings_cmd.execute(),
            Commands::Models(models_cmd) => models_cmd.execute().await,
            Commands::Compare(compare_cmd) => compare_cmd.execute().await,
            Commands::Transform(transform_cmd) => transform_cmd.execute().await,
        }
    }
}

/// Loads the saved settings and builds a client, failing early when no key
/// is configured.
pub(crate) fn connect(cache: &mut SettingsCache) -> Result<OpenAiCompatClient> {
    let mut store = CredentialStore::open_default()?;
    let settings = cache.api_settings(&mut store)?.clone();
    let info = check_api_settings(&settings)?;
    debug!(base_url = %info.base_url, aggregator = info.aggregator, "Using API settings");
    OpenAiCompatClient::new(settings)
}

