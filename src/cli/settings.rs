//! Settings commands: save, show and clear the encrypted API settings.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use crate::credentials::{CredentialState, CredentialStore, StorageMode};
use crate::llm::DEFAULT_BASE_URL;
use crate::utils::settings::{get_env_vars, API_KEY_VAR, API_KEY_VARS};
use crate::utils::{check_base_url, mask_key};

/// Settings operations.
#[derive(Parser)]
pub struct SettingsCommand {
    /// Settings subcommand to execute.
    #[command(subcommand)]
    pub command: SettingsSubcommands,
}

/// Settings subcommands.
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Encrypts and stores the API key and base URL.
    Save(SaveCommand),
    /// Shows the stored settings with the key masked.
    Show(ShowCommand),
    /// Removes the stored settings from both areas.
    Clear(ClearCommand),
}

/// Save command options.
#[derive(Parser)]
pub struct SaveCommand {
    /// Base URL of the OpenAI-compatible API (empty for the OpenAI default).
    #[arg(long)]
    pub base_url: String,

    /// API key; falls back to AI_SLOP_API_KEY, then OPENAI_API_KEY.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Where to keep the record.
    #[arg(long, value_enum, default_value_t = StorageMode::Session)]
    pub storage: StorageMode,
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {}

/// Clear command options.
#[derive(Parser)]
pub struct ClearCommand {}

impl SettingsCommand {
    /// Executes the settings command.
    pub fn execute(self) -> Result<()> {
        let mut store = CredentialStore::open_default()?;
        match self.command {
            SettingsSubcommands::Save(save_cmd) => save_cmd.execute(&mut store),
            SettingsSubcommands::Show(show_cmd) => show_cmd.execute(&mut store),
            SettingsSubcommands::Clear(clear_cmd) => clear_cmd.execute(&mut store),
        }
    }
}

impl SaveCommand {
    /// Executes the save command.
    pub fn execute(self, store: &mut CredentialStore) -> Result<()> {
        let base_url = self.base_url.trim();
        if !base_url.is_empty() {
            check_base_url(base_url)?;
        }

        let Some(api_key) = resolve_api_key(self.api_key) else {
            bail!("No API key given. Pass --api-key or set {API_KEY_VAR}.");
        };

        store.save(&api_key, base_url, self.storage)?;
        println!("Settings saved to {} storage.", self.storage);
        Ok(())
    }
}

impl ShowCommand {
    /// Executes the show command.
    pub fn execute(self, store: &mut CredentialStore) -> Result<()> {
        match store.load_state()? {
            CredentialState::Missing => {
                println!("No settings saved. Run 'ai-slop settings save' to configure.");
            }
            CredentialState::Corrupt {
                base_url,
                storage,
                reason,
            } => {
                println!("Storage:  {storage}");
                println!("Base URL: {}", display_base_url(base_url.as_deref()));
                println!("API key:  unreadable ({reason})");
                println!("Run 'ai-slop settings save' again to replace it.");
            }
            CredentialState::Present(credentials) => {
                println!("Storage:  {}", credentials.storage);
                println!("Base URL: {}", display_base_url(Some(&credentials.base_url)));
                println!("API key:  {}", mask_key(&credentials.api_key));
            }
        }
        Ok(())
    }
}

impl ClearCommand {
    /// Executes the clear command.
    pub fn execute(self, store: &mut CredentialStore) -> Result<()> {
        store.clear()?;
        println!("Settings cleared.");
        Ok(())
    }
}

/// An explicit key wins over the environment, even when empty.
fn resolve_api_key(explicit: Option<String>) -> Option<String> {
    explicit.or_else(|| get_env_vars(API_KEY_VARS).ok())
}

fn display_base_url(base_url: Option<&str>) -> String {
    match base_url.map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => format!("{DEFAULT_BASE_URL} (default)"),
    }
}
