//! Settings and configuration utilities.
//!
//! Reads $HOME/.ai-slop/settings.json and uses its `env` map as a fallback for
//! environment variables.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::llm::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

/// API key used by `settings save` when `--api-key` is omitted.
pub const API_KEY_VAR: &str = "AI_SLOP_API_KEY";
/// Second choice for the API key.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Variables searched for an API key, in order.
pub const API_KEY_VARS: &[&str] = &[API_KEY_VAR, OPENAI_API_KEY_VAR];
/// Directory backing the session storage area.
pub const SESSION_DIR_VAR: &str = "AI_SLOP_SESSION_DIR";
/// Directory backing the local storage area.
pub const STORAGE_DIR_VAR: &str = "AI_SLOP_STORAGE_DIR";
/// Token budget per request.
pub const MAX_TOKENS_VAR: &str = "AI_SLOP_MAX_TOKENS";
/// Model used when none is given.
pub const DEFAULT_MODEL_VAR: &str = "AI_SLOP_DEFAULT_MODEL";

/// Settings loaded from $HOME/.ai-slop/settings.json.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Environment variable overrides.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Self::load_from_path(&settings_path)
    }

    /// Loads settings from a specific path; a missing file gives defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        serde_json::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Returns the default settings path.
    pub fn get_settings_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

        Ok(home_dir.join(".ai-slop").join("settings.json"))
    }

    /// Returns an environment variable with fallback to settings.
    pub fn get_env_var(&self, key: &str) -> Option<String> {
        env::var(key).ok().or_else(|| self.env.get(key).cloned())
    }

    /// Token budget from `AI_SLOP_MAX_TOKENS`, or the default.
    ///
    /// Values that are not a positive integer are ignored.
    pub fn max_tokens(&self) -> u32 {
        parse_max_tokens(self.get_env_var(MAX_TOKENS_VAR).as_deref())
    }

    /// Model from `AI_SLOP_DEFAULT_MODEL`, or the default.
    pub fn default_model(&self) -> String {
        self.get_env_var(DEFAULT_MODEL_VAR)
            .map(|model| model.trim().to_string())
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }
}

fn parse_max_tokens(value: Option<&str>) -> u32 {
    value
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_TOKENS)
}

/// Returns an environment variable with fallback to settings.
pub fn get_env_var(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) => Ok(value),
        Err(_) => match Settings::load() {
            Ok(settings) => settings
                .env
                .get(key)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Environment variable not found: {}", key)),
            Err(err) => {
                Err(anyhow::anyhow!("Environment variable not found: {}", key).context(err))
            }
        },
    }
}

/// Tries multiple environment variables with fallback to settings.
pub fn get_env_vars(keys: &[&str]) -> Result<String> {
    for key in keys {
        if let Ok(value) = get_env_var(key) {
            return Ok(value);
        }
    }

    Err(anyhow::anyhow!(
        "None of the environment variables found: {:?}",
        keys
    ))
}
