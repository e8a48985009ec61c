//! Per-session cache of the decrypted API settings and the model list.

use anyhow::Result;
use tracing::debug;

use crate::credentials::CredentialStore;
use crate::llm::{list_models, ApiSettings, ModelRecord, OpenAiCompatClient};

/// Holds the decrypted settings and the fetched model list.
///
/// Both are loaded lazily and invalidated together by [`reset`](Self::reset),
/// which callers invoke after saving new settings.
#[derive(Debug, Default)]
pub struct SettingsCache {
    settings: Option<ApiSettings>,
    models: Option<Vec<ModelRecord>>,
}

impl SettingsCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached settings, reading `store` on first use.
    ///
    /// Missing or unreadable credentials yield settings with an empty key, so
    /// the client reports a configuration error on use.
    pub fn api_settings(&mut self, store: &mut CredentialStore) -> Result<&ApiSettings> {
        if self.settings.is_none() {
            let settings = store
                .load()?
                .map(|credentials| credentials.to_api_settings())
                .unwrap_or_default();
            debug!(
                base_url = %settings.resolved_base_url(),
                has_key = !settings.api_key.is_empty(),
                "Loaded API settings"
            );
            self.settings = Some(settings);
        }
        Ok(self.settings.get_or_insert_with(ApiSettings::default))
    }

    /// Returns the cached model list, fetching it with `client` on first use.
    pub async fn models(&mut self, client: &OpenAiCompatClient) -> Result<&[ModelRecord]> {
        if self.models.is_none() {
            self.models = Some(list_models(client).await?);
        }
        Ok(self.models.as_deref().unwrap_or_default())
    }

    /// Drops both cached values.
    pub fn reset(&mut self) {
        self.settings = None;
        self.models = None;
    }

    /// Whether settings are currently cached.
    pub fn is_loaded(&self) -> bool {
        self.settings.is_some()
    }
}
