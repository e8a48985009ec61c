//! Credential store: the API key and base URL, lightly encrypted at rest.
//!
//! The key material is stored next to the ciphertext, so this hides the API
//! key from casual inspection only. Anyone who can read the storage area can
//! decrypt it.

pub mod cipher;
pub mod storage;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::ApiSettings;
use cipher::CredentialKey;
pub use storage::{FileStorage, MemoryStorage, StorageArea, StorageMode};

/// Key of the record in the local area.
pub const LOCAL_SETTINGS_KEY: &str = "ai_slop_settings";

/// Key of the record in the session area.
pub const SESSION_SETTINGS_KEY: &str = "ai_slop_session_settings";

/// The persisted settings blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredSettings {
    /// Base URL of the upstream API; empty means the default.
    pub openai_base_url: String,
    /// Base64 of `iv || ciphertext`; empty when no key was saved.
    pub encrypted_api_key: String,
    /// Base64 of the raw AES key; empty when no key was saved.
    pub key_material: String,
    /// Area the record was written to.
    pub storage_type: StorageMode,
}

/// Decrypted credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Base URL as entered by the user; may be empty.
    pub base_url: String,
    /// Decrypted API key; empty when none was saved.
    pub api_key: String,
    /// Area the credentials were read from.
    pub storage: StorageMode,
}

impl Credentials {
    /// Converts into the call context used by the API client.
    pub fn to_api_settings(&self) -> ApiSettings {
        ApiSettings::new(Some(self.base_url.clone()), self.api_key.clone())
    }
}

/// Outcome of reading the store.
///
/// `Corrupt` is kept apart from `Missing` so callers can tell them apart,
/// even though [`CredentialStore::load`] treats both as "nothing configured".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialState {
    /// Neither area holds a record.
    Missing,
    /// A record exists but could not be decoded or decrypted.
    Corrupt {
        /// Base URL, when the record itself was readable.
        base_url: Option<String>,
        /// Area the record was found in.
        storage: StorageMode,
        /// What went wrong.
        reason: String,
    },
    /// A readable record.
    Present(Credentials),
}

impl CredentialState {
    /// Collapses the state to the usable credentials, if any.
    pub fn into_credentials(self) -> Option<Credentials> {
        match self {
            Self::Present(credentials) => Some(credentials),
            Self::Missing | Self::Corrupt { .. } => None,
        }
    }
}

/// Reads and writes the encrypted settings record.
pub struct CredentialStore {
    local: Box<dyn StorageArea>,
    session: Box<dyn StorageArea>,
    key: Option<CredentialKey>,
}

impl CredentialStore {
    /// Creates a store over the given areas.
    pub fn new(local: Box<dyn StorageArea>, session: Box<dyn StorageArea>) -> Self {
        Self {
            local,
            session,
            key: None,
        }
    }

    /// Opens the store over the default file-backed areas.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(
            Box::new(FileStorage::local()?),
            Box::new(FileStorage::session()?),
        ))
    }

    fn area(&self, mode: StorageMode) -> &dyn StorageArea {
        match mode {
            StorageMode::Local => self.local.as_ref(),
            StorageMode::Session => self.session.as_ref(),
        }
    }

    fn record_key(mode: StorageMode) -> &'static str {
        match mode {
            StorageMode::Local => LOCAL_SETTINGS_KEY,
            StorageMode::Session => SESSION_SETTINGS_KEY,
        }
    }

    /// Encrypts `api_key` and writes the record to `mode`'s area, removing any
    /// copy from the other area.
    ///
    /// Both values are trimmed. The in-memory key is reused when present.
    /// Encryption failures store an empty key rather than failing.
    pub fn save(&mut self, api_key: &str, base_url: &str, mode: StorageMode) -> Result<()> {
        let (encrypted_api_key, key_material) = self.encrypt(api_key.trim());

        let record = StoredSettings {
            openai_base_url: base_url.trim().to_string(),
            encrypted_api_key,
            key_material,
            storage_type: mode,
        };
        let json = serde_json::to_string(&record)?;

        self.area(mode).set(Self::record_key(mode), &json)?;
        let other = mode.other();
        self.area(other).remove(Self::record_key(other))?;

        debug!(storage = %mode, "Saved credentials");
        Ok(())
    }

    fn encrypt(&mut self, api_key: &str) -> (String, String) {
        if api_key.is_empty() {
            return (String::new(), String::new());
        }
        let key = self.key.get_or_insert_with(CredentialKey::generate);
        match key.encrypt(api_key) {
            Ok(sealed) => (sealed, key.export()),
            Err(e) => {
                warn!("Encryption error: {e}");
                (String::new(), String::new())
            }
        }
    }

    /// Reads the record, session area first.
    ///
    /// Only storage I/O errors propagate; anything wrong with the record
    /// itself is reported as [`CredentialState::Corrupt`].
    pub fn load_state(&mut self) -> Result<CredentialState> {
        let (raw, storage) = if let Some(raw) = self.session.get(SESSION_SETTINGS_KEY)? {
            (raw, StorageMode::Session)
        } else if let Some(raw) = self.local.get(LOCAL_SETTINGS_KEY)? {
            (raw, StorageMode::Local)
        } else {
            return Ok(CredentialState::Missing);
        };

        let record: StoredSettings = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(storage = %storage, "Error parsing stored settings: {e}");
                return Ok(CredentialState::Corrupt {
                    base_url: None,
                    storage,
                    reason: e.to_string(),
                });
            }
        };

        if record.encrypted_api_key.is_empty() || record.key_material.is_empty() {
            return Ok(CredentialState::Present(Credentials {
                base_url: record.openai_base_url,
                api_key: String::new(),
                storage,
            }));
        }

        match self.decrypt(&record.encrypted_api_key, &record.key_material) {
            Ok(api_key) => Ok(CredentialState::Present(Credentials {
                base_url: record.openai_base_url,
                api_key,
                storage,
            })),
            Err(e) => {
                warn!(storage = %storage, "Decryption error: {e}");
                Ok(CredentialState::Corrupt {
                    base_url: Some(record.openai_base_url),
                    storage,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn decrypt(&mut self, sealed: &str, material: &str) -> Result<String, cipher::CryptoError> {
        let stale = self
            .key
            .as_ref()
            .map_or(true, |key| key.export() != material.trim());
        if stale {
            self.key = Some(CredentialKey::import(material)?);
        }
        match &self.key {
            Some(key) => key.decrypt(sealed),
            None => Err(cipher::CryptoError::KeyMaterial("no key loaded".to_string())),
        }
    }

    /// Reads the credentials; `None` when nothing usable is stored.
    pub fn load(&mut self) -> Result<Option<Credentials>> {
        Ok(self.load_state()?.into_credentials())
    }

    /// Removes the record from both areas and forgets the in-memory key.
    pub fn clear(&mut self) -> Result<()> {
        self.local.remove(LOCAL_SETTINGS_KEY)?;
        self.session.remove(SESSION_SETTINGS_KEY)?;
        self.key = None;
        Ok(())
    }
}
