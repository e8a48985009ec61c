//! Key/value storage areas backing the credential store.
//!
//! Two areas exist: `local` survives across sessions, `session` lives in the
//! per-user runtime directory and disappears at logout. Records carry their
//! own key material, so on unix the directories are 0700 and the files 0600.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::settings::{get_env_var, SESSION_DIR_VAR, STORAGE_DIR_VAR};

/// Which storage area a record lives in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Cleared together with the user's runtime directory.
    #[default]
    Session,
    /// Kept under the user's home directory.
    Local,
}

impl StorageMode {
    /// The other area.
    pub fn other(self) -> Self {
        match self {
            Self::Session => Self::Local,
            Self::Local => Self::Session,
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session => f.write_str("session"),
            Self::Local => f.write_str("local"),
        }
    }
}

impl FromStr for StorageMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "local" => Ok(Self::Local),
            other => anyhow::bail!("Unknown storage type: {other} (expected session or local)"),
        }
    }
}

/// A string-keyed blob store.
pub trait StorageArea: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Stores each key as `<key>.json` in a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates storage rooted at `dir`. The directory is created on first write.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Persistent area: `$AI_SLOP_STORAGE_DIR` or `~/.ai-slop/storage`.
    pub fn local() -> Result<Self> {
        if let Ok(dir) = get_env_var(STORAGE_DIR_VAR) {
            return Ok(Self::new(dir));
        }
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(Self::new(home_dir.join(".ai-slop").join("storage")))
    }

    /// Session area: `$AI_SLOP_SESSION_DIR`, or `ai-slop-session` under the
    /// user's runtime directory (cache directory where there is none).
    pub fn session() -> Result<Self> {
        if let Ok(dir) = get_env_var(SESSION_DIR_VAR) {
            return Ok(Self::new(dir));
        }
        let base = dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .context("Failed to determine a per-user runtime or cache directory")?;
        Ok(Self::new(base.join("ai-slop-session")))
    }

    /// Directory this storage writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageArea for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        create_private_dir(&self.dir)
            .with_context(|| format!("Failed to create storage directory: {}", self.dir.display()))?;
        let path = self.path_for(key);
        write_private(&path, value).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private(path: &Path, value: &str) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies when the file is created.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(value.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, value: &str) -> io::Result<()> {
    fs::write(path, value)
}

/// In-memory storage. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))
    }
}

impl StorageArea for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn file_storage_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("nested"));

        assert_eq!(storage.get("k").unwrap(), None);
        storage.set("k", "{\"a\":1}").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("{\"a\":1}"));
        assert!(temp_dir.path().join("nested").join("k.json").exists());

        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
        storage.remove("k").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn records_are_private_to_the_user() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("session");
        let storage = FileStorage::new(&dir);

        // A file left world-readable is tightened on the next write.
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stale.json"), "{}").unwrap();
        fs::set_permissions(dir.join("stale.json"), fs::Permissions::from_mode(0o644)).unwrap();

        storage.set("fresh", "{\"keyMaterial\":\"x\"}").unwrap();
        storage.set("stale", "{}").unwrap();

        for name in ["fresh.json", "stale.json"] {
            let mode = fs::metadata(dir.join(name)).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "{name}");
        }

        let nested = temp_dir.path().join("a").join("b");
        FileStorage::new(&nested).set("k", "v").unwrap();
        let mode = fs::metadata(&nested).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn default_session_area_is_not_shared_temp() {
        if get_env_var(SESSION_DIR_VAR).is_ok() {
            return;
        }
        let Ok(storage) = FileStorage::session() else {
            return;
        };
        assert!(storage.dir().ends_with("ai-slop-session"));
        assert_ne!(storage.dir(), std::env::temp_dir().join("ai-slop-session"));
    }

    #[test]
    fn memory_storage_clones_share_state() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn storage_mode_parsing() {
        assert_eq!("LOCAL".parse::<StorageMode>().unwrap(), StorageMode::Local);
        assert_eq!(" session ".parse::<StorageMode>().unwrap(), StorageMode::Session);
        assert!("cloud".parse::<StorageMode>().is_err());
        assert_eq!(StorageMode::Local.other(), StorageMode::Session);
    }
}
