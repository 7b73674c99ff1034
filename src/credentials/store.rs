//! Credential storage backends
//!
//! The pipeline reads and writes the credential pair through [`CredentialStore`].
//! Which backend is used is a deployment decision made in configuration:
//! - [`MemoryStore`] keeps the pair in process memory only
//! - [`FileStore`] persists it to a YAML session file readable across runs

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::CredentialPair;
use crate::error::StoreError;

type Result<T> = std::result::Result<T, StoreError>;

/// Synchronous read/write access to the stored credential pair.
///
/// Implementations must replace the pair as a unit: after `save` returns,
/// `load` yields either the complete new pair or (on error) the complete old one.
pub trait CredentialStore: Send + Sync {
    /// Current pair, if a session exists
    fn load(&self) -> Result<Option<CredentialPair>>;

    /// Replace the stored pair
    fn save(&self, pair: &CredentialPair) -> Result<()>;

    /// Forget the stored pair
    fn clear(&self) -> Result<()>;
}

/// Which backend holds credentials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Process memory; the session ends with the process
    Memory,
    /// Session file on disk
    #[default]
    File,
}

impl StorageKind {
    /// Open the configured backend.
    ///
    /// `session_path` only applies to [`StorageKind::File`]; `None` selects
    /// the default location.
    pub fn open(self, session_path: Option<&Path>) -> Result<Box<dyn CredentialStore>> {
        match self {
            StorageKind::Memory => Ok(Box::new(MemoryStore::default())),
            StorageKind::File => {
                let path = match session_path {
                    Some(path) => path.to_path_buf(),
                    None => FileStore::default_path()?,
                };
                Ok(Box::new(FileStore::new(path)))
            }
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Memory => write!(f, "memory"),
            StorageKind::File => write!(f, "file"),
        }
    }
}

/// In-memory credential store
#[derive(Debug, Default)]
pub struct MemoryStore {
    pair: RwLock<Option<CredentialPair>>,
}

impl MemoryStore {
    /// Create a store already holding a pair
    #[cfg(test)]
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<CredentialPair>> {
        let guard = self
            .pair
            .read()
            .map_err(|_| StoreError::Io("credential lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        let mut guard = self
            .pair
            .write()
            .map_err(|_| StoreError::Io("credential lock poisoned".to_string()))?;
        *guard = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .pair
            .write()
            .map_err(|_| StoreError::Io("credential lock poisoned".to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// On-disk session file
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    credentials: CredentialPair,
    saved_at: chrono::DateTime<chrono::Utc>,
}

/// YAML session file store.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// session file, so readers never see half of a pair.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store backed by the given session file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default session file location (~/.tokenpipe/session.yaml)
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(StoreError::NoHome)?;
        Ok(home.join(".tokenpipe").join("session.yaml"))
    }

    /// Path of the session file
    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.yaml".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> Result<Option<CredentialPair>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let session: SessionFile = serde_yaml::from_str(&contents)?;
        Ok(Some(session.credentials))
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let session = SessionFile {
            credentials: pair.clone(),
            saved_at: chrono::Utc::now(),
        };
        let contents = serde_yaml::to_string(&session)?;

        let temp = self.temp_path();
        std::fs::write(&temp, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&temp)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&temp, perms)?;
        }

        std::fs::rename(&temp, &self.path)?;
        log::debug!("Saved session to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                log::debug!("Removed session file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
