//! Configuration management for tokenpipe

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::http::{DEFAULT_API_HOST, DEFAULT_REQUEST_TIMEOUT};
use crate::credentials::{CredentialStore, StorageKind};
use crate::error::{ConfigError, Result};
use crate::pipeline::{
    DEFAULT_MAX_QUEUE, DEFAULT_REFRESH_ATTEMPTS, DEFAULT_REFRESH_TIMEOUT, PipelineSettings,
};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "TOKENPIPE_CONFIG";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Email used by `login` when `--email` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Where the credential pair lives
    #[serde(default)]
    pub storage: StorageKind,

    /// Session file for file storage (defaults to ~/.tokenpipe/session.yaml)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_path: Option<PathBuf>,

    /// Refresh and request tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Refresh episode and transport limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,

    #[serde(default = "default_refresh_attempts")]
    pub refresh_attempts: u32,

    #[serde(default = "default_max_queue")]
    pub max_queue: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}

fn default_refresh_timeout_secs() -> u64 {
    DEFAULT_REFRESH_TIMEOUT.as_secs()
}

fn default_refresh_attempts() -> u32 {
    DEFAULT_REFRESH_ATTEMPTS
}

fn default_max_queue() -> usize {
    DEFAULT_MAX_QUEUE
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refresh_timeout_secs: default_refresh_timeout_secs(),
            refresh_attempts: default_refresh_attempts(),
            max_queue: default_max_queue(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    /// Settings handed to the pipeline
    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            refresh_timeout: Duration::from_secs(self.refresh_timeout_secs),
            refresh_attempts: self.refresh_attempts,
            max_queue: self.max_queue,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.refresh_timeout_secs == 0 {
            return Err(ConfigError::Invalid("refresh_timeout_secs must be > 0".to_string()).into());
        }
        if self.refresh_attempts == 0 {
            return Err(ConfigError::Invalid("refresh_attempts must be > 0".to_string()).into());
        }
        if self.max_queue == 0 {
            return Err(ConfigError::Invalid("max_queue must be > 0".to_string()).into());
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be > 0".to_string()).into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            email: None,
            storage: StorageKind::default(),
            session_path: None,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".tokenpipe").join("config.yaml"))
    }

    /// Resolve the config path: explicit path, then `TOKENPIPE_CONFIG`, then the default.
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(PathBuf::from(path)),
            None => match std::env::var(CONFIG_ENV) {
                Ok(path) if !path.is_empty() => Ok(PathBuf::from(path)),
                _ => Self::default_path(),
            },
        }
    }

    /// Load configuration from a specific path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.pipeline.validate()?;

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(path, contents)?;

        // Set file permissions to 600 on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Open the configured credential store
    pub fn open_store(&self) -> Result<Box<dyn CredentialStore>> {
        Ok(self.storage.open(self.session_path.as_deref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_host, "http://localhost:8000");
        assert!(config.email.is_none());
        assert_eq!(config.storage, StorageKind::File);
        assert_eq!(config.pipeline.settings(), PipelineSettings::default());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = tempdir().unwrap();
        let config = Config::load_from(&temp.path().join("absent.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "api_host: https://api.example.com\nstorage: memory\npipeline:\n  max_queue: 8\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_host, "https://api.example.com");
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.pipeline.max_queue, 8);
        assert_eq!(config.pipeline.refresh_attempts, 1);
        assert_eq!(config.pipeline.refresh_timeout_secs, 30);
    }

    #[test]
    fn test_save_and_reload() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("config.yaml");

        let config = Config {
            email: Some("dev@example.com".to_string()),
            session_path: Some(temp.path().join("session.yaml")),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let path = temp.path().join("config.yaml");
        Config::default().save_to(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "pipeline:\n  refresh_attempts: 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("refresh_attempts"));
    }

    #[test]
    fn test_invalid_yaml() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "api_host: [unclosed").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = Config::resolve_path(Some("/tmp/custom.yaml")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.yaml"));
    }
}
