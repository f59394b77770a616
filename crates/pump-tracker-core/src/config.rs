//! Configuration: store credentials from the environment and the selected
//! branch from a small JSON file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::Branch;

/// Environment variable holding the record store location.
pub const STORE_URL_VAR: &str = "STORE_URL";
/// Environment variable holding the record store access key.
pub const STORE_KEY_VAR: &str = "STORE_KEY";
/// Branch file name, relative to the working directory.
pub const DEFAULT_BRANCH_FILE: &str = "config.json";
/// Freshness window of cached aggregations.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Unknown branch: {0}")]
    UnknownBranch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Record store credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub url: String,
    pub key: String,
}

impl StoreSettings {
    /// Read credentials from the process environment, loading `.env` first
    /// when one exists.
    pub fn from_env() -> ConfigResult<Self> {
        if let Ok(path) = dotenv::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };
        Ok(Self {
            url: read(STORE_URL_VAR)?,
            key: read(STORE_KEY_VAR)?,
        })
    }

    /// Local database path for a `sqlite://` (or bare path) URL.
    pub fn database_path(&self) -> &str {
        self.url.strip_prefix("sqlite://").unwrap_or(&self.url)
    }
}

/// On-disk form of the branch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BranchFile {
    #[serde(alias = "filial")]
    branch: String,
}

/// The persisted branch selection. A missing file means "not configured".
#[derive(Debug, Clone)]
pub struct BranchConfig {
    path: PathBuf,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BRANCH_FILE)
    }
}

impl BranchConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The configured branch, `None` when not configured.
    pub fn load(&self) -> ConfigResult<Option<Branch>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: BranchFile = serde_json::from_str(&text)?;
        Branch::parse(&file.branch)
            .map(Some)
            .ok_or(ConfigError::UnknownBranch(file.branch))
    }

    pub fn save(&self, branch: Branch) -> ConfigResult<()> {
        let file = BranchFile {
            branch: branch.as_str().to_string(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        info!(%branch, path = %self.path.display(), "branch saved");
        Ok(())
    }

    /// Forget the selection. Clearing an unconfigured file is not an error.
    pub fn clear(&self) -> ConfigResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
