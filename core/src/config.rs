//! Configuration loaded from TOML with `TANDEM_*` environment overrides.
//!
//! ```toml
//! [database]
//! url = "sqlite://tandem.db?mode=rwc"
//! max_connections = 4
//!
//! [members]
//! admin = "sam@example.com"
//! user = "alex@example.com"
//!
//! [feed]
//! capacity = 64
//!
//! [log]
//! filter = "info,tandem_core=debug"
//! json = false
//! ```

use crate::identity::{IdentityError, RoleDirectory};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }
}

/// The two member accounts of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembersConfig {
    pub admin: String,
    pub user: String,
}

impl Default for MembersConfig {
    fn default() -> Self {
        Self {
            admin: "admin@tandem.local".to_string(),
            user: "user@tandem.local".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Buffered notices per subscriber before older ones are coalesced.
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    pub database: DatabaseConfig,
    pub members: MembersConfig,
    pub feed: FeedConfig,
    pub log: LogConfig,
}

impl TandemConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Reads `path`, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&source)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("TANDEM_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(admin) = lookup("TANDEM_ADMIN_ACCOUNT") {
            self.members.admin = admin;
        }
        if let Some(user) = lookup("TANDEM_USER_ACCOUNT") {
            self.members.user = user;
        }
        if let Some(filter) = lookup("TANDEM_LOG") {
            self.log.filter = filter;
        }
        if let Some(capacity) = lookup("TANDEM_FEED_CAPACITY") {
            self.feed.capacity = match capacity.parse() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "TANDEM_FEED_CAPACITY",
                        value: capacity,
                    });
                }
            };
        }
        Ok(())
    }

    pub fn directory(&self) -> Result<RoleDirectory, ConfigError> {
        Ok(RoleDirectory::new(&self.members.admin, &self.members.user)?)
    }
}
