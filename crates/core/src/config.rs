//! Configuration management
//!
//! [`StoreConfig`] is the bucket-scoped configuration installed into a
//! [`crate::Store`]. [`ConfigManager`] loads and saves the on-disk TOML file
//! holding a connection profile and store defaults, stored at
//! `<config dir>/bucketkit/config.toml` (or under `$BK_CONFIG_DIR`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::codec::{CodecOptions, FileType, TabularEngine, TextEncoding};
use crate::error::{Error, Result};
use crate::profile::ConnectionProfile;

/// Current configuration schema version
///
/// Bumping this version requires a migration step in [`ConfigManager::migrate`].
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "BK_CONFIG_DIR";

fn default_separator() -> char {
    ','
}

fn default_true() -> bool {
    true
}

/// Bucket-scoped defaults for every store operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Default bucket; operations without an explicit bucket need it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Prefix prepended to every logical key
    #[serde(default)]
    pub key_prefix: String,

    /// Frame flavour produced by `load`
    #[serde(default)]
    pub output_engine: TabularEngine,

    /// Format for frames uploaded to keys without extension
    #[serde(default)]
    pub default_file_type: FileType,

    /// Allow replacing existing objects and local files
    #[serde(default = "default_true")]
    pub overwrite: bool,

    /// Encoding of JSON and CSV text
    #[serde(default)]
    pub encoding: TextEncoding,

    /// CSV field separator
    #[serde(default = "default_separator")]
    pub csv_separator: char,

    /// Write a row index column to CSV
    #[serde(default)]
    pub include_index: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            key_prefix: String::new(),
            output_engine: TabularEngine::default(),
            default_file_type: FileType::default(),
            overwrite: true,
            encoding: TextEncoding::default(),
            csv_separator: default_separator(),
            include_index: false,
        }
    }
}

impl StoreConfig {
    /// Start building a configuration for `bucket`
    pub fn builder(bucket: impl Into<String>) -> StoreConfigBuilder {
        StoreConfigBuilder {
            config: StoreConfig {
                bucket: Some(bucket.into()),
                ..Default::default()
            },
        }
    }

    /// Check values that serde cannot reject on its own
    pub fn validate(&self) -> Result<()> {
        if !self.csv_separator.is_ascii() || self.csv_separator == '\n' || self.csv_separator == '"' {
            return Err(Error::Config(format!(
                "csv separator must be a single ascii character other than newline or quote, got {:?}",
                self.csv_separator
            )));
        }
        if matches!(&self.bucket, Some(b) if b.is_empty()) {
            return Err(Error::Config("bucket name cannot be empty".into()));
        }
        Ok(())
    }

    /// Serialization settings derived from this configuration
    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            default_file_type: self.default_file_type,
            csv_separator: self.csv_separator as u8,
            include_index: self.include_index,
            encoding: self.encoding,
        }
    }
}

/// Builder for [`StoreConfig`]
#[derive(Debug, Clone)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    pub fn output_engine(mut self, engine: TabularEngine) -> Self {
        self.config.output_engine = engine;
        self
    }

    pub fn default_file_type(mut self, file_type: FileType) -> Self {
        self.config.default_file_type = file_type;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.config.overwrite = overwrite;
        self
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    pub fn csv_separator(mut self, separator: char) -> Self {
        self.config.csv_separator = separator;
        self
    }

    pub fn include_index(mut self, include: bool) -> Self {
        self.config.include_index = include;
        self
    }

    /// Validate and finish
    pub fn build(self) -> Result<StoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// On-disk configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// How to reach the storage service
    #[serde(default)]
    pub connection: ConnectionProfile,

    /// Store defaults
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            connection: ConnectionProfile::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("bucketkit"),
        };
        Ok(Self {
            config_path: config_dir.join("config.toml"),
        })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// If the schema version doesn't match, attempts migration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade bucketkit.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        config.connection.validate()?;
        config.store.validate()?;
        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 600 (owner read/write only).
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, config: Config) -> Result<Config> {
        let mut config = config;
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}
