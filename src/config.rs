/// Application configuration.
///
/// Loaded once at startup from a TOML file, with a handful of environment
/// overrides (a `.env` file is honoured via `dotenv`). Every field has a
/// default matching the hosted deployment, so running without any
/// configuration file works.
///
/// ```toml
/// parameters_file = "parameters.toml"   # optional, built-in table otherwise
///
/// [cache]
/// prefix  = "aquarium-tracker"
/// version = "v1.1"
/// origin  = "https://tank.example/"
/// assets  = ["./index.html", "./data/optimal.js", "./manifest.webmanifest"]
///
/// [classification]
/// parsing = "strict"
///
/// [logging]
/// level = "debug"
/// file = "aquarium.log"
/// console_timestamps = true
/// ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::classify::ValueParsing;
use crate::error::ConfigError;
use crate::logging::{self, Component, LogLevel};
use crate::parameters::ReferenceTable;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "aquarium.toml";

pub const ENV_CONFIG: &str = "AQUARIUM_CONFIG";
pub const ENV_CACHE_VERSION: &str = "AQUARIUM_CACHE_VERSION";
pub const ENV_LOG_LEVEL: &str = "AQUARIUM_LOG_LEVEL";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub classification: ClassificationConfig,
    /// Optional TOML reference table; the built-in table is used when absent.
    pub parameters_file: Option<PathBuf>,
    pub logging: LoggingConfig,
}

/// Offline cache settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Shared by every bucket this system creates.
    pub prefix: String,
    /// Deployable version tag; changing it starts a new install/activate cycle.
    pub version: String,
    /// Base URL of the page. Relative asset paths resolve against it and its
    /// origin decides cache-first vs network-first routing.
    pub origin: String,
    /// Same-origin assets that must be fetchable at install time.
    pub assets: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "aquarium-tracker".to_string(),
            version: "v1.0".to_string(),
            origin: "http://localhost:8080/".to_string(),
            assets: vec![
                "./index.html".to_string(),
                "./data/optimal.js".to_string(),
                "./manifest.webmanifest".to_string(),
            ],
        }
    }
}

impl CacheConfig {
    /// Name of the bucket owned by this version, e.g. `aquarium-tracker-v1.0`.
    pub fn bucket_name(&self) -> String {
        format!("{}-{}", self.prefix, self.version)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub parsing: ValueParsing,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            console_timestamps: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads `.env`, then the file named by `AQUARIUM_CONFIG` (default
    /// `aquarium.toml`), then applies environment overrides.
    ///
    /// A missing default file means defaults; a missing file that was named
    /// explicitly is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = match std::env::var(ENV_CONFIG) {
            Ok(path) => Self::load_from_file(path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load_from_file(DEFAULT_CONFIG_FILE)?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies `AQUARIUM_CACHE_VERSION` / `AQUARIUM_LOG_LEVEL` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(version) = lookup(ENV_CACHE_VERSION) {
            if version.trim().is_empty() {
                return Err(ConfigError::InvalidEnv {
                    name: ENV_CACHE_VERSION.to_string(),
                    value: version,
                });
            }
            self.cache.version = version.trim().to_string();
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        Ok(())
    }

    /// The configured reference table, or the built-in one.
    pub fn reference_table(&self) -> Result<ReferenceTable, ConfigError> {
        match &self.parameters_file {
            Some(path) => ReferenceTable::load_from_file(path),
            None => Ok(ReferenceTable::freshwater_community()),
        }
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        self.logging
            .level
            .parse()
            .map_err(|_| ConfigError::InvalidEnv {
                name: "logging.level".to_string(),
                value: self.logging.level.clone(),
            })
    }

    /// Initialises the global logger from the `[logging]` section.
    pub fn init_logging(&self) -> Result<(), ConfigError> {
        logging::init_logger(
            self.log_level()?,
            self.logging.file.as_deref(),
            self.logging.console_timestamps,
        );
        logging::debug(
            Component::Config,
            None,
            &format!(
                "bucket {}, {} asset(s), {:?} parsing",
                self.cache.bucket_name(),
                self.cache.assets.len(),
                self.classification.parsing
            ),
        );
        Ok(())
    }
}
