//! Error types for configuration loading and the offline cache controller.
//!
//! Classification has no error type: every bad input folds into
//! `Status::Unknown` or `Status::Invalid`.

use std::path::PathBuf;

/// Errors raised while loading configuration or building the reference table.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML document was malformed or had the wrong shape.
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A parameter's thresholds violate their ordering invariants.
    #[error("invalid parameter '{key}': {reason}")]
    InvalidParameter { key: String, reason: String },

    /// Two parameters share the same identifier.
    #[error("duplicate parameter '{key}'")]
    DuplicateParameter { key: String },

    /// The page origin or an asset path is not a usable URL.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// An environment override had an unusable value.
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

/// Errors surfaced by the cache controller.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An install-time asset could not be fetched; the version is not installed.
    #[error("asset fetch failed for {path}: {reason}")]
    AssetFetchFailure { path: String, reason: String },

    /// A request-time network fetch failed.
    #[error("network failure for {url}: {reason}")]
    NetworkFailure { url: String, reason: String },

    /// Both the network and the cache fallback came up empty.
    #[error("no response for {url}: network failed and cache missed")]
    NoResponse { url: String },

    /// Requests can only be served by an active controller.
    #[error("controller is not active (state: {state})")]
    NotActive { state: String },

    /// A lifecycle event arrived in a state that does not accept it.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// The underlying cache storage failed.
    #[error("cache storage error: {message}")]
    Storage { message: String },

    /// The cache configuration could not be turned into a controller.
    #[error("invalid cache configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type CacheResult<T> = Result<T, CacheError>;
