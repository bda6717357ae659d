//! Error types for the kgqa reasoning engine.
//!
//! Only startup work (configuration, snapshot loading, cache warm-up) and the
//! live graph access layer return these errors. Question answering recovers
//! from every failure locally and records it on the reasoning chain instead.

use thiserror::Error;

/// Main error type for kgqa operations.
#[derive(Error, Debug)]
pub enum KgqaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Graph store error: {0}")]
    Store(#[from] StoreError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors raised by a graph store backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    #[error("Graph query timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Failed to decode row: {0}")]
    Decode(String),

    #[error("Unknown entity id in snapshot: {0}")]
    DanglingReference(String),
}

impl StoreError {
    /// Whether the failure means the store could not answer at all.
    ///
    /// Callers degrade to cached results for these instead of reporting a
    /// negative answer.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout { .. })
    }
}

/// Errors raised while loading or building a knowledge snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("Duplicate canonical name '{name}' for label {label}")]
    DuplicateCanonicalName { name: String, label: String },

    #[error("Alias '{alias}' points at unknown canonical name '{canonical}'")]
    UnknownAliasTarget { alias: String, canonical: String },
}

/// Result type alias for kgqa operations.
pub type Result<T> = std::result::Result<T, KgqaError>;
