//! Error types for the Exemplar classification engine.
//!
//! Errors are split by how far they propagate: configuration problems abort the
//! whole grid, extraction failures are recorded per image, classifier failures
//! abort a single cell, and persistence failures stop the remaining writes.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Exemplar operations.
#[derive(Error, Debug)]
pub enum ExemplarError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Embedding extraction errors
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Classification errors
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// Result persistence errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration and input-layout errors. Always fatal to the grid.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A required input directory does not exist
    #[error("Missing {what} directory: {path}")]
    MissingDirectory { what: &'static str, path: PathBuf },

    /// The class mapping file could not be parsed or holds invalid names
    #[error("Malformed class mapping {path}: {message}")]
    MalformedMapping { path: PathBuf, message: String },

    /// No matchable (non open-set) classes were found
    #[error("Empty class list for category {0}")]
    EmptyClassList(PathBuf),
}

/// Per-image extraction failures. Recorded, never fatal.
#[derive(Error, Debug, Clone)]
pub enum ExtractionError {
    /// File could not be read
    #[error("Cannot read {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// The backbone failed to produce an embedding
    #[error("Backbone failed for {path}: {message}")]
    Backbone { path: PathBuf, message: String },

    /// The backbone could not be loaded
    #[error("Backbone unavailable: {0}")]
    BackboneUnavailable(String),

    /// Embedding took longer than the configured limit
    #[error("Embedding timed out for {path} after {timeout_ms}ms")]
    Timeout { path: PathBuf, timeout_ms: u64 },
}

/// Classification failures. Fatal to one cell only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// No class in the support set has any exemplar
    #[error("Support set is empty (shot={shot_count})")]
    EmptySupportSet { shot_count: usize },

    /// Query and exemplar embeddings disagree on dimension
    #[error("Embedding dimension mismatch: query has {query}, exemplar has {exemplar}")]
    DimensionMismatch { query: usize, exemplar: usize },
}

/// Disk write failures. Fatal to the remaining persistence work.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Creating or writing a file failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding failed
    #[error("Failed to write table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// JSON encoding failed
    #[error("Failed to encode {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Exemplar results.
pub type Result<T> = std::result::Result<T, ExemplarError>;
