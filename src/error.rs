//! Error types for doc-triage.

use std::path::PathBuf;

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Routing error: {0}")]
    Route(#[from] RouteError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Memory store error: {0}")]
    Memory(#[from] MemoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Routing errors — fatal for one input only, never for the batch.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Unsupported input format: {path} (extension: {extension})")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),
}

/// Page-text extraction errors.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No readable text in {path}")]
    Empty { path: PathBuf },
}

/// Inference-service transport errors.
///
/// Every variant is recoverable: the classifier retries once and then
/// falls back to the rules engine. Nothing here ever crashes a run.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Service returned HTTP {status}")]
    Http { status: u16 },

    #[error("Malformed response body: {0}")]
    Body(String),

    #[error("Empty response from inference service")]
    EmptyResponse,
}

/// Memory store errors — fatal to the run. Losing provenance is worse
/// than aborting the batch.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to append record: {0}")]
    Append(#[source] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
