//! Error types for the composition engine and its collaborators.
//!
//! Only construction-time failures are meant to reach a host as `Err`;
//! the typing path degrades to empty results instead (see `WordStore` and
//! `Predictor`).

use std::path::PathBuf;

/// Failures of the persistent dictionary store.
#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("record encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported dictionary format: {0}")]
    UnsupportedFormat(String),
}

// redb reports each stage with its own error type; all of them funnel into
// `redb::Error` so `?` works inside a transaction.
macro_rules! redb_stage_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for DictionaryError {
                fn from(e: $ty) -> Self {
                    DictionaryError::Storage(e.into())
                }
            }
        )*
    };
}

redb_stage_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// Failures of the prediction adapter and model backends.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("failed to load model {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Configuration loading and validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors surfaced while assembling an engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
