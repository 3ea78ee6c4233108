// ============================================================================
// spark-store - Errors
// ============================================================================

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by store backends.
///
/// Bindings never surface these: a value that fails to decode reads as the
/// key's default, and a failed persist is logged. They reach callers of the
/// backend APIs (`FileStore::open`, `FileStore::save`, `StoreExt::try_set_value`).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to decode store file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for key `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("value for key `{key}` does not read back unchanged from JSON")]
    Lossy { key: String },

    #[error("failed to persist store to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("store file {path} does not contain a JSON object")]
    NotAnObject { path: PathBuf },
}

impl StoreError {
    /// Whether the error came from the filesystem rather than from the data.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Persist { .. })
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
