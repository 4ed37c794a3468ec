//! Error types for the store core.
//!
//! [`StoreError`] covers every failure the public API can surface:
//! lookup misses, broken reference graphs, background-load failures, and
//! file I/O. No error is swallowed anywhere in the crate; the only
//! recovered condition is a duplicate question on append, which is
//! reported as an info-level trace line, not an error.

use std::path::PathBuf;

use thiserror::Error;

/// All failure modes of the dataset and test-case stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested fingerprint is not present in the dataset store.
    #[error("no index stored under fingerprint '{0}'")]
    KeyNotFound(String),

    /// A reference chunk points at a collection the pool does not hold.
    #[error("reference points at unknown collection '{0}'")]
    UnknownCollection(String),

    /// A by-source reference names an entry the target collection lacks.
    #[error("collection '{collection}' has no entry named '{source_name}'")]
    UnknownSource {
        collection: String,
        source_name: String,
    },

    /// A by-position reference lies past the end of the target sequence.
    #[error("position {position} is out of range for collection '{collection}'")]
    IndexOutOfRange { collection: String, position: usize },

    /// Reference resolution revisited a `(collection, source)` pair.
    ///
    /// The pool is a DAG by construction, so a cycle means the stored
    /// data was corrupted or mis-imported.
    #[error("reference cycle detected at '{collection}' / '{source_name}'")]
    CorruptReference {
        collection: String,
        source_name: String,
    },

    /// A background load task failed; surfaced at the first operation
    /// that needed the store, and on every operation after it.
    #[error("loading store file {} failed: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    /// Underlying filesystem failure during load or save.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A store file could not be serialised during save.
    #[error("failed to encode store file {}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A store file exists but does not parse as the expected mapping.
    #[error("failed to decode store file {}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StoreError>;
