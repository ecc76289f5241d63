//! Error types for document operations.

use thiserror::Error;

use scrivo_types::{TextBlockId, TextListId};

/// Errors that can occur outside the silent-tolerant CRDT edit path.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Block not found in document.
    #[error("block not found: {0:?}")]
    BlockNotFound(TextBlockId),

    /// List not found in document.
    #[error("list not found: {0:?}")]
    ListNotFound(TextListId),

    /// Index outside the symbol sequence.
    #[error("index {index} out of bounds for document of length {len}")]
    OutOfRange { index: usize, len: usize },

    /// Snapshot failed structural validation.
    #[error("corrupt document snapshot: {0}")]
    Snapshot(String),

    /// Snapshot (de)serialization error.
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] postcard::Error),
}
