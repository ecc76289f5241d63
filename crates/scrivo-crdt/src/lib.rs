//! Fractional-position CRDT document model for Scrivo.
//!
//! # Architecture
//!
//! The document is an ordered sequence of [`Symbol`]s, each pinned to a dense
//! [`FracPos`] identifier. Because positions are totally ordered and globally
//! unique, concurrent inserts and deletes commute: every replica that applies
//! the same set of operations converges to the same sequence, no matter the
//! arrival order.
//!
//! On top of the sequence sit two tables:
//!
//! - **Blocks** — paragraph containers, each owned by the newline symbol that
//!   terminates it.
//! - **Lists** — ordered groups of blocks sharing a list format.
//!
//! Formats are *not* commutative; they converge through the server-imposed
//! total order (see `scrivo-server`), so the operations here are plain
//! last-writer-wins and silently tolerate targets that no longer exist.

mod document;
mod error;
mod pos;
mod symbol;

pub use document::{Document, DocumentSnapshot, TextBlock, TextList};
pub use error::DocumentError;
pub use pos::{BASE, FracPos};
pub use symbol::Symbol;

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
