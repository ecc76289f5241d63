//! Shared vocabulary types for Scrivo — the collaborative text editing core.
//!
//! This crate holds the types every other crate speaks:
//!
//! - **Identifiers**: [`AuthorId`], [`TextBlockId`], [`TextListId`], [`ClientId`]
//! - **Formats**: property-map based [`CharFormat`], [`BlockFormat`], [`ListFormat`]
//! - **Users**: [`UserRecord`] (server-side, credentials included) and
//!   [`Profile`] (the wire-safe projection)
//! - **Document naming**: [`DocumentUri`]
//!
//! Nothing in here does I/O; it is pure data with serde derives.

mod format;
mod ids;
mod uri;
mod user;

pub use format::{
    Alignment, BlockFormat, CharFormat, FormatMap, ListFormat, ListStyle, PropValue,
};
pub use ids::{AuthorId, ClientId, TextBlockId, TextListId};
pub use uri::{DocumentUri, UriError};
pub use user::{Profile, UserRecord};
