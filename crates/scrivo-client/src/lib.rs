//! Client-side core for Scrivo.
//!
//! [`DocumentEditor`] is the bridge between the platform text widget (behind
//! the [`EditorView`] trait) and the replicated [`scrivo_crdt::Document`]:
//! local view events become document mutations plus outbound messages, remote
//! messages become document mutations plus view updates. The editor is
//! single-threaded with respect to its document and view.
//!
//! [`Connection`] and [`Client`] drive the wire: framed transport, the login
//! handshake, document lifecycle calls, and the in-session message pump.

mod connection;
mod editor;
mod error;
mod view;

pub use connection::{Client, Connection, serve_editor};
pub use editor::DocumentEditor;
pub use error::ClientError;
pub use view::{EditorView, PresenceView};

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
