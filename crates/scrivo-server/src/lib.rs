//! Scrivo collaboration server.
//!
//! One [`Frontend`] accepts connections and routes pre-workspace traffic
//! (auth, accounts, document lifecycle). Each open document is owned by one
//! [`Workspace`] task — the single thread of control that mutates the
//! canonical document and fans edits out to participants. That task is the
//! linearization point the whole convergence story hangs on.
//!
//! ```text
//!   conn task ──┐                         ┌── outbound mpsc ── writer task
//!   conn task ──┼── mpsc ──▶ Workspace ───┼── outbound mpsc ── writer task
//!   conn task ──┘   (single consumer)     └── outbound mpsc ── writer task
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod frontend;
pub mod registry;
pub mod session;
pub mod store;
pub mod workspace;

pub use config::ServerConfig;
pub use error::ServerError;
pub use frontend::Frontend;
pub use registry::UserRegistry;
pub use session::{Session, SessionPhase};
pub use store::DocumentStore;
pub use workspace::{Workspace, WorkspaceHandle, WorkspaceTable};

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
