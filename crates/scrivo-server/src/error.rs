//! Server error types.

use thiserror::Error;

use scrivo_crdt::DocumentError;
use scrivo_protocol::ProtocolError;

/// Errors on the server side. Client-visible conditions are converted to
/// `Failure` messages at the frontend; these surface in logs and at task
/// boundaries.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("username '{0}' is already taken")]
    UserExists(String),

    #[error("unknown user '{0}'")]
    UnknownUser(String),

    #[error("invalid username '{0}': {1}")]
    InvalidUsername(String, &'static str),

    #[error("document name '{0}' is already in use")]
    NameCollision(String),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("persistence error: {0}")]
    Persist(String),

    #[error("workspace for {0} is gone")]
    WorkspaceGone(scrivo_types::DocumentUri),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}
