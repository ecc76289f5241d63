//! Client error types.

use thiserror::Error;

use scrivo_protocol::{FailureKind, MessageKind, ProtocolError};

/// Errors from the client connection and handshake paths.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("login denied: {0}")]
    LoginDenied(String),

    #[error("account request denied: {0}")]
    AccountDenied(String),

    #[error("server failure ({kind}): {context}")]
    Failure { kind: FailureKind, context: String },

    #[error("unexpected message {0} during handshake")]
    UnexpectedMessage(MessageKind),
}
