//! Protocol error types.

use thiserror::Error;

/// Errors raised while framing or parsing messages.
///
/// Any of these surfacing from the decoder means the stream can no longer be
/// trusted; the owning connection closes it.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("frame of {0} bytes exceeds the maximum")]
    FrameTooLarge(usize),

    #[error("frame too short to carry a message")]
    FrameTooShort,

    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u8, got: u8 },

    #[error("message body truncated")]
    Truncated,

    #[error("invalid UTF-8 in string field")]
    BadUtf8(#[from] std::string::FromUtf8Error),

    #[error("unknown property value tag {0}")]
    BadValueTag(u8),

    #[error("invalid character scalar {0:#x}")]
    BadChar(u32),

    #[error("malformed field: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
