//! Wire protocol for Scrivo.
//!
//! Every message travels as one length-prefixed frame:
//!
//! ```text
//! u32 length (BE) | u8 kind | u8 version | body
//! ```
//!
//! `length` counts everything after itself. Strings are `u32`-prefixed UTF-8;
//! formats are property maps (`u16 id` → tagged value) in which unknown
//! property ids survive decode → re-encode untouched, so older peers can relay
//! formats minted by newer ones.
//!
//! [`MessageCodec`] plugs into `tokio_util::codec::{FramedRead, FramedWrite}`.
//! A partial frame never advances decoder state; a frame with an unknown kind
//! byte is skipped silently; a bad version or malformed body is an error, and
//! the connection owner is expected to close.

pub mod auth;
mod codec;
mod error;
mod message;
mod wire;

pub use codec::{MAX_FRAME_LEN, MessageCodec, PROTOCOL_VERSION};
pub use error::ProtocolError;
pub use message::{FailureKind, Message, MessageKind};

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
