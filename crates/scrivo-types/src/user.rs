//! User records.
//!
//! [`UserRecord`] is the server-side record, credentials included — it never
//! crosses the wire. [`Profile`] is the projection sent in LoginGranted and
//! presence messages.

use serde::{Deserialize, Serialize};

use crate::ids::AuthorId;
use crate::uri::DocumentUri;

/// Full server-side user record, as persisted in the users file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub nickname: String,
    /// Encoded avatar image, opaque to the core.
    pub icon: Option<Vec<u8>>,
    /// Author id assigned at account creation, embedded in fractional
    /// positions and block/list ids minted by this user.
    pub author_id: AuthorId,
    /// Hex-encoded random salt.
    pub salt: String,
    /// Hex-encoded `sha256(password ‖ salt)`.
    pub password_hash: String,
    /// Next document counter; never rewinds, so URIs are not reused after a
    /// document is removed.
    pub doc_counter: u32,
    pub owned_docs: Vec<DocumentUri>,
    pub shared_docs: Vec<DocumentUri>,
}

impl UserRecord {
    /// The wire-safe projection of this record.
    pub fn profile(&self) -> Profile {
        Profile {
            author_id: self.author_id,
            username: self.username.clone(),
            nickname: self.nickname.clone(),
            icon: self.icon.clone(),
        }
    }

    /// Every document this user can open: owned first, then shared.
    pub fn accessible_docs(&self) -> impl Iterator<Item = &DocumentUri> {
        self.owned_docs.iter().chain(self.shared_docs.iter())
    }
}

/// What peers learn about a user: identity and presentation, no credentials.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub author_id: AuthorId,
    pub username: String,
    pub nickname: String,
    pub icon: Option<Vec<u8>>,
}

// ============================================================================
// Tests
// ============================================================================
