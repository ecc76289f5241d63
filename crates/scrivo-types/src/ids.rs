//! Typed identifiers for authors, blocks, lists and connections.
//!
//! `AuthorId` is the server-assigned per-user integer that rides inside
//! fractional positions; id 0 is reserved for the system author, which owns
//! document sentinels. Block and list ids are `(counter, author)` pairs where
//! the counter is per-author monotonic, so ids are globally unique without
//! coordination.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned author identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub u32);

impl AuthorId {
    /// The reserved system author (document sentinels, never a real user).
    pub const SYSTEM: AuthorId = AuthorId(0);

    pub fn is_system(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorId({})", self.0)
    }
}

/// Per-connection identifier on the server, never reused within a run.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

// ── Block / list ids ────────────────────────────────────────────────────────

macro_rules! impl_counter_id {
    ($T:ident, $name:literal) => {
        /// Globally unique `(counter, author)` identifier.
        #[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $T {
            pub counter: u32,
            pub author: AuthorId,
        }

        impl $T {
            pub fn new(counter: u32, author: AuthorId) -> Self {
                Self { counter, author }
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}@{}", self.counter, self.author)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}@{})", $name, self.counter, self.author)
            }
        }
    };
}

impl_counter_id!(TextBlockId, "TextBlockId");
impl_counter_id!(TextListId, "TextListId");

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_author() {
        assert!(AuthorId::SYSTEM.is_system());
        assert!(!AuthorId(3).is_system());
    }

    #[test]
    fn test_block_id_ordering_is_counter_first() {
        let a = TextBlockId::new(1, AuthorId(9));
        let b = TextBlockId::new(2, AuthorId(1));
        assert!(a < b);
    }

    #[test]
    fn test_debug_shows_type_name() {
        let id = TextListId::new(4, AuthorId(2));
        assert_eq!(format!("{:?}", id), "TextListId(4@2)");
        assert_eq!(id.to_string(), "4@2");
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = TextBlockId::new(7, AuthorId(3));
        let json = serde_json::to_string(&id).unwrap();
        let parsed: TextBlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_postcard_roundtrip() {
        let id = TextListId::new(7, AuthorId(3));
        let bytes = postcard::to_stdvec(&id).unwrap();
        let parsed: TextListId = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(id, parsed);
    }
}
