//! The message set.

use scrivo_crdt::{DocumentSnapshot, FracPos, Symbol};
use scrivo_types::{
    AuthorId, BlockFormat, CharFormat, DocumentUri, ListFormat, Profile, TextBlockId, TextListId,
};

/// Single-byte message tags. Values are wire-stable; gaps leave room for new
/// messages within each family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::FromRepr)]
#[repr(u8)]
pub enum MessageKind {
    LoginRequest = 0x01,
    LoginChallenge = 0x02,
    LoginUnlock = 0x03,
    LoginGranted = 0x04,
    LoginDenied = 0x05,
    Logout = 0x06,

    AccountCreate = 0x10,
    AccountUpdate = 0x11,
    AccountConfirmed = 0x12,
    AccountDenied = 0x13,

    DocumentCreate = 0x20,
    DocumentOpen = 0x21,
    DocumentRemove = 0x22,
    DocumentDismissed = 0x23,
    DocumentClose = 0x24,
    DocumentReady = 0x25,

    CharInsert = 0x30,
    CharDelete = 0x31,
    CharFormat = 0x32,
    BlockEdit = 0x33,
    ListEdit = 0x34,

    CursorMove = 0x40,
    PresenceAdd = 0x41,
    PresenceUpdate = 0x42,
    PresenceRemove = 0x43,

    Failure = 0x50,
}

/// Failure categories reported to the client while keeping the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[derive(strum::Display, strum::FromRepr)]
#[repr(u8)]
pub enum FailureKind {
    UnknownUser = 1,
    BadCredentials = 2,
    NotLoggedIn = 3,
    DocumentNotFound = 4,
    NameCollision = 5,
    PermissionDenied = 6,
    Internal = 7,
}

/// A protocol message. The variants mirror [`MessageKind`] one-to-one.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    // ── Login ───────────────────────────────────────────────────────────
    LoginRequest {
        username: String,
    },
    /// Salt for the stored digest plus a fresh per-attempt nonce.
    LoginChallenge {
        salt: String,
        nonce: String,
    },
    /// `sha256(sha256(password ‖ salt) ‖ nonce)`, hex-encoded.
    LoginUnlock {
        token: String,
    },
    LoginGranted {
        profile: Profile,
    },
    LoginDenied {
        reason: String,
    },
    Logout,

    // ── Account ─────────────────────────────────────────────────────────
    AccountCreate {
        username: String,
        nickname: String,
        icon: Option<Vec<u8>>,
        password: String,
    },
    /// Partial update; `None` fields are left unchanged.
    AccountUpdate {
        nickname: Option<String>,
        icon: Option<Vec<u8>>,
        password: Option<String>,
    },
    AccountConfirmed {
        profile: Profile,
    },
    AccountDenied {
        reason: String,
    },

    // ── Document lifecycle ──────────────────────────────────────────────
    DocumentCreate {
        name: String,
    },
    DocumentOpen {
        uri: DocumentUri,
    },
    DocumentRemove {
        uri: DocumentUri,
    },
    DocumentDismissed {
        uri: DocumentUri,
    },
    DocumentClose,
    /// Full-state bootstrap for a joining participant.
    DocumentReady {
        snapshot: DocumentSnapshot,
    },

    // ── Edits ───────────────────────────────────────────────────────────
    CharInsert {
        symbol: Symbol,
        is_last: bool,
    },
    CharDelete {
        pos: FracPos,
    },
    CharFormat {
        pos: FracPos,
        format: CharFormat,
    },
    BlockEdit {
        block: TextBlockId,
        format: BlockFormat,
    },
    ListEdit {
        block: TextBlockId,
        list: Option<TextListId>,
        format: ListFormat,
    },

    // ── Presence ────────────────────────────────────────────────────────
    CursorMove {
        author: AuthorId,
        index: u32,
    },
    PresenceAdd {
        profile: Profile,
    },
    PresenceUpdate {
        profile: Profile,
    },
    PresenceRemove {
        author: AuthorId,
    },

    // ── Errors ──────────────────────────────────────────────────────────
    Failure {
        kind: FailureKind,
        context: String,
    },
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::LoginRequest { .. } => MessageKind::LoginRequest,
            Message::LoginChallenge { .. } => MessageKind::LoginChallenge,
            Message::LoginUnlock { .. } => MessageKind::LoginUnlock,
            Message::LoginGranted { .. } => MessageKind::LoginGranted,
            Message::LoginDenied { .. } => MessageKind::LoginDenied,
            Message::Logout => MessageKind::Logout,
            Message::AccountCreate { .. } => MessageKind::AccountCreate,
            Message::AccountUpdate { .. } => MessageKind::AccountUpdate,
            Message::AccountConfirmed { .. } => MessageKind::AccountConfirmed,
            Message::AccountDenied { .. } => MessageKind::AccountDenied,
            Message::DocumentCreate { .. } => MessageKind::DocumentCreate,
            Message::DocumentOpen { .. } => MessageKind::DocumentOpen,
            Message::DocumentRemove { .. } => MessageKind::DocumentRemove,
            Message::DocumentDismissed { .. } => MessageKind::DocumentDismissed,
            Message::DocumentClose => MessageKind::DocumentClose,
            Message::DocumentReady { .. } => MessageKind::DocumentReady,
            Message::CharInsert { .. } => MessageKind::CharInsert,
            Message::CharDelete { .. } => MessageKind::CharDelete,
            Message::CharFormat { .. } => MessageKind::CharFormat,
            Message::BlockEdit { .. } => MessageKind::BlockEdit,
            Message::ListEdit { .. } => MessageKind::ListEdit,
            Message::CursorMove { .. } => MessageKind::CursorMove,
            Message::PresenceAdd { .. } => MessageKind::PresenceAdd,
            Message::PresenceUpdate { .. } => MessageKind::PresenceUpdate,
            Message::PresenceRemove { .. } => MessageKind::PresenceRemove,
            Message::Failure { .. } => MessageKind::Failure,
        }
    }

    /// True for the edit messages a workspace applies to its document.
    pub fn is_edit(&self) -> bool {
        matches!(
            self.kind(),
            MessageKind::CharInsert
                | MessageKind::CharDelete
                | MessageKind::CharFormat
                | MessageKind::BlockEdit
                | MessageKind::ListEdit
        )
    }

    /// True for format-class messages, which the server echoes to every
    /// participant (originator included) to impose its total order.
    pub fn is_format_edit(&self) -> bool {
        matches!(
            self.kind(),
            MessageKind::CharFormat | MessageKind::BlockEdit | MessageKind::ListEdit
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        assert_eq!(MessageKind::from_repr(0x30), Some(MessageKind::CharInsert));
        assert_eq!(MessageKind::from_repr(0xff), None);
        assert_eq!(Message::Logout.kind(), MessageKind::Logout);
    }

    #[test]
    fn test_dispatch_classes() {
        let format = Message::CharFormat {
            pos: FracPos::new(vec![3], AuthorId(1)),
            format: CharFormat::new(),
        };
        assert!(format.is_edit());
        assert!(format.is_format_edit());

        let delete = Message::CharDelete {
            pos: FracPos::new(vec![3], AuthorId(1)),
        };
        assert!(delete.is_edit());
        assert!(!delete.is_format_edit());

        let cursor = Message::CursorMove {
            author: AuthorId(1),
            index: 0,
        };
        assert!(!cursor.is_edit());
    }
}
