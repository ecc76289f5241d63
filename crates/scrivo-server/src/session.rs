//! Per-connection session state.

use scrivo_types::{ClientId, DocumentUri, Profile};

use crate::workspace::WorkspaceHandle;

/// Where a connection is in its lifecycle.
///
/// ```text
///   Connected → Challenged → Authenticated ⇄ InWorkspace
///       ▲            │ fail        │
///       └────────────┴─────────────┘  (logout)
/// ```
pub enum SessionPhase {
    /// Socket up, nobody identified.
    Connected,
    /// Challenge issued, awaiting the unlock token. The issued nonce lives
    /// in the frontend's pending-login table.
    Challenged,
    /// Logged in, no document open.
    Authenticated,
    /// Participating in a workspace.
    InWorkspace {
        uri: DocumentUri,
        handle: WorkspaceHandle,
    },
}

/// One connected client, as the frontend sees it.
pub struct Session {
    pub client_id: ClientId,
    pub phase: SessionPhase,
    /// Set from Authenticated onward.
    pub profile: Option<Profile>,
}

impl Session {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            phase: SessionPhase::Connected,
            profile: None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.profile.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.username.as_str())
    }

    /// The workspace handle when in one.
    pub fn workspace(&self) -> Option<&WorkspaceHandle> {
        match &self.phase {
            SessionPhase::InWorkspace { handle, .. } => Some(handle),
            _ => None,
        }
    }

    /// Back to Authenticated (document closed) or Connected (logout).
    pub fn leave_workspace(&mut self) {
        if matches!(self.phase, SessionPhase::InWorkspace { .. }) {
            self.phase = SessionPhase::Authenticated;
        }
    }

    pub fn reset(&mut self) {
        self.phase = SessionPhase::Connected;
        self.profile = None;
    }
}
