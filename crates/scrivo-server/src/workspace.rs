//! The workspace: one task per open document, the linearization point.
//!
//! All inbound edits for a document funnel through one mpsc channel into one
//! consumer task. The task applies each edit to the canonical document and
//! fans it out:
//!
//! - insert / delete / cursor-move → every participant except the originator;
//! - char-format / block-edit / list-edit → **every participant including the
//!   originator**, which is what imposes the server's total order on
//!   non-commutative format state.
//!
//! Persistence is deferred: edits mark the workspace dirty and a coalescing
//! timer writes the snapshot off the hot path; teardown persists once more.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use scrivo_crdt::Document;
use scrivo_protocol::Message;
use scrivo_types::{ClientId, DocumentUri, Profile};

use crate::error::ServerError;
use crate::store::DocumentStore;
use crate::Result;

/// Shared table of live workspaces, keyed by document URI.
pub type WorkspaceTable = Arc<DashMap<DocumentUri, WorkspaceHandle>>;

enum WorkspaceCommand {
    Join {
        client: ClientId,
        profile: Profile,
        outbound: mpsc::UnboundedSender<Message>,
        ready: oneshot::Sender<()>,
    },
    Leave {
        client: ClientId,
    },
    Edit {
        client: ClientId,
        message: Message,
    },
    ProfileChanged {
        client: ClientId,
        profile: Profile,
    },
}

/// Cheap cloneable handle for feeding a workspace's command queue.
#[derive(Clone)]
pub struct WorkspaceHandle {
    uri: DocumentUri,
    tx: mpsc::UnboundedSender<WorkspaceCommand>,
}

impl WorkspaceHandle {
    pub fn uri(&self) -> &DocumentUri {
        &self.uri
    }

    /// Register a participant. The workspace pushes the bootstrap
    /// (DocumentReady, then the presence roster) into `outbound` before any
    /// subsequent edit, so the joiner's stream is gap-free.
    pub async fn join(
        &self,
        client: ClientId,
        profile: Profile,
        outbound: mpsc::UnboundedSender<Message>,
    ) -> Result<()> {
        let (ready, done) = oneshot::channel();
        self.tx
            .send(WorkspaceCommand::Join {
                client,
                profile,
                outbound,
                ready,
            })
            .map_err(|_| ServerError::WorkspaceGone(self.uri.clone()))?;
        done.await
            .map_err(|_| ServerError::WorkspaceGone(self.uri.clone()))
    }

    pub fn leave(&self, client: ClientId) {
        let _ = self.tx.send(WorkspaceCommand::Leave { client });
    }

    pub fn edit(&self, client: ClientId, message: Message) {
        let _ = self.tx.send(WorkspaceCommand::Edit { client, message });
    }

    pub fn profile_changed(&self, client: ClientId, profile: Profile) {
        let _ = self
            .tx
            .send(WorkspaceCommand::ProfileChanged { client, profile });
    }

    fn same_channel(&self, other: &WorkspaceHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

struct Participant {
    profile: Profile,
    outbound: mpsc::UnboundedSender<Message>,
}

/// The single-consumer dispatcher owning one canonical document.
pub struct Workspace {
    document: Document,
    participants: HashMap<ClientId, Participant>,
    store: DocumentStore,
    save_interval: Duration,
    dirty: bool,
    rx: mpsc::UnboundedReceiver<WorkspaceCommand>,
    handle: WorkspaceHandle,
    table: WorkspaceTable,
}

impl Workspace {
    /// Spawn the workspace task and return its handle. The caller is
    /// expected to insert the handle into `table`; the task removes itself
    /// on teardown.
    pub fn spawn(
        document: Document,
        store: DocumentStore,
        save_interval: Duration,
        table: WorkspaceTable,
    ) -> WorkspaceHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = WorkspaceHandle {
            uri: document.uri().clone(),
            tx,
        };
        let workspace = Workspace {
            document,
            participants: HashMap::new(),
            store,
            save_interval,
            dirty: false,
            rx,
            handle: handle.clone(),
            table,
        };
        tokio::spawn(workspace.run());
        handle
    }

    async fn run(mut self) {
        let uri = self.handle.uri.clone();
        info!(%uri, "workspace started");

        let mut save = tokio::time::interval(self.save_interval);
        save.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut had_participant = false;

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(WorkspaceCommand::Join { client, profile, outbound, ready }) => {
                        had_participant = true;
                        self.handle_join(client, profile, outbound, ready);
                    }
                    Some(WorkspaceCommand::Leave { client }) => {
                        self.handle_leave(client);
                        if had_participant && self.participants.is_empty() {
                            break;
                        }
                    }
                    Some(WorkspaceCommand::Edit { client, message }) => {
                        self.handle_edit(client, message);
                    }
                    Some(WorkspaceCommand::ProfileChanged { client, profile }) => {
                        self.handle_profile_changed(client, profile);
                    }
                    None => break,
                },
                _ = save.tick(), if self.dirty => self.persist().await,
            }
        }

        self.persist().await;
        // Drop our table entry unless the frontend already replaced it.
        let own = self.handle.clone();
        self.table.remove_if(&uri, |_, existing| existing.same_channel(&own));
        info!(%uri, "workspace closed");
    }

    fn handle_join(
        &mut self,
        client: ClientId,
        profile: Profile,
        outbound: mpsc::UnboundedSender<Message>,
        ready: oneshot::Sender<()>,
    ) {
        info!(uri = %self.handle.uri, %client, user = %profile.username, "participant joined");

        // Bootstrap: full document, then the current roster. Ordering with
        // later edits is guaranteed by the outbound channel's FIFO.
        let _ = outbound.send(Message::DocumentReady {
            snapshot: self.document.snapshot(),
        });
        for participant in self.participants.values() {
            let _ = outbound.send(Message::PresenceAdd {
                profile: participant.profile.clone(),
            });
        }

        self.broadcast_except(
            client,
            Message::PresenceAdd {
                profile: profile.clone(),
            },
        );
        self.participants.insert(client, Participant { profile, outbound });
        let _ = ready.send(());
    }

    fn handle_leave(&mut self, client: ClientId) {
        let Some(participant) = self.participants.remove(&client) else {
            return;
        };
        info!(
            uri = %self.handle.uri,
            %client,
            user = %participant.profile.username,
            "participant left"
        );
        self.broadcast_except(
            client,
            Message::PresenceRemove {
                author: participant.profile.author_id,
            },
        );
    }

    fn handle_edit(&mut self, client: ClientId, message: Message) {
        // Edits queued behind a Leave (disconnect) are discarded.
        if !self.participants.contains_key(&client) {
            debug!(%client, "dropping edit from departed participant");
            return;
        }

        match &message {
            Message::CharInsert { symbol, .. } => {
                self.document.insert(symbol.clone());
            }
            Message::CharDelete { pos } => {
                self.document.remove(pos);
            }
            Message::CharFormat { pos, format } => {
                self.document.format_symbol(pos, format.clone());
            }
            Message::BlockEdit { block, format } => {
                self.document.format_block(block, format.clone());
            }
            Message::ListEdit {
                block,
                list,
                format,
            } => {
                self.document.edit_block_list(*block, *list, format.clone());
            }
            Message::CursorMove { .. } => {
                // Presence only; nothing to apply or persist.
                self.broadcast_except(client, message);
                return;
            }
            other => {
                debug!(kind = %other.kind(), "dropping unexpected message in workspace");
                return;
            }
        }

        self.dirty = true;
        if message.is_format_edit() {
            self.broadcast_all(message);
        } else {
            self.broadcast_except(client, message);
        }
    }

    fn handle_profile_changed(&mut self, client: ClientId, profile: Profile) {
        if let Some(participant) = self.participants.get_mut(&client) {
            participant.profile = profile.clone();
        }
        self.broadcast_except(client, Message::PresenceUpdate { profile });
    }

    fn broadcast_all(&self, message: Message) {
        for participant in self.participants.values() {
            let _ = participant.outbound.send(message.clone());
        }
    }

    fn broadcast_except(&self, skip: ClientId, message: Message) {
        for (id, participant) in &self.participants {
            if *id != skip {
                let _ = participant.outbound.send(message.clone());
            }
        }
    }

    async fn persist(&mut self) {
        let snapshot = self.document.snapshot();
        match self.store.save_document(&snapshot).await {
            Ok(()) => self.dirty = false,
            Err(e) => {
                // Stays dirty; the next tick retries.
                error!(uri = %self.handle.uri, error = %e, "document persist failed");
            }
        }
    }
}

// A workspace that outlives its channel would leak its document; warn if the
// task ends with participants still registered.
impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.participants.is_empty() {
            warn!(
                uri = %self.handle.uri,
                participants = self.participants.len(),
                "workspace dropped with live participants"
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
