//! The server frontend: accepts connections, drives per-connection sessions,
//! and routes pre-workspace traffic (auth, accounts, document lifecycle).
//!
//! Each connection gets a reader loop (this module) and a writer task fed by
//! an unbounded channel; the same channel is handed to the workspace on join,
//! so bootstrap, broadcasts and direct replies share one FIFO to the socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use scrivo_crdt::Document;
use scrivo_protocol::{FailureKind, Message, MessageCodec};
use scrivo_types::{ClientId, DocumentUri};

use crate::auth::{generate_nonce, verify_unlock};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::registry::UserRegistry;
use crate::session::{Session, SessionPhase};
use crate::store::DocumentStore;
use crate::workspace::{Workspace, WorkspaceTable};
use crate::Result;

type Outbound = mpsc::UnboundedSender<Message>;

struct PendingLogin {
    username: String,
    nonce: String,
}

/// Shared server state plus the accept loop.
pub struct Frontend {
    config: ServerConfig,
    store: DocumentStore,
    users: UserRegistry,
    workspaces: WorkspaceTable,
    pending_logins: DashMap<ClientId, PendingLogin>,
    next_client: AtomicU64,
}

impl Frontend {
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>> {
        let store = DocumentStore::new(&config.data_dir);
        let records = store.load_users().await?;
        info!(users = records.len(), data_dir = %config.data_dir.display(), "registry loaded");
        Ok(Arc::new(Self {
            config,
            store,
            users: UserRegistry::new(records),
            workspaces: Arc::new(DashMap::new()),
            pending_logins: DashMap::new(),
            next_client: AtomicU64::new(1),
        }))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accept loop; runs until the listener fails fatally.
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        info!(addr = %listener.local_addr()?, "listening");
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "connection accepted");
                    let frontend = self.clone();
                    tokio::spawn(frontend.handle_connection(stream));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }

    /// Drive one connection to completion. Public so tests can connect over
    /// in-memory streams.
    pub async fn handle_connection<S>(self: Arc<Self>, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let client_id = ClientId(self.next_client.fetch_add(1, Ordering::Relaxed));
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FramedRead::new(read_half, MessageCodec);

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            let mut writer = FramedWrite::new(write_half, MessageCodec);
            while let Some(message) = out_rx.recv().await {
                if let Err(e) = writer.send(message).await {
                    debug!(error = %e, "write side closed");
                    break;
                }
            }
        });

        let mut session = Session::new(client_id);
        while let Some(next) = reader.next().await {
            match next {
                Ok(message) => {
                    if let Err(e) = self.handle_message(&mut session, &out_tx, message).await {
                        error!(client = %client_id, error = %e, "session error, closing");
                        break;
                    }
                }
                Err(e) => {
                    // Malformed frame or version mismatch: the stream is
                    // untrustworthy from here on.
                    warn!(client = %client_id, error = %e, "protocol error, closing");
                    break;
                }
            }
        }

        self.disconnect(&mut session);
        drop(out_tx);
        let _ = writer.await;
        debug!(client = %client_id, "connection closed");
    }

    fn disconnect(&self, session: &mut Session) {
        self.pending_logins.remove(&session.client_id);
        if let Some(handle) = session.workspace() {
            handle.leave(session.client_id);
        }
        if let Some(username) = session.username() {
            info!(client = %session.client_id, user = username, "disconnected");
        }
        session.reset();
    }

    // ── Message routing ─────────────────────────────────────────────────────

    async fn handle_message(
        &self,
        session: &mut Session,
        out: &Outbound,
        message: Message,
    ) -> Result<()> {
        match message {
            Message::LoginRequest { username } => self.serve_login_request(session, out, username),
            Message::LoginUnlock { token } => self.authenticate(session, out, token),
            Message::Logout => {
                if let Some(handle) = session.workspace() {
                    handle.leave(session.client_id);
                }
                info!(client = %session.client_id, user = ?session.username(), "logout");
                session.reset();
                Ok(())
            }

            Message::AccountCreate {
                username,
                nickname,
                icon,
                password,
            } => {
                self.create_account(session, out, username, nickname, icon, password)
                    .await
            }
            Message::AccountUpdate {
                nickname,
                icon,
                password,
            } => self.update_account(session, out, nickname, icon, password).await,

            Message::DocumentCreate { name } => self.create_document(session, out, name).await,
            Message::DocumentOpen { uri } => self.open_document(session, out, uri).await,
            Message::DocumentRemove { uri } => self.remove_document(session, out, uri).await,
            Message::DocumentClose => {
                if let Some(handle) = session.workspace() {
                    handle.leave(session.client_id);
                }
                session.leave_workspace();
                Ok(())
            }

            edit @ (Message::CharInsert { .. }
            | Message::CharDelete { .. }
            | Message::CharFormat { .. }
            | Message::BlockEdit { .. }
            | Message::ListEdit { .. }
            | Message::CursorMove { .. }) => {
                match session.workspace() {
                    Some(handle) => handle.edit(session.client_id, edit),
                    None => self.fail(out, FailureKind::NotLoggedIn, "no open document"),
                }
                Ok(())
            }

            // Server-to-client kinds arriving from a client are dropped
            // silently, like unknown kinds at the codec.
            other => {
                debug!(client = %session.client_id, kind = %other.kind(), "dropping unexpected message");
                Ok(())
            }
        }
    }

    fn send(&self, out: &Outbound, message: Message) {
        let _ = out.send(message);
    }

    fn fail(&self, out: &Outbound, kind: FailureKind, context: impl Into<String>) {
        self.send(
            out,
            Message::Failure {
                kind,
                context: context.into(),
            },
        );
    }

    // ── Login ───────────────────────────────────────────────────────────────

    fn serve_login_request(
        &self,
        session: &mut Session,
        out: &Outbound,
        username: String,
    ) -> Result<()> {
        let Some(record) = self.users.get(&username) else {
            self.send(
                out,
                Message::LoginDenied {
                    reason: format!("unknown user '{username}'"),
                },
            );
            return Ok(());
        };

        let nonce = generate_nonce();
        self.pending_logins.insert(
            session.client_id,
            PendingLogin {
                username,
                nonce: nonce.clone(),
            },
        );
        session.phase = SessionPhase::Challenged;
        self.send(
            out,
            Message::LoginChallenge {
                salt: record.salt,
                nonce,
            },
        );
        Ok(())
    }

    fn authenticate(&self, session: &mut Session, out: &Outbound, token: String) -> Result<()> {
        let Some((_, pending)) = self.pending_logins.remove(&session.client_id) else {
            self.fail(out, FailureKind::NotLoggedIn, "no login in progress");
            return Ok(());
        };

        let verified = self
            .users
            .get(&pending.username)
            .filter(|r| verify_unlock(&r.password_hash, &pending.nonce, &token));

        let Some(record) = verified else {
            session.phase = SessionPhase::Connected;
            self.send(
                out,
                Message::LoginDenied {
                    reason: "bad credentials".into(),
                },
            );
            return Ok(());
        };

        info!(client = %session.client_id, user = %record.username, "login granted");
        session.phase = SessionPhase::Authenticated;
        session.profile = Some(record.profile());
        self.send(
            out,
            Message::LoginGranted {
                profile: record.profile(),
            },
        );
        Ok(())
    }

    // ── Accounts ────────────────────────────────────────────────────────────

    async fn create_account(
        &self,
        session: &mut Session,
        out: &Outbound,
        username: String,
        nickname: String,
        icon: Option<Vec<u8>>,
        password: String,
    ) -> Result<()> {
        if session.is_logged_in() {
            self.send(
                out,
                Message::AccountDenied {
                    reason: "already logged in".into(),
                },
            );
            return Ok(());
        }

        match self.users.create(&username, &nickname, icon, &password) {
            Ok(record) => {
                info!(client = %session.client_id, user = %record.username, "account created");
                self.persist_users().await;
                if let Err(e) = self.store.save_user_index(&record).await {
                    error!(user = %record.username, error = %e, "user index write failed");
                }
                // A confirmed account is also a login.
                session.phase = SessionPhase::Authenticated;
                session.profile = Some(record.profile());
                self.send(
                    out,
                    Message::AccountConfirmed {
                        profile: record.profile(),
                    },
                );
            }
            Err(e) => self.send(
                out,
                Message::AccountDenied {
                    reason: e.to_string(),
                },
            ),
        }
        Ok(())
    }

    async fn update_account(
        &self,
        session: &mut Session,
        out: &Outbound,
        nickname: Option<String>,
        icon: Option<Vec<u8>>,
        password: Option<String>,
    ) -> Result<()> {
        let Some(username) = session.username().map(str::to_string) else {
            self.fail(out, FailureKind::NotLoggedIn, "account update");
            return Ok(());
        };

        match self.users.update(&username, nickname, icon, password) {
            Ok(record) => {
                self.persist_users().await;
                session.profile = Some(record.profile());
                if let Some(handle) = session.workspace() {
                    handle.profile_changed(session.client_id, record.profile());
                }
                self.send(
                    out,
                    Message::AccountConfirmed {
                        profile: record.profile(),
                    },
                );
            }
            Err(e) => self.send(
                out,
                Message::AccountDenied {
                    reason: e.to_string(),
                },
            ),
        }
        Ok(())
    }

    // ── Document lifecycle ──────────────────────────────────────────────────

    async fn create_document(
        &self,
        session: &mut Session,
        out: &Outbound,
        name: String,
    ) -> Result<()> {
        let Some(username) = session.username().map(str::to_string) else {
            self.fail(out, FailureKind::NotLoggedIn, "document create");
            return Ok(());
        };
        if session.workspace().is_some() {
            self.fail(out, FailureKind::PermissionDenied, "close the current document first");
            return Ok(());
        }

        let uri = match self.users.register_document(&username, &name) {
            Ok(uri) => uri,
            Err(ServerError::NameCollision(name)) => {
                self.fail(out, FailureKind::NameCollision, name);
                return Ok(());
            }
            Err(e) => {
                self.fail(out, FailureKind::Internal, e.to_string());
                return Ok(());
            }
        };

        let document = Document::new(&name, uri.clone());
        if let Err(e) = self.store.save_document(&document.snapshot()).await {
            error!(%uri, error = %e, "initial document persist failed");
            self.users.unregister_document(&uri);
            self.fail(out, FailureKind::Internal, "could not persist document");
            return Ok(());
        }
        self.persist_users().await;
        if let Some(record) = self.users.get(&username) {
            let _ = self.store.save_user_index(&record).await;
        }
        info!(client = %session.client_id, %uri, "document created");

        // Creating opens: hand the session straight to a workspace.
        self.join_workspace(session, out, uri).await;
        Ok(())
    }

    async fn open_document(
        &self,
        session: &mut Session,
        out: &Outbound,
        uri: DocumentUri,
    ) -> Result<()> {
        let Some(username) = session.username().map(str::to_string) else {
            self.fail(out, FailureKind::NotLoggedIn, "document open");
            return Ok(());
        };
        if session.workspace().is_some() {
            self.fail(out, FailureKind::PermissionDenied, "close the current document first");
            return Ok(());
        }

        if self.join_workspace(session, out, uri.clone()).await {
            // Holding the URI is holding the share token.
            if username != uri.author {
                match self.users.grant_shared(&username, &uri) {
                    Ok(record) => {
                        self.persist_users().await;
                        let _ = self.store.save_user_index(&record).await;
                    }
                    Err(e) => warn!(user = %username, %uri, error = %e, "share grant failed"),
                }
            }
        }
        Ok(())
    }

    async fn remove_document(
        &self,
        session: &mut Session,
        out: &Outbound,
        uri: DocumentUri,
    ) -> Result<()> {
        let Some(username) = session.username().map(str::to_string) else {
            self.fail(out, FailureKind::NotLoggedIn, "document remove");
            return Ok(());
        };
        if uri.author != username {
            self.fail(out, FailureKind::PermissionDenied, uri.to_string());
            return Ok(());
        }
        if self.workspaces.contains_key(&uri) {
            self.fail(out, FailureKind::PermissionDenied, "document is open");
            return Ok(());
        }
        match self.store.load_document(&uri).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.fail(out, FailureKind::DocumentNotFound, uri.to_string());
                return Ok(());
            }
            Err(e) => {
                self.fail(out, FailureKind::Internal, e.to_string());
                return Ok(());
            }
        }

        if let Err(e) = self.store.remove_document(&uri).await {
            self.fail(out, FailureKind::Internal, e.to_string());
            return Ok(());
        }
        self.users.unregister_document(&uri);
        self.persist_users().await;
        if let Some(record) = self.users.get(&username) {
            let _ = self.store.save_user_index(&record).await;
        }
        info!(client = %session.client_id, %uri, "document removed");
        self.send(out, Message::DocumentDismissed { uri });
        Ok(())
    }

    /// Find or spawn the workspace for `uri` and join it. Reports failures
    /// to the client itself; returns whether the join happened.
    async fn join_workspace(&self, session: &mut Session, out: &Outbound, uri: DocumentUri) -> bool {
        let profile = match &session.profile {
            Some(profile) => profile.clone(),
            None => return false,
        };

        // Two attempts: a workspace tearing down can race the table lookup.
        for _ in 0..2 {
            let handle = match self.workspaces.get(&uri) {
                Some(existing) => existing.clone(),
                None => {
                    let snapshot = match self.store.load_document(&uri).await {
                        Ok(Some(snapshot)) => snapshot,
                        Ok(None) => {
                            self.fail(out, FailureKind::DocumentNotFound, uri.to_string());
                            return false;
                        }
                        Err(e) => {
                            error!(%uri, error = %e, "document load failed");
                            self.fail(out, FailureKind::Internal, "document load failed");
                            return false;
                        }
                    };
                    let document = match Document::from_snapshot(snapshot) {
                        Ok(document) => document,
                        Err(e) => {
                            error!(%uri, error = %e, "corrupt document snapshot");
                            self.fail(out, FailureKind::Internal, "corrupt document");
                            return false;
                        }
                    };
                    let handle = Workspace::spawn(
                        document,
                        self.store.clone(),
                        Duration::from_secs(self.config.save_interval_secs),
                        self.workspaces.clone(),
                    );
                    self.workspaces.insert(uri.clone(), handle.clone());
                    handle
                }
            };

            match handle.join(session.client_id, profile.clone(), out.clone()).await {
                Ok(()) => {
                    session.phase = SessionPhase::InWorkspace { uri, handle };
                    return true;
                }
                Err(_) => {
                    // Stale handle; drop it and retry once with a fresh task.
                    self.workspaces.remove(&uri);
                }
            }
        }

        self.fail(out, FailureKind::Internal, "workspace unavailable");
        false
    }

    async fn persist_users(&self) {
        if let Err(e) = self.store.save_users(&self.users.all()).await {
            // Registry state stays authoritative in memory; retried on the
            // next mutation.
            error!(error = %e, "users file persist failed");
        }
    }
}
