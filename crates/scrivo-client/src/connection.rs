//! Framed transport and the client session driver.
//!
//! [`Connection`] is a thin framed wrapper over any byte stream (TCP in
//! practice; the TLS terminator sits outside the core). [`Client`] runs the
//! request/response half of the protocol: login handshake, account calls,
//! document lifecycle. Once a document is open, [`serve_editor`] pumps the
//! connection: outbound editor intents up, inbound remote edits into the
//! [`DocumentEditor`], presence into the [`PresenceView`].

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use scrivo_crdt::DocumentSnapshot;
use scrivo_protocol::{auth, Message, MessageCodec};
use scrivo_types::{DocumentUri, Profile};

use crate::editor::DocumentEditor;
use crate::error::ClientError;
use crate::view::{EditorView, PresenceView};
use crate::Result;

/// A framed message stream.
pub struct Connection<S> {
    framed: Framed<S, MessageCodec>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, MessageCodec),
        }
    }

    pub async fn send(&mut self, message: Message) -> Result<()> {
        Ok(self.framed.send(message).await?)
    }

    /// Next message, or `None` on clean end of stream.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        match self.framed.next().await {
            None => Ok(None),
            Some(result) => Ok(Some(result?)),
        }
    }

    async fn expect(&mut self) -> Result<Message> {
        self.recv().await?.ok_or(ClientError::ConnectionClosed)
    }
}

/// The pre-workspace half of a client session.
pub struct Client<S> {
    connection: Connection<S>,
    profile: Option<Profile>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    pub fn new(stream: S) -> Self {
        Self {
            connection: Connection::new(stream),
            profile: None,
        }
    }

    /// The logged-in identity, if any.
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn connection_mut(&mut self) -> &mut Connection<S> {
        &mut self.connection
    }

    /// Challenge-response login. The password never leaves this function;
    /// only the nonce-bound token goes out.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Profile> {
        self.connection
            .send(Message::LoginRequest {
                username: username.to_string(),
            })
            .await?;

        let (salt, nonce) = match self.connection.expect().await? {
            Message::LoginChallenge { salt, nonce } => (salt, nonce),
            Message::LoginDenied { reason } => return Err(ClientError::LoginDenied(reason)),
            Message::Failure { kind, context } => return Err(ClientError::Failure { kind, context }),
            other => return Err(ClientError::UnexpectedMessage(other.kind())),
        };

        let token = auth::unlock_token(&auth::password_digest(password, &salt), &nonce);
        self.connection.send(Message::LoginUnlock { token }).await?;

        match self.connection.expect().await? {
            Message::LoginGranted { profile } => {
                self.profile = Some(profile.clone());
                Ok(profile)
            }
            Message::LoginDenied { reason } => Err(ClientError::LoginDenied(reason)),
            Message::Failure { kind, context } => Err(ClientError::Failure { kind, context }),
            other => Err(ClientError::UnexpectedMessage(other.kind())),
        }
    }

    /// Create an account. A confirmed account is also a login.
    pub async fn register(
        &mut self,
        username: &str,
        nickname: &str,
        icon: Option<Vec<u8>>,
        password: &str,
    ) -> Result<Profile> {
        self.connection
            .send(Message::AccountCreate {
                username: username.to_string(),
                nickname: nickname.to_string(),
                icon,
                password: password.to_string(),
            })
            .await?;

        match self.connection.expect().await? {
            Message::AccountConfirmed { profile } => {
                self.profile = Some(profile.clone());
                Ok(profile)
            }
            Message::AccountDenied { reason } => Err(ClientError::AccountDenied(reason)),
            Message::Failure { kind, context } => Err(ClientError::Failure { kind, context }),
            other => Err(ClientError::UnexpectedMessage(other.kind())),
        }
    }

    pub async fn update_account(
        &mut self,
        nickname: Option<String>,
        icon: Option<Vec<u8>>,
        password: Option<String>,
    ) -> Result<Profile> {
        self.connection
            .send(Message::AccountUpdate {
                nickname,
                icon,
                password,
            })
            .await?;

        match self.connection.expect().await? {
            Message::AccountConfirmed { profile } => {
                self.profile = Some(profile.clone());
                Ok(profile)
            }
            Message::AccountDenied { reason } => Err(ClientError::AccountDenied(reason)),
            Message::Failure { kind, context } => Err(ClientError::Failure { kind, context }),
            other => Err(ClientError::UnexpectedMessage(other.kind())),
        }
    }

    /// Create a document; the server opens it immediately and returns the
    /// bootstrap snapshot.
    pub async fn create_document(&mut self, name: &str) -> Result<DocumentSnapshot> {
        self.connection
            .send(Message::DocumentCreate {
                name: name.to_string(),
            })
            .await?;
        self.await_snapshot().await
    }

    /// Open a document by URI (owning it or holding the share token).
    pub async fn open_document(&mut self, uri: DocumentUri) -> Result<DocumentSnapshot> {
        self.connection.send(Message::DocumentOpen { uri }).await?;
        self.await_snapshot().await
    }

    async fn await_snapshot(&mut self) -> Result<DocumentSnapshot> {
        match self.connection.expect().await? {
            Message::DocumentReady { snapshot } => Ok(snapshot),
            Message::Failure { kind, context } => Err(ClientError::Failure { kind, context }),
            other => Err(ClientError::UnexpectedMessage(other.kind())),
        }
    }

    pub async fn remove_document(&mut self, uri: DocumentUri) -> Result<DocumentUri> {
        self.connection.send(Message::DocumentRemove { uri }).await?;
        match self.connection.expect().await? {
            Message::DocumentDismissed { uri } => Ok(uri),
            Message::Failure { kind, context } => Err(ClientError::Failure { kind, context }),
            other => Err(ClientError::UnexpectedMessage(other.kind())),
        }
    }

    /// Leave the current document. Fire-and-forget; the workspace drops us
    /// on receipt.
    pub async fn close_document(&mut self) -> Result<()> {
        self.connection.send(Message::DocumentClose).await
    }

    pub async fn logout(&mut self) -> Result<()> {
        self.profile = None;
        self.connection.send(Message::Logout).await
    }

    /// Report the local caret; index is a symbol-sequence index.
    pub async fn send_cursor(&mut self, index: u32) -> Result<()> {
        let Some(profile) = &self.profile else {
            return Ok(());
        };
        self.connection
            .send(Message::CursorMove {
                author: profile.author_id,
                index,
            })
            .await
    }
}

/// Pump an open editing session until the connection ends.
///
/// `outbox` is the receiving half of the editor's message channel; inbound
/// edits are dispatched into the editor, presence into `presence`.
pub async fn serve_editor<S, V, P>(
    connection: &mut Connection<S>,
    editor: &mut DocumentEditor<V>,
    presence: &mut P,
    outbox: &mut mpsc::UnboundedReceiver<Message>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    V: EditorView,
    P: PresenceView,
{
    loop {
        tokio::select! {
            outgoing = outbox.recv() => match outgoing {
                Some(message) => connection.send(message).await?,
                None => return Ok(()),
            },
            incoming = connection.recv() => match incoming? {
                Some(message) => dispatch(editor, presence, message),
                None => return Ok(()),
            },
        }
    }
}

fn dispatch<V: EditorView, P: PresenceView>(
    editor: &mut DocumentEditor<V>,
    presence: &mut P,
    message: Message,
) {
    match message {
        Message::CharInsert { symbol, is_last } => editor.remote_insert(symbol, is_last),
        Message::CharDelete { pos } => editor.remote_remove(pos),
        Message::CharFormat { pos, format } => editor.remote_char_format(pos, format),
        Message::BlockEdit { block, format } => editor.remote_block_format(block, format),
        Message::ListEdit {
            block,
            list,
            format,
        } => editor.remote_list_edit(block, list, format),
        Message::CursorMove { author, index } => presence.cursor_moved(author, index as usize),
        Message::PresenceAdd { profile } => presence.add_presence(&profile),
        Message::PresenceUpdate { profile } => presence.update_presence(&profile),
        Message::PresenceRemove { author } => presence.remove_presence(author),
        Message::Failure { kind, context } => {
            warn!(%kind, context, "server reported failure during session")
        }
        other => debug!(kind = %other.kind(), "ignoring message in editing session"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use scrivo_types::AuthorId;

    fn profile(username: &str) -> Profile {
        Profile {
            author_id: AuthorId(1),
            username: username.to_string(),
            nickname: username.to_string(),
            icon: None,
        }
    }

    #[tokio::test]
    async fn test_login_handshake() {
        let (client_io, server_io) = tokio::io::duplex(4096);

        let server = tokio::spawn(async move {
            let mut conn = Connection::new(server_io);
            match conn.recv().await.unwrap().unwrap() {
                Message::LoginRequest { username } => assert_eq!(username, "alice"),
                other => panic!("wrong message: {:?}", other.kind()),
            }
            conn.send(Message::LoginChallenge {
                salt: "ab12".into(),
                nonce: "cd34".into(),
            })
            .await
            .unwrap();

            let expected = auth::unlock_token(&auth::password_digest("pw", "ab12"), "cd34");
            match conn.recv().await.unwrap().unwrap() {
                Message::LoginUnlock { token } => assert_eq!(token, expected),
                other => panic!("wrong message: {:?}", other.kind()),
            }
            conn.send(Message::LoginGranted {
                profile: profile("alice"),
            })
            .await
            .unwrap();
        });

        let mut client = Client::new(client_io);
        let granted = client.login("alice", "pw").await.unwrap();
        assert_eq!(granted.username, "alice");
        assert!(client.profile().is_some());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_login_denied_keeps_client_usable() {
        let (client_io, server_io) = tokio::io::duplex(4096);

        let server = tokio::spawn(async move {
            let mut conn = Connection::new(server_io);
            let _ = conn.recv().await.unwrap().unwrap();
            conn.send(Message::LoginChallenge {
                salt: "00".into(),
                nonce: "11".into(),
            })
            .await
            .unwrap();
            let _ = conn.recv().await.unwrap().unwrap();
            conn.send(Message::LoginDenied {
                reason: "bad credentials".into(),
            })
            .await
            .unwrap();
        });

        let mut client = Client::new(client_io);
        let err = client.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, ClientError::LoginDenied(_)));
        assert!(client.profile().is_none());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_open_document_returns_snapshot() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let uri: DocumentUri = "alice_0_notes".parse().unwrap();
        let snapshot = scrivo_crdt::Document::new("notes", uri.clone()).snapshot();

        let served = snapshot.clone();
        let server = tokio::spawn(async move {
            let mut conn = Connection::new(server_io);
            match conn.recv().await.unwrap().unwrap() {
                Message::DocumentOpen { uri: requested } => {
                    assert_eq!(requested.to_string(), "alice_0_notes")
                }
                other => panic!("wrong message: {:?}", other.kind()),
            }
            conn.send(Message::DocumentReady { snapshot: served }).await.unwrap();
        });

        let mut client = Client::new(client_io);
        let received = client.open_document(uri).await.unwrap();
        assert_eq!(received, snapshot);
        server.await.unwrap();
    }
}
