//! On-disk layout.
//!
//! ```text
//! <data_dir>/
//!   users.json                     all user records (credentials included)
//!   users/<username>/index.json    that user's owned/shared URIs
//!   users/<owner>/<uri>.doc        postcard document snapshot
//! ```
//!
//! Document files live under their owner's directory; the owner is embedded
//! in the URI, so the path is derivable from the URI alone.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use scrivo_crdt::DocumentSnapshot;
use scrivo_types::{DocumentUri, UserRecord};

use crate::error::ServerError;
use crate::Result;

/// Per-user index of document URIs, kept next to the document files.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserIndex {
    pub owned: Vec<DocumentUri>,
    pub shared: Vec<DocumentUri>,
}

/// Handle on the persistence root. Cheap to clone.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn users_file(&self) -> PathBuf {
        self.root.join("users.json")
    }

    fn user_dir(&self, username: &str) -> PathBuf {
        self.root.join("users").join(username)
    }

    fn index_file(&self, username: &str) -> PathBuf {
        self.user_dir(username).join("index.json")
    }

    fn document_file(&self, uri: &DocumentUri) -> PathBuf {
        self.user_dir(&uri.author).join(format!("{uri}.doc"))
    }

    // ── Users ───────────────────────────────────────────────────────────────

    /// Load all user records; a missing file is an empty server.
    pub async fn load_users(&self) -> Result<Vec<UserRecord>> {
        match tokio::fs::read(self.users_file()).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ServerError::Persist(format!("users file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save_users(&self, records: &[UserRecord]) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let json = serde_json::to_vec_pretty(records)
            .map_err(|e| ServerError::Persist(format!("users file: {e}")))?;
        tokio::fs::write(self.users_file(), json).await?;
        Ok(())
    }

    /// Write a user's document index beside their document files.
    pub async fn save_user_index(&self, record: &UserRecord) -> Result<()> {
        let dir = self.user_dir(&record.username);
        tokio::fs::create_dir_all(&dir).await?;
        let index = UserIndex {
            owned: record.owned_docs.clone(),
            shared: record.shared_docs.clone(),
        };
        let json = serde_json::to_vec_pretty(&index)
            .map_err(|e| ServerError::Persist(format!("user index: {e}")))?;
        tokio::fs::write(self.index_file(&record.username), json).await?;
        Ok(())
    }

    // ── Documents ───────────────────────────────────────────────────────────

    pub async fn load_document(&self, uri: &DocumentUri) -> Result<Option<DocumentSnapshot>> {
        match tokio::fs::read(self.document_file(uri)).await {
            Ok(bytes) => Ok(Some(DocumentSnapshot::from_bytes(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save_document(&self, snapshot: &DocumentSnapshot) -> Result<()> {
        let path = self.document_file(&snapshot.uri);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = snapshot.to_bytes()?;
        tokio::fs::write(&path, bytes).await?;
        debug!(uri = %snapshot.uri, path = %path.display(), "persisted document");
        Ok(())
    }

    /// Delete a document file; already-gone is fine.
    pub async fn remove_document(&self, uri: &DocumentUri) -> Result<()> {
        match tokio::fs::remove_file(self.document_file(uri)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
