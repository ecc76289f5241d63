//! The shared user registry.
//!
//! Reader-writer discipline: every connection reads on login and document
//! access checks, mutations happen on account creation/update and document
//! lifecycle. Persistence of the backing users file is the caller's job
//! (see [`crate::store::DocumentStore`]); the registry is pure state.

use std::collections::HashMap;

use parking_lot::RwLock;

use scrivo_protocol::auth::password_digest;
use scrivo_types::{AuthorId, DocumentUri, UserRecord};

use crate::auth::generate_salt;
use crate::error::ServerError;
use crate::Result;

struct Inner {
    users: HashMap<String, UserRecord>,
    next_author: u32,
}

/// All known users, keyed by username.
pub struct UserRegistry {
    inner: RwLock<Inner>,
}

impl UserRegistry {
    pub fn new(records: Vec<UserRecord>) -> Self {
        // Author id 0 is the system author; real users start at 1.
        let next_author = records
            .iter()
            .map(|r| r.author_id.0 + 1)
            .max()
            .unwrap_or(1);
        let users = records.into_iter().map(|r| (r.username.clone(), r)).collect();
        Self {
            inner: RwLock::new(Inner { users, next_author }),
        }
    }

    pub fn get(&self, username: &str) -> Option<UserRecord> {
        self.inner.read().users.get(username).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().users.is_empty()
    }

    /// Everything, for persisting the users file.
    pub fn all(&self) -> Vec<UserRecord> {
        self.inner.read().users.values().cloned().collect()
    }

    /// Create an account. Usernames may not be empty or contain `_` (it is
    /// the URI separator).
    pub fn create(
        &self,
        username: &str,
        nickname: &str,
        icon: Option<Vec<u8>>,
        password: &str,
    ) -> Result<UserRecord> {
        if username.is_empty() {
            return Err(ServerError::InvalidUsername(username.into(), "empty"));
        }
        if username.contains('_') {
            return Err(ServerError::InvalidUsername(
                username.into(),
                "underscores are reserved",
            ));
        }

        let mut inner = self.inner.write();
        if inner.users.contains_key(username) {
            return Err(ServerError::UserExists(username.into()));
        }

        let salt = generate_salt();
        let record = UserRecord {
            username: username.to_string(),
            nickname: if nickname.is_empty() { username } else { nickname }.to_string(),
            icon,
            author_id: AuthorId(inner.next_author),
            password_hash: password_digest(password, &salt),
            salt,
            doc_counter: 0,
            owned_docs: Vec::new(),
            shared_docs: Vec::new(),
        };
        inner.next_author += 1;
        inner.users.insert(username.to_string(), record.clone());
        Ok(record)
    }

    /// Apply a partial account update; `None` fields are untouched. A new
    /// password gets a fresh salt.
    pub fn update(
        &self,
        username: &str,
        nickname: Option<String>,
        icon: Option<Vec<u8>>,
        password: Option<String>,
    ) -> Result<UserRecord> {
        let mut inner = self.inner.write();
        let record = inner
            .users
            .get_mut(username)
            .ok_or_else(|| ServerError::UnknownUser(username.into()))?;

        if let Some(nickname) = nickname {
            record.nickname = nickname;
        }
        if let Some(icon) = icon {
            record.icon = Some(icon);
        }
        if let Some(password) = password {
            record.salt = generate_salt();
            record.password_hash = password_digest(&password, &record.salt);
        }
        Ok(record.clone())
    }

    /// Register a freshly created document with its owner, returning the
    /// minted URI. Fails on a name collision among the owner's documents.
    pub fn register_document(&self, username: &str, name: &str) -> Result<DocumentUri> {
        let mut inner = self.inner.write();
        let record = inner
            .users
            .get_mut(username)
            .ok_or_else(|| ServerError::UnknownUser(username.into()))?;

        let uri = DocumentUri::new(username, record.doc_counter, name);
        if record.owned_docs.iter().any(|d| d.slug == uri.slug) {
            return Err(ServerError::NameCollision(name.to_string()));
        }
        record.doc_counter += 1;
        record.owned_docs.push(uri.clone());
        Ok(uri)
    }

    /// Record shared access: opening a URI you don't own adds it to your
    /// shared list (the URI is the share token).
    pub fn grant_shared(&self, username: &str, uri: &DocumentUri) -> Result<UserRecord> {
        let mut inner = self.inner.write();
        let record = inner
            .users
            .get_mut(username)
            .ok_or_else(|| ServerError::UnknownUser(username.into()))?;
        if record.username != uri.author && !record.shared_docs.contains(uri) {
            record.shared_docs.push(uri.clone());
        }
        Ok(record.clone())
    }

    /// Drop a document from its owner's list (and from anyone's shared list).
    pub fn unregister_document(&self, uri: &DocumentUri) {
        let mut inner = self.inner.write();
        for record in inner.users.values_mut() {
            record.owned_docs.retain(|d| d != uri);
            record.shared_docs.retain(|d| d != uri);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> UserRegistry {
        UserRegistry::new(Vec::new())
    }

    #[test]
    fn test_create_assigns_sequential_authors() {
        let reg = registry();
        let alice = reg.create("alice", "Alice", None, "pw").unwrap();
        let bob = reg.create("bob", "", None, "pw").unwrap();
        assert_eq!(alice.author_id, AuthorId(1));
        assert_eq!(bob.author_id, AuthorId(2));
        assert_eq!(bob.nickname, "bob"); // empty nickname falls back
    }

    #[test]
    fn test_create_rejects_duplicates_and_bad_names() {
        let reg = registry();
        reg.create("alice", "Alice", None, "pw").unwrap();
        assert!(matches!(
            reg.create("alice", "", None, "pw"),
            Err(ServerError::UserExists(_))
        ));
        assert!(matches!(
            reg.create("under_score", "", None, "pw"),
            Err(ServerError::InvalidUsername(..))
        ));
        assert!(matches!(
            reg.create("", "", None, "pw"),
            Err(ServerError::InvalidUsername(..))
        ));
    }

    #[test]
    fn test_author_ids_survive_reload() {
        let reg = registry();
        reg.create("alice", "Alice", None, "pw").unwrap();
        reg.create("bob", "Bob", None, "pw").unwrap();

        let reloaded = UserRegistry::new(reg.all());
        let carol = reloaded.create("carol", "Carol", None, "pw").unwrap();
        assert_eq!(carol.author_id, AuthorId(3));
    }

    #[test]
    fn test_password_update_rotates_salt() {
        let reg = registry();
        let before = reg.create("alice", "Alice", None, "old").unwrap();
        let after = reg
            .update("alice", None, None, Some("new".into()))
            .unwrap();
        assert_ne!(before.salt, after.salt);
        assert_ne!(before.password_hash, after.password_hash);
        assert_eq!(after.nickname, "Alice");
    }

    #[test]
    fn test_register_document_counters_never_rewind() {
        let reg = registry();
        reg.create("alice", "Alice", None, "pw").unwrap();
        let first = reg.register_document("alice", "Notes").unwrap();
        assert_eq!(first.counter, 0);

        reg.unregister_document(&first);
        let second = reg.register_document("alice", "Notes").unwrap();
        assert_eq!(second.counter, 1);
    }

    #[test]
    fn test_register_document_name_collision() {
        let reg = registry();
        reg.create("alice", "Alice", None, "pw").unwrap();
        reg.register_document("alice", "Notes").unwrap();
        assert!(reg.register_document("alice", "notes!").is_err()); // same slug
    }

    #[test]
    fn test_grant_shared_is_idempotent_and_skips_owner() {
        let reg = registry();
        reg.create("alice", "Alice", None, "pw").unwrap();
        reg.create("bob", "Bob", None, "pw").unwrap();
        let uri = reg.register_document("alice", "Notes").unwrap();

        reg.grant_shared("bob", &uri).unwrap();
        let bob = reg.grant_shared("bob", &uri).unwrap();
        assert_eq!(bob.shared_docs, vec![uri.clone()]);

        let alice = reg.grant_shared("alice", &uri).unwrap();
        assert!(alice.shared_docs.is_empty());
    }
}
