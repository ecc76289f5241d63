//! Document URIs.
//!
//! `<author>_<counter>_<slug>` — globally unique because the counter is
//! per-author monotonic. The URI doubles as the share token: knowing it is
//! what grants access to a document you don't own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing a document URI.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UriError {
    #[error("malformed document URI: '{0}'")]
    Malformed(String),
    #[error("bad counter in document URI: '{0}'")]
    BadCounter(String),
}

/// Unique document identifier `<author>_<counter>_<slug>`.
///
/// Author usernames may not contain underscores (enforced at account
/// creation), so the first two `_` are unambiguous separators; the slug may
/// contain more.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentUri {
    pub author: String,
    pub counter: u32,
    pub slug: String,
}

impl DocumentUri {
    pub fn new(author: impl Into<String>, counter: u32, name: &str) -> Self {
        Self {
            author: author.into(),
            counter,
            slug: slugify(name),
        }
    }
}

/// Lowercase, alphanumeric runs joined by single dashes.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() { "untitled".to_string() } else { slug }
}

impl fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.author, self.counter, self.slug)
    }
}

impl fmt::Debug for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.author, self.counter, self.slug)
    }
}

impl FromStr for DocumentUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '_');
        let (author, counter, slug) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(c), Some(rest)) if !a.is_empty() && !rest.is_empty() => (a, c, rest),
            _ => return Err(UriError::Malformed(s.to_string())),
        };
        let counter = counter
            .parse::<u32>()
            .map_err(|_| UriError::BadCounter(s.to_string()))?;
        Ok(Self {
            author: author.to_string(),
            counter,
            slug: slug.to_string(),
        })
    }
}

impl TryFrom<String> for DocumentUri {
    type Error = UriError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DocumentUri> for String {
    fn from(uri: DocumentUri) -> String {
        uri.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let uri = DocumentUri::new("alice", 3, "Meeting Notes");
        assert_eq!(uri.to_string(), "alice_3_meeting-notes");
        let parsed: DocumentUri = "alice_3_meeting-notes".parse().unwrap();
        assert_eq!(parsed, uri);
    }

    #[test]
    fn test_slug_with_underscores_parses() {
        let parsed: DocumentUri = "bob_12_notes_from_q3".parse().unwrap();
        assert_eq!(parsed.author, "bob");
        assert_eq!(parsed.counter, 12);
        assert_eq!(parsed.slug, "notes_from_q3");
    }

    #[test]
    fn test_malformed() {
        assert!("nounderscores".parse::<DocumentUri>().is_err());
        assert!("a_b".parse::<DocumentUri>().is_err());
        assert!("a_notanumber_slug".parse::<DocumentUri>().is_err());
        assert!("_3_slug".parse::<DocumentUri>().is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(DocumentUri::new("a", 0, "Hello,  World!").slug, "hello-world");
        assert_eq!(DocumentUri::new("a", 0, "???").slug, "untitled");
    }

    #[test]
    fn test_json_is_string() {
        let uri = DocumentUri::new("alice", 1, "doc");
        let json = serde_json::to_string(&uri).unwrap();
        assert_eq!(json, "\"alice_1_doc\"");
        let parsed: DocumentUri = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, uri);
    }
}
