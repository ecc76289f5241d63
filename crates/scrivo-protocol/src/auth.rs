//! Login digest derivation, shared by both ends of the wire.
//!
//! The server stores `digest = sha256(password ‖ salt)` per user. A login
//! challenge carries the salt plus a fresh nonce; the client answers with
//! `sha256(digest ‖ nonce)`. The password digest never travels and the token
//! is worthless once the nonce is spent.
//!
//! All digests are lowercase hex, hashed over their hex string bytes, so both
//! sides can hold credentials as plain strings.

use sha2::{Digest, Sha256};

fn sha256_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// The stored credential: `sha256(password ‖ salt)`.
pub fn password_digest(password: &str, salt_hex: &str) -> String {
    sha256_hex(&[password.as_bytes(), salt_hex.as_bytes()])
}

/// The one-shot login token: `sha256(digest ‖ nonce)`.
pub fn unlock_token(password_digest_hex: &str, nonce_hex: &str) -> String {
    sha256_hex(&[password_digest_hex.as_bytes(), nonce_hex.as_bytes()])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        let a = password_digest("hunter2", "ab12");
        let b = password_digest("hunter2", "ab12");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_salt_changes_digest() {
        assert_ne!(password_digest("pw", "00"), password_digest("pw", "01"));
    }

    #[test]
    fn test_token_binds_nonce() {
        let digest = password_digest("pw", "ab");
        assert_ne!(unlock_token(&digest, "n1"), unlock_token(&digest, "n2"));
    }

    #[test]
    fn test_both_sides_agree() {
        // What the client derives from the password equals what the server
        // derives from the stored digest.
        let salt = "5a5a";
        let nonce = "77";
        let stored = password_digest("secret", salt);

        let client_token = unlock_token(&password_digest("secret", salt), nonce);
        let server_token = unlock_token(&stored, nonce);
        assert_eq!(client_token, server_token);
    }
}
