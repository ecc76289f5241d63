//! Credential generation and verification.
//!
//! Digest derivation itself lives in `scrivo_protocol::auth` so both ends of
//! the wire agree; this module adds the server-only pieces: random salts,
//! per-attempt nonces, and the token check.

use rand::RngCore;

use scrivo_protocol::auth::unlock_token;

const SALT_BYTES: usize = 16;
const NONCE_BYTES: usize = 16;

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Fresh per-user salt, minted at account creation.
pub fn generate_salt() -> String {
    random_hex(SALT_BYTES)
}

/// Fresh per-attempt login nonce.
pub fn generate_nonce() -> String {
    random_hex(NONCE_BYTES)
}

/// Check a LoginUnlock token against the stored digest and issued nonce.
pub fn verify_unlock(stored_digest: &str, nonce: &str, token: &str) -> bool {
    unlock_token(stored_digest, nonce) == token
}

// ============================================================================
// Tests
// ============================================================================
