//! Server configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ServerError;

/// Paths to the certificate pair handed to the TLS terminator in front of
/// the core. The core itself speaks plain frames on the decrypted stream.
#[derive(Clone, Debug, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Server configuration, loaded from a TOML file with CLI overrides.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind_addr: SocketAddr,
    /// Root of persisted state (users file, per-user document directories).
    pub data_dir: PathBuf,
    /// Coalescing interval for deferred document saves, in seconds.
    pub save_interval_secs: u64,
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7878".parse().expect("static address"),
            data_dir: PathBuf::from("scrivo-data"),
            save_interval_secs: 5,
            tls: None,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }
}

// ============================================================================
// Tests
// ============================================================================
