//! Scrivo server binary.
//!
//! Serves the frame protocol over plain TCP; TLS termination is expected in
//! front of it. Configuration comes from a TOML file with CLI overrides.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use scrivo_server::{Frontend, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "scrivo-server", about = "Real-time collaborative text editing server")]
struct Args {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen address.
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(tls) = &config.tls {
        tracing::info!(
            cert = %tls.cert_path.display(),
            key = %tls.key_path.display(),
            "TLS termination delegated to the fronting proxy"
        );
    }

    tokio::fs::create_dir_all(&config.data_dir).await?;
    let listener = TcpListener::bind(config.bind_addr).await?;
    let frontend = Frontend::new(config).await?;
    frontend.run(listener).await?;
    Ok(())
}
