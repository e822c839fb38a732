//! REST API server for playbook records.
//!
//! Wires the record store, its snapshot persistence and the REST API
//! together with command-line configuration and ctrl-c shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use records_api::{router::Router, server::Server};
use records_core::config::StoreConfig;
use records_core::{Database, DbError};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for the records server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Directory for the snapshot file; the store stays in memory when unset
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Request body read timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    request_timeout_ms: u64,

    /// Page size for list requests without a limit
    #[arg(long, default_value_t = 100)]
    page_size: usize,

    /// Largest page size a client may request
    #[arg(long, default_value_t = 1000)]
    max_page_size: usize,
}

impl Args {
    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            data_dir: self.data_dir.clone(),
            request_timeout_ms: self.request_timeout_ms,
            default_page_size: self.page_size.max(1),
            max_page_size: self.max_page_size.max(self.page_size).max(1),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "records_server=info,records_api=info,records_core=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.store_config();

    let db = match Database::open(&config) {
        Ok(db) => db,
        Err(DbError::DataCorruption(msg)) => {
            tracing::error!("Snapshot corruption detected: {}", msg);
            tracing::error!("Server cannot start. Restore the snapshot from backup or remove it.");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to open record store"),
    };

    let router = Router::new(Arc::new(db), Arc::new(config.clone()))
        .context("Failed to build router")?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;
    let server = Server::new(addr, router);

    tracing::info!(
        host = %args.host,
        port = args.port,
        data_dir = ?config.data_dir,
        request_timeout_ms = config.request_timeout_ms,
        page_size = config.default_page_size,
        max_page_size = config.max_page_size,
        "Starting records server"
    );

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.serve().await {
            tracing::error!("Server error: {}", e);
        }
    });

    signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c")?;
    tracing::info!("Shutting down server");
    server_handle.abort();

    Ok(())
}
