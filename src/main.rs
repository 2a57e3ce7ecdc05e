//! Sendfile proxy.
//!
//! Sits in front of an application and serves files the application names
//! in an `X-Sendfile` response header, streamed from disk in bounded chunks.
//!
//! ```text
//!     Client ──▶ trace/request-id layers ──▶ sendfile layer ──▶ upstream app
//!                                                  │
//!     Client ◀── replayed response ◀───────────────┤ (no X-Sendfile)
//!     Client ◀── file chunks ◀── disk ◀────────────┘ (X-Sendfile: /path)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use sendfile_proxy::config::{load_config, ProxyConfig};
use sendfile_proxy::http::HttpServer;
use sendfile_proxy::lifecycle::Shutdown;
use sendfile_proxy::observability::{init_tracer_provider, logging, metrics};

#[derive(Parser)]
#[command(name = "sendfile-proxy")]
#[command(about = "Serve X-Sendfile responses from disk in front of an application", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.telemetry)?;

    tracing::info!("sendfile-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        chunk_size = config.sendfile.chunk_size,
        root = ?config.sendfile.root,
        tracer = ?config.telemetry.tracer_name,
        "Configuration loaded"
    );

    let tracer_provider = init_tracer_provider(&config.telemetry);

    if config.telemetry.metrics_enabled {
        match config.telemetry.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.telemetry.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;
    drop(tracer_provider);

    tracing::info!("Shutdown complete");
    Ok(())
}
