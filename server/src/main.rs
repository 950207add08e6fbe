//! Cotton Disease API Server
//!
//! Serves leaf diagnoses with Hindi guidance and printable PDF reports
//! from a model trained by the `cotton_disease` CLI.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::state::{AppState, ServerConfig};

/// Cotton Disease API Server
#[derive(Parser, Debug)]
#[command(name = "cotton-server")]
#[command(version)]
#[command(about = "HTTP API for cotton leaf disease detection")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8000", env = "COTTON_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "COTTON_HOST")]
    host: String,

    /// Trained model artifacts
    #[arg(long, env = "COTTON_ARTIFACTS_DIR")]
    artifacts_dir: Option<PathBuf>,

    /// Devanagari TrueType font for PDF reports
    #[arg(long, env = "COTTON_FONT_PATH")]
    font: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let mut config = ServerConfig::default();
    if let Some(artifacts_dir) = cli.artifacts_dir {
        config.artifacts_dir = artifacts_dir;
    }
    if let Some(font) = cli.font {
        config.font_path = font;
    }

    info!("Cotton Disease API v{}", env!("CARGO_PKG_VERSION"));
    info!("  Artifacts: {:?}", config.artifacts_dir);
    info!("  Font:      {:?}", config.font_path);
    info!("  Backend:   {}", cotton_disease::backend::backend_name());

    let state = Arc::new(AppState::load(&config)?);
    let app = routes::router(state);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
