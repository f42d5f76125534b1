//! devtap binary entry point.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use devtap::config::load_config;
use devtap::env::EnvironmentStore;
use devtap::http::HttpServer;
use devtap::traffic::TrafficLog;

#[derive(Parser, Debug)]
#[command(name = "devtap", about = "Developer-facing intercepting reverse proxy")]
struct Args {
    /// Path of the TOML configuration file.
    #[arg(long, default_value = "devtap.toml")]
    config: PathBuf,

    /// Override for the persisted-state file path.
    #[arg(long)]
    state: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devtap=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(&args.config)?;

    tracing::info!(
        http_address = %config.listener.http_address,
        https_address = config.listener.https_address.as_deref().unwrap_or("disabled"),
        environments = config.environments.len(),
        "Configuration loaded"
    );

    let state_file = args
        .state
        .unwrap_or_else(|| PathBuf::from(&config.state_file));
    let env_store = EnvironmentStore::with_persistence(config.environments.clone(), state_file);
    let log = TrafficLog::new();

    tracing::info!(environment = %env_store.active().name(), "Active environment");

    let listener = TcpListener::bind(&config.listener.http_address).await?;
    let server = HttpServer::new(config, env_store, log)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
