//! duci server binary.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use duci_api::AppState;
use duci_api::routes;
use duci_api::services::git::GitService;
use duci_api::services::github::GitHubClient;
use duci_config::Configuration;
use duci_core::LogStore;
use duci_executor::DockerClient;
use duci_runner::{ConcurrencyGate, DockerRunner};
use duci_store::SledLogStore;

/// Name prefixed to the image tags this instance builds.
const RUNNER_NAME: &str = "duci";

#[derive(Parser)]
#[command(name = "duci", about = "Webhook-driven CI dispatcher", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Configuration::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    info!(config = %config, "configuration loaded");

    let gate = ConcurrencyGate::new(config.job.concurrency)
        .context("failed to initialize the concurrency gate")?;

    // The base work directory must exist before any job may run.
    std::fs::create_dir_all(&config.server.workdir).with_context(|| {
        format!(
            "failed to create work directory {}",
            config.server.workdir.display()
        )
    })?;

    let git = Arc::new(GitService::new(config.server.ssh_key_path.clone()));
    let github = Arc::new(GitHubClient::new(config.github.api_token.clone()));
    let docker = Arc::new(DockerClient::new().context("failed to create docker client")?);
    let store: Arc<dyn LogStore> = Arc::new(
        SledLogStore::open(&config.server.database_path)
            .context("failed to initialize the database")?,
    );

    let runner = Arc::new(DockerRunner::new(
        RUNNER_NAME,
        config.server.workdir.clone(),
        git,
        github.clone(),
        docker,
        store.clone(),
        gate,
        config.timeout(),
    ));

    let state = AppState {
        runner,
        store: store.clone(),
        github,
        webhook_secret: std::env::var("DUCI_WEBHOOK_SECRET").ok(),
    };

    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!(addr = %config.addr(), "starting server");

    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind listen address")?;
    axum::serve(listener, app).await.context("server terminated")?;

    store.close().await.context("failed to close the database")?;
    Ok(())
}
