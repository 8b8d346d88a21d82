//! ttmd-ms - TTML Database Mirror Server
//!
//! Mirrors the amll-ttml-db lyric repository on a fixed schedule,
//! routing clone/update traffic through ranked fallback proxies, and
//! serves the mirrored tree plus usage statistics over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use ttmd_common::config::MirrorConfig;

use ttmd_ms::services::github_client::GithubClient;
use ttmd_ms::services::ncm_client::NcmClient;
use ttmd_ms::sync::{self, GitCli, ProxyHealthStore, ProxySelector, RepositoryUpdater, SyncState};
use ttmd_ms::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about = "TTML lyric database mirror server")]
struct Args {
    /// Root data folder (working copy, database, log file)
    #[arg(long, env = "TTMD_ROOT_FOLDER")]
    root_folder: Option<String>,

    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Arc::new(MirrorConfig::resolve(
        args.root_folder.as_deref(),
        args.config.as_deref(),
    )?);
    config.ensure_root_exists()?;

    // Log to the console and to a file in the root folder; the file is
    // what /api/log serves back.
    let file_appender = tracing_appender::rolling::never(&config.root_folder, "ttmd.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    info!(
        "Starting TTMD Mirror Server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", config.root_folder.display());
    info!("Origin: {}", config.origin_url);

    let db = ttmd_common::db::init_database_pool(&config.database_path()).await?;
    info!("Database connection established");

    let store = ProxyHealthStore::new(config.proxy_status_path(), config.mirrors.clone());
    let selector = ProxySelector::new(store);
    info!(proxies = config.mirrors.len(), "Proxy status loaded");

    let sync_state = SyncState::new(selector.credits().clone());
    let updater = RepositoryUpdater::new(GitCli, &config);
    {
        let sync_state = sync_state.clone();
        let interval = config.update_interval;
        tokio::spawn(async move {
            sync::scheduler::run(updater, selector, sync_state, interval).await;
        });
    }
    info!("Background repository updater started");

    let ncm = Arc::new(NcmClient::new()?);
    let github = Arc::new(GithubClient::new()?);
    let state = AppState::new(db, config.clone(), sync_state, ncm, github);
    let app = ttmd_ms::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
