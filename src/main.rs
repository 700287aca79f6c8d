// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use podhost::web::{self, AppState};
use podhost::{
    Catalog, Config, LocalStore, LogReporter, PublishDateResolver, TagProbe, run_periodic_sync,
};

/// Host podcast feeds from a storage directory
#[derive(Parser, Debug)]
#[command(name = "podhost")]
#[command(about = "Host podcast feeds and keep them in sync with stored audio files")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML); missing files are ignored
    #[arg(short, long, default_value = "podhost.toml")]
    config: PathBuf,

    /// Address to listen on, overriding the configuration
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Storage root directory, overriding the configuration
    #[arg(short, long)]
    storage_root: Option<PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("podhost={0},tower_http={0}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting podhost v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(Some(&cli.config))
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(root) = cli.storage_root {
        config.storage.root = root;
    }

    let store = Arc::new(LocalStore::new(config.storage.root.clone()));
    let resolver = PublishDateResolver::new(Arc::new(TagProbe), config.sync.extraction_timeout);

    let mut catalog = Catalog::open(store, resolver, LogReporter::shared())
        .await
        .with_context(|| {
            format!(
                "Failed to load catalog from {}",
                config.storage.root.display()
            )
        })?;
    if let Some(dir) = &config.storage.scratch_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create scratch directory {}", dir.display()))?;
        catalog = catalog.with_scratch_dir(dir);
    }
    let catalog = Arc::new(catalog);

    let default_feed = catalog
        .ensure_feed(config.default_feed.to_feed())
        .await
        .context("Failed to create the default feed")?;
    info!("Default feed is '{}'", default_feed.id);

    let report = catalog.synchronize_all().await;
    info!(
        "Startup sync: {} imported, {} pruned, {} failed",
        report.imported, report.pruned, report.failed
    );

    let cancel = CancellationToken::new();
    let sweep = config.sync.enabled.then(|| {
        tokio::spawn(run_periodic_sync(
            catalog.clone(),
            config.sync.schedule(),
            cancel.clone(),
        ))
    });

    let app = web::router(
        AppState::new(catalog, &config),
        config.server.max_upload_bytes,
    );
    let listener = TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(
        "Listening on {} (public URL {})",
        config.server.bind, config.server.base_url
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    cancel.cancel();
    if let Some(sweep) = sweep
        && let Err(e) = sweep.await
    {
        warn!("Periodic sync task ended abnormally: {e}");
    }

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
