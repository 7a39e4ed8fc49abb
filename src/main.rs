//! Binary entrypoint: boots the Axum HTTP server over the snapshot store and
//! spawns the background pipeline schedulers.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mindshare_pipeline::api::{create_router, AppState};
use mindshare_pipeline::config::ScoringConfig;
use mindshare_pipeline::feed::{ActivityFeed, InMemoryFeed};
use mindshare_pipeline::metrics;
use mindshare_pipeline::pipeline::{spawn_scheduler, Pipeline};
use mindshare_pipeline::store::SnapshotStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mindshare_pipeline=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments. This enables
    // SCORING_CONFIG_PATH / ACTIVITY_FIXTURE_PATH from .env.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Arc::new(ScoringConfig::load()?);
    let prometheus = metrics::install_recorder();

    // Feed source: a JSON fixture for local runs, empty in-memory otherwise.
    let feed: Arc<dyn ActivityFeed> = match std::env::var("ACTIVITY_FIXTURE_PATH") {
        Ok(path) => Arc::new(InMemoryFeed::from_json_file(&path)?),
        Err(_) => {
            warn!("ACTIVITY_FIXTURE_PATH not set; starting with an empty in-memory feed");
            Arc::new(InMemoryFeed::new())
        }
    };

    let store = Arc::new(SnapshotStore::new());
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&cfg), feed, Arc::clone(&store)));

    // First run immediately so the API has snapshots to serve.
    let as_of = chrono::Utc::now().date_naive();
    if let Err(e) = pipeline.run_day(as_of).await {
        warn!(error = ?e, "initial pipeline run failed");
    }
    spawn_scheduler(Arc::clone(&pipeline), cfg.scheduler);

    let state = AppState { store, cfg };
    let router = create_router(state).merge(metrics::exposition_router(prometheus));

    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
