use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trax_server::config::ServerConfig;
use trax_server::engine::TraxEngine;
use trax_server::provider::{RefreshKind, SnapshotProvider};
use trax_server::web::{AppState, create_router};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    info!(data_dir = %config.data_dir.display(), "starting");

    let provider = SnapshotProvider::from_dir(&config.data_dir);
    let engine = Arc::new(TraxEngine::new(Arc::new(provider), config.engine.clone()));

    // Serve immediately; requests get NotReady until the first load lands
    if !engine.driver().request(RefreshKind::Static) {
        warn!("initial load was not started");
    }
    engine.driver().start_timer();

    let app = create_router(AppState::new(engine));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "TRAX listening");
    info!("  GET  /health");
    info!("  GET  /api/status, /api/loading");
    info!("  POST /api/reload");
    info!("  GET  /api/stop/:stop_id, /api/trip/:instance_id, /api/travel/:service_id");
    info!("  GET  /api/run-series/:date/:series, /api/search");

    axum::serve(listener, app).await
}
