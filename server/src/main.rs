mod page;
mod routes;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use color_lock_common::config::Config;
use tracing::info;

use crate::state::AppState;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        backend = config.capture.backend,
        max_index = config.capture.max_index,
        cameras = config.capture.mjpeg_urls.len(),
        radius = config.sampler.radius,
        quality = config.stream.quality,
        "starting color-lock server"
    );

    let state = match AppState::from_config(&config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to set up capture backend: {e}");
            std::process::exit(1);
        }
    };

    let app = routes::router(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    info!(addr, "color-lock server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        eprintln!("Failed to bind to {addr}: {e}");
        std::process::exit(1);
    });
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
