//! Serving process plumbing
//!
//! Thin HTTP layer over the serving preprocessor: artifacts are loaded once
//! at startup into an immutable context, every request reads that context
//! without locking, and replacing it requires an explicit reload call.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use crate::engine::ModelEngine;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the schema and constants artifacts
    pub config_dir: String,
    /// Name of the prediction field the engine emits for the label
    pub prediction_field: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            config_dir: std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string()),
            prediction_field: std::env::var("PREDICTION_FIELD")
                .unwrap_or_else(|_| "predict".to_string()),
        }
    }
}

/// Start the serving process with the given configuration and model engine
pub async fn run_server(config: ServerConfig, engine: Arc<dyn ModelEngine>) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    let context = crate::artifacts::ServingContext::load(Path::new(&config.config_dir))?;
    info!(
        version = %context.version(),
        features = context.schema.features.len(),
        started_at = %start_time.to_rfc3339(),
        "serving context loaded"
    );

    let state = Arc::new(AppState::new(config.clone(), context, engine));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "server listening");

    let shutdown_signal = async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("shutdown signal received, stopping server");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("server shut down cleanly");
    Ok(())
}
