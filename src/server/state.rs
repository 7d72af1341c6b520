//! Application state shared across handlers

use crate::artifacts::ServingContext;
use crate::engine::ModelEngine;
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ServerConfig;

/// Shared serving state. The context is immutable per request: handlers
/// clone the Arc and work with a consistent schema/constants pair even if a
/// reload swaps the context mid-flight.
pub struct AppState {
    pub config: ServerConfig,
    context: RwLock<Arc<ServingContext>>,
    pub engine: Arc<dyn ModelEngine>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        context: ServingContext,
        engine: Arc<dyn ModelEngine>,
    ) -> Self {
        Self {
            config,
            context: RwLock::new(Arc::new(context)),
            engine,
        }
    }

    /// Snapshot of the current serving context
    pub async fn context(&self) -> Arc<ServingContext> {
        self.context.read().await.clone()
    }

    /// Re-read both artifacts from disk and swap them in atomically.
    /// Returns the version of the freshly loaded pair.
    pub async fn reload(&self) -> Result<String> {
        let context = ServingContext::load(Path::new(&self.config.config_dir))?;
        let version = context.version().to_string();
        *self.context.write().await = Arc::new(context);
        Ok(version)
    }
}
