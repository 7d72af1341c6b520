//! External model engine contract
//!
//! The model-search engine is an external collaborator: it receives a
//! cleaned dataset and returns a model location plus a metrics record which
//! this crate passes through uninterpreted. At serving time it scores a
//! feature-aligned batch, row-aligned with the input.

use crate::error::Result;
use polars::prelude::DataFrame;

/// Outcome of a training run handed back by the engine
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Location of the trained model artifact
    pub model_path: String,
    /// Leaderboard metrics, passed through to the caller
    pub metrics: serde_json::Value,
}

/// Seam to the external AutoML engine
pub trait ModelEngine: Send + Sync {
    /// Train a model on a cleaned dataset within a wall-clock budget
    fn train(
        &self,
        data: &DataFrame,
        label: &str,
        id_column: Option<&str>,
        max_runtime_secs: u64,
    ) -> Result<TrainOutcome>;

    /// Score a feature-aligned batch with a previously trained model.
    /// The returned frame must be row-aligned with the input batch.
    fn predict(&self, model_path: &str, batch: &DataFrame) -> Result<DataFrame>;
}
