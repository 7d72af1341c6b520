//! Autoprep - train/serve-consistent tabular preprocessing
//!
//! Prepares tabular data for a classification or regression task and
//! guarantees that the exact feature transformation applied at training
//! time is replayed, value for value, at prediction time, even though
//! training and serving run as separate processes.
//!
//! # Modules
//!
//! ## Core pipeline
//! - [`classify`] - Categorical/numeric column classification and drops
//! - [`impute`] - Missing-value imputation with memorized constants
//! - [`labels`] - Label tokenization and prediction decoding
//! - [`trainer`] - Training-time orchestration
//! - [`serving`] - Serving-time replay and batch alignment
//!
//! ## Contracts
//! - [`artifacts`] - Persisted schema/constants pair and serving context
//! - [`engine`] - External model engine trait
//!
//! ## Services
//! - [`server`] - HTTP serving process

pub mod error;

pub mod artifacts;
pub mod classify;
pub mod engine;
pub mod impute;
pub mod labels;
pub mod serving;
pub mod trainer;

pub mod server;

pub use error::{PrepError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::artifacts::{ConstantsArtifact, SchemaArtifact, ServingContext};
    pub use crate::classify::{ColumnClassifier, ColumnDescriptor, ColumnKind, ColumnRole};
    pub use crate::engine::{ModelEngine, TrainOutcome};
    pub use crate::error::{PrepError, Result};
    pub use crate::impute::ImputeValue;
    pub use crate::labels::{LabelMap, PredictionDecoder};
    pub use crate::trainer::{TaskKind, Trainer};
}
