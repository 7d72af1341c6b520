//! Column classification: categorical vs. numeric, and drop decisions

use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Fraction of missing values at or above which a column is dropped
pub const DEFAULT_DROP_THRESHOLD: f64 = 0.8;

/// Distinct-to-row ratio at or below which a column is categorical
pub const DEFAULT_CATEGORICAL_THRESHOLD: f64 = 0.1;

/// Kind of a retained feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Categorical,
    Numeric,
}

/// Role a column plays in the training dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    Label,
    Feature,
    Id,
    Dropped,
}

/// Per-column decision produced once during training, immutable thereafter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub role: ColumnRole,
    pub kind: Option<ColumnKind>,
    pub impute_value: Option<crate::impute::ImputeValue>,
    pub has_indicator: bool,
}

/// Classification outcome for a single column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    Dropped,
    Categorical,
    Numeric,
}

/// Decides whether a column is categorical or numeric, and whether it
/// should be dropped for excessive missingness.
#[derive(Debug, Clone)]
pub struct ColumnClassifier {
    drop_threshold: f64,
    categorical_threshold: f64,
}

impl Default for ColumnClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_DROP_THRESHOLD)
    }
}

impl ColumnClassifier {
    pub fn new(drop_threshold: f64) -> Self {
        Self {
            drop_threshold,
            categorical_threshold: DEFAULT_CATEGORICAL_THRESHOLD,
        }
    }

    pub fn with_categorical_threshold(mut self, threshold: f64) -> Self {
        self.categorical_threshold = threshold;
        self
    }

    /// Classify a column. Threshold comparisons are inclusive: a column with
    /// missing fraction >= drop_threshold is dropped, and a column whose
    /// distinct/row ratio is <= categorical_threshold is categorical. A
    /// single-valued column is always categorical.
    pub fn classify(&self, series: &Series) -> Result<ColumnClass> {
        let rows = series.len();
        if rows == 0 {
            return Ok(ColumnClass::Dropped);
        }

        let missing = series.null_count() as f64;
        if missing >= self.drop_threshold * rows as f64 {
            return Ok(ColumnClass::Dropped);
        }

        // Distinct count over non-missing values only
        let distinct = series.drop_nulls().n_unique()?;
        if distinct <= 1 {
            return Ok(ColumnClass::Categorical);
        }
        if distinct as f64 <= self.categorical_threshold * rows as f64 {
            Ok(ColumnClass::Categorical)
        } else {
            Ok(ColumnClass::Numeric)
        }
    }
}
