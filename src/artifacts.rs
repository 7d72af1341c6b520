//! Persisted artifacts tying training output to serving input
//!
//! Training writes two JSON files at the end of a run: the schema artifact
//! (feature order, label, id column, model location, label map) and the
//! constants artifact (per-column impute values). Both carry the same
//! version identifier so a serving process can refuse a torn pair written
//! by two different training runs.

use crate::error::{PrepError, Result};
use crate::impute::ImputeValue;
use crate::labels::LabelMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub const SCHEMA_FILE: &str = "model_config.json";
pub const CONSTANTS_FILE: &str = "data_constants.json";

/// Generate a fresh artifact version identifier
pub fn new_version() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

/// Persisted description of feature order, label, and id column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaArtifact {
    pub model_path: String,
    pub index: Option<String>,
    /// Exact column order the model expects
    pub features: Vec<String>,
    /// Original training dataset columns
    pub columns: Vec<String>,
    pub label: String,
    /// Forward raw-label → token map; empty for regression tasks
    #[serde(default)]
    pub label_map: HashMap<String, String>,
    pub version: String,
}

impl SchemaArtifact {
    pub fn save(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(SCHEMA_FILE), json)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(dir.join(SCHEMA_FILE))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Persisted per-column impute values used to replay training-time cleaning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantsArtifact {
    pub version: String,
    pub values: BTreeMap<String, ImputeValue>,
}

impl ConstantsArtifact {
    pub fn new(version: String, values: BTreeMap<String, ImputeValue>) -> Self {
        Self { version, values }
    }

    pub fn get(&self, column: &str) -> Option<&ImputeValue> {
        self.values.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(CONSTANTS_FILE), json)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(dir.join(CONSTANTS_FILE))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Immutable training-time state loaded once at serving-process startup.
///
/// Concurrent requests read it without locking; replacing it is an explicit,
/// separately-triggered reload, never implicit file polling.
#[derive(Debug, Clone)]
pub struct ServingContext {
    pub schema: SchemaArtifact,
    pub constants: ConstantsArtifact,
    pub label_map: LabelMap,
}

impl ServingContext {
    /// Load and pair both artifacts, refusing a version mismatch
    pub fn load(dir: &Path) -> Result<Self> {
        let schema = SchemaArtifact::load(dir)?;
        let constants = ConstantsArtifact::load(dir)?;
        if schema.version != constants.version {
            return Err(PrepError::ArtifactMismatch {
                schema: schema.version,
                constants: constants.version,
            });
        }
        let label_map = LabelMap::from_forward(schema.label_map.clone());
        Ok(Self {
            schema,
            constants,
            label_map,
        })
    }

    pub fn version(&self) -> &str {
        &self.schema.version
    }
}
