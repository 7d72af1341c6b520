//! Training-time preprocessing
//!
//! Imports a dataset, drops missing-label rows, tokenizes classification
//! labels, classifies and imputes every remaining column in original order,
//! and hands the cleaned frame to the external engine. The ordered feature
//! list accumulated here becomes the schema artifact; serving replays it
//! column for column.

use crate::artifacts::{self, ConstantsArtifact, SchemaArtifact};
use crate::classify::{ColumnClassifier, ColumnClass, ColumnDescriptor, ColumnKind, ColumnRole};
use crate::engine::{ModelEngine, TrainOutcome};
use crate::error::{PrepError, Result};
use crate::impute::{self, FittedImpute, ImputeValue};
use crate::labels::LabelMap;
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Kind of supervised task the data is being prepared for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Classify,
    Regress,
}

impl FromStr for TaskKind {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "classify" => Ok(TaskKind::Classify),
            "regress" => Ok(TaskKind::Regress),
            other => Err(PrepError::UnsupportedInput(format!(
                "unknown task '{other}', expected 'classify' or 'regress'"
            ))),
        }
    }
}

/// Per-column fit computed before any mutation is applied
enum ColumnFit {
    Dropped { reason: String },
    Keep { kind: ColumnKind, fitted: FittedImpute },
}

/// Orchestrates column classification, imputation fitting, and label
/// tokenization over a full training dataset.
pub struct Trainer {
    data: DataFrame,
    /// Snapshot taken after label-row filtering, before imputation; used to
    /// refit individual columns without redoing the whole pass
    raw: Option<DataFrame>,
    columns: Vec<String>,
    label: Option<String>,
    task: TaskKind,
    features: Vec<String>,
    categorical_features: Vec<String>,
    descriptors: Vec<ColumnDescriptor>,
    constants: BTreeMap<String, ImputeValue>,
    label_map: Option<LabelMap>,
    cleaned: bool,
}

impl Trainer {
    /// Import training data from a file. Only CSV input is supported;
    /// anything else is a fatal format error.
    pub fn from_path(path: &str, task: TaskKind) -> Result<Self> {
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if extension != "csv" {
            return Err(PrepError::UnsupportedFormat(extension));
        }

        let file = File::open(path)?;
        let data = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(file)
            .finish()?;

        Ok(Self::from_dataframe(data, task))
    }

    pub fn from_dataframe(data: DataFrame, task: TaskKind) -> Self {
        let columns = data
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self {
            data,
            raw: None,
            columns,
            label: None,
            task,
            features: Vec::new(),
            categorical_features: Vec::new(),
            descriptors: Vec::new(),
            constants: BTreeMap::new(),
            label_map: None,
            cleaned: false,
        }
    }

    /// Designate a column as the training label
    pub fn set_label(&mut self, column: &str) -> Result<()> {
        if !self.columns.iter().any(|c| c == column) {
            return Err(PrepError::ColumnNotFound(column.to_string()));
        }
        if let Some(previous) = &self.label {
            info!(previous = %previous, label = %column, "overwriting label column");
        } else {
            info!(label = %column, "setting label column");
        }
        self.label = Some(column.to_string());
        Ok(())
    }

    /// Clean the dataset for model training.
    ///
    /// Rows with a missing label are removed first; classification labels
    /// are then tokenized; finally every column except the label is
    /// classified and imputed in original column order, accumulating the
    /// feature list the serving process must reproduce exactly.
    pub fn clean(&mut self, drop_threshold: f64) -> Result<()> {
        let label = self.label.clone().ok_or(PrepError::LabelNotSet)?;

        info!(label = %label, "dropping rows with missing label");
        let mask = self
            .data
            .column(&label)
            .map_err(|_| PrepError::ColumnNotFound(label.clone()))?
            .as_materialized_series()
            .is_not_null();
        self.data = self.data.filter(&mask)?;

        if self.task == TaskKind::Classify {
            info!("tokenizing classification labels");
            let series = self.data.column(&label)?.as_materialized_series().clone();
            let map = LabelMap::fit(&series)?;
            let encoded = map.encode(&series)?;
            self.data.replace(&label, encoded)?;
            self.label_map = Some(map);
        }

        self.raw = Some(self.data.clone());

        let classifier = ColumnClassifier::new(drop_threshold);
        let candidates: Vec<String> = self
            .columns
            .iter()
            .filter(|c| **c != label)
            .cloned()
            .collect();

        // Column fits are independent; only the accumulation below has to
        // stay in original column order.
        let fits: Vec<(String, Result<ColumnFit>)> = candidates
            .par_iter()
            .map(|col| (col.clone(), fit_column(&self.data, col, &classifier)))
            .collect();

        self.features.clear();
        self.categorical_features.clear();
        self.descriptors.clear();
        self.constants.clear();

        for (col, fit) in fits {
            match fit? {
                ColumnFit::Dropped { reason } => {
                    warn!(column = %col, reason = %reason, "dropping column");
                    self.descriptors.push(ColumnDescriptor {
                        name: col,
                        role: ColumnRole::Dropped,
                        kind: None,
                        impute_value: None,
                        has_indicator: false,
                    });
                }
                ColumnFit::Keep { kind, fitted } => {
                    if fitted.needs_indicator {
                        let series = self.data.column(&col)?.as_materialized_series().clone();
                        let filled = impute::fill_series(&series, &fitted.value)?;
                        let flag = impute::indicator_series(&series, &col);
                        self.data.replace(&col, filled)?;
                        self.data.with_column(flag)?;
                        self.features.push(col.clone());
                        self.features.push(impute::indicator_name(&col));
                    } else {
                        self.features.push(col.clone());
                    }
                    if kind == ColumnKind::Categorical {
                        self.categorical_features.push(col.clone());
                    }
                    self.constants.insert(col.clone(), fitted.value.clone());
                    self.descriptors.push(ColumnDescriptor {
                        name: col,
                        role: ColumnRole::Feature,
                        kind: Some(kind),
                        impute_value: Some(fitted.value),
                        has_indicator: fitted.needs_indicator,
                    });
                }
            }
        }

        let mut selection = self.features.clone();
        selection.push(label.clone());
        self.data = self.data.select(selection.iter().map(|s| s.as_str()))?;

        info!(
            categorical = ?self.categorical_features,
            features = self.features.len(),
            "imputed and flagged missing data"
        );
        self.cleaned = true;
        Ok(())
    }

    /// Manually force the named columns to categorical, re-running
    /// imputation for just those columns against the raw snapshot. Columns
    /// dropped during cleaning stay dropped.
    pub fn set_categorical(&mut self, columns: &[String]) -> Result<()> {
        for col in columns {
            if !self.columns.iter().any(|c| c == col) {
                return Err(PrepError::ColumnNotFound(col.clone()));
            }
        }
        if !self.cleaned {
            self.categorical_features = columns.to_vec();
            return Ok(());
        }

        let raw = self
            .raw
            .clone()
            .ok_or_else(|| PrepError::DataError("raw snapshot missing after clean".to_string()))?;

        for col in columns {
            let position = self.descriptors.iter().position(|d| d.name == *col);
            match position {
                Some(i) if self.descriptors[i].role == ColumnRole::Feature => {
                    if self.descriptors[i].kind == Some(ColumnKind::Categorical) {
                        continue;
                    }
                    let series = raw.column(col)?.as_materialized_series().clone();
                    let fitted = impute::fit(&series, ColumnKind::Categorical)?;
                    let filled = impute::fill_series(&series, &fitted.value)?;
                    self.data.replace(col, filled)?;
                    self.constants.insert(col.clone(), fitted.value.clone());
                    self.descriptors[i].kind = Some(ColumnKind::Categorical);
                    self.descriptors[i].impute_value = Some(fitted.value);
                    info!(column = %col, "reclassified column as categorical");
                }
                _ => {
                    warn!(column = %col, "cannot reclassify a dropped column; leaving as-is");
                }
            }
        }

        self.categorical_features = self
            .descriptors
            .iter()
            .filter(|d| d.role == ColumnRole::Feature && d.kind == Some(ColumnKind::Categorical))
            .map(|d| d.name.clone())
            .collect();
        Ok(())
    }

    /// Hand the cleaned dataset to the external engine and persist the
    /// schema and constants artifacts under a shared fresh version.
    pub fn initiate(
        &self,
        engine: &dyn ModelEngine,
        max_runtime_secs: u64,
        index_column: Option<&str>,
        config_dir: &Path,
    ) -> Result<TrainOutcome> {
        if !self.cleaned {
            return Err(PrepError::DataError(
                "clean must run before training is initiated".to_string(),
            ));
        }
        let label = self.label.clone().ok_or(PrepError::LabelNotSet)?;

        let outcome = engine.train(&self.data, &label, index_column, max_runtime_secs)?;
        info!(model_path = %outcome.model_path, "training complete");

        self.write_artifacts(&outcome.model_path, index_column, config_dir)?;
        Ok(outcome)
    }

    /// Persist the schema and constants artifacts for a given model
    /// location. Both files carry the same fresh version identifier.
    pub fn write_artifacts(
        &self,
        model_path: &str,
        index_column: Option<&str>,
        config_dir: &Path,
    ) -> Result<(SchemaArtifact, ConstantsArtifact)> {
        if !self.cleaned {
            return Err(PrepError::DataError(
                "clean must run before artifacts are written".to_string(),
            ));
        }
        let label = self.label.clone().ok_or(PrepError::LabelNotSet)?;

        let version = artifacts::new_version();
        let schema = SchemaArtifact {
            model_path: model_path.to_string(),
            index: index_column.map(str::to_string),
            features: self.features.clone(),
            columns: self.columns.clone(),
            label,
            label_map: self
                .label_map
                .as_ref()
                .map(|m| m.forward().clone())
                .unwrap_or_default(),
            version: version.clone(),
        };
        let constants = ConstantsArtifact::new(version.clone(), self.constants.clone());

        std::fs::create_dir_all(config_dir)?;
        schema.save(config_dir)?;
        constants.save(config_dir)?;
        info!(version = %version, dir = %config_dir.display(), "artifacts written");
        Ok((schema, constants))
    }

    /// Write the cleaned dataset to a CSV file
    pub fn save_cleaned(&mut self, path: &str) -> Result<()> {
        if !self.cleaned {
            return Err(PrepError::DataError(
                "clean must run before the dataset is saved".to_string(),
            ));
        }
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).finish(&mut self.data)?;
        Ok(())
    }

    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn categorical_features(&self) -> &[String] {
        &self.categorical_features
    }

    pub fn descriptors(&self) -> &[ColumnDescriptor] {
        &self.descriptors
    }

    pub fn constants(&self) -> &BTreeMap<String, ImputeValue> {
        &self.constants
    }

    pub fn label_map(&self) -> Option<&LabelMap> {
        self.label_map.as_ref()
    }
}

fn fit_column(df: &DataFrame, col: &str, classifier: &ColumnClassifier) -> Result<ColumnFit> {
    let column = df
        .column(col)
        .map_err(|_| PrepError::ColumnNotFound(col.to_string()))?;
    let series = column.as_materialized_series();

    match classifier.classify(series)? {
        ColumnClass::Dropped => Ok(ColumnFit::Dropped {
            reason: "missing fraction at or above drop threshold".to_string(),
        }),
        ColumnClass::Categorical => {
            let fitted = impute::fit(series, ColumnKind::Categorical)?;
            Ok(ColumnFit::Keep {
                kind: ColumnKind::Categorical,
                fitted,
            })
        }
        ColumnClass::Numeric => match impute::fit(series, ColumnKind::Numeric) {
            Ok(fitted) => Ok(ColumnFit::Keep {
                kind: ColumnKind::Numeric,
                fitted,
            }),
            // Malformed numeric data drops the column, not the run
            Err(PrepError::DataError(reason)) => Ok(ColumnFit::Dropped { reason }),
            Err(e) => Err(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::DEFAULT_DROP_THRESHOLD;

    fn sample_df() -> DataFrame {
        df!(
            "age" => &[Some(30.0), None, Some(41.0), Some(30.0)],
            "city" => &[Some("NY"), Some("NY"), Some("LA"), Some("NY")],
        )
        .unwrap()
    }

    #[test]
    fn test_clean_without_label_fails() {
        let mut trainer = Trainer::from_dataframe(sample_df(), TaskKind::Classify);
        let result = trainer.clean(DEFAULT_DROP_THRESHOLD);
        assert!(matches!(result, Err(PrepError::LabelNotSet)));
    }

    #[test]
    fn test_set_label_unknown_column_fails() {
        let mut trainer = Trainer::from_dataframe(sample_df(), TaskKind::Classify);
        let result = trainer.set_label("missing");
        assert!(matches!(result, Err(PrepError::ColumnNotFound(_))));
    }

    #[test]
    fn test_clean_drops_rows_with_missing_label() {
        let df = df!(
            "age" => &[Some(30.0), Some(40.0), Some(50.0)],
            "city" => &[Some("NY"), None, Some("NY")],
        )
        .unwrap();
        let mut trainer = Trainer::from_dataframe(df, TaskKind::Classify);
        trainer.set_label("city").unwrap();
        trainer.clean(DEFAULT_DROP_THRESHOLD).unwrap();
        assert_eq!(trainer.data().height(), 2);
    }

    #[test]
    fn test_clean_imputes_and_flags() {
        let mut trainer = Trainer::from_dataframe(sample_df(), TaskKind::Classify);
        trainer.set_label("city").unwrap();
        trainer.clean(DEFAULT_DROP_THRESHOLD).unwrap();

        // age is numeric with a missing value: indicator column follows it
        assert_eq!(trainer.features(), &["age", "age_imputed"]);
        // mean(30, 41, 30) = 33.67, truncated to 33
        assert_eq!(trainer.constants().get("age"), Some(&ImputeValue::Integer(33)));

        let age = trainer.data().column("age").unwrap();
        assert_eq!(age.null_count(), 0);
        let flags = trainer.data().column("age_imputed").unwrap();
        let flags = flags.as_materialized_series().i32().unwrap().clone();
        assert_eq!(flags.get(1), Some(1));
        assert_eq!(flags.get(0), Some(0));
    }

    #[test]
    fn test_cleaned_dataset_ends_with_label() {
        let mut trainer = Trainer::from_dataframe(sample_df(), TaskKind::Classify);
        trainer.set_label("city").unwrap();
        trainer.clean(DEFAULT_DROP_THRESHOLD).unwrap();

        let names: Vec<String> = trainer
            .data()
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names.last().map(String::as_str), Some("city"));
    }

    #[test]
    fn test_classification_label_is_tokenized() {
        let mut trainer = Trainer::from_dataframe(sample_df(), TaskKind::Classify);
        trainer.set_label("city").unwrap();
        trainer.clean(DEFAULT_DROP_THRESHOLD).unwrap();

        let map = trainer.label_map().expect("classification builds a map");
        assert_eq!(map.len(), 2);
        let label = trainer.data().column("city").unwrap();
        let label = label.as_materialized_series().str().unwrap().clone();
        assert_eq!(label.get(0), map.token_for("NY"));
    }

    #[test]
    fn test_regression_label_is_not_tokenized() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0],
            "y" => &[1.5, 2.5, 3.5, 4.5],
        )
        .unwrap();
        let mut trainer = Trainer::from_dataframe(df, TaskKind::Regress);
        trainer.set_label("y").unwrap();
        trainer.clean(DEFAULT_DROP_THRESHOLD).unwrap();
        assert!(trainer.label_map().is_none());
    }

    #[test]
    fn test_mostly_missing_column_is_dropped() {
        let df = df!(
            "sparse" => &[Some(1.0), None, None, None, None],
            "label" => &[1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();
        let mut trainer = Trainer::from_dataframe(df, TaskKind::Regress);
        trainer.set_label("label").unwrap();
        trainer.clean(DEFAULT_DROP_THRESHOLD).unwrap();

        assert!(trainer.features().is_empty());
        let dropped = trainer
            .descriptors()
            .iter()
            .find(|d| d.name == "sparse")
            .unwrap();
        assert_eq!(dropped.role, ColumnRole::Dropped);
    }

    #[test]
    fn test_set_categorical_refits_named_column() {
        let mut trainer = Trainer::from_dataframe(sample_df(), TaskKind::Classify);
        trainer.set_label("city").unwrap();
        trainer.clean(DEFAULT_DROP_THRESHOLD).unwrap();
        assert_eq!(trainer.constants().get("age"), Some(&ImputeValue::Integer(33)));

        trainer.set_categorical(&["age".to_string()]).unwrap();
        // mode of [30, 41, 30] as strings is "30.0"
        assert_eq!(
            trainer.constants().get("age"),
            Some(&ImputeValue::Text("30.0".to_string()))
        );
        assert_eq!(trainer.categorical_features(), &["age".to_string()]);
    }

    #[test]
    fn test_set_categorical_unknown_column_fails() {
        let mut trainer = Trainer::from_dataframe(sample_df(), TaskKind::Classify);
        let result = trainer.set_categorical(&["missing".to_string()]);
        assert!(matches!(result, Err(PrepError::ColumnNotFound(_))));
    }

    #[test]
    fn test_unsupported_format_is_fatal() {
        let result = Trainer::from_path("data.parquet", TaskKind::Classify);
        assert!(matches!(result, Err(PrepError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_task_kind_from_str() {
        assert_eq!(TaskKind::from_str("classify").unwrap(), TaskKind::Classify);
        assert_eq!(TaskKind::from_str("regress").unwrap(), TaskKind::Regress);
        assert!(TaskKind::from_str("cluster").is_err());
    }
}
