//! Record preprocessing pipeline

use crate::error::{Result, ThyroidError};
use crate::utils::data_loader::{drop_measured_columns, frame_from_records, records_from_frame};
use super::{
    config::PreprocessingConfig,
    encoder::{FeatureSchema, LabelEncoder, OneHotEncoder},
    imputer::{ImputeColumn, ImputeStrategy, Imputer},
    policy::{DiagnosticClass, DomainRules},
    record::{PatientRecord, NUMERIC_COLUMNS},
};
use ndarray::{concatenate, Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Output of preprocessing a labeled batch
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Cleaned records as a frame, with the derived `class` column
    pub cleaned: DataFrame,
    /// Fully numeric feature matrix, one row per surviving record
    pub features: Array2<f64>,
    /// Dense class codes aligned with `features`
    pub labels: Array1<i64>,
    /// Derived class of every surviving record
    pub classes: Vec<DiagnosticClass>,
    /// Statistics and schema needed to preprocess unseen records the same way
    pub fitted: FittedPreprocessor,
}

/// Output of preprocessing an unlabeled batch
#[derive(Debug, Clone)]
pub struct UnlabeledData {
    pub patient_ids: Vec<String>,
    pub features: Array2<f64>,
    /// Records dropped by the age filter
    pub n_dropped: usize,
}

/// Turns raw patient records into a feature matrix and labels
pub struct Preprocessor<'a> {
    rules: &'a DomainRules,
    config: PreprocessingConfig,
}

impl<'a> Preprocessor<'a> {
    /// Create a preprocessor with default configuration
    pub fn new(rules: &'a DomainRules) -> Self {
        Self::with_config(rules, PreprocessingConfig::default())
    }

    /// Create a preprocessor with custom configuration
    pub fn with_config(rules: &'a DomainRules, config: PreprocessingConfig) -> Self {
        Self { rules, config }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Prepare a raw frame as loaded from CSV
    pub fn prepare(&self, df: &DataFrame) -> Result<PreparedData> {
        let df = drop_measured_columns(df);
        let records = records_from_frame(&df, true)?;
        self.prepare_records(records)
    }

    /// Prepare already-parsed records
    pub fn prepare_records(&self, records: Vec<PatientRecord>) -> Result<PreparedData> {
        let start = Instant::now();
        let n_input = records.len();
        if records.is_empty() {
            return Err(ThyroidError::EmptyInput("no patient records".to_string()));
        }

        let mut records = filter_by_age(records, self.config.max_age);
        info!(
            dropped = n_input - records.len(),
            remaining = records.len(),
            max_age = self.config.max_age,
            "age filter"
        );
        if records.is_empty() {
            return Err(ThyroidError::EmptyInput(format!(
                "no records with age <= {}",
                self.config.max_age
            )));
        }

        let mut sex_imputer = Imputer::new(ImputeStrategy::MostFrequent);
        sex_imputer.fit_transform(&mut records, &[ImputeColumn::Sex])?;
        debug!(fill = ?sex_imputer.fill_value(ImputeColumn::Sex), "sex imputed");

        impute_tbg(self.rules, &mut records)?;

        let mut classes = records
            .iter()
            .map(|r| match r.target.as_deref() {
                Some(code) => self.rules.targets.derive_class(code),
                None => Err(ThyroidError::DataError(format!(
                    "patient '{}' has no target code",
                    r.patient_id
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        if self.config.drop_incomplete_healthy {
            let before = records.len();
            let (kept_records, kept_classes): (Vec<_>, Vec<_>) = records
                .into_iter()
                .zip(classes)
                .filter(|(r, c)| !(*c == DiagnosticClass::NoCondition && r.missing_core_lab()))
                .unzip();
            records = kept_records;
            classes = kept_classes;
            info!(
                dropped = before - records.len(),
                remaining = records.len(),
                "incomplete no-condition filter"
            );
            if records.is_empty() {
                return Err(ThyroidError::EmptyInput(
                    "every record was removed by the no-condition filter".to_string(),
                ));
            }
        }

        let binned_columns: Vec<ImputeColumn> =
            self.config.binned_labs.iter().map(|&l| ImputeColumn::Lab(l)).collect();
        let mut binned_imputer = Imputer::new(ImputeStrategy::AgeBinnedMean {
            n_bins: self.config.n_age_bins,
        });
        binned_imputer.fit_transform(&mut records, &binned_columns)?;

        let mean_columns: Vec<ImputeColumn> =
            self.config.mean_labs.iter().map(|&l| ImputeColumn::Lab(l)).collect();
        let mut mean_imputer = Imputer::new(ImputeStrategy::Mean);
        mean_imputer.fit_transform(&mut records, &mean_columns)?;

        let cleaned = frame_from_records(&records, Some(&classes))?;

        let mut encoder = OneHotEncoder::new();
        let indicators = encoder.fit_transform(&records)?;
        let features = concatenate(Axis(1), &[numeric_matrix(&records)?.view(), indicators.view()])?;

        let feature_names: Vec<String> = NUMERIC_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(encoder.feature_names())
            .collect();

        let label_encoder = LabelEncoder::fit(&classes);
        let labels = label_encoder.encode_all(&classes)?;

        info!(
            rows = features.nrows(),
            features = features.ncols(),
            classes = label_encoder.classes().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "preprocessing complete"
        );

        Ok(PreparedData {
            cleaned,
            features,
            labels,
            classes,
            fitted: FittedPreprocessor {
                config: self.config.clone(),
                sex_imputer,
                binned_imputer,
                mean_imputer,
                schema: FeatureSchema {
                    feature_names,
                    labels: label_encoder,
                },
            },
        })
    }
}

/// Frozen preprocessing state, persisted with every trained model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    config: PreprocessingConfig,
    sex_imputer: Imputer,
    binned_imputer: Imputer,
    mean_imputer: Imputer,
    schema: FeatureSchema,
}

impl FittedPreprocessor {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Preprocess an unlabeled frame with the frozen statistics
    pub fn transform(&self, rules: &DomainRules, df: &DataFrame) -> Result<UnlabeledData> {
        let df = drop_measured_columns(df);
        let records = records_from_frame(&df, false)?;
        self.transform_records(rules, records)
    }

    /// Preprocess unlabeled records with the frozen statistics
    pub fn transform_records(
        &self,
        rules: &DomainRules,
        records: Vec<PatientRecord>,
    ) -> Result<UnlabeledData> {
        if records.is_empty() {
            return Err(ThyroidError::EmptyInput("no patient records".to_string()));
        }
        let n_input = records.len();
        let mut records = filter_by_age(records, self.config.max_age);
        let n_dropped = n_input - records.len();
        if n_dropped > 0 {
            info!(dropped = n_dropped, "age filter");
        }
        if records.is_empty() {
            return Err(ThyroidError::EmptyInput(format!(
                "no records with age <= {}",
                self.config.max_age
            )));
        }

        self.sex_imputer.transform(&mut records)?;
        impute_tbg(rules, &mut records)?;
        self.binned_imputer.transform(&mut records)?;
        self.mean_imputer.transform(&mut records)?;

        // Encode every observed category, then keep only the frozen columns
        let mut encoder = OneHotEncoder::new().with_drop_first(false);
        let indicators = encoder.fit_transform(&records)?;
        let raw = concatenate(Axis(1), &[numeric_matrix(&records)?.view(), indicators.view()])?;
        let names: Vec<String> = NUMERIC_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(encoder.feature_names())
            .collect();
        let features = self.schema.align(&names, &raw)?;

        Ok(UnlabeledData {
            patient_ids: records.into_iter().map(|r| r.patient_id).collect(),
            features,
            n_dropped,
        })
    }
}

/// Keep records with a known age no greater than `max_age`
fn filter_by_age(records: Vec<PatientRecord>, max_age: f64) -> Vec<PatientRecord> {
    records
        .into_iter()
        .filter(|r| r.age.is_some_and(|a| a <= max_age))
        .collect()
}

fn impute_tbg(rules: &DomainRules, records: &mut [PatientRecord]) -> Result<()> {
    let mut filled = 0usize;
    for record in records.iter_mut() {
        if record.tbg.is_some() {
            continue;
        }
        let age = record.age.ok_or_else(|| ThyroidError::AgeOutOfDomain {
            patient_id: record.patient_id.clone(),
            age: f64::NAN,
        })?;
        let sex = record.sex.as_deref().unwrap_or_default();
        record.tbg = Some(rules.tbg.impute(&record.patient_id, age, sex, None)?);
        filled += 1;
    }
    debug!(filled, "TBG imputed from policy table");
    Ok(())
}

fn numeric_matrix(records: &[PatientRecord]) -> Result<Array2<f64>> {
    let mut out = Array2::<f64>::zeros((records.len(), NUMERIC_COLUMNS.len()));
    for (i, record) in records.iter().enumerate() {
        for (j, value) in record.numeric_features().iter().enumerate() {
            out[[i, j]] = value.ok_or_else(|| {
                ThyroidError::ImputationError(format!(
                    "patient '{}' still has no {} after imputation",
                    record.patient_id, NUMERIC_COLUMNS[j]
                ))
            })?;
        }
    }
    Ok(out)
}
