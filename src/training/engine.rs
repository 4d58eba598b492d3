//! Training engine implementation
//!
//! Runs the batch pipeline: preprocess, split 60/20/20, rebalance the
//! training partition, fit every configured classifier and score it on the
//! validation and test partitions.

use crate::error::{Result, ThyroidError};
use crate::export::ModelArtifact;
use crate::preprocessing::{DiagnosticClass, DomainRules, FittedPreprocessor, Preprocessor};
use crate::synthetic::{class_counts, imbalance_ratio, EditedNearestNeighbours, Sampler, SMOTE, SMOTEENN};
use crate::utils::DataLoader;
use super::config::PipelineConfig;
use super::models::{Classifier, ModelMetrics};
use super::registry::{ModelKind, TrainedModel};
use super::split::train_test_split;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Scores of one trained classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub kind: ModelKind,
    pub validation: ModelMetrics,
    pub test: ModelMetrics,
    pub training_time_secs: f64,
}

/// Row counts per partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSizes {
    /// Training rows before balancing
    pub train: usize,
    /// Training rows after balancing
    pub train_balanced: usize,
    pub validation: usize,
    pub test: usize,
}

/// Everything a training run measured
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Rows in the input frame
    pub n_input: usize,
    /// Rows that survived preprocessing
    pub n_prepared: usize,
    pub n_features: usize,
    /// Classes in label-code order
    pub classes: Vec<DiagnosticClass>,
    pub partitions: PartitionSizes,
    pub train_counts_before: BTreeMap<i64, usize>,
    pub train_counts_after: BTreeMap<i64, usize>,
    pub models: Vec<ModelReport>,
}

impl TrainingReport {
    /// Models ordered by validation weighted F1, best first
    pub fn ranked(&self) -> Vec<&ModelReport> {
        let mut ranked: Vec<&ModelReport> = self.models.iter().collect();
        ranked.sort_by(|a, b| {
            b.validation
                .weighted_f1
                .partial_cmp(&a.validation.weighted_f1)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    pub fn best(&self) -> Option<&ModelReport> {
        self.ranked().into_iter().next()
    }

    /// Class name for a label code
    pub fn class_name(&self, code: i64) -> &'static str {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.classes.get(i))
            .copied()
            .unwrap_or(DiagnosticClass::Other)
            .name()
    }
}

/// Main training engine
pub struct TrainEngine {
    config: PipelineConfig,
    rules: DomainRules,
    artifacts: Vec<ModelArtifact>,
    report: Option<TrainingReport>,
}

impl TrainEngine {
    /// Create a new training engine with the standard domain rules
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            rules: DomainRules::standard(),
            artifacts: Vec::new(),
            report: None,
        }
    }

    pub fn with_rules(mut self, rules: DomainRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load a CSV and fit on it
    pub fn fit_csv(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let df = DataLoader::new().load_csv(path)?;
        self.fit(&df)
    }

    /// Run the whole pipeline on a raw frame
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.config.validate()?;
        let seed = self.config.seed;
        let start = Instant::now();

        let prepared = Preprocessor::with_config(&self.rules, self.config.preprocessing.clone())
            .prepare(df)?;
        let n_features = prepared.features.ncols();

        // 80/20, then 75/25 of the remainder
        let (rest, test) =
            train_test_split(&prepared.features, &prepared.labels, self.config.test_size, seed)?;
        let (train, validation) =
            train_test_split(&rest.x, &rest.y, self.config.validation_size, seed)?;
        info!(
            train = train.y.len(),
            validation = validation.y.len(),
            test = test.y.len(),
            "data split"
        );

        let train_counts_before = class_counts(&train.y);
        let (x_train, y_train) = self.balance(train.x, train.y)?;
        let train_counts_after = class_counts(&y_train);

        let mut models = Vec::with_capacity(self.config.models.len());
        self.artifacts.clear();
        for &kind in &self.config.models {
            let (model, report) = Self::train_one(
                kind,
                seed,
                (&x_train, &y_train),
                (&validation.x, &validation.y),
                (&test.x, &test.y),
            )?;
            self.artifacts.push(Self::artifact(
                model,
                &prepared.fitted,
                report.validation.clone(),
                y_train.len(),
            ));
            models.push(report);
        }

        info!(
            models = models.len(),
            secs = start.elapsed().as_secs_f64(),
            "training finished"
        );

        self.report = Some(TrainingReport {
            n_input: df.height(),
            n_prepared: prepared.labels.len(),
            n_features,
            classes: prepared.fitted.schema().labels.classes().to_vec(),
            partitions: PartitionSizes {
                train: train_counts_before.values().sum(),
                train_balanced: y_train.len(),
                validation: validation.y.len(),
                test: test.y.len(),
            },
            train_counts_before,
            train_counts_after,
            models,
        });
        Ok(self)
    }

    /// SMOTE then ENN on the training partition, when enabled
    pub fn balance(&self, x: Array2<f64>, y: Array1<i64>) -> Result<(Array2<f64>, Array1<i64>)> {
        let balancer = &self.config.balancer;
        if !balancer.enabled {
            return Ok((x, y));
        }
        if class_counts(&y).len() < 2 {
            warn!("single class in the training partition, balancing skipped");
            return Ok((x, y));
        }

        let mut sampler = SMOTEENN::new(
            SMOTE::new()
                .with_k_neighbors(balancer.smote_k)
                .with_seed(self.config.seed),
            EditedNearestNeighbours::new().with_n_neighbors(balancer.enn_k),
        );
        let before = imbalance_ratio(&y);
        let result = sampler.fit_resample(&x, &y)?;
        info!(
            rows_before = y.len(),
            rows_after = result.y.len(),
            synthetic = ?result.n_synthetic,
            ratio_before = before,
            ratio_after = imbalance_ratio(&result.y),
            "training partition balanced"
        );
        Ok((result.x, result.y))
    }

    fn train_one(
        kind: ModelKind,
        seed: u64,
        train: (&Array2<f64>, &Array1<i64>),
        validation: (&Array2<f64>, &Array1<i64>),
        test: (&Array2<f64>, &Array1<i64>),
    ) -> Result<(TrainedModel, ModelReport)> {
        let start = Instant::now();
        let mut model = kind.build(seed);
        model
            .fit(train.0, train.1)
            .map_err(|e| ThyroidError::TrainingError(format!("{kind}: {e}")))?;
        let training_time_secs = start.elapsed().as_secs_f64();

        let validation = ModelMetrics::compute(validation.1, &model.predict(validation.0)?)?;
        let test = ModelMetrics::compute(test.1, &model.predict(test.0)?)?;
        info!(
            model = %kind,
            accuracy = validation.accuracy,
            weighted_f1 = validation.weighted_f1,
            test_accuracy = test.accuracy,
            secs = training_time_secs,
            "model trained"
        );

        let report = ModelReport {
            kind,
            validation,
            test,
            training_time_secs,
        };
        Ok((model, report))
    }

    fn artifact(
        model: TrainedModel,
        fitted: &FittedPreprocessor,
        metrics: ModelMetrics,
        n_train: usize,
    ) -> ModelArtifact {
        ModelArtifact::new(model, fitted.clone())
            .with_metadata(|m| m.with_metrics(metrics).with_training_samples(n_train))
    }

    /// Report of the last fit
    pub fn report(&self) -> Option<&TrainingReport> {
        self.report.as_ref()
    }

    /// Trained models of the last fit, in configuration order
    pub fn artifacts(&self) -> &[ModelArtifact] {
        &self.artifacts
    }

    /// Persist every trained model into `dir`
    pub fn save_artifacts(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        if self.artifacts.is_empty() {
            return Err(ThyroidError::ModelNotFitted);
        }
        self.artifacts
            .iter()
            .map(|a| a.save_to_dir(dir.as_ref()))
            .collect()
    }
}
