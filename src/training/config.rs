//! Pipeline configuration

use crate::error::{Result, ThyroidError};
use crate::preprocessing::PreprocessingConfig;
use super::registry::ModelKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Training-partition rebalancing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    pub enabled: bool,
    /// SMOTE neighbours
    pub smote_k: usize,
    /// ENN neighbours
    pub enn_k: usize,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smote_k: 5,
            enn_k: 3,
        }
    }
}

/// End-to-end training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seed for splitting, balancing and every model
    pub seed: u64,
    /// Fraction held out as the test partition
    pub test_size: f64,
    /// Fraction of the remainder held out for validation
    pub validation_size: f64,
    pub balancer: BalancerConfig,
    pub models: Vec<ModelKind>,
    pub model_dir: PathBuf,
    pub preprocessing: PreprocessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_size: 0.2,
            validation_size: 0.25,
            balancer: BalancerConfig::default(),
            models: ModelKind::ALL.to_vec(),
            model_dir: PathBuf::from("models"),
            preprocessing: PreprocessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; absent fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ThyroidError::DataError(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    pub fn with_models(mut self, models: Vec<ModelKind>) -> Self {
        self.models = models;
        self
    }

    pub fn with_balancing(mut self, enabled: bool) -> Self {
        self.balancer.enabled = enabled;
        self
    }

    pub fn with_preprocessing(mut self, config: PreprocessingConfig) -> Self {
        self.preprocessing = config;
        self
    }

    /// Reject fractions outside (0, 1), zero neighbour counts and an empty model list
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("test_size", self.test_size), ("validation_size", self.validation_size)] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ThyroidError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must lie strictly between 0 and 1".to_string(),
                });
            }
        }
        for (name, value) in [("smote_k", self.balancer.smote_k), ("enn_k", self.balancer.enn_k)] {
            if value == 0 {
                return Err(ThyroidError::InvalidParameter {
                    name: name.to_string(),
                    value: "0".to_string(),
                    reason: "needs at least one neighbour".to_string(),
                });
            }
        }
        if self.models.is_empty() {
            return Err(ThyroidError::InvalidParameter {
                name: "models".to_string(),
                value: "[]".to_string(),
                reason: "select at least one model".to_string(),
            });
        }
        Ok(())
    }
}
