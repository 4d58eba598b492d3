//! Preprocessing configuration

use crate::preprocessing::record::Lab;
use serde::{Deserialize, Serialize};

/// Configuration for record preprocessing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Records older than this are discarded
    pub max_age: f64,

    /// Number of equal-width age bins for bucketed imputation
    pub n_age_bins: usize,

    /// Labs filled with their age-bin mean
    pub binned_labs: Vec<Lab>,

    /// Labs filled with their global mean
    pub mean_labs: Vec<Lab>,

    /// Drop "No Condition" records that lack any core lab
    pub drop_incomplete_healthy: bool,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            max_age: 100.0,
            n_age_bins: 10,
            binned_labs: vec![Lab::T3, Lab::Tt4, Lab::Tsh],
            mean_labs: vec![Lab::T4u, Lab::Fti],
            drop_incomplete_healthy: true,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the age cutoff
    pub fn with_max_age(mut self, max_age: f64) -> Self {
        self.max_age = max_age;
        self
    }

    /// Builder method to set the number of age bins
    pub fn with_age_bins(mut self, n_bins: usize) -> Self {
        self.n_age_bins = n_bins.max(1);
        self
    }

    /// Builder method to toggle healthy-row filtering
    pub fn with_drop_incomplete_healthy(mut self, enabled: bool) -> Self {
        self.drop_incomplete_healthy = enabled;
        self
    }
}
