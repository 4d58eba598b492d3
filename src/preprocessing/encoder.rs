//! Categorical encoding and the frozen feature schema

use crate::error::{Result, ThyroidError};
use crate::preprocessing::policy::DiagnosticClass;
use crate::preprocessing::record::{PatientRecord, CATEGORICAL_COLUMNS};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Observed categories of one column, sorted lexicographically
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLevels {
    pub column: String,
    pub categories: Vec<String>,
}

/// One-hot encoder over the categorical record fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    drop_first: bool,
    levels: Vec<CategoryLevels>,
    is_fitted: bool,
}

impl OneHotEncoder {
    /// Create a drop-first encoder
    pub fn new() -> Self {
        Self {
            drop_first: true,
            levels: Vec::new(),
            is_fitted: false,
        }
    }

    /// Keep or drop the first (baseline) category of each column
    pub fn with_drop_first(mut self, drop_first: bool) -> Self {
        self.drop_first = drop_first;
        self
    }

    pub fn levels(&self) -> &[CategoryLevels] {
        &self.levels
    }

    /// Fit the encoder to the records
    pub fn fit(&mut self, records: &[PatientRecord]) -> Result<&mut Self> {
        self.levels = CATEGORICAL_COLUMNS
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let categories: BTreeSet<&str> =
                    records.iter().filter_map(|r| r.categorical(idx)).collect();
                CategoryLevels {
                    column: column.to_string(),
                    categories: categories.into_iter().map(str::to_string).collect(),
                }
            })
            .collect();

        self.is_fitted = true;
        Ok(self)
    }

    /// Output column names, `<column>_<category>`
    pub fn feature_names(&self) -> Vec<String> {
        let skip = usize::from(self.drop_first);
        self.levels
            .iter()
            .flat_map(|lv| {
                lv.categories
                    .iter()
                    .skip(skip)
                    .map(move |cat| format!("{}_{}", lv.column, cat))
            })
            .collect()
    }

    /// Encode records into indicator columns
    pub fn transform(&self, records: &[PatientRecord]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ThyroidError::ModelNotFitted);
        }

        let skip = usize::from(self.drop_first);
        let width: usize = self
            .levels
            .iter()
            .map(|lv| lv.categories.len().saturating_sub(skip))
            .sum();

        let mut out = Array2::<f64>::zeros((records.len(), width));
        for (row, record) in records.iter().enumerate() {
            let mut offset = 0;
            for (idx, lv) in self.levels.iter().enumerate() {
                let n_out = lv.categories.len().saturating_sub(skip);
                if let Some(value) = record.categorical(idx) {
                    if let Some(pos) = lv.categories.iter().position(|c| c == value) {
                        if pos >= skip {
                            out[[row, offset + pos - skip]] = 1.0;
                        }
                    }
                }
                offset += n_out;
            }
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, records: &[PatientRecord]) -> Result<Array2<f64>> {
        self.fit(records)?;
        self.transform(records)
    }

    /// Recover the category of column `column_idx` from one encoded row: an
    /// all-zero block is the dropped baseline, otherwise the hot position.
    pub fn decode(&self, column_idx: usize, encoded_row: &[f64]) -> Option<&str> {
        let skip = usize::from(self.drop_first);
        let lv = self.levels.get(column_idx)?;
        let offset: usize = self.levels[..column_idx]
            .iter()
            .map(|l| l.categories.len().saturating_sub(skip))
            .sum();
        let n_out = lv.categories.len().saturating_sub(skip);
        let block = encoded_row.get(offset..offset + n_out)?;

        let hot = block
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0.0)
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i + skip);

        match hot {
            Some(i) => lv.categories.get(i).map(String::as_str),
            None if self.drop_first => lv.categories.first().map(String::as_str),
            None => None,
        }
    }
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Dense integer codes for the classes present at training time, in
/// canonical class order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<DiagnosticClass>,
}

impl LabelEncoder {
    pub fn fit(labels: &[DiagnosticClass]) -> Self {
        let present: BTreeSet<DiagnosticClass> = labels.iter().copied().collect();
        let classes = DiagnosticClass::LABELED
            .iter()
            .copied()
            .filter(|c| present.contains(c))
            .collect();
        Self { classes }
    }

    pub fn classes(&self) -> &[DiagnosticClass] {
        &self.classes
    }

    pub fn encode(&self, class: DiagnosticClass) -> Result<i64> {
        self.classes
            .iter()
            .position(|&c| c == class)
            .map(|i| i as i64)
            .ok_or_else(|| {
                ThyroidError::DataError(format!("class '{class}' was not seen during fitting"))
            })
    }

    pub fn encode_all(&self, labels: &[DiagnosticClass]) -> Result<Array1<i64>> {
        labels
            .iter()
            .map(|&c| self.encode(c))
            .collect::<Result<Vec<_>>>()
            .map(Array1::from_vec)
    }

    /// Reverse lookup; codes outside the fitted range decode to `Other`
    pub fn decode(&self, code: i64) -> DiagnosticClass {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.classes.get(i).copied())
            .unwrap_or(DiagnosticClass::Other)
    }
}

/// Column layout frozen at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub feature_names: Vec<String>,
    pub labels: LabelEncoder,
}

impl FeatureSchema {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Reorder `matrix` (columns named by `names`) into the frozen layout.
    /// Columns the schema lacks are dropped; schema columns the input lacks
    /// are zero-filled.
    pub fn align(&self, names: &[String], matrix: &Array2<f64>) -> Result<Array2<f64>> {
        if names.len() != matrix.ncols() {
            return Err(ThyroidError::ShapeError {
                expected: format!("{} named columns", names.len()),
                actual: format!("{} columns", matrix.ncols()),
            });
        }

        let index: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();

        let sources: Vec<Option<usize>> = self
            .feature_names
            .iter()
            .map(|n| index.get(n.as_str()).copied())
            .collect();

        Ok(Array2::from_shape_fn(
            (matrix.nrows(), self.feature_names.len()),
            |(i, j)| sources[j].map_or(0.0, |src| matrix[[i, src]]),
        ))
    }
}
