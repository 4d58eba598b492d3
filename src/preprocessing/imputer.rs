//! Missing value imputation strategies

use crate::error::{Result, ThyroidError};
use crate::preprocessing::record::{Lab, PatientRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy for imputing missing values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with the most frequent value (categorical only)
    MostFrequent,
    /// Replace with the column mean (labs only)
    Mean,
    /// Replace with the mean of the patient's equal-width age bin (labs only)
    AgeBinnedMean { n_bins: usize },
}

/// Field of a record that can be imputed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputeColumn {
    Sex,
    Lab(Lab),
}

impl ImputeColumn {
    pub fn name(&self) -> &'static str {
        match self {
            ImputeColumn::Sex => "sex",
            ImputeColumn::Lab(lab) => lab.column(),
        }
    }
}

/// Equal-width age bins, right-closed, with the lowest edge nudged down so the
/// minimum age falls into the first bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeBins {
    edges: Vec<f64>,
}

impl AgeBins {
    pub fn fit(ages: &[f64], n_bins: usize) -> Result<Self> {
        if n_bins == 0 {
            return Err(ThyroidError::InvalidParameter {
                name: "n_bins".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let (mut lo, mut hi) = ages
            .iter()
            .copied()
            .filter(|a| a.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), a| (lo.min(a), hi.max(a)));
        if !lo.is_finite() {
            return Err(ThyroidError::ImputationError(
                "no observed ages to build age bins from".to_string(),
            ));
        }

        if lo == hi {
            let pad = if lo == 0.0 { 0.001 } else { 0.001 * lo.abs() };
            lo -= pad;
            hi += pad;
            let step = (hi - lo) / n_bins as f64;
            let edges = (0..=n_bins).map(|i| lo + step * i as f64).collect();
            return Ok(Self { edges });
        }

        let step = (hi - lo) / n_bins as f64;
        let mut edges: Vec<f64> = (0..=n_bins).map(|i| lo + step * i as f64).collect();
        edges[n_bins] = hi;
        edges[0] -= (hi - lo) * 0.001;
        Ok(Self { edges })
    }

    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Bin index of `age`; ages outside the fitted range go to the edge bins
    pub fn bin_of(&self, age: f64) -> usize {
        let n = self.n_bins();
        self.edges[1..]
            .iter()
            .position(|&upper| age <= upper)
            .unwrap_or(n - 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeValue {
    Text(String),
    Numeric(f64),
    Binned {
        bins: AgeBins,
        means: Vec<f64>,
    },
}

/// Imputer for record fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: Vec<(ImputeColumn, ImputeValue)>,
    is_fitted: bool,
}

impl Imputer {
    /// Create a new imputer with the specified strategy
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn strategy(&self) -> ImputeStrategy {
        self.strategy
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Learned fill value for `column`
    pub fn fill_value(&self, column: ImputeColumn) -> Option<&ImputeValue> {
        self.fill_values
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    /// Fit the imputer to the records
    pub fn fit(&mut self, records: &[PatientRecord], columns: &[ImputeColumn]) -> Result<&mut Self> {
        if records.is_empty() {
            return Err(ThyroidError::EmptyInput(
                "cannot fit an imputer on zero records".to_string(),
            ));
        }

        self.fill_values.clear();
        for &column in columns {
            let value = self.compute_fill_value(records, column)?;
            self.fill_values.push((column, value));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Fill missing values in place
    pub fn transform(&self, records: &mut [PatientRecord]) -> Result<()> {
        if !self.is_fitted {
            return Err(ThyroidError::ModelNotFitted);
        }

        for (column, value) in &self.fill_values {
            for record in records.iter_mut() {
                Self::fill_record(record, *column, value)?;
            }
        }
        Ok(())
    }

    /// Fit and transform in one step
    pub fn fit_transform(
        &mut self,
        records: &mut [PatientRecord],
        columns: &[ImputeColumn],
    ) -> Result<()> {
        self.fit(records, columns)?;
        self.transform(records)
    }

    fn compute_fill_value(&self, records: &[PatientRecord], column: ImputeColumn) -> Result<ImputeValue> {
        match (self.strategy, column) {
            (ImputeStrategy::MostFrequent, ImputeColumn::Sex) => {
                let mode = most_frequent(records.iter().filter_map(|r| r.sex.as_deref()))
                    .ok_or_else(|| {
                        ThyroidError::ImputationError("no observed values for 'sex'".to_string())
                    })?;
                Ok(ImputeValue::Text(mode))
            }
            (ImputeStrategy::Mean, ImputeColumn::Lab(lab)) => {
                Ok(ImputeValue::Numeric(observed_mean(records, lab)?))
            }
            (ImputeStrategy::AgeBinnedMean { n_bins }, ImputeColumn::Lab(lab)) => {
                let global = observed_mean(records, lab)?;
                let ages: Vec<f64> = records.iter().filter_map(|r| r.age).collect();
                let bins = AgeBins::fit(&ages, n_bins)?;

                let mut sums = vec![0.0; bins.n_bins()];
                let mut counts = vec![0usize; bins.n_bins()];
                for record in records {
                    if let (Some(age), Some(value)) = (record.age, record.lab(lab)) {
                        let b = bins.bin_of(age);
                        sums[b] += value;
                        counts[b] += 1;
                    }
                }

                // Empty bins fall back to the global mean
                let means = sums
                    .iter()
                    .zip(&counts)
                    .map(|(&s, &c)| if c == 0 { global } else { s / c as f64 })
                    .collect();

                Ok(ImputeValue::Binned { bins, means })
            }
            (strategy, column) => Err(ThyroidError::InvalidParameter {
                name: "strategy".to_string(),
                value: format!("{strategy:?}"),
                reason: format!("not applicable to column '{}'", column.name()),
            }),
        }
    }

    fn fill_record(record: &mut PatientRecord, column: ImputeColumn, value: &ImputeValue) -> Result<()> {
        match (column, value) {
            (ImputeColumn::Sex, ImputeValue::Text(mode)) => {
                if record.sex.is_none() {
                    record.sex = Some(mode.clone());
                }
            }
            (ImputeColumn::Lab(lab), ImputeValue::Numeric(mean)) => {
                if record.lab(lab).is_none() {
                    record.set_lab(lab, Some(*mean));
                }
            }
            (ImputeColumn::Lab(lab), ImputeValue::Binned { bins, means }) => {
                if record.lab(lab).is_none() {
                    let age = record.age.ok_or_else(|| {
                        ThyroidError::ImputationError(format!(
                            "patient '{}' has no age to bin {}",
                            record.patient_id,
                            lab.column()
                        ))
                    })?;
                    record.set_lab(lab, Some(means[bins.bin_of(age)]));
                }
            }
            (column, _) => {
                return Err(ThyroidError::ImputationError(format!(
                    "fill value does not match column '{}'",
                    column.name()
                )))
            }
        }
        Ok(())
    }
}

/// Most frequent value; ties go to the lexicographically smallest
pub fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    // BTreeMap iterates in key order, so the first maximum wins ties
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string())
}

fn observed_mean(records: &[PatientRecord], lab: Lab) -> Result<f64> {
    let (sum, n) = records
        .iter()
        .filter_map(|r| r.lab(lab))
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        return Err(ThyroidError::ImputationError(format!(
            "column '{}' has no observed values to average",
            lab.column()
        )));
    }
    Ok(sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, age: f64) -> PatientRecord {
        PatientRecord::new(id).with_age(age)
    }

    #[test]
    fn test_most_frequent_tie_break() {
        let mode = most_frequent(["M", "F", "M", "F"].into_iter());
        assert_eq!(mode.as_deref(), Some("F"));
        assert_eq!(most_frequent(std::iter::empty()), None);
    }

    #[test]
    fn test_age_bins_right_closed() {
        let bins = AgeBins::fit(&[0.0, 100.0], 10).unwrap();
        assert_eq!(bins.n_bins(), 10);
        assert_eq!(bins.bin_of(0.0), 0);
        assert_eq!(bins.bin_of(10.0), 0);
        assert_eq!(bins.bin_of(10.5), 1);
        assert_eq!(bins.bin_of(100.0), 9);
        // Out-of-range ages clamp to the edge bins
        assert_eq!(bins.bin_of(-5.0), 0);
        assert_eq!(bins.bin_of(130.0), 9);
    }

    #[test]
    fn test_age_bins_single_value() {
        let bins = AgeBins::fit(&[40.0, 40.0], 10).unwrap();
        let b = bins.bin_of(40.0);
        assert!(b < 10);
    }

    #[test]
    fn test_sex_mode_imputation() {
        let mut records = vec![
            record("1", 30.0).with_sex("F"),
            record("2", 40.0).with_sex("F"),
            record("3", 50.0).with_sex("M"),
            record("4", 60.0),
        ];
        let mut imputer = Imputer::new(ImputeStrategy::MostFrequent);
        imputer.fit_transform(&mut records, &[ImputeColumn::Sex]).unwrap();
        assert_eq!(records[3].sex.as_deref(), Some("F"));
    }

    #[test]
    fn test_binned_mean_with_empty_bin_fallback() {
        let mut records = vec![
            record("1", 10.0).with_lab(Lab::T3, 1.0),
            record("2", 12.0).with_lab(Lab::T3, 3.0),
            record("3", 90.0).with_lab(Lab::T3, 10.0),
            record("4", 11.0),
            record("5", 50.0),
        ];
        let mut imputer = Imputer::new(ImputeStrategy::AgeBinnedMean { n_bins: 10 });
        imputer
            .fit_transform(&mut records, &[ImputeColumn::Lab(Lab::T3)])
            .unwrap();

        assert_eq!(records[3].t3, Some(2.0));
        // Age 50 sits in a bin with no observed T3
        let global = (1.0 + 3.0 + 10.0) / 3.0;
        assert!((records[4].t3.unwrap() - global).abs() < 1e-12);
        assert!(records.iter().all(|r| r.t3.is_some()));
    }

    #[test]
    fn test_mean_imputation() {
        let mut records = vec![
            record("1", 20.0).with_lab(Lab::Fti, 100.0),
            record("2", 30.0).with_lab(Lab::Fti, 120.0),
            record("3", 40.0),
        ];
        let mut imputer = Imputer::new(ImputeStrategy::Mean);
        imputer
            .fit_transform(&mut records, &[ImputeColumn::Lab(Lab::Fti)])
            .unwrap();
        assert_eq!(records[2].fti, Some(110.0));
    }

    #[test]
    fn test_all_missing_column_errors() {
        let records = vec![record("1", 20.0), record("2", 30.0)];
        let mut imputer = Imputer::new(ImputeStrategy::Mean);
        let err = imputer.fit(&records, &[ImputeColumn::Lab(Lab::T4u)]).unwrap_err();
        assert!(matches!(err, ThyroidError::ImputationError(_)));
    }

    #[test]
    fn test_strategy_column_mismatch() {
        let records = vec![record("1", 20.0).with_sex("M")];
        let mut imputer = Imputer::new(ImputeStrategy::Mean);
        assert!(matches!(
            imputer.fit(&records, &[ImputeColumn::Sex]),
            Err(ThyroidError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_transform_before_fit() {
        let imputer = Imputer::new(ImputeStrategy::Mean);
        let mut records = vec![record("1", 20.0)];
        assert!(matches!(
            imputer.transform(&mut records),
            Err(ThyroidError::ModelNotFitted)
        ));
    }
}
