//! Data loading utilities

use crate::error::{Result, ThyroidError};
use crate::preprocessing::{
    DiagnosticClass, Lab, PatientRecord, CLASS_COLUMN, FLAG_COLUMNS, MEASURED_COLUMNS,
    PATIENT_ID_COLUMN, TARGET_COLUMN,
};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// CSV loader for patient record files
pub struct DataLoader {
    /// Rows used for schema inference
    infer_schema_length: usize,
    /// Tokens read as missing
    null_values: Vec<String>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
            null_values: vec!["".to_string(), "?".to_string(), "NA".to_string()],
        }
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ThyroidError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        let nulls = self.null_values.iter().map(|s| s.as_str().into()).collect();
        let parse_opts = CsvParseOptions::default()
            .with_null_values(Some(NullValues::AllColumns(nulls)));

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "loaded csv");
        Ok(df)
    }
}

/// Writer for cleaned frames and prediction tables
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV, creating parent directories as needed
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).finish(df)?;
        Ok(())
    }
}

/// Shape and missingness overview of a raw frame
#[derive(Debug, Clone)]
pub struct FrameSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    pub null_counts: Vec<(String, usize)>,
    /// Raw target code counts, most frequent first
    pub target_counts: Vec<(String, usize)>,
}

impl FrameSummary {
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let null_counts = df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.null_count()))
            .collect();

        let mut target_counts = Vec::new();
        if df.column(TARGET_COLUMN).is_ok() {
            let mut counts = std::collections::BTreeMap::<String, usize>::new();
            for code in string_values(df, TARGET_COLUMN)?.into_iter().flatten() {
                *counts.entry(code).or_insert(0) += 1;
            }
            target_counts = counts.into_iter().collect();
            target_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        }

        Ok(Self {
            n_rows: df.height(),
            n_cols: df.width(),
            null_counts,
            target_counts,
        })
    }
}

/// Drop the `*_measured` companion columns that are present
pub fn drop_measured_columns(df: &DataFrame) -> DataFrame {
    let present: Vec<PlSmallStr> = MEASURED_COLUMNS
        .iter()
        .filter(|c| df.column(c).is_ok())
        .map(|&c| c.into())
        .collect();
    df.drop_many(present)
}

fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| ThyroidError::MissingColumn(name.to_string()))
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = require_column(df, name)?.cast(&DataType::String)?;
    let values = column
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect();
    Ok(values)
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = require_column(df, name)?.cast(&DataType::Float64)?;
    let values = column
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    Ok(values)
}

/// Convert a raw frame into patient records.
///
/// Every input column except the `*_measured` companions is required; the
/// target column only when `require_target` is set.
pub fn records_from_frame(df: &DataFrame, require_target: bool) -> Result<Vec<PatientRecord>> {
    let ids = string_values(df, PATIENT_ID_COLUMN)?;
    let ages = float_values(df, "age")?;
    let sexes = string_values(df, "sex")?;
    let referrals = string_values(df, "referral_source")?;

    let flags = FLAG_COLUMNS
        .iter()
        .map(|c| string_values(df, c))
        .collect::<Result<Vec<_>>>()?;
    let labs = Lab::ALL
        .iter()
        .map(|lab| float_values(df, lab.column()))
        .collect::<Result<Vec<_>>>()?;

    let targets = if require_target {
        Some(string_values(df, TARGET_COLUMN)?)
    } else {
        None
    };

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let patient_id = ids[row].clone().ok_or_else(|| {
            ThyroidError::DataError(format!("row {row} has no {PATIENT_ID_COLUMN}"))
        })?;

        let mut record = PatientRecord::new(patient_id);
        record.age = ages[row];
        record.sex = sexes[row].clone();
        record.referral_source = referrals[row].clone();
        for (slot, values) in record.flags.iter_mut().zip(&flags) {
            *slot = values[row].clone();
        }
        for (lab, values) in Lab::ALL.iter().zip(&labs) {
            record.set_lab(*lab, values[row]);
        }
        record.target = targets.as_ref().and_then(|t| t[row].clone());
        records.push(record);
    }

    Ok(records)
}

fn float_column(
    name: &str,
    records: &[PatientRecord],
    value: impl Fn(&PatientRecord) -> Option<f64>,
) -> Column {
    let values: Vec<Option<f64>> = records.iter().map(value).collect();
    Column::new(name.into(), values)
}

fn string_column<'a>(
    name: &str,
    records: &'a [PatientRecord],
    value: impl Fn(&'a PatientRecord) -> Option<&'a str>,
) -> Column {
    let values: Vec<Option<&str>> = records.iter().map(value).collect();
    Column::new(name.into(), values)
}

/// Build the cleaned frame: raw columns in input order (without the
/// `*_measured` companions) plus an optional `class` column.
pub fn frame_from_records(
    records: &[PatientRecord],
    classes: Option<&[DiagnosticClass]>,
) -> Result<DataFrame> {
    if let Some(classes) = classes {
        if classes.len() != records.len() {
            return Err(ThyroidError::ShapeError {
                expected: format!("{} classes", records.len()),
                actual: format!("{} classes", classes.len()),
            });
        }
    }

    let mut columns: Vec<Column> = Vec::with_capacity(26);
    columns.push(float_column("age", records, |r| r.age));
    columns.push(string_column("sex", records, |r| r.sex.as_deref()));
    for (i, name) in FLAG_COLUMNS.iter().enumerate() {
        columns.push(string_column(name, records, |r| r.flags[i].as_deref()));
    }
    for lab in Lab::ALL {
        columns.push(float_column(lab.column(), records, |r| r.lab(lab)));
    }
    columns.push(string_column("referral_source", records, |r| {
        r.referral_source.as_deref()
    }));
    columns.push(string_column(TARGET_COLUMN, records, |r| r.target.as_deref()));
    columns.push(string_column(PATIENT_ID_COLUMN, records, |r| {
        Some(r.patient_id.as_str())
    }));
    if let Some(classes) = classes {
        let names: Vec<&str> = classes.iter().map(|c| c.name()).collect();
        columns.push(Column::new(CLASS_COLUMN.into(), names));
    }

    Ok(DataFrame::new(columns)?)
}
