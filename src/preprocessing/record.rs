//! Patient record schema

use serde::{Deserialize, Serialize};

/// Companion "was this lab measured" columns, discarded before any processing
pub const MEASURED_COLUMNS: [&str; 6] = [
    "TSH_measured",
    "T3_measured",
    "TT4_measured",
    "T4U_measured",
    "FTI_measured",
    "TBG_measured",
];

/// Boolean-like clinical flags, in input order
pub const FLAG_COLUMNS: [&str; 14] = [
    "on_thyroxine",
    "query_on_thyroxine",
    "on_antithyroid_meds",
    "sick",
    "pregnant",
    "thyroid_surgery",
    "I131_treatment",
    "query_hypothyroid",
    "query_hyperthyroid",
    "lithium",
    "goitre",
    "tumor",
    "hypopituitary",
    "psych",
];

/// Columns that get one-hot encoded, in encoding order
pub const CATEGORICAL_COLUMNS: [&str; 16] = [
    "sex",
    "on_thyroxine",
    "query_on_thyroxine",
    "on_antithyroid_meds",
    "sick",
    "pregnant",
    "thyroid_surgery",
    "I131_treatment",
    "query_hypothyroid",
    "query_hyperthyroid",
    "lithium",
    "goitre",
    "tumor",
    "hypopituitary",
    "psych",
    "referral_source",
];

/// Numeric feature columns, in matrix order
pub const NUMERIC_COLUMNS: [&str; 7] = ["age", "TSH", "T3", "TT4", "T4U", "FTI", "TBG"];

pub const PATIENT_ID_COLUMN: &str = "patient_id";
pub const TARGET_COLUMN: &str = "target";
pub const CLASS_COLUMN: &str = "class";

/// Laboratory measurement carried by a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lab {
    Tsh,
    T3,
    Tt4,
    T4u,
    Fti,
    Tbg,
}

impl Lab {
    pub const ALL: [Lab; 6] = [Lab::Tsh, Lab::T3, Lab::Tt4, Lab::T4u, Lab::Fti, Lab::Tbg];

    /// Labs that must all be present for a "No Condition" label to be trusted
    pub const CORE: [Lab; 5] = [Lab::Tsh, Lab::T3, Lab::Tt4, Lab::T4u, Lab::Fti];

    /// Column name in the raw CSV
    pub const fn column(self) -> &'static str {
        match self {
            Lab::Tsh => "TSH",
            Lab::T3 => "T3",
            Lab::Tt4 => "TT4",
            Lab::T4u => "T4U",
            Lab::Fti => "FTI",
            Lab::Tbg => "TBG",
        }
    }
}

/// One patient row of raw measurements and flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: String,
    pub age: Option<f64>,
    pub sex: Option<String>,
    /// Values of [`FLAG_COLUMNS`], same order
    pub flags: [Option<String>; 14],
    pub tsh: Option<f64>,
    pub t3: Option<f64>,
    pub tt4: Option<f64>,
    pub t4u: Option<f64>,
    pub fti: Option<f64>,
    pub tbg: Option<f64>,
    pub referral_source: Option<String>,
    /// Raw diagnosis code; absent on prediction input
    pub target: Option<String>,
}

impl PatientRecord {
    /// Create an empty record; every flag defaults to `"f"`
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            age: None,
            sex: None,
            flags: std::array::from_fn(|_| Some("f".to_string())),
            tsh: None,
            t3: None,
            tt4: None,
            t4u: None,
            fti: None,
            tbg: None,
            referral_source: None,
            target: None,
        }
    }

    pub fn with_age(mut self, age: f64) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_sex(mut self, sex: impl Into<String>) -> Self {
        self.sex = Some(sex.into());
        self
    }

    pub fn with_lab(mut self, lab: Lab, value: f64) -> Self {
        self.set_lab(lab, Some(value));
        self
    }

    /// Set a flag by column name; unknown names are ignored
    pub fn with_flag(mut self, column: &str, value: impl Into<String>) -> Self {
        if let Some(idx) = FLAG_COLUMNS.iter().position(|&c| c == column) {
            self.flags[idx] = Some(value.into());
        }
        self
    }

    pub fn with_referral_source(mut self, source: impl Into<String>) -> Self {
        self.referral_source = Some(source.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn lab(&self, lab: Lab) -> Option<f64> {
        match lab {
            Lab::Tsh => self.tsh,
            Lab::T3 => self.t3,
            Lab::Tt4 => self.tt4,
            Lab::T4u => self.t4u,
            Lab::Fti => self.fti,
            Lab::Tbg => self.tbg,
        }
    }

    pub fn set_lab(&mut self, lab: Lab, value: Option<f64>) {
        let slot = match lab {
            Lab::Tsh => &mut self.tsh,
            Lab::T3 => &mut self.t3,
            Lab::Tt4 => &mut self.tt4,
            Lab::T4u => &mut self.t4u,
            Lab::Fti => &mut self.fti,
            Lab::Tbg => &mut self.tbg,
        };
        *slot = value;
    }

    /// Value of the `idx`-th entry of [`CATEGORICAL_COLUMNS`]
    pub fn categorical(&self, idx: usize) -> Option<&str> {
        match idx {
            0 => self.sex.as_deref(),
            i if i <= FLAG_COLUMNS.len() => self.flags[i - 1].as_deref(),
            i if i == FLAG_COLUMNS.len() + 1 => self.referral_source.as_deref(),
            _ => None,
        }
    }

    /// Numeric feature values in [`NUMERIC_COLUMNS`] order
    pub fn numeric_features(&self) -> [Option<f64>; 7] {
        [self.age, self.tsh, self.t3, self.tt4, self.t4u, self.fti, self.tbg]
    }

    /// True when any of the core labs is missing
    pub fn missing_core_lab(&self) -> bool {
        Lab::CORE.iter().any(|&lab| self.lab(lab).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorical_indexing() {
        let record = PatientRecord::new("1")
            .with_sex("F")
            .with_flag("psych", "t")
            .with_referral_source("SVI");

        assert_eq!(record.categorical(0), Some("F"));
        assert_eq!(record.categorical(1), Some("f"));
        assert_eq!(record.categorical(14), Some("t"));
        assert_eq!(record.categorical(15), Some("SVI"));
        assert_eq!(record.categorical(16), None);
    }

    #[test]
    fn test_missing_core_lab_ignores_tbg() {
        let mut record = PatientRecord::new("7");
        for lab in Lab::CORE {
            record.set_lab(lab, Some(1.0));
        }
        assert!(!record.missing_core_lab());

        record.set_lab(Lab::T4u, None);
        assert!(record.missing_core_lab());
    }
}
