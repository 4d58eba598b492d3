//! Fixed domain rules: target-code grouping and TBG replacement values
//!
//! Both tables are built once and handed to the preprocessor by reference.

use crate::error::{Result, ThyroidError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Diagnostic class a raw target code is grouped into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticClass {
    NoCondition,
    Hyperthyroid,
    Hypothyroid,
    BindingProtein,
    GeneralHealth,
    ReplacementTherapy,
    Miscellaneous,
    /// Decode-only catch-all for codes outside the known range
    Other,
}

impl DiagnosticClass {
    /// Classes a raw target code can map to, in canonical order
    pub const LABELED: [DiagnosticClass; 7] = [
        DiagnosticClass::NoCondition,
        DiagnosticClass::Hyperthyroid,
        DiagnosticClass::Hypothyroid,
        DiagnosticClass::BindingProtein,
        DiagnosticClass::GeneralHealth,
        DiagnosticClass::ReplacementTherapy,
        DiagnosticClass::Miscellaneous,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            DiagnosticClass::NoCondition => "No Condition",
            DiagnosticClass::Hyperthyroid => "Hyperthyroid",
            DiagnosticClass::Hypothyroid => "Hypothyroid",
            DiagnosticClass::BindingProtein => "Binding Protein",
            DiagnosticClass::GeneralHealth => "General Health",
            DiagnosticClass::ReplacementTherapy => "Replacement Therapy",
            DiagnosticClass::Miscellaneous => "Miscellaneous",
            DiagnosticClass::Other => "Other",
        }
    }
}

impl fmt::Display for DiagnosticClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw target code to diagnostic class lookup
#[derive(Debug, Clone)]
pub struct TargetMapping {
    table: HashMap<&'static str, DiagnosticClass>,
}

impl TargetMapping {
    pub fn standard() -> Self {
        use DiagnosticClass::*;

        let groups: [(DiagnosticClass, &[&'static str]); 7] = [
            (Hyperthyroid, &["A", "B", "C", "D", "AK"]),
            (Hypothyroid, &["E", "F", "G", "H", "GK", "GI", "FK", "GKJ"]),
            (BindingProtein, &["I", "J", "C I"]),
            (GeneralHealth, &["K", "KJ", "H|K"]),
            (ReplacementTherapy, &["M", "L", "N", "MK", "MI", "LJ"]),
            (Miscellaneous, &["P", "Q", "OI", "R", "S", "T", "DIR"]),
            (NoCondition, &["-"]),
        ];

        let table = groups
            .iter()
            .flat_map(|(class, codes)| codes.iter().map(move |&code| (code, *class)))
            .collect();

        Self { table }
    }

    /// Map a raw code (surrounding whitespace ignored) to its class
    pub fn derive_class(&self, code: &str) -> Result<DiagnosticClass> {
        self.table
            .get(code.trim())
            .copied()
            .ok_or_else(|| ThyroidError::UnknownTargetCode(code.to_string()))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for TargetMapping {
    fn default() -> Self {
        Self::standard()
    }
}

/// Biological sex as understood by the TBG table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "M" => Some(Sex::Male),
            "F" => Some(Sex::Female),
            _ => None,
        }
    }
}

/// Inclusive integer age bracket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct AgeBracket {
    min: u32,
    max: u32,
}

impl AgeBracket {
    fn contains(&self, age: f64) -> bool {
        age >= self.min as f64 && age <= self.max as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct TbgEntry {
    bracket: AgeBracket,
    male: f64,
    female: f64,
}

/// TBG replacement values keyed by (age bracket, sex).
///
/// Brackets are tried in order; an age at or above the first lower bound that
/// no earlier bracket holds (20 and up, or a fractional age such as 9.5)
/// takes the last entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TbgPolicy {
    entries: Vec<TbgEntry>,
}

impl TbgPolicy {
    pub fn standard() -> Self {
        let entry = |min, max, male, female| TbgEntry {
            bracket: AgeBracket { min, max },
            male,
            female,
        };
        Self {
            entries: vec![
                entry(1, 9, 3.75, 3.75),
                entry(10, 19, 3.35, 3.35),
                entry(20, 100, 1.85, 2.2),
            ],
        }
    }

    fn entry_for(&self, age: f64) -> Option<&TbgEntry> {
        let (last, earlier) = self.entries.split_last()?;
        let floor = self.entries[0].bracket.min as f64;
        if age.is_nan() || age < floor {
            return None;
        }
        Some(
            earlier
                .iter()
                .find(|e| e.bracket.contains(age))
                .unwrap_or(last),
        )
    }

    /// Table value for `(age, sex)`, if the age is inside the table domain
    pub fn lookup(&self, age: f64, sex: Sex) -> Option<f64> {
        self.entry_for(age).map(|e| match sex {
            Sex::Male => e.male,
            Sex::Female => e.female,
        })
    }

    /// Resolve the TBG value of one record.
    ///
    /// A present measurement is returned untouched; otherwise the table value
    /// for the patient's bracket and sex is used.
    pub fn impute(
        &self,
        patient_id: &str,
        age: f64,
        sex: &str,
        current: Option<f64>,
    ) -> Result<f64> {
        if let Some(value) = current {
            return Ok(value);
        }

        let sex_key = Sex::parse(sex).ok_or_else(|| ThyroidError::SexOutOfDomain {
            patient_id: patient_id.to_string(),
            sex: sex.to_string(),
        })?;

        self.lookup(age, sex_key)
            .ok_or_else(|| ThyroidError::AgeOutOfDomain {
                patient_id: patient_id.to_string(),
                age,
            })
    }
}

impl Default for TbgPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Every fixed rule the preprocessor consults
#[derive(Debug, Clone, Default)]
pub struct DomainRules {
    pub targets: TargetMapping,
    pub tbg: TbgPolicy,
}

impl DomainRules {
    pub fn standard() -> Self {
        Self {
            targets: TargetMapping::standard(),
            tbg: TbgPolicy::standard(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_class_known_codes() {
        let mapping = TargetMapping::standard();
        assert_eq!(mapping.derive_class("A").unwrap(), DiagnosticClass::Hyperthyroid);
        assert_eq!(mapping.derive_class("-").unwrap(), DiagnosticClass::NoCondition);
        assert_eq!(mapping.derive_class("K").unwrap(), DiagnosticClass::GeneralHealth);
        assert_eq!(mapping.derive_class("C I").unwrap(), DiagnosticClass::BindingProtein);
        assert_eq!(mapping.derive_class("H|K").unwrap(), DiagnosticClass::GeneralHealth);
        assert_eq!(mapping.derive_class("GKJ").unwrap(), DiagnosticClass::Hypothyroid);
        assert_eq!(mapping.derive_class("DIR").unwrap(), DiagnosticClass::Miscellaneous);
        assert_eq!(mapping.len(), 33);
    }

    #[test]
    fn test_derive_class_unknown_code() {
        let mapping = TargetMapping::standard();
        let err = mapping.derive_class("ZZ").unwrap_err();
        assert!(matches!(err, ThyroidError::UnknownTargetCode(code) if code == "ZZ"));
    }

    #[test]
    fn test_tbg_table_values() {
        let policy = TbgPolicy::standard();
        assert_eq!(policy.impute("p", 5.0, "F", None).unwrap(), 3.75);
        assert_eq!(policy.impute("p", 15.0, "M", None).unwrap(), 3.35);
        assert_eq!(policy.impute("p", 50.0, "F", None).unwrap(), 2.2);
        assert_eq!(policy.impute("p", 50.0, "M", None).unwrap(), 1.85);
        assert_eq!(policy.impute("p", 100.0, "M", None).unwrap(), 1.85);
        assert_eq!(policy.impute("p", 9.0, "M", None).unwrap(), 3.75);
        assert_eq!(policy.impute("p", 19.0, "F", None).unwrap(), 3.35);
    }

    #[test]
    fn test_tbg_gap_ages_take_last_entry() {
        let policy = TbgPolicy::standard();
        assert_eq!(policy.impute("p", 9.5, "F", None).unwrap(), 2.2);
        assert_eq!(policy.impute("p", 9.5, "M", None).unwrap(), 1.85);
        assert_eq!(policy.impute("p", 19.5, "M", None).unwrap(), 1.85);
        assert_eq!(policy.impute("p", 1.0, "M", None).unwrap(), 3.75);
        assert_eq!(policy.lookup(0.99, Sex::Female), None);
    }

    #[test]
    fn test_tbg_present_value_short_circuits() {
        let policy = TbgPolicy::standard();
        // Out-of-domain age and sex are irrelevant when a value exists
        assert_eq!(policy.impute("p", 0.0, "?", Some(7.1)).unwrap(), 7.1);
    }

    #[test]
    fn test_tbg_out_of_domain() {
        let policy = TbgPolicy::standard();
        assert!(matches!(
            policy.impute("p1", 0.0, "F", None),
            Err(ThyroidError::AgeOutOfDomain { .. })
        ));
        assert!(matches!(
            policy.impute("p2", 0.5, "M", None),
            Err(ThyroidError::AgeOutOfDomain { .. })
        ));
        assert!(matches!(
            policy.impute("p3", 40.0, "X", None),
            Err(ThyroidError::SexOutOfDomain { .. })
        ));
    }
}
