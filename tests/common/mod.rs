//! Shared fixtures for the integration tests

#![allow(dead_code)]

use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use thyroid_dx::preprocessing::{FLAG_COLUMNS, MEASURED_COLUMNS};

/// One raw CSV row
#[derive(Debug, Clone)]
pub struct RawRow {
    pub id: String,
    pub age: Option<f64>,
    pub sex: Option<&'static str>,
    /// TSH, T3, TT4, T4U, FTI, TBG
    pub labs: [Option<f64>; 6],
    pub referral: &'static str,
    pub target: &'static str,
}

/// Build a frame with the full raw schema, every flag set to "f" and the
/// `*_measured` companions derived from the labs
pub fn raw_frame(rows: &[RawRow], with_target: bool) -> DataFrame {
    let lab = |i: usize| rows.iter().map(|r| r.labs[i]).collect::<Vec<_>>();
    let mut df = df!(
        "patient_id" => rows.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
        "age" => rows.iter().map(|r| r.age).collect::<Vec<_>>(),
        "sex" => rows.iter().map(|r| r.sex).collect::<Vec<_>>(),
        "TSH" => lab(0),
        "T3" => lab(1),
        "TT4" => lab(2),
        "T4U" => lab(3),
        "FTI" => lab(4),
        "TBG" => lab(5),
        "referral_source" => rows.iter().map(|r| r.referral).collect::<Vec<_>>(),
    )
    .unwrap();

    for flag in FLAG_COLUMNS {
        df.with_column(Column::new(flag.into(), vec!["f"; rows.len()]))
            .unwrap();
    }
    for (i, measured) in MEASURED_COLUMNS.iter().enumerate() {
        let values: Vec<&str> = rows
            .iter()
            .map(|r| if r.labs[i].is_some() { "t" } else { "f" })
            .collect();
        df.with_column(Column::new((*measured).into(), values)).unwrap();
    }
    if with_target {
        df.with_column(Column::new(
            "target".into(),
            rows.iter().map(|r| r.target).collect::<Vec<_>>(),
        ))
        .unwrap();
    }
    df
}

/// A fully measured row
pub fn complete_row(id: &str, age: f64, sex: &'static str, target: &'static str) -> RawRow {
    RawRow {
        id: id.to_string(),
        age: Some(age),
        sex: Some(sex),
        labs: [Some(1.3), Some(2.0), Some(105.0), Some(0.95), Some(110.0), None],
        referral: "other",
        target,
    }
}

/// Imbalanced cohort with lab profiles that separate the classes:
/// mostly no-condition, then hypothyroid, hyperthyroid and a few general-health rows.
/// Roughly 5% of non-healthy lab values are missing, as are a few sexes.
pub fn synthetic_cohort(n: usize, seed: u64) -> Vec<RawRow> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let referrals = ["other", "SVI", "SVHC", "STMW"];

    (0..n)
        .map(|i| {
            let roll: f64 = rng.gen();
            let (target, tsh, t3, tt4, fti) = if roll < 0.65 {
                ("-", rng.gen_range(0.5..4.0), rng.gen_range(1.5..2.6), rng.gen_range(80.0..140.0), rng.gen_range(80.0..140.0))
            } else if roll < 0.83 {
                ("F", rng.gen_range(12.0..80.0), rng.gen_range(0.4..1.3), rng.gen_range(15.0..65.0), rng.gen_range(10.0..60.0))
            } else if roll < 0.95 {
                ("B", rng.gen_range(0.005..0.1), rng.gen_range(3.2..6.0), rng.gen_range(160.0..260.0), rng.gen_range(160.0..240.0))
            } else {
                ("K", rng.gen_range(0.2..0.6), rng.gen_range(2.6..3.2), rng.gen_range(140.0..160.0), rng.gen_range(140.0..160.0))
            };

            let mut labs = [Some(tsh), Some(t3), Some(tt4), Some(rng.gen_range(0.7..1.2)), Some(fti), None];
            if target != "-" {
                for value in labs.iter_mut().take(5) {
                    if rng.gen_bool(0.05) {
                        *value = None;
                    }
                }
            }
            if rng.gen_bool(0.1) {
                labs[5] = Some(rng.gen_range(10.0..40.0));
            }

            let sex = if rng.gen_bool(0.03) {
                None
            } else if rng.gen_bool(0.7) {
                Some("F")
            } else {
                Some("M")
            };

            RawRow {
                id: format!("{}", 840_800_000 + i),
                age: Some(rng.gen_range(1..96) as f64),
                sex,
                labs,
                referral: referrals[rng.gen_range(0..referrals.len())],
                target,
            }
        })
        .collect()
}
