//! Integration test: training-partition balancing

mod common;

use common::{raw_frame, synthetic_cohort};
use thyroid_dx::preprocessing::{DomainRules, Preprocessor};
use thyroid_dx::synthetic::{
    class_counts, imbalance_ratio, EditedNearestNeighbours, Sampler, SMOTE, SMOTEENN,
};
use thyroid_dx::training::{train_test_split, ModelKind, PipelineConfig, TrainEngine};

#[test]
fn test_smoteenn_reduces_imbalance_on_cohort() {
    let rules = DomainRules::standard();
    let prepared = Preprocessor::new(&rules)
        .prepare(&raw_frame(&synthetic_cohort(400, 21), true))
        .unwrap();

    let before = imbalance_ratio(&prepared.labels);
    assert!(before > 2.0, "fixture should be imbalanced, got {before}");

    let mut sampler = SMOTEENN::new(
        SMOTE::new().with_k_neighbors(5).with_seed(42),
        EditedNearestNeighbours::new().with_n_neighbors(3),
    );
    let result = sampler.fit_resample(&prepared.features, &prepared.labels).unwrap();

    assert!(imbalance_ratio(&result.y) < before);
    assert_eq!(result.x.nrows(), result.y.len());
    assert_eq!(result.x.ncols(), prepared.features.ncols());
    // No class disappears
    assert_eq!(
        class_counts(&result.y).len(),
        class_counts(&prepared.labels).len()
    );
}

#[test]
fn test_balancing_is_seeded() {
    let rules = DomainRules::standard();
    let prepared = Preprocessor::new(&rules)
        .prepare(&raw_frame(&synthetic_cohort(250, 4), true))
        .unwrap();

    let run = || {
        let mut sampler = SMOTEENN::new(
            SMOTE::new().with_seed(7),
            EditedNearestNeighbours::new(),
        );
        sampler.fit_resample(&prepared.features, &prepared.labels).unwrap()
    };
    let (a, b) = (run(), run());
    assert_eq!(a.x, b.x);
    assert_eq!(a.y, b.y);
}

#[test]
fn test_only_training_partition_is_balanced() {
    let config = PipelineConfig::new()
        .with_seed(42)
        .with_models(vec![ModelKind::GaussianNaiveBayes]);
    let df = raw_frame(&synthetic_cohort(400, 8), true);

    let mut engine = TrainEngine::new(config.clone());
    engine.fit(&df).unwrap();
    let report = engine.report().unwrap();

    // Recompute the split independently: validation and test keep their sizes
    let rules = DomainRules::standard();
    let prepared = Preprocessor::new(&rules).prepare(&df).unwrap();
    let (rest, test) =
        train_test_split(&prepared.features, &prepared.labels, config.test_size, config.seed)
            .unwrap();
    let (train, validation) =
        train_test_split(&rest.x, &rest.y, config.validation_size, config.seed).unwrap();

    assert_eq!(report.partitions.train, train.y.len());
    assert_eq!(report.partitions.validation, validation.y.len());
    assert_eq!(report.partitions.test, test.y.len());
    assert_eq!(report.models[0].validation.n_samples, validation.y.len());
    assert_eq!(report.models[0].test.n_samples, test.y.len());

    assert_eq!(report.train_counts_before, class_counts(&train.y));
    assert_eq!(
        report.partitions.train_balanced,
        report.train_counts_after.values().sum::<usize>()
    );
    let ratio = |counts: &std::collections::BTreeMap<i64, usize>| {
        let max = *counts.values().max().unwrap() as f64;
        let min = *counts.values().min().unwrap() as f64;
        max / min
    };
    assert!(ratio(&report.train_counts_after) < ratio(&report.train_counts_before));
}

#[test]
fn test_balancing_can_be_disabled() {
    let config = PipelineConfig::new()
        .with_balancing(false)
        .with_models(vec![ModelKind::DecisionTree]);
    let mut engine = TrainEngine::new(config);
    engine
        .fit(&raw_frame(&synthetic_cohort(200, 3), true))
        .unwrap();
    let report = engine.report().unwrap();
    assert_eq!(report.partitions.train, report.partitions.train_balanced);
    assert_eq!(report.train_counts_before, report.train_counts_after);
}
