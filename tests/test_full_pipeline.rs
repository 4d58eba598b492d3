//! Integration test: Full pipeline (load → preprocess → train → persist → predict)

mod common;

use common::{complete_row, raw_frame, synthetic_cohort};
use thyroid_dx::cli::{cmd_info, cmd_predict, cmd_preprocess, cmd_train, TrainArgs};
use thyroid_dx::error::ThyroidError;
use thyroid_dx::export::ModelArtifact;
use thyroid_dx::inference::{Predictor, PREDICTED_CLASS_COLUMN};
use thyroid_dx::preprocessing::{DiagnosticClass, CLASS_COLUMN};
use thyroid_dx::training::{ModelKind, PipelineConfig, TrainEngine};
use thyroid_dx::utils::{DataLoader, DataSaver};

#[test]
fn test_train_save_load_predict() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new().with_models(vec![
        ModelKind::RandomForest,
        ModelKind::GaussianNaiveBayes,
        ModelKind::SupportVectorClassifier,
    ]);

    let mut engine = TrainEngine::new(config);
    engine
        .fit(&raw_frame(&synthetic_cohort(300, 42), true))
        .unwrap();
    let paths = engine.save_artifacts(dir.path()).unwrap();

    let names: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "Random_Forest.model",
            "Gaussian_Naive_Bayes.model",
            "Support_Vector_Classifier.model"
        ]
    );

    let predictor = Predictor::load(dir.path().join("Random_Forest.model")).unwrap();
    let meta = &predictor.artifact().metadata;
    assert_eq!(meta.model_kind, ModelKind::RandomForest);
    assert!(meta.metrics.is_some());
    assert_eq!(
        meta.feature_names,
        engine.artifacts()[0].preprocessor.schema().feature_names
    );

    // Unlabeled batch, one record above the age limit
    let mut rows = synthetic_cohort(40, 77);
    rows[0].age = Some(130.0);
    let result = predictor.predict_frame(&raw_frame(&rows, false)).unwrap();
    assert_eq!(result.n_dropped, 1);
    assert_eq!(result.predictions.len(), 39);
    assert!(result
        .predictions
        .iter()
        .all(|p| predictor.artifact().classes().contains(&p.class)));

    let dist = result.distribution();
    let total: f64 = dist.iter().map(|s| s.percentage).sum();
    assert!((total - 100.0).abs() < 1e-9);
    assert_eq!(dist.iter().map(|s| s.count).sum::<usize>(), 39);
}

#[test]
fn test_loaded_model_matches_in_memory_model() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new().with_models(vec![ModelKind::GradientBoosting]);
    let mut engine = TrainEngine::new(config);
    engine
        .fit(&raw_frame(&synthetic_cohort(250, 5), true))
        .unwrap();
    let path = engine.artifacts()[0].save_to_dir(dir.path()).unwrap();

    let batch = raw_frame(&synthetic_cohort(30, 6), true);
    let in_memory = Predictor::new(engine.artifacts()[0].clone())
        .predict_frame(&batch)
        .unwrap();
    let from_disk = Predictor::load(&path).unwrap().predict_frame(&batch).unwrap();
    assert_eq!(in_memory.predictions, from_disk.predictions);
}

#[test]
fn test_corrupted_artifact_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new().with_models(vec![ModelKind::DecisionTree]);
    let mut engine = TrainEngine::new(config);
    engine
        .fit(&raw_frame(&synthetic_cohort(200, 1), true))
        .unwrap();
    let path = engine.artifacts()[0].save_to_dir(dir.path()).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let err = ModelArtifact::load(&path).unwrap_err();
    assert!(matches!(err, ThyroidError::ModelArtifact { .. }));
    assert!(err.to_string().contains("Retrain"));

    let missing = Predictor::load(dir.path().join("Absent.model"));
    assert!(matches!(missing, Err(ThyroidError::ModelArtifact { .. })));
}

#[test]
fn test_save_before_fit_fails() {
    let engine = TrainEngine::new(PipelineConfig::new());
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        engine.save_artifacts(dir.path()),
        Err(ThyroidError::ModelNotFitted)
    ));
}

#[test]
fn test_single_record_prediction() {
    let config = PipelineConfig::new().with_models(vec![ModelKind::LogisticRegression]);
    let mut engine = TrainEngine::new(config);
    engine
        .fit(&raw_frame(&synthetic_cohort(200, 10), true))
        .unwrap();
    let predictor = Predictor::new(engine.artifacts()[0].clone());

    let mut hypo = complete_row("solo", 60.0, "F", "-");
    hypo.labs = [Some(45.0), Some(0.8), Some(30.0), Some(0.9), Some(25.0), None];
    let result = predictor.predict_frame(&raw_frame(&[hypo], false)).unwrap();
    assert_eq!(result.predictions.len(), 1);
    assert_eq!(result.predictions[0].patient_id, "solo");
    assert_ne!(result.predictions[0].class, DiagnosticClass::Other);
}

#[test]
fn test_cli_commands_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("thyroid.csv");
    let mut df = raw_frame(&synthetic_cohort(220, 13), true);
    DataSaver::save_csv(&mut df, &data).unwrap();

    cmd_info(&data).unwrap();

    let cleaned = dir.path().join("cleaned.csv");
    cmd_preprocess(&data, &cleaned).unwrap();
    let cleaned_df = DataLoader::new().load_csv(&cleaned).unwrap();
    assert!(cleaned_df.column(CLASS_COLUMN).is_ok());

    let model_dir = dir.path().join("models");
    let args = TrainArgs {
        data: data.clone(),
        model_dir: Some(model_dir.clone()),
        seed: Some(3),
        models: Some(vec!["dt".to_string(), "nb".to_string()]),
        ..Default::default()
    };
    cmd_train(&args).unwrap();
    assert!(model_dir.join("Decision_Tree.model").exists());
    assert!(model_dir.join("Gaussian_Naive_Bayes.model").exists());

    let output = dir.path().join("predictions.csv");
    cmd_predict(
        &model_dir.join("Decision_Tree.model"),
        &data,
        Some(output.as_path()),
        5,
    )
    .unwrap();
    let predictions = DataLoader::new().load_csv(&output).unwrap();
    assert_eq!(predictions.height(), 220);
    assert!(predictions.column(PREDICTED_CLASS_COLUMN).is_ok());
}
