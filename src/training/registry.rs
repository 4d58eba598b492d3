//! Classifier registry: display names, construction and the persisted model enum

use crate::error::{Result, ThyroidError};
use super::adaboost::AdaBoostClassifier;
use super::decision_tree::DecisionTree;
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::logistic::LogisticRegression;
use super::models::Classifier;
use super::naive_bayes::GaussianNaiveBayes;
use super::random_forest::RandomForest;
use super::svm::{SVMClassifier, SVMConfig};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every classifier the pipeline can train
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LogisticRegression,
    RandomForest,
    GradientBoosting,
    AdaBoost,
    DecisionTree,
    GaussianNaiveBayes,
    SupportVectorClassifier,
}

impl ModelKind {
    /// Registry order
    pub const ALL: [ModelKind; 7] = [
        ModelKind::LogisticRegression,
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::AdaBoost,
        ModelKind::DecisionTree,
        ModelKind::GaussianNaiveBayes,
        ModelKind::SupportVectorClassifier,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::AdaBoost => "AdaBoost",
            ModelKind::DecisionTree => "Decision Tree",
            ModelKind::GaussianNaiveBayes => "Gaussian Naive Bayes",
            ModelKind::SupportVectorClassifier => "Support Vector Classifier",
        }
    }

    /// Artifact file name: display name with spaces replaced, plus `.model`
    pub fn file_name(&self) -> String {
        format!("{}.model", self.display_name().replace(' ', "_"))
    }

    /// Untrained model with default hyperparameters and the given seed
    pub fn build(&self, seed: u64) -> TrainedModel {
        match self {
            ModelKind::LogisticRegression => TrainedModel::LogisticRegression(LogisticRegression::new()),
            ModelKind::RandomForest => {
                TrainedModel::RandomForest(RandomForest::new(100).with_random_state(seed))
            }
            ModelKind::GradientBoosting => {
                TrainedModel::GradientBoosting(GradientBoostingClassifier::new(GradientBoostingConfig {
                    random_state: seed,
                    ..Default::default()
                }))
            }
            ModelKind::AdaBoost => {
                TrainedModel::AdaBoost(AdaBoostClassifier::default().with_random_state(seed))
            }
            ModelKind::DecisionTree => {
                TrainedModel::DecisionTree(DecisionTree::new_classifier().with_random_state(seed))
            }
            ModelKind::GaussianNaiveBayes => TrainedModel::GaussianNaiveBayes(GaussianNaiveBayes::new()),
            ModelKind::SupportVectorClassifier => TrainedModel::SupportVectorClassifier(SVMClassifier::new(SVMConfig {
                random_state: seed,
                ..Default::default()
            })),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ModelKind {
    type Err = ThyroidError;

    /// Accepts display names, snake case and short aliases, ignoring case
    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let kind = match key.as_str() {
            "logisticregression" | "logistic" | "lr" => ModelKind::LogisticRegression,
            "randomforest" | "rf" => ModelKind::RandomForest,
            "gradientboosting" | "gb" | "gbm" => ModelKind::GradientBoosting,
            "adaboost" | "ada" => ModelKind::AdaBoost,
            "decisiontree" | "dt" | "tree" => ModelKind::DecisionTree,
            "gaussiannaivebayes" | "naivebayes" | "nb" => ModelKind::GaussianNaiveBayes,
            "supportvectorclassifier" | "svc" | "svm" => ModelKind::SupportVectorClassifier,
            _ => {
                return Err(ThyroidError::InvalidParameter {
                    name: "model".to_string(),
                    value: s.to_string(),
                    reason: "unknown model name".to_string(),
                })
            }
        };
        Ok(kind)
    }
}

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    AdaBoost(AdaBoostClassifier),
    DecisionTree(DecisionTree),
    GaussianNaiveBayes(GaussianNaiveBayes),
    SupportVectorClassifier(SVMClassifier),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::LogisticRegression(_) => ModelKind::LogisticRegression,
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
            TrainedModel::AdaBoost(_) => ModelKind::AdaBoost,
            TrainedModel::DecisionTree(_) => ModelKind::DecisionTree,
            TrainedModel::GaussianNaiveBayes(_) => ModelKind::GaussianNaiveBayes,
            TrainedModel::SupportVectorClassifier(_) => ModelKind::SupportVectorClassifier,
        }
    }

    fn as_classifier(&self) -> &dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::AdaBoost(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::GaussianNaiveBayes(m) => m,
            TrainedModel::SupportVectorClassifier(m) => m,
        }
    }

    fn as_classifier_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::AdaBoost(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::GaussianNaiveBayes(m) => m,
            TrainedModel::SupportVectorClassifier(m) => m,
        }
    }

    /// Impurity-based importances for the tree models
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            TrainedModel::RandomForest(m) => m.feature_importances().cloned(),
            TrainedModel::DecisionTree(m) => m.feature_importances().cloned(),
            TrainedModel::GradientBoosting(m) => Some(Array1::from_vec(m.feature_importances().to_vec())),
            _ => None,
        }
    }
}

impl Classifier for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        self.as_classifier_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        self.as_classifier().predict(x)
    }
}
