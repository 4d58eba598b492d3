//! Model training module
//!
//! Provides the classifiers the pipeline compares:
//! - Logistic Regression (multinomial)
//! - Decision trees and Random Forests
//! - Gradient boosting and AdaBoost
//! - Gaussian Naive Bayes
//! - Linear Support Vector Classifier
//!
//! plus evaluation metrics, seeded splitting and the end-to-end engine.

mod config;
mod engine;
mod models;
mod registry;
pub mod adaboost;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod logistic;
pub mod naive_bayes;
pub mod random_forest;
pub mod split;
pub mod svm;

pub use config::{BalancerConfig, PipelineConfig};
pub use engine::{ModelReport, PartitionSizes, TrainEngine, TrainingReport};
pub use models::{ClassMetrics, Classifier, ModelMetrics};
pub use registry::{ModelKind, TrainedModel};
pub use adaboost::AdaBoostClassifier;
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use logistic::LogisticRegression;
pub use naive_bayes::GaussianNaiveBayes;
pub use random_forest::{MaxFeatures, RandomForest};
pub use split::{train_test_split, SplitPart};
pub use svm::{SVMClassifier, SVMConfig};
