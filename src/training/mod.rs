//! Model training module
//!
//! Provides the classifier families used for model selection:
//! - Logistic regression with balanced class weights
//! - Random forest with class-balanced bootstrap
//! - Gradient-boosted trees with `scale_pos_weight`
//!
//! plus stratified cross-validation, exhaustive grid search and the
//! per-family selection loop.

mod config;
mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod grid_search;
pub mod linear_models;
pub mod random_forest;
pub mod selector;

pub use config::{
    param_f64, param_opt_usize, param_usize, BaselinePolicy, FamilyConfig, ModelFamily, ParamGrid, ParamSet,
    ParamValue,
};
pub use cross_validation::{train_test_split, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use grid_search::{format_params, CandidateScore, GridSearchCV, GridSearchResult};
pub use linear_models::{LogisticRegression, Solver};
pub use models::{accuracy, baseline_accuracy, Classifier, ModelMetrics};
pub use random_forest::{MaxFeatures, RandomForest};
pub use selector::{select_best, FamilyFailure, ModelSelector, SelectionOutcome, TrialResult};
