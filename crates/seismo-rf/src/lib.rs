//! Random Forest regression: train, cross-validate, evaluate, predict.
//!
//! Provides a hand-rolled Random Forest regressor with CART decision trees,
//! a squared-error split criterion, parallel training via rayon, out-of-bag
//! R², impurity-based feature importance, k-fold cross-validation and the
//! usual regression metrics.

mod config;
mod error;
mod eval;
mod forest;
mod importance;
mod metrics;
mod node;
mod oob;
mod predict;
mod result;
mod split;
mod tree;

pub use config::{MaxFeatures, OobMode, RandomForestConfig};
pub use error::RfError;
pub use eval::{CrossValidation, CrossValidationResult, KFold, TrainTestSplit, train_test_split};
pub use forest::RandomForest;
pub use importance::RankedFeature;
pub use metrics::{mean_absolute_error, mean_and_std, mean_squared_error, r2_score};
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use oob::OobScore;
pub use result::{RandomForestResult, TrainingMetadata};
pub use split::SplitCriterion;
pub use tree::{DecisionTree, DecisionTreeConfig};
