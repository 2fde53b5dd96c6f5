//! Sequence classifiers, their weights, and the handle pipelines own.

// ============ Model capability traits ============

pub mod capabilities;

// ============ Weights and ownership ============

pub mod handle;
pub mod params;

// ============ Model implementations ============

pub mod bert;

pub use bert::{BertConfig, BertForSequenceClassification};
pub use capabilities::{ClassifierInfo, SequenceClassifier};
pub use handle::{ModelHandle, NoGradGuard};
pub use params::{Parameter, ParameterStore, TrainableRoles};
