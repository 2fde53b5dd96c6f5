//! Scoring stored predictions against their references.

pub(crate) mod evaluator;
pub(crate) mod metrics;

pub use evaluator::Evaluator;
pub use metrics::{Accuracy, MacroAveraged, Metric, MetricScorer};
