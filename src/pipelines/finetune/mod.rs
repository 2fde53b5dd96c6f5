//! Parameter-efficient fine-tuning with a fixed step budget.
//!
//! Only parameters whose names contain one of the configured sublayer roles
//! are trained. Everything else is frozen when the model is loaded and is
//! written back unchanged.

// ============ Internal API ============

pub(crate) mod builder;
pub(crate) mod config;
pub(crate) mod pipeline;

// ============ Public API ============

pub use crate::pipelines::stats::PipelineStats;
pub use builder::FineTuningPipelineBuilder;
pub use config::{FineTuningConfig, OptimizerKind};
pub use pipeline::{FineTuneReport, FineTuningPipeline};
