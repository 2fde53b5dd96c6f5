//! Batched sequence-classification inference, parameter-efficient
//! fine-tuning and evaluation on [Candle](https://github.com/huggingface/candle).
//!
//! A table of texts flows through [`dataset::TabularDataset`] into an
//! [`inference::InferencePipeline`]; the predicted table is written to disk
//! and scored by an [`evaluation::Evaluator`]. For fine-tuning, a slice of the
//! table becomes a [`dataset::TokenizedDataset`], a
//! [`finetune::FineTuningPipeline`] trains the selected sublayers and saves
//! the full model, and the saved directory is loaded back as a model id.

// ============ Internal API ============

pub(crate) mod pipelines;

// ============ Public API ============

pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod loaders;
pub mod models;
pub mod settings;

pub use pipelines::stats::PipelineStats;
pub use pipelines::utils::DeviceRequest;
pub use pipelines::{finetune, inference};
