//! Batched sequence-classification inference.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use candle_sft::dataset::{Table, TabularDataset};
//! use candle_sft::inference::InferencePipelineBuilder;
//!
//! # fn main() -> candle_sft::error::Result<()> {
//! let dataset = TabularDataset::new(Table::read_csv("dataset.csv")?)?.head(100);
//! let pipeline = InferencePipelineBuilder::bert("cointegrated/rubert-tiny-sentiment-balanced")
//!     .cpu()
//!     .build(dataset)?;
//!
//! println!("{:?}", pipeline.analyze_model()?);
//! pipeline.infer_dataset()?.write_csv("predictions.csv")?;
//! # Ok(())
//! # }
//! ```

// ============ Internal API ============

pub(crate) mod builder;
pub(crate) mod labels;
pub(crate) mod pipeline;

// ============ Public API ============

pub use crate::pipelines::stats::PipelineStats;
pub use builder::{InferencePipelineBuilder, DEFAULT_BATCH_SIZE, DEFAULT_MAX_LENGTH};
pub use labels::LabelMap;
pub use pipeline::{InferencePipeline, ModelProperties};

/// Only for generic annotations. Use [`InferencePipelineBuilder::bert`].
pub type BertClassifier = crate::models::BertForSequenceClassification;
