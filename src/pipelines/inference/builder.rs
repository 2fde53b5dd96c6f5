use std::marker::PhantomData;

use super::labels::LabelMap;
use super::pipeline::InferencePipeline;
use crate::dataset::{Encoder, TabularDataset};
use crate::error::{PipelineError, Result};
use crate::loaders::{HubSource, ModelSource};
use crate::models::{BertForSequenceClassification, ModelHandle, SequenceClassifier, TrainableRoles};
use crate::pipelines::utils::{impl_device_methods, DeviceRequest};

/// Default truncation length of inference batches.
pub const DEFAULT_MAX_LENGTH: usize = 120;
/// Default number of rows per forward pass.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Builder for [`InferencePipeline`].
///
/// # Example
///
/// ```rust,no_run
/// use candle_sft::dataset::{Table, TabularDataset};
/// use candle_sft::inference::InferencePipelineBuilder;
///
/// # fn main() -> candle_sft::error::Result<()> {
/// let dataset = TabularDataset::new(Table::read_csv("dataset.csv")?)?;
/// let pipeline = InferencePipelineBuilder::bert("cointegrated/rubert-tiny-sentiment-balanced")
///     .batch_size(64)
///     .max_length(120)
///     .build(dataset)?;
/// let predictions = pipeline.infer_dataset()?;
/// # Ok(())
/// # }
/// ```
pub struct InferencePipelineBuilder<M: SequenceClassifier> {
    model_id: String,
    max_length: usize,
    batch_size: usize,
    labels: LabelMap,
    source: Box<dyn ModelSource>,
    device_request: DeviceRequest,
    _model: PhantomData<M>,
}

impl InferencePipelineBuilder<BertForSequenceClassification> {
    /// A BERT sequence classifier, by hub name or local directory.
    pub fn bert(model_id: impl Into<String>) -> Self {
        Self::new(model_id)
    }
}

impl<M: SequenceClassifier> InferencePipelineBuilder<M> {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            max_length: DEFAULT_MAX_LENGTH,
            batch_size: DEFAULT_BATCH_SIZE,
            labels: LabelMap::default(),
            source: Box::new(HubSource),
            device_request: DeviceRequest::default(),
            _model: PhantomData,
        }
    }

    /// Truncation length (default: 120). Must not exceed the model's
    /// `max_position_embeddings`.
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Rows per forward pass (default: 64).
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Replace the class-index decoding table (default: [`LabelMap::default`]).
    pub fn label_map(mut self, labels: LabelMap) -> Self {
        self.labels = labels;
        self
    }

    /// Where model files come from (default: [`HubSource`]).
    pub fn source(mut self, source: impl ModelSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn device(mut self, device: DeviceRequest) -> Self {
        self.device_request = device;
        self
    }

    /// Load the model and bind it to `dataset`.
    pub fn build(self, dataset: TabularDataset) -> Result<InferencePipeline<M>> {
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch_size must be positive".into(),
            ));
        }

        let device = self.device_request.resolve()?;
        let handle = ModelHandle::<M>::load(
            self.source.as_ref(),
            &self.model_id,
            &device,
            &TrainableRoles::none(),
        )?;

        let capacity = handle.info().max_position_embeddings;
        if self.max_length > capacity {
            return Err(PipelineError::InvalidConfig(format!(
                "max_length {} exceeds the model's {} positions",
                self.max_length, capacity
            )));
        }
        let encoder = Encoder::new(handle.tokenizer(), self.max_length)?;

        Ok(InferencePipeline {
            handle,
            dataset,
            encoder,
            batch_size: self.batch_size,
            labels: self.labels,
        })
    }
}

impl_device_methods!(direct: InferencePipelineBuilder<M: SequenceClassifier>);
