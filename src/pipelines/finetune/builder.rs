use std::marker::PhantomData;
use std::path::PathBuf;

use super::config::{FineTuningConfig, OptimizerKind};
use super::pipeline::{FineTuningPipeline, TrainingOptimizer};
use crate::dataset::{Dataset, TokenizedDataset};
use crate::error::{PipelineError, Result};
use crate::loaders::{HubSource, ModelSource};
use crate::models::{BertForSequenceClassification, ModelHandle, SequenceClassifier};
use crate::pipelines::utils::impl_device_methods;

/// Builder for [`FineTuningPipeline`].
///
/// # Example
///
/// ```rust,no_run
/// use candle_sft::dataset::{Table, TabularDataset, TokenizedDataset};
/// use candle_sft::finetune::FineTuningPipelineBuilder;
/// use candle_sft::loaders::{HubSource, ModelSource};
///
/// # fn main() -> candle_sft::error::Result<()> {
/// let model = "cointegrated/rubert-tiny-sentiment-balanced";
/// let rows = TabularDataset::new(Table::read_csv("dataset.csv")?)?.slice(100..250);
/// let dataset = TokenizedDataset::new(rows, &HubSource.tokenizer(model)?, 120)?;
///
/// let report = FineTuningPipelineBuilder::bert(model)
///     .max_steps(50)
///     .trainable_roles(["query", "key", "value", "dense"])
///     .output_dir("dist/finetuned")
///     .build(dataset)?
///     .run()?;
/// println!("final loss {:?}", report.losses.last());
/// # Ok(())
/// # }
/// ```
pub struct FineTuningPipelineBuilder<M: SequenceClassifier> {
    model_id: String,
    config: FineTuningConfig,
    source: Box<dyn ModelSource>,
    _model: PhantomData<M>,
}

impl FineTuningPipelineBuilder<BertForSequenceClassification> {
    /// A BERT sequence classifier, by hub name or local directory.
    pub fn bert(model_id: impl Into<String>) -> Self {
        Self::new(model_id)
    }
}

impl<M: SequenceClassifier> FineTuningPipelineBuilder<M> {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self::from_config(model_id, FineTuningConfig::default())
    }

    pub fn from_config(model_id: impl Into<String>, config: FineTuningConfig) -> Self {
        Self {
            model_id: model_id.into(),
            config,
            source: Box::new(HubSource),
            _model: PhantomData,
        }
    }

    /// Rows per step (default: 3).
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Must equal the dataset's encoded length (default: 120).
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.config.max_length = max_length;
        self
    }

    /// Optimizer step budget (default: 50).
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.config.max_steps = max_steps;
        self
    }

    /// Default: 1e-3.
    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.config.learning_rate = learning_rate;
        self
    }

    /// Default: AdamW.
    pub fn optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.config.optimizer = optimizer;
        self
    }

    /// Sublayer roles left trainable (default: `query`, `key`, `value`, `dense`).
    pub fn trainable_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.trainable_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Default: `dist/finetuned`.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Where model files come from (default: [`HubSource`]).
    pub fn source(mut self, source: impl ModelSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    /// Load the model, freeze everything outside the trainable roles and set
    /// up the optimizer.
    pub fn build(self, dataset: TokenizedDataset) -> Result<FineTuningPipeline<M>> {
        let config = self.config;
        config.validate()?;

        if dataset.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "cannot fine-tune on an empty dataset".into(),
            ));
        }
        if dataset.max_length() != config.max_length {
            return Err(PipelineError::InvalidConfig(format!(
                "dataset is encoded to {} tokens but max_length is {}",
                dataset.max_length(),
                config.max_length
            )));
        }

        let device = config.device.resolve()?;
        let handle =
            ModelHandle::<M>::load(self.source.as_ref(), &self.model_id, &device, &config.roles())?;

        let info = handle.info();
        if config.max_length > info.max_position_embeddings {
            return Err(PipelineError::InvalidConfig(format!(
                "max_length {} exceeds the model's {} positions",
                config.max_length, info.max_position_embeddings
            )));
        }
        if let Some(label) = dataset.labels().iter().find(|&&l| l as usize >= info.num_labels) {
            return Err(PipelineError::InvalidConfig(format!(
                "label {label} is outside the model's {} classes",
                info.num_labels
            )));
        }

        let optimizer =
            TrainingOptimizer::new(config.optimizer, handle.trainable_vars(), config.learning_rate)?;

        tracing::info!(
            model_id = %self.model_id,
            trainable = handle.params().trainable_parameter_count(),
            frozen = handle.params().parameter_count() - handle.params().trainable_parameter_count(),
            optimizer = ?config.optimizer,
            "fine-tuning configured"
        );

        Ok(FineTuningPipeline {
            handle,
            dataset,
            config,
            optimizer,
        })
    }
}

impl_device_methods!(config: FineTuningPipelineBuilder<M: SequenceClassifier>);
