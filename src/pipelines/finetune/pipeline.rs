use std::path::PathBuf;

use candle_core::{Device, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, SGD};

use super::config::{FineTuningConfig, OptimizerKind};
use crate::dataset::{Dataset, TokenizedDataset};
use crate::error::{PipelineError, Result};
use crate::models::{ModelHandle, SequenceClassifier};
use crate::pipelines::stats::PipelineStats;

/// Outcome of [`FineTuningPipeline::run`].
#[derive(Debug)]
pub struct FineTuneReport {
    /// Always equal to the configured `max_steps`.
    pub optimizer_steps: usize,
    /// `batch_size * max_steps`, counting repeats of a wrapped dataset.
    pub samples_seen: usize,
    /// Mean cross-entropy of each step, in order.
    pub losses: Vec<f32>,
    pub trainable_params: usize,
    pub total_params: usize,
    /// Directory the adapted model was written to; loadable as a model id.
    pub output_dir: PathBuf,
    pub stats: PipelineStats,
}

pub(crate) enum TrainingOptimizer {
    AdamW(AdamW),
    Sgd(SGD),
}

impl TrainingOptimizer {
    pub(crate) fn new(kind: OptimizerKind, vars: Vec<Var>, learning_rate: f64) -> Result<Self> {
        Ok(match kind {
            OptimizerKind::AdamW => Self::AdamW(AdamW::new(
                vars,
                ParamsAdamW {
                    lr: learning_rate,
                    ..Default::default()
                },
            )?),
            OptimizerKind::Sgd => Self::Sgd(SGD::new(vars, learning_rate)?),
        })
    }

    fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::AdamW(opt) => opt.backward_step(loss)?,
            Self::Sgd(opt) => opt.backward_step(loss)?,
        }
        Ok(())
    }
}

/// Yields `batch_size` row indices per call, wrapping around the dataset.
#[derive(Debug, Clone)]
pub(crate) struct CyclicSampler {
    len: usize,
    batch_size: usize,
    cursor: usize,
}

impl CyclicSampler {
    pub(crate) fn new(len: usize, batch_size: usize) -> Self {
        Self {
            len,
            batch_size,
            cursor: 0,
        }
    }

    pub(crate) fn next_batch(&mut self) -> Vec<usize> {
        let batch = (self.cursor..self.cursor + self.batch_size)
            .map(|i| i % self.len)
            .collect();
        self.cursor = (self.cursor + self.batch_size) % self.len;
        batch
    }
}

/// Stack the encodings and labels of `indices` into `(ids, mask, labels)`.
fn collate(
    dataset: &TokenizedDataset,
    indices: &[usize],
    device: &Device,
) -> Result<(Tensor, Tensor, Tensor)> {
    let seq_len = dataset.max_length();
    let mut ids = Vec::with_capacity(indices.len() * seq_len);
    let mut mask = Vec::with_capacity(indices.len() * seq_len);
    let mut labels = Vec::with_capacity(indices.len());

    for &i in indices {
        let (sample_ids, sample_mask) = dataset.encoded_sample(i)?;
        ids.extend_from_slice(sample_ids);
        mask.extend_from_slice(sample_mask);
        labels.push(dataset.label(i)?);
    }

    let shape = (indices.len(), seq_len);
    Ok((
        Tensor::from_vec(ids, shape, device)?,
        Tensor::from_vec(mask, shape, device)?,
        Tensor::from_vec(labels, indices.len(), device)?,
    ))
}

/// Trains the role-selected parameters of a classifier for a fixed number of
/// steps, then persists the whole model.
///
/// Construct with [`FineTuningPipelineBuilder`](super::FineTuningPipelineBuilder).
/// [`run`](Self::run) consumes the pipeline; reload the result from
/// [`FineTuneReport::output_dir`].
pub struct FineTuningPipeline<M: SequenceClassifier> {
    pub(crate) handle: ModelHandle<M>,
    pub(crate) dataset: TokenizedDataset,
    pub(crate) config: FineTuningConfig,
    pub(crate) optimizer: TrainingOptimizer,
}

impl<M: SequenceClassifier> FineTuningPipeline<M> {
    /// Run exactly `max_steps` optimizer steps and save to `output_dir`.
    ///
    /// A non-finite loss aborts the run before anything is written.
    pub fn run(mut self) -> Result<FineTuneReport> {
        let stats = PipelineStats::start();
        let steps = self.config.max_steps;
        let batch_size = self.config.batch_size;
        let mut sampler = CyclicSampler::new(self.dataset.len(), batch_size);
        let mut losses = Vec::with_capacity(steps);

        tracing::info!(
            model_id = self.handle.model_id(),
            steps,
            batch_size,
            rows = self.dataset.len(),
            "fine-tuning started"
        );

        for step in 1..=steps {
            let indices = sampler.next_batch();
            let (input_ids, attention_mask, labels) =
                collate(&self.dataset, &indices, self.handle.device())?;

            let logits = self.handle.forward(&input_ids, &attention_mask)?;
            let loss = candle_nn::loss::cross_entropy(&logits, &labels)?;
            let value = loss.to_scalar::<f32>()?;
            if !value.is_finite() {
                return Err(PipelineError::Training(format!(
                    "loss became {value} at step {step}"
                )));
            }

            self.optimizer.backward_step(&loss)?;
            tracing::debug!(step, loss = value, "optimizer step");
            losses.push(value);
        }

        self.handle.save(&self.config.output_dir)?;

        let params = self.handle.params();
        Ok(FineTuneReport {
            optimizer_steps: losses.len(),
            samples_seen: losses.len() * batch_size,
            losses,
            trainable_params: params.trainable_parameter_count(),
            total_params: params.parameter_count(),
            output_dir: self.config.output_dir.clone(),
            stats: stats.finish("fine_tune", steps),
        })
    }

    pub fn model(&self) -> &ModelHandle<M> {
        &self.handle
    }

    pub fn dataset(&self) -> &TokenizedDataset {
        &self.dataset
    }

    pub fn config(&self) -> &FineTuningConfig {
        &self.config
    }
}
