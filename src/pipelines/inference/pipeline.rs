use std::collections::BTreeMap;

use candle_core::{DType, Tensor};
use serde::Serialize;

use super::labels::{decode_logits, LabelMap};
use crate::dataset::{Column, Dataset, Encoder, Sample, Table, TabularDataset};
use crate::error::{PipelineError, Result};
use crate::models::{ModelHandle, SequenceClassifier};
use crate::pipelines::stats::PipelineStats;

/// Structural and size facts of a loaded classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelProperties {
    /// Shape of each named model input in the analysis pass.
    pub input_shape: BTreeMap<String, Vec<usize>>,
    /// Positional capacity (`max_position_embeddings`).
    pub embedding_size: usize,
    /// Shape of the logits for the analysis pass.
    pub output_shape: Vec<usize>,
    pub num_trainable_params: usize,
    pub vocab_size: usize,
    /// Bytes occupied by all parameters.
    pub size: usize,
    pub max_context_length: usize,
}

/// Batched inference of a sequence classifier over a [`TabularDataset`].
///
/// Construct with [`InferencePipelineBuilder`](super::InferencePipelineBuilder).
pub struct InferencePipeline<M: SequenceClassifier> {
    pub(crate) handle: ModelHandle<M>,
    pub(crate) dataset: TabularDataset,
    pub(crate) encoder: Encoder,
    pub(crate) batch_size: usize,
    pub(crate) labels: LabelMap,
}

impl<M: SequenceClassifier> InferencePipeline<M> {
    /// Run the model once on an all-zero input of its full positional
    /// capacity. Gradient tracking is off for the pass; no state changes.
    pub fn analyze_model(&self) -> Result<ModelProperties> {
        let _no_grad = self.handle.no_grad();
        let info = self.handle.info().clone();

        let shape = (1, info.max_position_embeddings);
        let zeros = Tensor::zeros(shape, DType::U32, self.handle.device())?;
        let logits = self.handle.forward(&zeros, &zeros)?;

        let input_shape = ["input_ids", "attention_mask"]
            .into_iter()
            .map(|name| (name.to_string(), zeros.dims().to_vec()))
            .collect();

        let params = self.handle.params();
        Ok(ModelProperties {
            input_shape,
            embedding_size: info.max_position_embeddings,
            output_shape: logits.dims().to_vec(),
            // Nothing is frozen for inference: every parameter would take a gradient.
            num_trainable_params: params.parameter_count(),
            vocab_size: info.vocab_size,
            size: params.size_in_bytes(),
            max_context_length: info.max_length,
        })
    }

    /// Predict one sample. `None` when the text cannot be encoded or no label
    /// comes back.
    pub fn infer_sample(&self, sample: &Sample) -> Result<Option<String>> {
        let stats = PipelineStats::start();
        let prediction = match self.infer_batch(std::slice::from_ref(sample)) {
            Ok(mut labels) => labels.pop(),
            Err(PipelineError::Tokenization(reason)) => {
                tracing::warn!(%reason, "sample could not be encoded");
                None
            }
            Err(e) => return Err(e),
        };
        stats.finish("infer_sample", 1);
        Ok(prediction)
    }

    /// Predict every row in order and return a copy of the table with a
    /// `prediction` column appended.
    pub fn infer_dataset(&self) -> Result<Table> {
        let stats = PipelineStats::start();
        let len = self.dataset.len();

        let mut predictions = Vec::with_capacity(len);
        for start in (0..len).step_by(self.batch_size) {
            let end = (start + self.batch_size).min(len);
            let batch = (start..end)
                .map(|i| self.dataset.sample(i))
                .collect::<Result<Vec<_>>>()?;
            predictions.extend(self.infer_batch(&batch)?);
        }

        if predictions.len() != len {
            return Err(PipelineError::Unexpected(format!(
                "{} predictions for {} rows",
                predictions.len(),
                len
            )));
        }

        let table = self
            .dataset
            .table()
            .clone()
            .with_column(Column::Prediction.as_str(), predictions)?;
        stats.finish("infer_dataset", len);
        Ok(table)
    }

    /// Jointly encode `samples`, run one gradient-free forward pass and decode
    /// the argmax class of each row.
    pub fn infer_batch(&self, samples: &[Sample]) -> Result<Vec<String>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = samples.iter().map(Sample::source).collect();
        let batch = self.encoder.encode_batch(&texts)?;

        let device = self.handle.device();
        let shape = (batch.batch_size, batch.seq_len);
        let input_ids = Tensor::from_vec(batch.input_ids, shape, device)?;
        let attention_mask = Tensor::from_vec(batch.attention_mask, shape, device)?;

        let logits = {
            let _no_grad = self.handle.no_grad();
            self.handle.forward(&input_ids, &attention_mask)?
        };
        let labels = decode_logits(&logits, &self.labels)?;

        tracing::debug!(rows = samples.len(), seq_len = shape.1, "inferred batch");
        Ok(labels)
    }

    pub fn model(&self) -> &ModelHandle<M> {
        &self.handle
    }

    pub fn dataset(&self) -> &TabularDataset {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_length(&self) -> usize {
        self.encoder.max_length()
    }

    pub fn label_map(&self) -> &LabelMap {
        &self.labels
    }
}
