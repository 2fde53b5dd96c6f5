//! Model capability traits.
//!
//! Pipelines are generic over [`SequenceClassifier`]; they never name a
//! concrete architecture.

use candle_core::Tensor;
use candle_nn::VarBuilder;

use crate::error::Result;

/// Architecture facts every classifier reports from its `config.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierInfo {
    /// Number of rows in the token embedding table.
    pub vocab_size: usize,
    /// Number of learned positions; the longest input the encoder accepts.
    pub max_position_embeddings: usize,
    /// `max_length` from the config (generation default, 20 when absent).
    pub max_length: usize,
    /// Width of the output logits.
    pub num_labels: usize,
}

/// A model mapping encoded text to a fixed, small set of class scores.
pub trait SequenceClassifier: Sized {
    /// Build the model from `config.json` contents and a weight source.
    ///
    /// Must fail when the artifact is not a sequence classifier (wrong
    /// architecture, missing classification head) rather than at the first
    /// forward pass.
    fn load(vb: VarBuilder<'_>, config_json: &str) -> Result<Self>;

    /// `input_ids` and `attention_mask` are `(batch, seq_len)` u32 tensors.
    /// Returns `(batch, num_labels)` logits.
    fn forward(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor>;

    /// Static architecture facts.
    fn info(&self) -> &ClassifierInfo;
}
