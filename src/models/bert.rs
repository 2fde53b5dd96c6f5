//! BERT encoder with a pooled classification head.
//!
//! Weight names follow the Hugging Face `BertForSequenceClassification`
//! layout (`bert.embeddings.*`, `bert.encoder.layer.N.*`, `bert.pooler.dense`,
//! `classifier`). Every op on the forward path has a backward pass, so the
//! same module serves inference and fine-tuning.

use std::collections::HashMap;

use candle_core::{DType, IndexOp, Tensor, D};
use candle_nn::{embedding, linear, ops::softmax, Embedding, Linear, Module, VarBuilder};
use serde::Deserialize;

use super::capabilities::{ClassifierInfo, SequenceClassifier};
use crate::error::{PipelineError, Result};

const MASKED_POSITION_BIAS: f64 = -10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenAct {
    Gelu,
    #[serde(alias = "gelu_pytorch_tanh", alias = "gelu_fast")]
    GeluNew,
    Relu,
}

impl HiddenAct {
    fn apply(self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            HiddenAct::Gelu => xs.gelu_erf(),
            HiddenAct::GeluNew => xs.gelu(),
            HiddenAct::Relu => xs.relu(),
        }
    }
}

fn default_hidden_act() -> HiddenAct {
    HiddenAct::Gelu
}

fn default_type_vocab_size() -> usize {
    2
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

fn default_max_length() -> usize {
    20
}

/// The subset of a BERT `config.json` this model reads.
#[derive(Debug, Clone, Deserialize)]
pub struct BertConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    #[serde(default = "default_hidden_act")]
    pub hidden_act: HiddenAct,
    pub max_position_embeddings: usize,
    #[serde(default = "default_type_vocab_size")]
    pub type_vocab_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default)]
    pub architectures: Vec<String>,
    #[serde(default)]
    pub id2label: HashMap<String, String>,
    #[serde(default)]
    pub num_labels: Option<usize>,
}

impl BertConfig {
    /// Label count from `id2label`, then `num_labels`, then the Hugging Face default of 2.
    pub fn label_count(&self) -> usize {
        if !self.id2label.is_empty() {
            self.id2label.len()
        } else {
            self.num_labels.unwrap_or(2)
        }
    }

    fn check_classifier(&self) -> Result<()> {
        if !self.architectures.is_empty()
            && !self
                .architectures
                .iter()
                .any(|a| a.ends_with("ForSequenceClassification"))
        {
            return Err(PipelineError::InvalidModel(format!(
                "architectures {:?} contain no sequence classifier",
                self.architectures
            )));
        }
        if self.num_attention_heads == 0 || self.hidden_size % self.num_attention_heads != 0 {
            return Err(PipelineError::InvalidModel(format!(
                "hidden_size {} is not divisible by num_attention_heads {}",
                self.hidden_size, self.num_attention_heads
            )));
        }
        if self.label_count() == 0 {
            return Err(PipelineError::InvalidModel(
                "classifier declares zero labels".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNorm {
    fn load(size: usize, eps: f64, vb: VarBuilder) -> candle_core::Result<Self> {
        // Older checkpoints store gamma/beta.
        let (weight, bias) = match (vb.get(size, "weight"), vb.get(size, "bias")) {
            (Ok(weight), Ok(bias)) => (weight, bias),
            (Err(err), _) | (_, Err(err)) => {
                match (vb.get(size, "gamma"), vb.get(size, "beta")) {
                    (Ok(weight), Ok(bias)) => (weight, bias),
                    _ => return Err(err),
                }
            }
        };
        Ok(Self { weight, bias, eps })
    }
}

impl Module for LayerNorm {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mean = xs.mean_keepdim(D::Minus1)?;
        let centered = xs.broadcast_sub(&mean)?;
        let variance = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let normed = centered.broadcast_div(&(variance + self.eps)?.sqrt()?)?;
        normed
            .broadcast_mul(&self.weight)?
            .broadcast_add(&self.bias)
    }
}

#[derive(Debug, Clone)]
struct Embeddings {
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    token_type_embeddings: Embedding,
    layer_norm: LayerNorm,
}

impl Embeddings {
    fn load(vb: VarBuilder, config: &BertConfig) -> candle_core::Result<Self> {
        Ok(Self {
            word_embeddings: embedding(
                config.vocab_size,
                config.hidden_size,
                vb.pp("word_embeddings"),
            )?,
            position_embeddings: embedding(
                config.max_position_embeddings,
                config.hidden_size,
                vb.pp("position_embeddings"),
            )?,
            token_type_embeddings: embedding(
                config.type_vocab_size,
                config.hidden_size,
                vb.pp("token_type_embeddings"),
            )?,
            layer_norm: LayerNorm::load(
                config.hidden_size,
                config.layer_norm_eps,
                vb.pp("LayerNorm"),
            )?,
        })
    }

    fn forward(&self, input_ids: &Tensor) -> candle_core::Result<Tensor> {
        let (_batch, seq_len) = input_ids.dims2()?;
        let positions = Tensor::arange(0u32, seq_len as u32, input_ids.device())?;
        let token_types = input_ids.zeros_like()?;

        let words = self.word_embeddings.forward(input_ids)?;
        let positions = self.position_embeddings.forward(&positions)?;
        let token_types = self.token_type_embeddings.forward(&token_types)?;

        let embeddings = (words.broadcast_add(&positions)? + token_types)?;
        self.layer_norm.forward(&embeddings)
    }
}

#[derive(Debug, Clone)]
struct SelfAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    num_heads: usize,
    head_dim: usize,
    span: tracing::Span,
}

impl SelfAttention {
    fn load(vb: VarBuilder, config: &BertConfig) -> candle_core::Result<Self> {
        let hidden = config.hidden_size;
        Ok(Self {
            query: linear(hidden, hidden, vb.pp("query"))?,
            key: linear(hidden, hidden, vb.pp("key"))?,
            value: linear(hidden, hidden, vb.pp("value"))?,
            num_heads: config.num_attention_heads,
            head_dim: hidden / config.num_attention_heads,
            span: tracing::span!(tracing::Level::TRACE, "self-attn"),
        })
    }

    fn split_heads(&self, xs: Tensor) -> candle_core::Result<Tensor> {
        let (batch, seq_len, _) = xs.dims3()?;
        xs.reshape((batch, seq_len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    fn forward(&self, xs: &Tensor, mask_bias: &Tensor) -> candle_core::Result<Tensor> {
        let _enter = self.span.enter();
        let (batch, seq_len, hidden) = xs.dims3()?;

        let q = self.split_heads(self.query.forward(xs)?)?;
        let k = self.split_heads(self.key.forward(xs)?)?;
        let v = self.split_heads(self.value.forward(xs)?)?;

        let scores = (q.matmul(&k.t()?)? / (self.head_dim as f64).sqrt())?;
        let probs = softmax(&scores.broadcast_add(mask_bias)?, D::Minus1)?;

        probs
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq_len, hidden))
    }
}

#[derive(Debug, Clone)]
struct Layer {
    attention: SelfAttention,
    attention_output: Linear,
    attention_norm: LayerNorm,
    intermediate: Linear,
    output: Linear,
    output_norm: LayerNorm,
    activation: HiddenAct,
    span: tracing::Span,
}

impl Layer {
    fn load(vb: VarBuilder, config: &BertConfig) -> candle_core::Result<Self> {
        let hidden = config.hidden_size;
        let eps = config.layer_norm_eps;
        Ok(Self {
            attention: SelfAttention::load(vb.pp("attention.self"), config)?,
            attention_output: linear(hidden, hidden, vb.pp("attention.output.dense"))?,
            attention_norm: LayerNorm::load(hidden, eps, vb.pp("attention.output.LayerNorm"))?,
            intermediate: linear(hidden, config.intermediate_size, vb.pp("intermediate.dense"))?,
            output: linear(config.intermediate_size, hidden, vb.pp("output.dense"))?,
            output_norm: LayerNorm::load(hidden, eps, vb.pp("output.LayerNorm"))?,
            activation: config.hidden_act,
            span: tracing::span!(tracing::Level::TRACE, "layer"),
        })
    }

    fn forward(&self, xs: &Tensor, mask_bias: &Tensor) -> candle_core::Result<Tensor> {
        let _enter = self.span.enter();
        let attended = self.attention.forward(xs, mask_bias)?;
        let attended = self
            .attention_norm
            .forward(&(self.attention_output.forward(&attended)? + xs)?)?;

        let intermediate = self
            .activation
            .apply(&self.intermediate.forward(&attended)?)?;
        self.output_norm
            .forward(&(self.output.forward(&intermediate)? + &attended)?)
    }
}

/// `BertForSequenceClassification`: encoder, tanh pooler over `[CLS]`, linear head.
#[derive(Debug, Clone)]
pub struct BertForSequenceClassification {
    embeddings: Embeddings,
    layers: Vec<Layer>,
    pooler: Linear,
    classifier: Linear,
    info: ClassifierInfo,
}

impl BertForSequenceClassification {
    pub fn new(vb: VarBuilder, config: &BertConfig) -> Result<Self> {
        config.check_classifier()?;

        let bert = vb.pp("bert");
        let embeddings = Embeddings::load(bert.pp("embeddings"), config)?;
        let layers = (0..config.num_hidden_layers)
            .map(|i| Layer::load(bert.pp(format!("encoder.layer.{i}")), config))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let pooler = linear(config.hidden_size, config.hidden_size, bert.pp("pooler.dense"))?;

        let num_labels = config.label_count();
        let classifier = linear(config.hidden_size, num_labels, vb.pp("classifier"))
            .map_err(|e| PipelineError::InvalidModel(format!("no classification head: {e}")))?;

        Ok(Self {
            embeddings,
            layers,
            pooler,
            classifier,
            info: ClassifierInfo {
                vocab_size: config.vocab_size,
                max_position_embeddings: config.max_position_embeddings,
                max_length: config.max_length,
                num_labels,
            },
        })
    }
}

/// `(batch, seq)` 0/1 mask to a `(batch, 1, 1, seq)` additive bias.
fn attention_bias(attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let (batch, seq_len) = attention_mask.dims2()?;
    attention_mask
        .to_dtype(DType::F32)?
        .affine(-MASKED_POSITION_BIAS, MASKED_POSITION_BIAS)?
        .reshape((batch, 1, 1, seq_len))
}

impl SequenceClassifier for BertForSequenceClassification {
    fn load(vb: VarBuilder<'_>, config_json: &str) -> Result<Self> {
        let config: BertConfig = serde_json::from_str(config_json)
            .map_err(|e| PipelineError::InvalidModel(format!("unreadable BERT config: {e}")))?;
        Self::new(vb, &config)
    }

    fn forward(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let mask_bias = attention_bias(attention_mask)?;

        let mut hidden = self.embeddings.forward(input_ids)?;
        for layer in &self.layers {
            hidden = layer.forward(&hidden, &mask_bias)?;
        }

        let cls = hidden.i((.., 0))?.contiguous()?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        Ok(self.classifier.forward(&pooled)?)
    }

    fn info(&self) -> &ClassifierInfo {
        &self.info
    }
}
