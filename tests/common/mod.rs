//! A tiny random BERT classifier written to a temp directory, so the
//! pipelines run offline through the same local-path loading used for
//! fine-tuned models.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};
use candle_sft::dataset::{Table, TabularDataset};
use tempfile::TempDir;

pub const HIDDEN: usize = 16;
pub const INTERMEDIATE: usize = 32;
pub const MAX_POSITIONS: usize = 128;
pub const NUM_LABELS: usize = 3;

const WORDS: &[&str] = &[
    "the", "movie", "film", "plot", "acting", "was", "is", "not", "very", "and", "good", "great",
    "fun", "bad", "awful", "boring",
];
const SPECIAL: &[&str] = &["[PAD]", "[UNK]", "[CLS]", "[SEP]"];

pub fn vocab_size() -> usize {
    SPECIAL.len() + WORDS.len()
}

pub struct TinyBert {
    dir: TempDir,
}

impl TinyBert {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The directory, usable wherever a hub name is.
    pub fn model_id(&self) -> String {
        self.path().to_string_lossy().into_owned()
    }

    pub fn weights(&self) -> HashMap<String, Tensor> {
        load_weights(&self.path().join("model.safetensors"))
    }
}

pub fn load_weights(path: &Path) -> HashMap<String, Tensor> {
    candle_core::safetensors::load(path, &Device::Cpu).unwrap()
}

pub fn tiny_bert() -> TinyBert {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.json"), config_json()).unwrap();
    std::fs::write(dir.path().join("tokenizer.json"), tokenizer_json()).unwrap();
    candle_core::safetensors::save(&random_weights(), dir.path().join("model.safetensors"))
        .unwrap();
    TinyBert { dir }
}

pub fn config_json() -> String {
    serde_json::json!({
        "architectures": ["BertForSequenceClassification"],
        "model_type": "bert",
        "vocab_size": vocab_size(),
        "hidden_size": HIDDEN,
        "num_hidden_layers": 1,
        "num_attention_heads": 2,
        "intermediate_size": INTERMEDIATE,
        "hidden_act": "gelu",
        "max_position_embeddings": MAX_POSITIONS,
        "type_vocab_size": 2,
        "layer_norm_eps": 1e-12,
        "id2label": {"0": "negative", "1": "neutral", "2": "positive"},
        "label2id": {"negative": 0, "neutral": 1, "positive": 2}
    })
    .to_string()
}

pub fn tokenizer_json() -> String {
    let vocab: serde_json::Map<String, serde_json::Value> = SPECIAL
        .iter()
        .chain(WORDS)
        .enumerate()
        .map(|(id, token)| (token.to_string(), id.into()))
        .collect();

    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": {"type": "Lowercase"},
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": {
            "type": "BertProcessing",
            "sep": ["[SEP]", 3],
            "cls": ["[CLS]", 2]
        },
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "[UNK]"
        }
    })
    .to_string()
}

fn randn(shape: &[usize]) -> Tensor {
    Tensor::randn(0f32, 0.5, shape, &Device::Cpu).unwrap()
}

fn layer_norm(weights: &mut HashMap<String, Tensor>, prefix: &str) {
    weights.insert(
        format!("{prefix}.weight"),
        Tensor::ones(HIDDEN, candle_core::DType::F32, &Device::Cpu).unwrap(),
    );
    weights.insert(
        format!("{prefix}.bias"),
        Tensor::zeros(HIDDEN, candle_core::DType::F32, &Device::Cpu).unwrap(),
    );
}

fn dense(weights: &mut HashMap<String, Tensor>, prefix: &str, out_dim: usize, in_dim: usize) {
    weights.insert(format!("{prefix}.weight"), randn(&[out_dim, in_dim]));
    weights.insert(format!("{prefix}.bias"), randn(&[out_dim]));
}

pub fn random_weights() -> HashMap<String, Tensor> {
    let mut w = HashMap::new();
    w.insert(
        "bert.embeddings.word_embeddings.weight".into(),
        randn(&[vocab_size(), HIDDEN]),
    );
    w.insert(
        "bert.embeddings.position_embeddings.weight".into(),
        randn(&[MAX_POSITIONS, HIDDEN]),
    );
    w.insert(
        "bert.embeddings.token_type_embeddings.weight".into(),
        randn(&[2, HIDDEN]),
    );
    layer_norm(&mut w, "bert.embeddings.LayerNorm");

    let layer = "bert.encoder.layer.0";
    for proj in ["query", "key", "value"] {
        dense(&mut w, &format!("{layer}.attention.self.{proj}"), HIDDEN, HIDDEN);
    }
    dense(&mut w, &format!("{layer}.attention.output.dense"), HIDDEN, HIDDEN);
    layer_norm(&mut w, &format!("{layer}.attention.output.LayerNorm"));
    dense(&mut w, &format!("{layer}.intermediate.dense"), INTERMEDIATE, HIDDEN);
    dense(&mut w, &format!("{layer}.output.dense"), HIDDEN, INTERMEDIATE);
    layer_norm(&mut w, &format!("{layer}.output.LayerNorm"));

    dense(&mut w, "bert.pooler.dense", HIDDEN, HIDDEN);
    dense(&mut w, "classifier", NUM_LABELS, HIDDEN);
    w
}

const TEXTS: &[&str] = &[
    "the movie was great",
    "the plot is boring",
    "acting was not very good",
    "awful film",
    "great fun and good acting",
    "the film is bad",
    "not boring",
    "very very good movie",
    "plot was awful and boring",
    "fun",
    "the acting is great",
];

/// `rows` rows of `source`/`target`, cycling through a small corpus and the
/// labels 0, 1, 2.
pub fn sentiment_table(rows: usize) -> Table {
    let sources = (0..rows).map(|i| TEXTS[i % TEXTS.len()].to_string()).collect();
    let targets = (0..rows).map(|i| (i % NUM_LABELS).to_string()).collect();
    Table::from_columns([("source", sources), ("target", targets)]).unwrap()
}

pub fn sentiment_dataset(rows: usize) -> TabularDataset {
    TabularDataset::new(sentiment_table(rows)).unwrap()
}
