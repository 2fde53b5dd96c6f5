use tokenizers::Tokenizer;

use super::{check_index, Column, Dataset, Encoder, Encoding, Sample, TabularDataset};
use crate::error::{PipelineError, Result};

/// A [`TabularDataset`] plus fixed-length encodings and integer labels.
///
/// Every row is tokenized once, here, with pad-to-max and truncation; training
/// never re-tokenizes.
#[derive(Debug, Clone)]
pub struct TokenizedDataset {
    rows: TabularDataset,
    encodings: Vec<Encoding>,
    labels: Vec<u32>,
    max_length: usize,
}

impl TokenizedDataset {
    /// Requires a `target` column of class indices.
    pub fn new(rows: TabularDataset, tokenizer: &Tokenizer, max_length: usize) -> Result<Self> {
        let targets = rows.table().require_column(Column::Target.as_str())?;
        let labels = targets
            .iter()
            .enumerate()
            .map(|(row, value)| parse_label(row, value))
            .collect::<Result<Vec<_>>>()?;

        let encoder = Encoder::new(tokenizer, max_length)?;
        let encodings = (0..rows.len())
            .map(|i| encoder.encode_fixed(rows.sample(i)?.source()))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(rows = rows.len(), max_length, "tokenized dataset");

        Ok(Self {
            rows,
            encodings,
            labels,
            max_length,
        })
    }

    /// `(input_ids, attention_mask)` of row `index`, both `max_length` long.
    pub fn encoded_sample(&self, index: usize) -> Result<(&[u32], &[u32])> {
        check_index(index, self.len())?;
        let encoding = &self.encodings[index];
        Ok((&encoding.input_ids, &encoding.attention_mask))
    }

    pub fn label(&self, index: usize) -> Result<u32> {
        check_index(index, self.len())?;
        Ok(self.labels[index])
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn rows(&self) -> &TabularDataset {
        &self.rows
    }
}

impl Dataset for TokenizedDataset {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn sample(&self, index: usize) -> Result<Sample> {
        self.rows.sample(index)
    }
}

/// Accepts `"2"` and pandas-style `"2.0"`.
fn parse_label(row: usize, value: &str) -> Result<u32> {
    let value = value.trim();
    value
        .parse::<u32>()
        .ok()
        .or_else(|| {
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= u32::MAX as f64)
                .map(|v| v as u32)
        })
        .ok_or_else(|| {
            PipelineError::Table(format!(
                "target '{value}' in row {row} is not a class index"
            ))
        })
}
