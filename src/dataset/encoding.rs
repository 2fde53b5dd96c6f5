use tokenizers::{Tokenizer, TruncationParams};

use crate::error::{PipelineError, Result};

/// Token ids and attention mask of one text, equal lengths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Encoding {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl Encoding {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    fn pad_to(mut self, len: usize, pad_id: u32) -> Self {
        self.input_ids.resize(len, pad_id);
        self.attention_mask.resize(len, 0);
        self
    }
}

/// Row-major `(batch_size, seq_len)` ids and mask, ready for `Tensor::from_vec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub batch_size: usize,
    pub seq_len: usize,
}

/// A tokenizer with truncation fixed to `max_length` and a resolved pad id.
#[derive(Clone)]
pub struct Encoder {
    tokenizer: Tokenizer,
    max_length: usize,
    pad_id: u32,
}

impl Encoder {
    pub fn new(tokenizer: &Tokenizer, max_length: usize) -> Result<Self> {
        if max_length == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_length must be positive".into(),
            ));
        }

        // Read before padding is cleared below.
        let pad_id = tokenizer
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| tokenizer.token_to_id("<pad>"))
            .or_else(|| tokenizer.token_to_id("[PAD]"))
            .unwrap_or(0);

        let mut tokenizer = tokenizer.clone();
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| {
                PipelineError::Tokenization(format!("Failed to configure truncation: {e}"))
            })?;

        Ok(Self {
            tokenizer,
            max_length,
            pad_id,
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    /// Truncated, unpadded encoding with special tokens.
    pub fn encode(&self, text: &str) -> Result<Encoding> {
        let encoding = self.tokenizer.encode(text, true).map_err(|e| {
            PipelineError::Tokenization(format!(
                "Tokenization failed on '{}': {}",
                &text.chars().take(50).collect::<String>(),
                e
            ))
        })?;
        Ok(Encoding {
            input_ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
        })
    }

    /// Truncated and padded to exactly `max_length`.
    pub fn encode_fixed(&self, text: &str) -> Result<Encoding> {
        Ok(self.encode(text)?.pad_to(self.max_length, self.pad_id))
    }

    /// Encode jointly, padding every row to the longest in the batch.
    pub fn encode_batch(&self, texts: &[&str]) -> Result<EncodedBatch> {
        let encodings = texts
            .iter()
            .map(|text| self.encode(text))
            .collect::<Result<Vec<_>>>()?;
        let seq_len = encodings.iter().map(Encoding::len).max().unwrap_or(0);

        let mut input_ids = Vec::with_capacity(texts.len() * seq_len);
        let mut attention_mask = Vec::with_capacity(texts.len() * seq_len);
        for encoding in encodings {
            let encoding = encoding.pad_to(seq_len, self.pad_id);
            input_ids.extend(encoding.input_ids);
            attention_mask.extend(encoding.attention_mask);
        }

        Ok(EncodedBatch {
            input_ids,
            attention_mask,
            batch_size: texts.len(),
            seq_len,
        })
    }
}
