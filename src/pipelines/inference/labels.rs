use std::collections::BTreeMap;

use candle_core::{DType, Tensor, D};

use crate::error::Result;

/// Decodes raw class indices into label strings.
///
/// The default table maps class `0` to `"2"`: the base checkpoints this lab
/// targets encode negative and neutral in the opposite order from the
/// dataset labels. Indices without an entry decode to their decimal form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    overrides: BTreeMap<usize, String>,
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::identity().with_label(0, "2")
    }
}

impl LabelMap {
    /// Every index decodes to itself.
    pub fn identity() -> Self {
        Self {
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, index: usize, label: impl Into<String>) -> Self {
        self.overrides.insert(index, label.into());
        self
    }

    pub fn decode(&self, index: usize) -> String {
        self.overrides
            .get(&index)
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }
}

/// Row-wise softmax, then argmax, then label decoding.
pub(crate) fn decode_logits(logits: &Tensor, labels: &LabelMap) -> Result<Vec<String>> {
    let probs = candle_nn::ops::softmax(&logits.to_dtype(DType::F32)?, D::Minus1)?;
    let indices = probs.argmax(D::Minus1)?.to_vec1::<u32>()?;
    Ok(indices
        .into_iter()
        .map(|i| labels.decode(i as usize))
        .collect())
}
