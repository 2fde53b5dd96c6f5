//! Index-addressable, read-only datasets over a [`Table`].
//!
//! [`TabularDataset`] exposes raw rows as [`Sample`]s. [`TokenizedDataset`]
//! composes one with an encoding cache built eagerly at construction.

use std::fmt;

pub(crate) mod encoding;
pub(crate) mod table;
pub(crate) mod tabular;
pub(crate) mod tokenized;

pub use encoding::{EncodedBatch, Encoder, Encoding};
pub use table::Table;
pub use tabular::{DatasetProperties, TabularDataset};
pub use tokenized::TokenizedDataset;

use crate::error::{PipelineError, Result};

/// Column roles of the tables flowing through the pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Input text.
    Source,
    /// Reference label, decimal digits.
    Target,
    /// Predicted label, decimal digits.
    Prediction,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Source => "source",
            Column::Target => "target",
            Column::Prediction => "prediction",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row's fields. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sample {
    source: String,
    target: Option<String>,
}

impl Sample {
    pub fn new(source: impl Into<String>, target: Option<String>) -> Self {
        Self {
            source: source.into(),
            target,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

/// Fixed-size, index-addressable sample access.
pub trait Dataset {
    /// Row count; fixed at construction.
    fn len(&self) -> usize;

    /// Sample `index`, or [`PipelineError::IndexOutOfRange`] outside `0..len()`.
    fn sample(&self, index: usize) -> Result<Sample>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(PipelineError::IndexOutOfRange { index, len })
    }
}
