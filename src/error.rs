//! Error types for this crate.
//!
//! All fallible operations return [`Result<T>`] which uses [`PipelineError`] as the error type.

use thiserror::Error;

/// A [`Result`](std::result::Result) alias using [`PipelineError`] as the error type.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The unified error type for all crate errors.
///
/// Nothing in this crate retries. Every variant reaches the immediate caller.
///
/// # Example
///
/// ```rust,no_run
/// use candle_sft::error::PipelineError;
///
/// fn handle_error(e: PipelineError) {
///     match &e {
///         PipelineError::Download(_) => {
///             // Network issue - retry with backoff
///         }
///         PipelineError::IndexOutOfRange { index, len } => {
///             // Caller bug - index must be in 0..len
///             eprintln!("bad index {index} for {len} samples");
///         }
///         PipelineError::Training(_) => {
///             // Diverged run - lower the learning rate
///         }
///         _ => eprintln!("{e}"),
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PipelineError {
    /// Network or download failure. Retry may help.
    #[error("{0}")]
    Download(String),

    /// Tokenization failure. Check input text.
    #[error("{0}")]
    Tokenization(String),

    /// Device initialization failure. Fall back to CPU.
    #[error("{0}")]
    Device(String),

    /// The loaded artifact is not a sequence classifier.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Rejected hyperparameter or pipeline configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Sample index outside `0..len`.
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Dataset length.
        len: usize,
    },

    /// A table lacks a column the operation requires.
    #[error("table is missing required column '{0}'")]
    MissingColumn(String),

    /// Reading or writing a delimited table failed.
    #[error("table error: {0}")]
    Table(String),

    /// Fine-tuning produced a non-finite loss or failed mid-step.
    #[error("training failed: {0}")]
    Training(String),

    /// Internal error. Report if seen.
    #[error("{0}")]
    Unexpected(String),
}

impl From<hf_hub::api::sync::ApiError> for PipelineError {
    fn from(value: hf_hub::api::sync::ApiError) -> Self {
        PipelineError::Download(format!("HuggingFace API error: {}", value))
    }
}

impl From<candle_core::Error> for PipelineError {
    fn from(value: candle_core::Error) -> Self {
        PipelineError::Unexpected(value.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(value: std::io::Error) -> Self {
        PipelineError::Unexpected(value.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(value: serde_json::Error) -> Self {
        PipelineError::Unexpected(value.to_string())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(value: csv::Error) -> Self {
        PipelineError::Table(value.to_string())
    }
}
