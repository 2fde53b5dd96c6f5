//! The JSON settings file driving an end-to-end run.
//!
//! ```json
//! {
//!   "parameters": {
//!     "model": "cointegrated/rubert-tiny-sentiment-balanced",
//!     "dataset": "dataset.csv",
//!     "metrics": ["accuracy", "f1"]
//!   },
//!   "inference": { "batch_size": 64, "max_length": 120, "num_samples": 100 },
//!   "fine_tuning": { "max_steps": 50, "batch_size": 3, "num_samples": 150 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::evaluation::Metric;
use crate::finetune::FineTuningConfig;
use crate::inference::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_LENGTH};
use crate::pipelines::utils::DeviceRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabSettings {
    pub parameters: Parameters,
    #[serde(default)]
    pub inference: InferenceSettings,
    /// Absent: skip fine-tuning.
    #[serde(default)]
    pub fine_tuning: Option<FineTuningSettings>,
}

/// What to run on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Hub name or local directory.
    pub model: String,
    /// Path of the preprocessed CSV table.
    pub dataset: String,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub batch_size: usize,
    pub max_length: usize,
    pub device: DeviceRequest,
    /// Leading rows of the table to run inference on.
    pub num_samples: usize,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_length: DEFAULT_MAX_LENGTH,
            device: DeviceRequest::Cpu,
            num_samples: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineTuningSettings {
    #[serde(flatten)]
    pub config: FineTuningConfig,
    /// Rows used for training, taken right after the inference rows.
    #[serde(default = "default_training_rows")]
    pub num_samples: usize,
}

fn default_training_rows() -> usize {
    150
}

impl LabSettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidConfig(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)
            .map_err(|e| PipelineError::InvalidConfig(format!("invalid settings: {e}")))?;
        if let Some(fine_tuning) = &settings.fine_tuning {
            fine_tuning.config.validate()?;
        }
        Ok(settings)
    }
}
