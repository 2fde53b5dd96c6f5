use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::TrainableRoles;
use crate::pipelines::utils::DeviceRequest;

/// Optimizer applied to the trainable parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    AdamW,
    Sgd,
}

/// Fine-tuning hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FineTuningConfig {
    /// Rows per optimizer step.
    pub batch_size: usize,
    /// Encoded length of every training row.
    pub max_length: usize,
    /// Number of optimizer steps. The dataset is cycled as often as needed.
    pub max_steps: usize,
    pub learning_rate: f64,
    pub optimizer: OptimizerKind,
    /// Sublayer roles that stay trainable; every other parameter is frozen.
    pub trainable_roles: Vec<String>,
    /// Directory the adapted model and tokenizer are written to.
    pub output_dir: PathBuf,
    pub device: DeviceRequest,
}

impl Default for FineTuningConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            max_length: 120,
            max_steps: 50,
            learning_rate: 1e-3,
            optimizer: OptimizerKind::AdamW,
            trainable_roles: ["query", "key", "value", "dense"]
                .map(String::from)
                .to_vec(),
            output_dir: PathBuf::from("dist/finetuned"),
            device: DeviceRequest::Cpu,
        }
    }
}

impl FineTuningConfig {
    pub fn roles(&self) -> TrainableRoles {
        TrainableRoles::new(self.trainable_roles.iter().cloned())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(PipelineError::InvalidConfig(msg.to_string()));
        if self.batch_size == 0 {
            return invalid("batch_size must be positive");
        }
        if self.max_length == 0 {
            return invalid("max_length must be positive");
        }
        if self.max_steps == 0 {
            return invalid("max_steps must be positive");
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid("learning_rate must be a positive number");
        }
        if self.trainable_roles.is_empty() {
            return invalid("at least one trainable role is required");
        }
        if self.output_dir.as_os_str().is_empty() {
            return invalid("output_dir must not be empty");
        }
        Ok(())
    }
}
