use std::cell::Cell;
use std::path::Path;

use candle_core::{Device, Tensor, Var};
use tokenizers::Tokenizer;

use super::capabilities::{ClassifierInfo, SequenceClassifier};
use super::params::{ParameterStore, TrainableRoles};
use crate::error::{PipelineError, Result};
use crate::loaders::{
    load_tokenizer_file, ModelFiles, ModelSource, CONFIG_FILE, SAFETENSORS_FILE, TOKENIZER_FILE,
};

/// A loaded classifier and its tokenizer, owned by exactly one pipeline.
///
/// Handles are never re-pointed at new weights: a fine-tuned model is
/// persisted and reloaded as a fresh handle.
pub struct ModelHandle<M: SequenceClassifier> {
    model_id: String,
    model: M,
    tokenizer: Tokenizer,
    params: ParameterStore,
    files: ModelFiles,
    device: Device,
    grad_enabled: Cell<bool>,
}

impl<M: SequenceClassifier> ModelHandle<M> {
    /// Load `model_id` through `source`, partitioning weights by `roles`.
    pub fn load(
        source: &dyn ModelSource,
        model_id: &str,
        device: &Device,
        roles: &TrainableRoles,
    ) -> Result<Self> {
        let files = source.fetch(model_id)?;
        let config_json = std::fs::read_to_string(&files.config)?;
        let params = ParameterStore::load(&files.weights, device, roles)?;

        let model = M::load(params.var_builder(device), &config_json).map_err(|e| match e {
            PipelineError::InvalidModel(_) => e,
            other => PipelineError::InvalidModel(format!(
                "'{model_id}' is not a sequence classifier: {other}"
            )),
        })?;
        let tokenizer = load_tokenizer_file(&files.tokenizer)?;

        tracing::info!(
            model_id,
            parameters = params.parameter_count(),
            trainable = params.trainable_parameter_count(),
            device = ?device.location(),
            "loaded classifier"
        );

        Ok(Self {
            model_id: model_id.to_string(),
            model,
            tokenizer,
            params,
            files,
            device: device.clone(),
            grad_enabled: Cell::new(true),
        })
    }

    /// Forward pass. Outputs are detached while a [`NoGradGuard`] is alive.
    pub fn forward(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let logits = self.model.forward(input_ids, attention_mask)?;
        if self.grad_enabled.get() {
            Ok(logits)
        } else {
            Ok(logits.detach())
        }
    }

    /// Disable gradient tracking until the returned guard drops.
    pub fn no_grad(&self) -> NoGradGuard<'_> {
        NoGradGuard {
            previous: self.grad_enabled.replace(false),
            flag: &self.grad_enabled,
        }
    }

    pub fn grad_enabled(&self) -> bool {
        self.grad_enabled.get()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn info(&self) -> &ClassifierInfo {
        self.model.info()
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn trainable_vars(&self) -> Vec<Var> {
        self.params.trainable_vars()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Persist the full model and its tokenizer so that `dir` can be passed
    /// back as a model identifier.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        self.params.save(&dir.join(SAFETENSORS_FILE))?;
        copy_unless_same(&self.files.config, &dir.join(CONFIG_FILE))?;
        copy_unless_same(&self.files.tokenizer, &dir.join(TOKENIZER_FILE))?;

        tracing::info!(model_id = %self.model_id, dir = %dir.display(), "saved model");
        Ok(())
    }
}

fn copy_unless_same(from: &Path, to: &Path) -> Result<()> {
    if to.exists() && std::fs::canonicalize(from)? == std::fs::canonicalize(to)? {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    Ok(())
}

/// Scoped inference mode. Restores the previous mode on drop, including
/// when the scope is left through an error.
pub struct NoGradGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl Drop for NoGradGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}
