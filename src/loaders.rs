//! Resolving model identifiers to files on disk.
//!
//! A model identifier is either a local directory (for example the output of a
//! fine-tuning run) or a Hugging Face hub repository name. Both resolve to the
//! same [`ModelFiles`] triple, so a persisted model reloads exactly like a
//! pretrained one.

use std::path::{Path, PathBuf};

use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::Tokenizer;

use crate::error::{PipelineError, Result};

pub(crate) const CONFIG_FILE: &str = "config.json";
pub(crate) const TOKENIZER_FILE: &str = "tokenizer.json";
pub(crate) const SAFETENSORS_FILE: &str = "model.safetensors";
pub(crate) const PTH_FILE: &str = "pytorch_model.bin";

/// Paths of the artifacts that make up a classifier checkpoint.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    /// `config.json` with the architecture and label tables.
    pub config: PathBuf,
    /// `model.safetensors` or `pytorch_model.bin`.
    pub weights: PathBuf,
    /// `tokenizer.json`.
    pub tokenizer: PathBuf,
}

/// Capability for turning a model identifier into loadable files.
///
/// Pipelines only depend on this trait, never on a concrete hub client.
pub trait ModelSource {
    /// Resolve every file of the checkpoint named `model_id`.
    fn fetch(&self, model_id: &str) -> Result<ModelFiles>;

    /// Load the tokenizer paired with `model_id`.
    fn tokenizer(&self, model_id: &str) -> Result<Tokenizer> {
        let files = self.fetch(model_id)?;
        load_tokenizer_file(&files.tokenizer)
    }
}

/// Local directories first, then the Hugging Face hub.
#[derive(Debug, Clone, Copy, Default)]
pub struct HubSource;

impl ModelSource for HubSource {
    fn fetch(&self, model_id: &str) -> Result<ModelFiles> {
        let config = HfLoader::new(model_id, CONFIG_FILE).load()?;
        let weights = HfLoader::new(model_id, SAFETENSORS_FILE)
            .load()
            .or_else(|_| HfLoader::new(model_id, PTH_FILE).load())?;
        let tokenizer = HfLoader::new(model_id, TOKENIZER_FILE).load()?;

        tracing::debug!(model_id, weights = %weights.display(), "resolved model files");

        Ok(ModelFiles {
            config,
            weights,
            tokenizer,
        })
    }
}

/// One file of one repository.
#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub filename: String,
}

impl HfLoader {
    pub fn new(repo: &str, filename: &str) -> Self {
        Self {
            repo: repo.into(),
            filename: filename.into(),
        }
    }

    pub fn load(&self) -> Result<PathBuf> {
        let local = Path::new(&self.repo);
        if local.is_dir() {
            let path = local.join(&self.filename);
            return if path.is_file() {
                Ok(path)
            } else {
                Err(PipelineError::Download(format!(
                    "'{}' not found in local model directory '{}'",
                    self.filename, self.repo
                )))
            };
        }

        let api = Api::new()?;
        let repo = api.repo(Repo::new(self.repo.clone(), RepoType::Model));
        repo.get(&self.filename).map_err(|e| {
            PipelineError::Download(format!(
                "Failed to download '{}' from '{}': {}",
                self.filename, self.repo, e
            ))
        })
    }
}

pub(crate) fn load_tokenizer_file(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path).map_err(|e| {
        PipelineError::Tokenization(format!(
            "Failed to load tokenizer from '{}': {}",
            path.display(),
            e
        ))
    })
}
