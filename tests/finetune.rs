mod common;

use candle_core::{Device, Tensor};
use candle_sft::dataset::{Dataset, Table, TabularDataset, TokenizedDataset};
use candle_sft::error::PipelineError;
use candle_sft::finetune::{FineTuningPipelineBuilder, OptimizerKind};
use candle_sft::inference::InferencePipelineBuilder;
use candle_sft::loaders::{HubSource, ModelSource};
use common::{load_weights, sentiment_dataset, tiny_bert, TinyBert};

const MAX_LENGTH: usize = 16;

fn tokenized(model: &TinyBert, rows: TabularDataset) -> TokenizedDataset {
    let tokenizer = HubSource.tokenizer(&model.model_id()).unwrap();
    TokenizedDataset::new(rows, &tokenizer, MAX_LENGTH).unwrap()
}

fn values(t: &Tensor) -> Vec<f32> {
    t.flatten_all().unwrap().to_vec1::<f32>().unwrap()
}

#[test]
fn runs_exactly_max_steps_on_a_small_dataset() -> anyhow::Result<()> {
    let model = tiny_bert();
    let out = tempfile::tempdir()?;
    let dataset = tokenized(&model, sentiment_dataset(4));

    let report = FineTuningPipelineBuilder::bert(model.model_id())
        .batch_size(3)
        .max_length(MAX_LENGTH)
        .max_steps(5)
        .trainable_roles(["query", "value"])
        .output_dir(out.path())
        .build(dataset)?
        .run()?;

    assert_eq!(report.optimizer_steps, 5);
    assert_eq!(report.losses.len(), 5);
    assert_eq!(report.samples_seen, 15);
    assert!(report.losses.iter().all(|l| l.is_finite()));
    assert!(report.trainable_params > 0);
    assert!(report.trainable_params < report.total_params);
    assert_eq!(report.stats.items_processed, 5);
    Ok(())
}

#[test]
fn only_declared_roles_change() -> anyhow::Result<()> {
    let model = tiny_bert();
    let out = tempfile::tempdir()?;
    let before = model.weights();

    FineTuningPipelineBuilder::bert(model.model_id())
        .max_length(MAX_LENGTH)
        .max_steps(3)
        .learning_rate(1e-2)
        .trainable_roles(["query", "value"])
        .output_dir(out.path())
        .build(tokenized(&model, sentiment_dataset(6)))?
        .run()?;

    let after = load_weights(&out.path().join("model.safetensors"));
    assert_eq!(after.len(), before.len(), "every parameter is persisted");

    let mut changed = 0;
    for (name, original) in &before {
        let saved = &after[name];
        let trainable = name.contains(".query.") || name.contains(".value.");
        if trainable {
            if values(original) != values(saved) {
                changed += 1;
            }
        } else {
            assert_eq!(values(original), values(saved), "frozen {name} was modified");
        }
    }
    assert!(changed > 0, "no trainable parameter moved");
    Ok(())
}

#[test]
fn persisted_model_reloads_by_path() -> anyhow::Result<()> {
    let model = tiny_bert();
    let out = tempfile::tempdir()?;
    let target = out.path().join("adapted");

    let report = FineTuningPipelineBuilder::bert(model.model_id())
        .max_length(MAX_LENGTH)
        .max_steps(2)
        .optimizer(OptimizerKind::Sgd)
        .output_dir(&target)
        .build(tokenized(&model, sentiment_dataset(5)))?
        .run()?;

    assert_eq!(report.output_dir, target);
    for file in ["config.json", "tokenizer.json", "model.safetensors"] {
        assert!(target.join(file).is_file(), "{file} missing");
    }

    let rows = sentiment_dataset(7);
    let table = InferencePipelineBuilder::bert(target.to_string_lossy())
        .build(rows.clone())?
        .infer_dataset()?;
    assert_eq!(table.len(), rows.len());
    Ok(())
}

#[test]
fn non_finite_loss_aborts_without_persisting() -> anyhow::Result<()> {
    let model = tiny_bert();
    let mut weights = model.weights();
    let shape = weights["classifier.weight"].dims().to_vec();
    weights.insert(
        "classifier.weight".to_string(),
        Tensor::full(f32::NAN, shape, &Device::Cpu)?,
    );
    candle_core::safetensors::save(&weights, model.path().join("model.safetensors"))?;

    let out = tempfile::tempdir()?;
    let target = out.path().join("diverged");
    let result = FineTuningPipelineBuilder::bert(model.model_id())
        .max_length(MAX_LENGTH)
        .max_steps(2)
        .output_dir(&target)
        .build(tokenized(&model, sentiment_dataset(4)))?
        .run();

    assert!(matches!(result, Err(PipelineError::Training(_))));
    assert!(!target.exists(), "diverged model was persisted");
    Ok(())
}

#[test]
fn unknown_trainable_role_fails_at_construction() {
    let model = tiny_bert();
    let result = FineTuningPipelineBuilder::bert(model.model_id())
        .max_length(MAX_LENGTH)
        .trainable_roles(["query", "lora_A"])
        .build(tokenized(&model, sentiment_dataset(3)));
    assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
}

#[test]
fn encoded_length_must_match_max_length() {
    let model = tiny_bert();
    let result = FineTuningPipelineBuilder::bert(model.model_id())
        .max_length(MAX_LENGTH * 2)
        .build(tokenized(&model, sentiment_dataset(3)));
    assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
}

#[test]
fn labels_outside_the_head_are_rejected() {
    let model = tiny_bert();
    let table = Table::from_columns([
        ("source", vec!["good".to_string(), "bad".to_string()]),
        ("target", vec!["1".to_string(), "7".to_string()]),
    ])
    .unwrap();
    let rows = TabularDataset::new(table).unwrap();

    let result = FineTuningPipelineBuilder::bert(model.model_id())
        .max_length(MAX_LENGTH)
        .build(tokenized(&model, rows));
    assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
}

#[test]
fn empty_dataset_is_rejected() {
    let model = tiny_bert();
    let rows = sentiment_dataset(3).slice(3..3);
    let dataset = tokenized(&model, rows);
    assert!(dataset.is_empty());

    let result = FineTuningPipelineBuilder::bert(model.model_id())
        .max_length(MAX_LENGTH)
        .build(dataset);
    assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
}
