use std::path::PathBuf;

use anyhow::{ensure, Context};
use candle_sft::dataset::{Dataset, Table, TabularDataset, TokenizedDataset};
use candle_sft::evaluation::Evaluator;
use candle_sft::finetune::FineTuningPipelineBuilder;
use candle_sft::inference::InferencePipelineBuilder;
use candle_sft::loaders::{HubSource, ModelSource};
use candle_sft::settings::LabSettings;
use clap::Parser;

/// Run inference, evaluation and optional fine-tuning described by a settings file.
#[derive(Parser, Debug)]
#[command(name = "candle-sft", version)]
struct Cli {
    /// Settings JSON.
    #[arg(short, long, default_value = "settings.json")]
    settings: PathBuf,

    /// Override `parameters.dataset`.
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Directory for prediction tables.
    #[arg(long, default_value = "dist")]
    dist_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = LabSettings::from_file(&cli.settings)
        .with_context(|| format!("loading {}", cli.settings.display()))?;
    let params = &settings.parameters;
    let dataset_path = cli
        .dataset
        .unwrap_or_else(|| PathBuf::from(&params.dataset));

    std::fs::create_dir_all(&cli.dist_dir)?;
    let predictions_path = cli.dist_dir.join("predictions.csv");

    let table = TabularDataset::new(
        Table::read_csv(&dataset_path)
            .with_context(|| format!("reading {}", dataset_path.display()))?,
    )?;
    println!("{}", serde_json::to_string_pretty(&table.analyze())?);

    let inference = &settings.inference;
    let rows = table.head(inference.num_samples);
    ensure!(!rows.is_empty(), "dataset {} has no rows", dataset_path.display());

    let pipeline = InferencePipelineBuilder::bert(&params.model)
        .batch_size(inference.batch_size)
        .max_length(inference.max_length)
        .device(inference.device)
        .build(rows.clone())?;
    println!("{}", serde_json::to_string_pretty(&pipeline.analyze_model()?)?);

    let first = rows.sample(0)?;
    println!("{:?} -> {:?}", first.source(), pipeline.infer_sample(&first)?);

    pipeline.infer_dataset()?.write_csv(&predictions_path)?;
    let metrics = params.metrics.iter().copied();
    let scores = Evaluator::new(&predictions_path, metrics).run()?;
    println!("{scores:?}");

    let Some(fine_tuning) = settings.fine_tuning.clone() else {
        return Ok(());
    };
    drop(pipeline);

    let start = inference.num_samples;
    let train_rows = table.slice(start..start + fine_tuning.num_samples);
    ensure!(!train_rows.is_empty(), "no rows left for fine-tuning after row {start}");

    let tokenizer = HubSource.tokenizer(&params.model)?;
    let train_set = TokenizedDataset::new(train_rows, &tokenizer, fine_tuning.config.max_length)?;
    let report = FineTuningPipelineBuilder::<candle_sft::models::BertForSequenceClassification>::from_config(&params.model, fine_tuning.config)
        .build(train_set)?
        .run()?;
    println!(
        "fine-tuned {} of {} parameters in {} steps, final loss {:?}",
        report.trainable_params,
        report.total_params,
        report.optimizer_steps,
        report.losses.last()
    );

    let finetuned_id = report.output_dir.to_string_lossy().into_owned();
    let pipeline = InferencePipelineBuilder::bert(finetuned_id)
        .batch_size(inference.batch_size)
        .max_length(inference.max_length)
        .device(inference.device)
        .build(rows)?;
    let finetuned_path = cli.dist_dir.join("finetuned_predictions.csv");
    pipeline.infer_dataset()?.write_csv(&finetuned_path)?;

    let scores = Evaluator::new(&finetuned_path, params.metrics.iter().copied()).run()?;
    println!("{scores:?}");
    Ok(())
}
