use candle_sft::dataset::Table;
use candle_sft::error::PipelineError;
use candle_sft::evaluation::{Evaluator, Metric};

fn write_predictions(dir: &std::path::Path, targets: &[&str], predictions: &[&str]) -> std::path::PathBuf {
    let path = dir.join("predictions.csv");
    let column = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
    Table::from_columns([
        ("source", column(&vec!["text"; targets.len()])),
        ("target", column(targets)),
        ("prediction", column(predictions)),
    ])
    .unwrap()
    .write_csv(&path)
    .unwrap();
    path
}

#[test]
fn empty_metric_list_returns_none() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_predictions(dir.path(), &["1"], &["1"]);
    assert!(Evaluator::new(&path, Vec::<Metric>::new()).run()?.is_none());
    Ok(())
}

#[test]
fn empty_metric_list_does_not_touch_the_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("nowhere.csv");
    assert!(Evaluator::new(missing, Vec::<Metric>::new()).run()?.is_none());
    Ok(())
}

#[test]
fn scores_every_requested_metric() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_predictions(dir.path(), &["1", "2", "2", "1"], &["1", "2", "1", "1"]);

    let scores = Evaluator::new(&path, [Metric::Accuracy, Metric::F1, Metric::Recall])
        .run()?
        .expect("metrics were requested");

    assert_eq!(scores.len(), 3);
    assert_eq!(scores["accuracy"], 0.75);
    assert!((0.0..=1.0).contains(&scores["f1"]));
    assert!((0.0..=1.0).contains(&scores["recall"]));
    Ok(())
}

#[test]
fn float_formatted_targets_compare_equal() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_predictions(dir.path(), &["1.0", "2.0"], &["1", "2"]);
    let scores = Evaluator::new(&path, [Metric::Accuracy]).run()?.unwrap();
    assert_eq!(scores["accuracy"], 1.0);
    Ok(())
}

#[test]
fn runs_are_independent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_predictions(dir.path(), &["1", "2"], &["1", "1"]);
    let evaluator = Evaluator::new(&path, [Metric::Accuracy]);
    assert_eq!(evaluator.run()?, evaluator.run()?);

    write_predictions(dir.path(), &["1", "2"], &["1", "2"]);
    assert_eq!(evaluator.run()?.unwrap()["accuracy"], 1.0);
    Ok(())
}

#[test]
fn missing_prediction_column_is_fatal() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("predictions.csv");
    std::fs::write(&path, "source,target\nnice,1\n")?;

    let result = Evaluator::new(&path, [Metric::Accuracy]).run();
    assert!(matches!(result, Err(PipelineError::MissingColumn(name)) if name == "prediction"));
    Ok(())
}
