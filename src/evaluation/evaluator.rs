use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::metrics::{Metric, MetricScorer};
use crate::dataset::{Column, Table};
use crate::error::{PipelineError, Result};
use crate::pipelines::stats::PipelineStats;

/// Scores a persisted prediction table.
pub struct Evaluator {
    path: PathBuf,
    scorers: Vec<Box<dyn MetricScorer>>,
}

impl Evaluator {
    pub fn new(path: impl AsRef<Path>, metrics: impl IntoIterator<Item = Metric>) -> Self {
        Self::with_scorers(path, metrics.into_iter().map(Metric::scorer).collect())
    }

    /// Use custom scorers instead of the built-in metrics.
    pub fn with_scorers(path: impl AsRef<Path>, scorers: Vec<Box<dyn MetricScorer>>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            scorers,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload the table and compute every metric. `None` when no metrics were
    /// requested. A table without `target` or `prediction` is an error.
    pub fn run(&self) -> Result<Option<HashMap<String, f64>>> {
        if self.scorers.is_empty() {
            return Ok(None);
        }

        let stats = PipelineStats::start();
        let table = Table::read_csv(&self.path)?;
        let references = normalized(table.require_column(Column::Target.as_str())?);
        let predictions = normalized(table.require_column(Column::Prediction.as_str())?);

        let mut scores = HashMap::with_capacity(self.scorers.len());
        for scorer in &self.scorers {
            let computed = scorer.compute(&references, &predictions)?;
            let score = *computed.get(scorer.name()).ok_or_else(|| {
                PipelineError::Unexpected(format!("scorer did not report '{}'", scorer.name()))
            })?;
            tracing::info!(metric = scorer.name(), score, "evaluated");
            scores.insert(scorer.name().to_string(), score);
        }

        stats.finish("evaluate", table.len());
        Ok(Some(scores))
    }
}

/// `"2.0"` and `" 2"` both compare as `"2"`.
fn normalized(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .map(|label| {
            let label = label.trim();
            match label.parse::<f64>() {
                Ok(v) if v.fract() == 0.0 && v.is_finite() => format!("{}", v as i64),
                _ => label.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_numeric_labels() {
        let labels: Vec<String> = ["2.0", " 1", "pos"].iter().map(|s| s.to_string()).collect();
        assert_eq!(normalized(&labels), ["2", "1", "pos"]);
    }
}
