use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Built-in metric identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Accuracy,
    F1,
    Precision,
    Recall,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::F1 => "f1",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
        }
    }

    /// The scorer computing this metric.
    pub fn scorer(self) -> Box<dyn MetricScorer> {
        match self {
            Metric::Accuracy => Box::new(Accuracy),
            metric => Box::new(MacroAveraged(metric)),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accuracy" => Ok(Metric::Accuracy),
            "f1" => Ok(Metric::F1),
            "precision" => Ok(Metric::Precision),
            "recall" => Ok(Metric::Recall),
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown metric '{other}'"
            ))),
        }
    }
}

/// Computes named scores from parallel reference and prediction labels.
pub trait MetricScorer {
    /// Key under which the primary score is reported.
    fn name(&self) -> &str;

    /// Returns at least `{name(): score}`. Inputs have equal, non-zero length.
    fn compute(&self, references: &[String], predictions: &[String]) -> Result<HashMap<String, f64>>;
}

/// Share of exact matches.
#[derive(Debug, Clone, Copy)]
pub struct Accuracy;

impl MetricScorer for Accuracy {
    fn name(&self) -> &str {
        Metric::Accuracy.as_str()
    }

    fn compute(&self, references: &[String], predictions: &[String]) -> Result<HashMap<String, f64>> {
        check_lengths(references, predictions)?;
        let hits = references
            .iter()
            .zip(predictions)
            .filter(|(r, p)| r == p)
            .count();
        let score = hits as f64 / references.len() as f64;
        Ok(HashMap::from([(self.name().to_string(), score)]))
    }
}

/// F1, precision or recall averaged over every label seen in either column.
#[derive(Debug, Clone, Copy)]
pub struct MacroAveraged(Metric);

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    tp: usize,
    fp: usize,
    fn_: usize,
}

impl Counts {
    fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    fn f1(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl MetricScorer for MacroAveraged {
    fn name(&self) -> &str {
        self.0.as_str()
    }

    fn compute(&self, references: &[String], predictions: &[String]) -> Result<HashMap<String, f64>> {
        check_lengths(references, predictions)?;
        let labels: BTreeSet<&str> = references
            .iter()
            .chain(predictions)
            .map(String::as_str)
            .collect();

        let per_label = labels.iter().map(|&label| {
            references
                .iter()
                .zip(predictions)
                .fold(Counts::default(), |mut c, (r, p)| {
                    match (r == label, p == label) {
                        (true, true) => c.tp += 1,
                        (false, true) => c.fp += 1,
                        (true, false) => c.fn_ += 1,
                        (false, false) => {}
                    }
                    c
                })
        });

        let score_of = |c: Counts| match self.0 {
            Metric::Precision => c.precision(),
            Metric::Recall => c.recall(),
            _ => c.f1(),
        };
        let score = per_label.map(score_of).sum::<f64>() / labels.len() as f64;
        Ok(HashMap::from([(self.name().to_string(), score)]))
    }
}

fn check_lengths(references: &[String], predictions: &[String]) -> Result<()> {
    if references.is_empty() {
        return Err(PipelineError::Table("no rows to score".into()));
    }
    if references.len() != predictions.len() {
        return Err(PipelineError::Table(format!(
            "{} references but {} predictions",
            references.len(),
            predictions.len()
        )));
    }
    Ok(())
}
