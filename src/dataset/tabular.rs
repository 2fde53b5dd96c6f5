use std::ops::Range;

use serde::Serialize;

use super::{check_index, Column, Dataset, Sample, Table};
use crate::error::Result;

/// Summary of a dataset, computed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetProperties {
    pub dataset_number_of_samples: usize,
    pub dataset_columns: usize,
    pub dataset_duplicates: usize,
    pub dataset_empty_rows: usize,
    /// Shortest non-empty source text, in characters.
    pub dataset_sample_min_len: Option<usize>,
    /// Longest non-empty source text, in characters.
    pub dataset_sample_max_len: Option<usize>,
}

/// Read-only rows of a preprocessed table with a `source` column and an
/// optional `target` column.
#[derive(Debug, Clone)]
pub struct TabularDataset {
    table: Table,
}

impl TabularDataset {
    /// Fails with [`PipelineError::MissingColumn`](crate::error::PipelineError::MissingColumn)
    /// when `source` is absent.
    pub fn new(table: Table) -> Result<Self> {
        table.require_column(Column::Source.as_str())?;
        Ok(Self { table })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    pub fn has_targets(&self) -> bool {
        self.table.column(Column::Target.as_str()).is_some()
    }

    pub fn head(&self, n: usize) -> Self {
        Self {
            table: self.table.head(n),
        }
    }

    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            table: self.table.slice(range),
        }
    }

    pub fn analyze(&self) -> DatasetProperties {
        let lengths = self
            .sources()
            .iter()
            .map(|s| s.chars().count())
            .filter(|&len| len > 0);

        DatasetProperties {
            dataset_number_of_samples: self.table.len(),
            dataset_columns: self.table.num_columns(),
            dataset_duplicates: self.table.duplicate_rows(),
            dataset_empty_rows: self.table.rows_with_empty_cells(),
            dataset_sample_min_len: lengths.clone().min(),
            dataset_sample_max_len: lengths.max(),
        }
    }

    fn sources(&self) -> &[String] {
        // Checked in `new`.
        self.table
            .column(Column::Source.as_str())
            .unwrap_or_default()
    }
}

impl Dataset for TabularDataset {
    fn len(&self) -> usize {
        self.table.len()
    }

    fn sample(&self, index: usize) -> Result<Sample> {
        check_index(index, self.len())?;
        let target = self
            .table
            .column(Column::Target.as_str())
            .map(|targets| targets[index].clone());
        Ok(Sample::new(self.sources()[index].clone(), target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn dataset() -> TabularDataset {
        let table = Table::from_columns([
            (
                "source",
                vec!["great film".into(), "awful".into(), "".into()],
            ),
            ("target", vec!["1".into(), "2".into(), "1".into()]),
        ])
        .unwrap();
        TabularDataset::new(table).unwrap()
    }

    #[test]
    fn requires_source_column() {
        let table = Table::from_columns([("text", vec!["x".to_string()])]).unwrap();
        assert!(matches!(
            TabularDataset::new(table),
            Err(PipelineError::MissingColumn(_))
        ));
    }

    #[test]
    fn sample_is_stable_and_bounded() {
        let ds = dataset();
        assert_eq!(ds.len(), 3);
        for i in 0..ds.len() {
            assert_eq!(ds.sample(i).unwrap(), ds.sample(i).unwrap());
        }
        assert_eq!(ds.sample(1).unwrap().target(), Some("2"));
        assert!(matches!(
            ds.sample(3),
            Err(PipelineError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert_eq!(ds.len(), 3);
    }

    #[test]
    fn analyze_ignores_empty_sources_for_lengths() {
        let props = dataset().analyze();
        assert_eq!(props.dataset_number_of_samples, 3);
        assert_eq!(props.dataset_columns, 2);
        assert_eq!(props.dataset_duplicates, 0);
        assert_eq!(props.dataset_empty_rows, 1);
        assert_eq!(props.dataset_sample_min_len, Some(5));
        assert_eq!(props.dataset_sample_max_len, Some(10));
    }
}
