use std::collections::HashSet;
use std::io::{Read, Write};
use std::ops::Range;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};

use crate::error::{PipelineError, Result};

/// A column-major table of string cells with a fixed row count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<String>>,
    rows: usize,
}

impl Table {
    /// An empty table with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, values)` pairs. All columns must have equal length
    /// and distinct names.
    pub fn from_columns<I, N>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, Vec<String>)>,
        N: Into<String>,
    {
        columns
            .into_iter()
            .try_fold(Self::new(), |table, (name, values)| {
                let name = name.into();
                if table.column(&name).is_some() {
                    return Err(PipelineError::Table(format!("duplicate column '{name}'")));
                }
                table.with_column(name, values)
            })
    }

    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            PipelineError::Table(format!("cannot open '{}': {e}", path.display()))
        })?;
        Self::from_reader(file)
    }

    /// Parse comma-delimited text with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let names: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut columns: Vec<Vec<String>> = vec![Vec::new(); names.len()];

        for record in rdr.records() {
            let record = record?;
            for (column, value) in columns.iter_mut().zip(record.iter()) {
                column.push(value.to_string());
            }
        }

        let rows = columns.first().map_or(0, Vec::len);
        Ok(Self {
            names,
            columns,
            rows,
        })
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| {
            PipelineError::Table(format!("cannot create '{}': {e}", path.display()))
        })?;
        self.to_writer(file)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        wtr.write_record(&self.names)?;
        for row in 0..self.rows {
            wtr.write_record(self.columns.iter().map(|c| c[row].as_str()))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn num_columns(&self) -> usize {
        self.names.len()
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn require_column(&self, name: &str) -> Result<&[String]> {
        self.column(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    /// Cells of row `index` in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&str>> {
        (index < self.rows).then(|| self.columns.iter().map(|c| c[index].as_str()).collect())
    }

    /// Append `name`, or replace it if present. Length must match the row count
    /// unless the table has no columns yet.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<String>) -> Result<Self> {
        let name = name.into();
        if !self.names.is_empty() && values.len() != self.rows {
            return Err(PipelineError::Table(format!(
                "column '{name}' has {} values but the table has {} rows",
                values.len(),
                self.rows
            )));
        }

        self.rows = values.len();
        match self.names.iter().position(|n| *n == name) {
            Some(i) => self.columns[i] = values,
            None => {
                self.names.push(name);
                self.columns.push(values);
            }
        }
        Ok(self)
    }

    /// First `n` rows (all rows if `n` exceeds the row count).
    pub fn head(&self, n: usize) -> Self {
        self.rows_in(0..n.min(self.rows))
    }

    /// Rows `range`, clamped to the table.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.rows);
        let start = range.start.min(end);
        self.rows_in(start..end)
    }

    fn rows_in(&self, range: Range<usize>) -> Self {
        Self {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| c[range.clone()].to_vec())
                .collect(),
            rows: range.len(),
        }
    }

    /// Rows identical to an earlier row.
    pub(crate) fn duplicate_rows(&self) -> usize {
        let mut seen = HashSet::with_capacity(self.rows);
        (0..self.rows)
            .filter_map(|i| self.row(i))
            .filter(|row| !seen.insert(row.clone()))
            .count()
    }

    /// Rows with at least one empty cell.
    pub(crate) fn rows_with_empty_cells(&self) -> usize {
        (0..self.rows)
            .filter(|&i| self.columns.iter().any(|c| c[i].trim().is_empty()))
            .count()
    }
}
