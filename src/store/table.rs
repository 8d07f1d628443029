//! Schema-checked, column-addressed view over a CSV table
//!
//! Stages read upstream tables by column name rather than by fixed struct so
//! that optional columns (cluster labels, alternate score names) can be
//! detected and tolerated. Mandatory columns are checked up front and every
//! missing one is reported together.

use crate::error::{PipelineError, PipelineResult};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

/// An in-memory CSV table
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    index: HashMap<String, usize>,
    records: Vec<StringRecord>,
}

impl Table {
    /// Read a table, failing with `MissingUpstreamArtifact` if the file is absent
    pub fn read(path: &Path, producer: &str) -> PipelineResult<Self> {
        if !path.exists() {
            return Err(PipelineError::missing_artifact(path, producer));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file = std::fs::File::open(path)?;
        Self::from_reader(name, file)
    }

    /// Read the first table that exists among `candidates`
    ///
    /// Returns the chosen path alongside the table. When none exist the error
    /// names the producer of the last (most basic) candidate.
    pub fn read_first_existing(candidates: &[(PathBuf, &str)]) -> PipelineResult<(PathBuf, Self)> {
        for (path, producer) in candidates {
            if path.exists() {
                return Ok((path.clone(), Self::read(path, producer)?));
            }
        }
        match candidates.last() {
            Some((path, producer)) => Err(PipelineError::missing_artifact(path, producer)),
            None => Err(PipelineError::InsufficientData("no candidate tables given".into())),
        }
    }

    /// Parse a table from any reader (e.g., an in-memory buffer)
    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> PipelineResult<Self> {
        let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut records = Vec::new();
        for result in csv_reader.records() {
            records.push(result?);
        }

        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();

        Ok(Self {
            name: name.into(),
            headers,
            index,
            records,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Fail with `SchemaViolation` listing every column in `columns` that is absent
    pub fn require(&self, columns: &[&str]) -> PipelineResult<()> {
        let missing: Vec<String> = columns
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| c.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::SchemaViolation {
                table: self.name.clone(),
                missing,
            })
        }
    }

    /// First of `candidates` present in this table
    pub fn first_present<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        candidates.iter().copied().find(|c| self.has_column(c))
    }

    fn column_index(&self, column: &str) -> PipelineResult<usize> {
        self.index
            .get(column)
            .copied()
            .ok_or_else(|| PipelineError::SchemaViolation {
                table: self.name.clone(),
                missing: vec![column.to_string()],
            })
    }

    fn invalid(&self, column: &str, row: usize, value: &str) -> PipelineError {
        PipelineError::InvalidValue {
            table: self.name.clone(),
            column: column.to_string(),
            row,
            value: value.to_string(),
        }
    }

    /// All cells of one row, in header order
    pub fn row_cells(&self, row: usize) -> Vec<String> {
        self.records[row].iter().map(str::to_string).collect()
    }

    /// Raw text cells of a column
    pub fn text(&self, column: &str) -> PipelineResult<Vec<String>> {
        let idx = self.column_index(column)?;
        Ok(self
            .records
            .iter()
            .map(|r| r.get(idx).unwrap_or("").trim().to_string())
            .collect())
    }

    /// Lenient numeric column: blank or unparsable cells become `None`
    pub fn numeric(&self, column: &str) -> PipelineResult<Vec<Option<f64>>> {
        let idx = self.column_index(column)?;
        Ok(self
            .records
            .iter()
            .map(|r| parse_float(r.get(idx).unwrap_or("")))
            .collect())
    }

    /// Strict numeric column: every cell must parse to a finite number
    pub fn required_numeric(&self, column: &str) -> PipelineResult<Vec<f64>> {
        let idx = self.column_index(column)?;
        self.records
            .iter()
            .enumerate()
            .map(|(row, r)| {
                let raw = r.get(idx).unwrap_or("");
                parse_float(raw).ok_or_else(|| self.invalid(column, row, raw))
            })
            .collect()
    }

    /// Strict numeric values of the given rows only, in the order given
    pub fn required_numeric_rows(&self, column: &str, rows: &[usize]) -> PipelineResult<Vec<f64>> {
        let idx = self.column_index(column)?;
        rows.iter()
            .map(|&row| {
                let raw = self.records.get(row).and_then(|r| r.get(idx)).unwrap_or("");
                parse_float(raw).ok_or_else(|| self.invalid(column, row, raw))
            })
            .collect()
    }

    /// Lenient integer column; integral floats such as `3.0` are accepted
    pub fn integer_lenient(&self, column: &str) -> PipelineResult<Vec<Option<i64>>> {
        Ok(self
            .numeric(column)?
            .into_iter()
            .map(|v| v.filter(|x| x.fract() == 0.0).map(|x| x as i64))
            .collect())
    }

    /// Strict integer column
    pub fn integer(&self, column: &str) -> PipelineResult<Vec<i64>> {
        let idx = self.column_index(column)?;
        self.records
            .iter()
            .enumerate()
            .map(|(row, r)| {
                let raw = r.get(idx).unwrap_or("");
                parse_integer(raw).ok_or_else(|| self.invalid(column, row, raw))
            })
            .collect()
    }
}

fn parse_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    trimmed.parse::<i64>().ok().or_else(|| {
        parse_float(trimmed)
            .filter(|v| v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let csv = "customer_id,income,cluster_name\n1,1000.5,a\n2,,b\n3.0,abc,\n";
        Table::from_reader("sample", csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_require_reports_every_missing_column() {
        let table = sample();
        match table.require(&["customer_id", "balance", "month"]) {
            Err(PipelineError::SchemaViolation { missing, .. }) => {
                assert_eq!(missing, vec!["balance".to_string(), "month".to_string()]);
            }
            other => panic!("expected schema violation, got {:?}", other),
        }
        assert!(table.require(&["income"]).is_ok());
    }

    #[test]
    fn test_lenient_and_strict_numeric() {
        let table = sample();
        assert_eq!(table.numeric("income").unwrap(), vec![Some(1000.5), None, None]);
        assert!(matches!(
            table.required_numeric("income"),
            Err(PipelineError::InvalidValue { row: 1, .. })
        ));
        assert_eq!(table.integer("customer_id").unwrap(), vec![1, 2, 3]);
        assert_eq!(table.required_numeric_rows("income", &[0]).unwrap(), vec![1000.5]);
        assert!(matches!(
            table.required_numeric_rows("income", &[0, 2]),
            Err(PipelineError::InvalidValue { row: 2, .. })
        ));
    }

    #[test]
    fn test_first_present() {
        let table = sample();
        assert_eq!(table.first_present(&["propensity", "income"]), Some("income"));
        assert_eq!(table.first_present(&["propensity"]), None);
    }

    #[test]
    fn test_missing_file_names_producer() {
        let err = Table::read(Path::new("/definitely/not/here.csv"), "build_features").unwrap_err();
        assert!(matches!(err, PipelineError::MissingUpstreamArtifact { .. }));
    }
}
