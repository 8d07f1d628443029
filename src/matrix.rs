//! Dense feature arrays and column statistics

use crate::error::PipelineResult;
use ndarray::{Array2, ArrayView1, ErrorKind, ShapeError};

fn incompatible() -> ShapeError {
    ShapeError::from_kind(ErrorKind::IncompatibleShape)
}

/// Stack columns of length `n_rows` into an `(n_rows, columns.len())` array
///
/// The row count is explicit so a matrix with no columns still has one
/// (empty) row per observation.
pub fn stack_columns(n_rows: usize, columns: &[Vec<f64>]) -> PipelineResult<Array2<f64>> {
    let mut out = Array2::zeros((n_rows, columns.len()));
    for (j, col) in columns.iter().enumerate() {
        if col.len() != n_rows {
            return Err(incompatible().into());
        }
        out.column_mut(j).assign(&ArrayView1::from(col.as_slice()));
    }
    Ok(out)
}

/// Stack rows of width `n_cols` into an `(rows.len(), n_cols)` array
pub fn stack_rows(n_cols: usize, rows: &[Vec<f64>]) -> PipelineResult<Array2<f64>> {
    let mut out = Array2::zeros((rows.len(), n_cols));
    for (i, row) in rows.iter().enumerate() {
        if row.len() != n_cols {
            return Err(incompatible().into());
        }
        out.row_mut(i).assign(&ArrayView1::from(row.as_slice()));
    }
    Ok(out)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample (n - 1) standard deviation; fewer than two values yields 0
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Population (n) standard deviation
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / values.len() as f64).sqrt()
}

/// Median of the present values; `None` if there are none
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.total_cmp(b));
    let n = present.len();
    Some(if n % 2 == 1 {
        present[n / 2]
    } else {
        (present[n / 2 - 1] + present[n / 2]) / 2.0
    })
}

/// Replace missing values with the column median (0 if the column is all missing)
pub fn impute_median(values: &[Option<f64>]) -> Vec<f64> {
    let fill = median(values).unwrap_or(0.0);
    values.iter().map(|v| v.unwrap_or(fill)).collect()
}
