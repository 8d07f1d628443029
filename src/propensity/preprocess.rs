//! Feature preparation for the propensity classifier
//!
//! Numeric columns are imputed with the training median. The optional
//! categorical column is imputed with the training mode and one-hot encoded;
//! categories not seen in training encode as all zeros.

use crate::error::PipelineResult;
use crate::matrix::{median, stack_rows};
use crate::store::Table;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw model inputs read from the customer table
#[derive(Debug, Clone)]
pub struct RawFeatures {
    pub numeric_names: Vec<String>,
    /// Column-major numeric values
    pub numeric: Vec<Vec<Option<f64>>>,
    pub categorical: Option<(String, Vec<Option<String>>)>,
}

impl RawFeatures {
    /// Collect the candidate numeric columns present and the optional categorical one
    pub fn from_table(table: &Table, numeric_candidates: &[&str], categorical: &str) -> PipelineResult<Self> {
        let mut numeric_names = Vec::new();
        let mut numeric = Vec::new();
        for name in numeric_candidates {
            if table.has_column(name) {
                numeric_names.push(name.to_string());
                numeric.push(table.numeric(name)?);
            }
        }
        let categorical = if table.has_column(categorical) {
            let values = table
                .text(categorical)?
                .into_iter()
                .map(|v| if v.is_empty() { None } else { Some(v) })
                .collect();
            Some((categorical.to_string(), values))
        } else {
            None
        };
        Ok(Self {
            numeric_names,
            numeric,
            categorical,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    pub column: String,
    pub mode: String,
    /// Sorted training categories
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub numeric_names: Vec<String>,
    pub medians: Vec<f64>,
    pub categorical: Option<CategoricalEncoder>,
}

impl Preprocessor {
    /// Learn medians, mode and categories from the rows in `fit_rows`
    pub fn fit(raw: &RawFeatures, fit_rows: &[usize]) -> Self {
        let medians = raw
            .numeric
            .iter()
            .map(|col| {
                let subset: Vec<Option<f64>> = fit_rows.iter().map(|&i| col[i]).collect();
                median(&subset).unwrap_or(0.0)
            })
            .collect();

        let categorical = raw.categorical.as_ref().map(|(column, values)| {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for &i in fit_rows {
                if let Some(v) = &values[i] {
                    *counts.entry(v.as_str()).or_default() += 1;
                }
            }
            // Most frequent; ties go to the smallest category
            let mode = counts
                .iter()
                .fold(None, |best: Option<(&str, usize)>, (&cat, &n)| match best {
                    Some((_, m)) if m >= n => best,
                    _ => Some((cat, n)),
                })
                .map_or_else(String::new, |(cat, _)| cat.to_string());
            CategoricalEncoder {
                column: column.clone(),
                mode,
                categories: counts.keys().map(|c| c.to_string()).collect(),
            }
        });

        Self {
            numeric_names: raw.numeric_names.clone(),
            medians,
            categorical,
        }
    }

    pub fn output_columns(&self) -> Vec<String> {
        let mut cols = self.numeric_names.clone();
        if let Some(enc) = &self.categorical {
            cols.extend(enc.categories.iter().map(|c| format!("{}={}", enc.column, c)));
        }
        cols
    }

    /// Design matrix for `rows`, in the order given; columns follow `output_columns`
    pub fn transform(&self, raw: &RawFeatures, rows: &[usize]) -> PipelineResult<Array2<f64>> {
        let encoded: Vec<Vec<f64>> = rows
            .iter()
            .map(|&i| {
                let mut out: Vec<f64> = raw
                    .numeric
                    .iter()
                    .zip(&self.medians)
                    .map(|(col, m)| col[i].unwrap_or(*m))
                    .collect();
                if let (Some(enc), Some((_, values))) = (&self.categorical, &raw.categorical) {
                    let value = values[i].as_deref().unwrap_or(&enc.mode);
                    out.extend(enc.categories.iter().map(|c| if c == value { 1.0 } else { 0.0 }));
                }
                out
            })
            .collect();
        stack_rows(self.output_columns().len(), &encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
customer_id,income,mean_pix,cluster_name
1,1000,3,stable digital
2,,5,stable digital
3,3000,,traditional conservative
4,5000,9,
5,7000,1,brand new
";

    #[test]
    fn test_imputes_from_training_rows_only() {
        let table = Table::from_reader("t", TABLE.as_bytes()).unwrap();
        let raw = RawFeatures::from_table(&table, &["income", "mean_pix", "age"], "cluster_name").unwrap();
        assert_eq!(raw.numeric_names, vec!["income", "mean_pix"]);

        let prep = Preprocessor::fit(&raw, &[0, 1, 2, 3]);
        assert_eq!(prep.medians, vec![3000.0, 5.0]);
        let enc = prep.categorical.as_ref().unwrap();
        assert_eq!(enc.mode, "stable digital");
        assert_eq!(enc.categories, vec!["stable digital", "traditional conservative"]);

        let x = prep.transform(&raw, &[1, 2, 3, 4]).unwrap();
        assert_eq!(
            prep.output_columns(),
            [
                "income",
                "mean_pix",
                "cluster_name=stable digital",
                "cluster_name=traditional conservative"
            ]
        );
        assert_eq!(x.row(0).to_vec(), vec![3000.0, 5.0, 1.0, 0.0]);
        assert_eq!(x.row(1).to_vec(), vec![3000.0, 5.0, 0.0, 1.0]);
        // Missing category takes the mode
        assert_eq!(x.row(2).to_vec(), vec![5000.0, 9.0, 1.0, 0.0]);
        // Unseen category encodes as zeros
        assert_eq!(x.row(3).to_vec(), vec![7000.0, 1.0, 0.0, 0.0]);
    }
}
