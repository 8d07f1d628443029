//! Histogram-based gradient boosting
//!
//! Features are binned once on the training data; split search then scans
//! per-bin gradient and hessian sums instead of sorted values.

use super::boosting::{boost, check_labels, BoostSettings, Ensemble};
use super::tree::{Split, SplitFinder, TreeParams};
use super::BinaryClassifier;
use crate::config::HistogramParams;
use crate::error::PipelineResult;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Per-feature bin edges; a value falls in the first bin whose edge is >= it
#[derive(Debug, Clone, PartialEq)]
pub struct BinMapper {
    edges: Vec<Vec<f64>>,
}

impl BinMapper {
    pub fn fit(x: &Array2<f64>, max_bins: usize) -> Self {
        let max_bins = max_bins.max(2);
        let edges = x
            .columns()
            .into_iter()
            .map(|col| {
                let mut values = col.to_vec();
                values.sort_by(f64::total_cmp);
                values.dedup();
                let midpoints = |a: f64, b: f64| a + (b - a) / 2.0;
                if values.len() <= max_bins {
                    values.windows(2).map(|w| midpoints(w[0], w[1])).collect()
                } else {
                    // Quantile cut points between distinct values
                    let mut cuts: Vec<f64> = (1..max_bins)
                        .map(|q| {
                            let pos = q * (values.len() - 1) / max_bins;
                            midpoints(values[pos], values[pos + 1])
                        })
                        .collect();
                    cuts.dedup();
                    cuts
                }
            })
            .collect();
        Self { edges }
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.edges[feature].len() + 1
    }

    pub fn bin(&self, feature: usize, value: f64) -> usize {
        self.edges[feature].partition_point(|&e| e < value)
    }

    pub fn edge(&self, feature: usize, bin: usize) -> f64 {
        self.edges[feature][bin]
    }
}

pub(crate) struct HistogramSplitFinder {
    mapper: BinMapper,
    /// Row-major bin indices
    bins: Vec<Vec<usize>>,
}

impl HistogramSplitFinder {
    pub fn new(x: &Array2<f64>, max_bins: usize) -> Self {
        let mapper = BinMapper::fit(x, max_bins);
        let bins = x
            .rows()
            .into_iter()
            .map(|row| row.iter().enumerate().map(|(j, &v)| mapper.bin(j, v)).collect())
            .collect();
        Self { mapper, bins }
    }
}

impl SplitFinder for HistogramSplitFinder {
    fn best_split_on(&self, feature: usize, rows: &[usize], grad: &[f64], hess: &[f64], params: &TreeParams) -> Option<Split> {
        let n_bins = self.mapper.n_bins(feature);
        let mut hist = vec![(0.0, 0.0, 0usize); n_bins];
        for &r in rows {
            let b = self.bins[r][feature];
            hist[b].0 += grad[r];
            hist[b].1 += hess[r];
            hist[b].2 += 1;
        }
        let total = hist
            .iter()
            .fold((0.0, 0.0, 0usize), |acc, h| (acc.0 + h.0, acc.1 + h.1, acc.2 + h.2));

        let mut left = (0.0, 0.0, 0usize);
        let mut best: Option<Split> = None;
        for (b, h) in hist.iter().enumerate().take(n_bins - 1) {
            left = (left.0 + h.0, left.1 + h.1, left.2 + h.2);
            if h.2 == 0 {
                continue;
            }
            if let Some(gain) = params.split_gain(left, total) {
                if best.map_or(true, |s| gain > s.gain) {
                    best = Some(Split {
                        feature,
                        threshold: self.mapper.edge(feature, b),
                        gain,
                    });
                }
            }
        }
        best
    }
}

/// Histogram boosted trees without subsampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBoostedTrees {
    pub params: HistogramParams,
    pub seed: u64,
    ensemble: Option<Ensemble>,
}

impl HistogramBoostedTrees {
    pub fn new(params: HistogramParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            ensemble: None,
        }
    }
}

impl BinaryClassifier for HistogramBoostedTrees {
    fn name(&self) -> &'static str {
        "HistogramBoostedTrees"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> PipelineResult<()> {
        check_labels(x, y)?;
        let settings = BoostSettings {
            rounds: self.params.max_iter,
            learning_rate: self.params.learning_rate,
            subsample: 1.0,
            colsample: 1.0,
            tree: TreeParams {
                max_depth: self.params.max_depth,
                lambda: self.params.l2_regularization,
                min_child_weight: 1e-3,
                min_samples_leaf: self.params.min_samples_leaf,
            },
            seed: self.seed,
        };
        let finder = HistogramSplitFinder::new(x, self.params.max_bins);
        self.ensemble = Some(boost(x, y, &settings, &finder));
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        match &self.ensemble {
            Some(e) => e.predict_proba(x),
            None => vec![0.5; x.nrows()],
        }
    }

    fn ensemble(&self) -> Option<&Ensemble> {
        self.ensemble.as_ref()
    }
}
