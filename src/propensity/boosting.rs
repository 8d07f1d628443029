//! Log-loss gradient boosting with exact greedy split search

use super::tree::{RegressionTree, Split, SplitFinder, TreeParams};
use super::BinaryClassifier;
use crate::config::GradientBoostingParams;
use crate::error::{PipelineError, PipelineResult};
use crate::rng::{stream_rng, Stream};
use ndarray::{Array2, ArrayView1};
use rand::seq::index::sample;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub(crate) fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// Additive tree model on the log-odds scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    /// Log-odds of the training prior
    pub base_score: f64,
    /// Trees with shrinkage already applied to their leaves
    pub trees: Vec<RegressionTree>,
}

impl Ensemble {
    pub fn raw_score(&self, row: ArrayView1<f64>) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        (0..x.nrows())
            .into_par_iter()
            .map(|i| sigmoid(self.raw_score(x.row(i))))
            .collect()
    }
}

/// Settings of one boosting run
pub(crate) struct BoostSettings {
    pub rounds: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub colsample: f64,
    pub tree: TreeParams,
    pub seed: u64,
}

pub(crate) fn check_labels(x: &Array2<f64>, y: &[bool]) -> PipelineResult<()> {
    if x.nrows() != y.len() || y.is_empty() {
        return Err(PipelineError::InsufficientData(format!(
            "{} feature rows for {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if y.iter().all(|&v| v) || y.iter().all(|&v| !v) {
        return Err(PipelineError::InsufficientData(
            "training labels contain a single class".into(),
        ));
    }
    Ok(())
}

/// Fit an ensemble by second-order boosting of the logistic loss
pub(crate) fn boost(x: &Array2<f64>, y: &[bool], settings: &BoostSettings, finder: &dyn SplitFinder) -> Ensemble {
    let (n, p) = x.dim();
    let positives = y.iter().filter(|&&v| v).count() as f64;
    let prior = positives / n as f64;
    let base_score = (prior / (1.0 - prior)).ln();

    let targets: Vec<f64> = y.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();
    let mut scores = vec![base_score; n];
    let mut trees = Vec::with_capacity(settings.rounds);

    let n_rows = ((n as f64 * settings.subsample).round() as usize).clamp(1, n);
    let n_cols = ((p as f64 * settings.colsample).round() as usize).clamp(1, p.max(1));

    for round in 0..settings.rounds {
        let mut rng = stream_rng(settings.seed, Stream::Boosting, round as u64);

        let (grad, hess): (Vec<f64>, Vec<f64>) = scores
            .iter()
            .zip(&targets)
            .map(|(&s, &t)| {
                let prob = sigmoid(s);
                (prob - t, (prob * (1.0 - prob)).max(1e-16))
            })
            .unzip();

        let mut rows: Vec<usize> = if n_rows < n {
            sample(&mut rng, n, n_rows).into_vec()
        } else {
            (0..n).collect()
        };
        rows.sort_unstable();
        let mut features: Vec<usize> = if n_cols < p {
            sample(&mut rng, p, n_cols).into_vec()
        } else {
            (0..p).collect()
        };
        features.sort_unstable();

        let tree = RegressionTree::grow(x, rows, &grad, &hess, &features, &settings.tree, finder)
            .scaled(settings.learning_rate);
        for (i, s) in scores.iter_mut().enumerate() {
            *s += tree.predict(x.row(i));
        }
        trees.push(tree);
    }

    Ensemble { base_score, trees }
}

/// Exhaustive search over midpoints between consecutive distinct values
pub(crate) struct ExactSplitFinder<'a> {
    pub x: &'a Array2<f64>,
}

impl SplitFinder for ExactSplitFinder<'_> {
    fn best_split_on(&self, feature: usize, rows: &[usize], grad: &[f64], hess: &[f64], params: &TreeParams) -> Option<Split> {
        let mut sorted: Vec<usize> = rows.to_vec();
        let x = self.x;
        sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]).then(a.cmp(&b)));
        let total = (
            rows.iter().map(|&r| grad[r]).sum::<f64>(),
            rows.iter().map(|&r| hess[r]).sum::<f64>(),
            rows.len(),
        );

        let mut left = (0.0, 0.0, 0usize);
        let mut best: Option<Split> = None;
        for pair in sorted.windows(2) {
            left = (left.0 + grad[pair[0]], left.1 + hess[pair[0]], left.2 + 1);
            let here = x[[pair[0], feature]];
            let next = x[[pair[1], feature]];
            if here == next {
                continue;
            }
            if let Some(gain) = params.split_gain(left, total) {
                if best.map_or(true, |b| gain > b.gain) {
                    best = Some(Split {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

/// Exact-greedy boosted trees with row and column subsampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    pub params: GradientBoostingParams,
    pub seed: u64,
    ensemble: Option<Ensemble>,
}

impl GradientBoostedTrees {
    pub fn new(params: GradientBoostingParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            ensemble: None,
        }
    }
}

impl BinaryClassifier for GradientBoostedTrees {
    fn name(&self) -> &'static str {
        "GradientBoostedTrees"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> PipelineResult<()> {
        check_labels(x, y)?;
        let settings = BoostSettings {
            rounds: self.params.n_estimators,
            learning_rate: self.params.learning_rate,
            subsample: self.params.subsample,
            colsample: self.params.colsample,
            tree: TreeParams {
                max_depth: self.params.max_depth,
                lambda: self.params.lambda,
                min_child_weight: self.params.min_child_weight,
                min_samples_leaf: 1,
            },
            seed: self.seed,
        };
        self.ensemble = Some(boost(x, y, &settings, &ExactSplitFinder { x }));
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
