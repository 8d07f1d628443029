//! Fixed-k partitioning with k-means++ seeding and multiple restarts

use crate::error::PipelineResult;
use crate::rng::{stream_rng, Stream};
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::Array2;

/// Fitted centroids (in the space the model was trained in)
pub type KMeansModel = KMeans<f64, L2Dist>;

/// Fitting parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    pub k: usize,
    pub restarts: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: u64,
}

/// Fit k-means, keeping the restart with the lowest inertia
///
/// Every restart draws from one seeded k-means stream, so a seed always
/// reproduces the same centroids.
pub fn fit(data: &Array2<f64>, params: &KMeansParams) -> PipelineResult<KMeansModel> {
    let rng = stream_rng(params.seed, Stream::KMeans, 0);
    let dataset = DatasetBase::from(data.clone());
    let model = KMeans::params_with(params.k, rng, L2Dist)
        .n_runs(params.restarts.max(1))
        .max_n_iterations(params.max_iterations as u64)
        .tolerance(params.tolerance)
        .fit(&dataset)?;
    Ok(model)
}
