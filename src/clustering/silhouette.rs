//! Mean silhouette coefficient over all points

use crate::error::PipelineResult;
use linfa::metrics::SilhouetteScore;
use linfa::Dataset;
use ndarray::{Array1, Array2};
use std::collections::BTreeSet;

/// Mean silhouette in [-1, 1]
///
/// With fewer than two non-empty clusters the score is undefined and 0 is
/// returned.
pub fn silhouette_score(data: &Array2<f64>, labels: &Array1<usize>) -> PipelineResult<f64> {
    let clusters = labels.iter().collect::<BTreeSet<_>>().len();
    if data.nrows() == 0 || clusters < 2 {
        return Ok(0.0);
    }
    let dataset = Dataset::new(data.clone(), labels.clone());
    Ok(dataset.silhouette_score()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::stack_columns;

    fn line(points: &[f64]) -> Array2<f64> {
        stack_columns(points.len(), &[points.to_vec()]).unwrap()
    }

    #[test]
    fn test_well_separated_clusters_score_near_one() {
        let data = line(&[0.0, 0.1, 0.2, 100.0, 100.1, 100.2]);
        let score = silhouette_score(&data, &Array1::from(vec![0, 0, 0, 1, 1, 1])).unwrap();
        assert!(score > 0.99 && score <= 1.0, "score {}", score);
    }

    #[test]
    fn test_interleaved_clusters_score_below_separated() {
        let data = line(&[0.0, 1.0, 5.0, 6.0]);
        let good = silhouette_score(&data, &Array1::from(vec![0, 0, 1, 1])).unwrap();
        let bad = silhouette_score(&data, &Array1::from(vec![0, 1, 0, 1])).unwrap();
        assert!(good > 0.5, "good {}", good);
        assert!(bad < good, "bad {} good {}", bad, good);
        assert!((-1.0..=1.0).contains(&bad));
    }

    #[test]
    fn test_single_cluster_scores_zero() {
        let data = line(&[1.0, 2.0, 3.0]);
        assert_eq!(silhouette_score(&data, &Array1::from(vec![0, 0, 0])).unwrap(), 0.0);
    }
}
