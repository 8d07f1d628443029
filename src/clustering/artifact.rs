//! Persisted standardisation + clustering model
//!
//! The transition stage reuses this artifact to keep monthly states in the
//! same cluster-id space as the customer clusters. Reuse is only allowed when
//! the schema the model was trained on matches the current run exactly.

use super::kmeans::KMeansModel;
use super::scaler::StandardScaler;
use linfa::prelude::*;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered `name:type` list of the columns a model was trained on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFingerprint(pub Vec<String>);

impl SchemaFingerprint {
    /// Fingerprint of a set of numeric (f64) columns
    pub fn numeric(columns: &[&str]) -> Self {
        Self(columns.iter().map(|c| format!("{}:f64", c)).collect())
    }
}

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterModelArtifact {
    pub fingerprint: SchemaFingerprint,
    pub k: usize,
    pub seed: u64,
    pub scaler: StandardScaler,
    pub kmeans: KMeansModel,
}

impl ClusterModelArtifact {
    /// Reason this artifact cannot be reused for the given schema and k, if any
    pub fn incompatibility(&self, expected: &SchemaFingerprint, k: usize) -> Option<String> {
        if &self.fingerprint != expected {
            return Some(format!(
                "trained on [{}], expected [{}]",
                self.fingerprint, expected
            ));
        }
        let centroids = self.kmeans.centroids();
        if self.k != k || centroids.nrows() != k {
            return Some(format!("trained with k={}, expected k={}", centroids.nrows(), k));
        }
        let width = expected.0.len();
        if self.scaler.means.len() != width || centroids.ncols() != width {
            return Some(format!(
                "scaler has {} columns and centroids {}, expected {}",
                self.scaler.means.len(),
                centroids.ncols(),
                width
            ));
        }
        None
    }

    /// Cluster ids of raw (unscaled) feature rows
    pub fn assign(&self, features: &Array2<f64>) -> Array1<usize> {
        self.kmeans.predict(&self.scaler.transform(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::kmeans::{self, KMeansParams};
    use crate::matrix::stack_rows;

    fn raw() -> Array2<f64> {
        stack_rows(
            2,
            &[
                vec![400.0, 4.0],
                vec![450.0, 4.5],
                vec![500.0, 5.0],
                vec![1500.0, 15.0],
                vec![1550.0, 15.5],
                vec![1600.0, 16.0],
            ],
        )
        .unwrap()
    }

    fn artifact() -> ClusterModelArtifact {
        let scaler = StandardScaler {
            means: vec![1000.0, 10.0],
            scales: vec![500.0, 5.0],
        };
        let params = KMeansParams {
            k: 2,
            restarts: 5,
            max_iterations: 100,
            tolerance: 1e-6,
            seed: 42,
        };
        let kmeans = kmeans::fit(&scaler.transform(&raw()), &params).unwrap();
        ClusterModelArtifact {
            fingerprint: SchemaFingerprint::numeric(&["income", "mean_pix"]),
            k: 2,
            seed: 42,
            scaler,
            kmeans,
        }
    }

    #[test]
    fn test_matching_schema_is_compatible() {
        let a = artifact();
        assert_eq!(a.incompatibility(&SchemaFingerprint::numeric(&["income", "mean_pix"]), 2), None);
    }

    #[test]
    fn test_column_order_and_k_are_enforced() {
        let a = artifact();
        let swapped = SchemaFingerprint::numeric(&["mean_pix", "income"]);
        assert!(a.incompatibility(&swapped, 2).unwrap().contains("trained on"));
        let same = SchemaFingerprint::numeric(&["income", "mean_pix"]);
        assert!(a.incompatibility(&same, 3).unwrap().contains("k=2"));
    }

    #[test]
    fn test_assign_scales_before_predicting() {
        let a = artifact();
        let labels = a.assign(&raw());
        assert!(labels.iter().take(3).all(|&l| l == labels[0]));
        assert!(labels.iter().skip(3).all(|&l| l == labels[3]));
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_artifact_round_trips_through_json() {
        let a = artifact();
        let restored: ClusterModelArtifact = serde_json::from_str(&serde_json::to_string(&a).unwrap()).unwrap();
        assert_eq!(restored.kmeans.centroids(), a.kmeans.centroids());
        assert_eq!(restored.assign(&raw()), a.assign(&raw()));
    }
}
