//! Column-wise standardisation to zero mean and unit variance

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Fitted per-column mean and scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    /// Population standard deviation, or 1.0 for a constant column
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> Self {
        let (means, scales) = data
            .columns()
            .into_iter()
            .map(|col| {
                let sd = col.std(0.0);
                (col.mean().unwrap_or(0.0), if sd > 0.0 { sd } else { 1.0 })
            })
            .unzip();
        Self { means, scales }
    }

    /// `data` must have one column per fitted mean
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let means = Array1::from(self.means.clone());
        let scales = Array1::from(self.scales.clone());
        (data - &means) / &scales
    }
}
