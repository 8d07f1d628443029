//! Monthly behavioural state assignment
//!
//! The clustering model is trained on per-customer aggregates. To give every
//! (customer, month) a state, the month's point values are placed in the
//! aggregate feature slots (balance -> mean_balance, pix_count -> mean_pix,
//! late_payment flag -> late_payment_rate, and so on) and `std_balance` is set
//! to zero. This is an approximation: monthly values are more dispersed than
//! customer means and no month has balance volatility, so states are biased
//! toward whichever clusters sit nearest the low-volatility region. Treat the
//! resulting matrix as descriptive, not as a calibrated state model.

use crate::clustering::ClusterModelArtifact;
use crate::error::PipelineResult;
use crate::features::{MonthlyObservation, CLUSTER_FEATURES};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Month values placed in the aggregate feature slots (`CLUSTER_FEATURES` order)
pub fn monthly_feature_vector(obs: &MonthlyObservation) -> [f64; 8] {
    [
        obs.age,
        obs.income,
        obs.balance,
        0.0,
        obs.card_spend,
        obs.utilization,
        obs.pix_count,
        obs.late_payment,
    ]
}

pub fn assign_states(rows: &[MonthlyObservation], model: &ClusterModelArtifact) -> PipelineResult<Vec<usize>> {
    let flat: Vec<f64> = rows.iter().flat_map(monthly_feature_vector).collect();
    let features = Array2::from_shape_vec((rows.len(), CLUSTER_FEATURES.len()), flat)?;
    Ok(model.assign(&features).to_vec())
}

/// One row of the monthly state table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStateRow {
    pub customer_id: i64,
    pub month: i64,
    pub age: f64,
    pub income: f64,
    pub balance: f64,
    pub card_spend: f64,
    pub utilization: f64,
    pub pix_count: f64,
    pub late_payment: f64,
    pub cluster: usize,
}

impl MonthlyStateRow {
    pub fn new(obs: &MonthlyObservation, cluster: usize) -> Self {
        Self {
            customer_id: obs.customer_id,
            month: obs.month,
            age: obs.age,
            income: obs.income,
            balance: obs.balance,
            card_spend: obs.card_spend,
            utilization: obs.utilization,
            pix_count: obs.pix_count,
            late_payment: obs.late_payment,
            cluster,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatility_slot_is_zero() {
        let obs = MonthlyObservation {
            customer_id: 7,
            month: 3,
            age: 41.0,
            income: 5200.0,
            balance: 1800.0,
            card_spend: 950.0,
            utilization: 0.42,
            pix_count: 12.0,
            late_payment: 1.0,
            target: None,
        };
        assert_eq!(
            monthly_feature_vector(&obs),
            [41.0, 5200.0, 1800.0, 0.0, 950.0, 0.42, 12.0, 1.0]
        );
        let row = MonthlyStateRow::new(&obs, 2);
        assert_eq!((row.customer_id, row.month, row.cluster), (7, 3, 2));
    }
}
