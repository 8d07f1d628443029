//! Weighted composite score and priority tiers

use super::normalize::minmax;
use crate::clustering::round_to;
use crate::config::FusionConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityTier {
    Low,
    Medium,
    High,
}

impl PriorityTier {
    /// Low up to and including `low_cut`, Medium up to and including `medium_cut`, High above
    pub fn from_score(score: f64, config: &FusionConfig) -> Self {
        if score <= config.low_cut {
            PriorityTier::Low
        } else if score <= config.medium_cut {
            PriorityTier::Medium
        } else {
            PriorityTier::High
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriorityTier::Low => "Low",
            PriorityTier::Medium => "Medium",
            PriorityTier::High => "High",
        };
        f.write_str(s)
    }
}

/// Raw per-customer signals, already joined and filled
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionInputs {
    pub propensity: Vec<f64>,
    pub p_adopt_short: Vec<f64>,
    pub expected_time: Vec<f64>,
    pub transition_risk: Vec<f64>,
}

/// Composite score (rounded to 6 decimals) and tier per customer
///
/// Every signal is min-max scaled over this population. Urgency rewards a
/// high short-horizon adoption probability and a short expected time.
pub fn fuse(inputs: &FusionInputs, config: &FusionConfig) -> Vec<(f64, PriorityTier)> {
    let propensity = minmax(&inputs.propensity);
    let p_short = minmax(&inputs.p_adopt_short);
    let time = minmax(&inputs.expected_time);
    let risk = minmax(&inputs.transition_risk);

    (0..propensity.len())
        .map(|i| {
            let urgency = config.urgency_probability_weight * p_short[i]
                + config.urgency_time_weight * (1.0 - time[i]);
            let score = round_to(
                config.propensity_weight * propensity[i]
                    + config.urgency_weight * urgency
                    + config.risk_weight * risk[i],
                6,
            );
            (score, PriorityTier::from_score(score, config))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_tiers_partition_the_unit_interval() {
        let config = FusionConfig::default();
        let tier = |s| PriorityTier::from_score(s, &config);
        assert_eq!(tier(0.0), PriorityTier::Low);
        assert_eq!(tier(0.33), PriorityTier::Low);
        assert_eq!(tier(0.330001), PriorityTier::Medium);
        assert_eq!(tier(0.66), PriorityTier::Medium);
        assert_eq!(tier(0.660001), PriorityTier::High);
        assert_eq!(tier(1.0), PriorityTier::High);
        assert_eq!(PriorityTier::Medium.to_string(), "Medium");
    }

    #[test]
    fn test_reference_customer() {
        // Population extremes pin the ranges: propensity [0,1], p3 [0.1,0.9],
        // expected time [1,12], risk [0,1]
        let inputs = FusionInputs {
            propensity: vec![0.0, 1.0, 0.8],
            p_adopt_short: vec![0.1, 0.9, 0.5],
            expected_time: vec![1.0, 12.0, 3.0],
            transition_risk: vec![0.0, 1.0, 0.4],
        };
        let fused = fuse(&inputs, &FusionConfig::default());

        let time_score = 1.0 - 2.0 / 11.0;
        let urgency = 0.6 * 0.5 + 0.4 * time_score;
        let expected = 0.5 * 0.8 + 0.3 * urgency + 0.2 * 0.4;
        assert_abs_diff_eq!(fused[2].0, expected, epsilon = 1e-6);
        assert_abs_diff_eq!(fused[2].0, 0.6682, epsilon = 1e-4);
        assert_eq!(fused[2].1, PriorityTier::High);
    }

    #[test]
    fn test_constant_signals_do_not_divide_by_zero() {
        let inputs = FusionInputs {
            propensity: vec![0.3, 0.3],
            p_adopt_short: vec![0.2, 0.2],
            expected_time: vec![5.0, 5.0],
            transition_risk: vec![0.0, 0.0],
        };
        let fused = fuse(&inputs, &FusionConfig::default());
        // Only the time term survives: 0.3 * 0.4 * (1 - 0)
        assert_abs_diff_eq!(fused[0].0, 0.12, epsilon = 1e-12);
        assert_eq!(fused[0].1, PriorityTier::Low);
    }
}
