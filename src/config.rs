//! Pipeline configuration
//!
//! Defaults reproduce the reference run (k = 4, seed 42, horizons 3/6/9,
//! 0.50/0.30/0.20 fusion weights). A JSON file may override any subset of
//! fields, and `SCORING_SEED` / `SCORING_BOOSTER` override on top of that.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::path::Path;

/// Top-level configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of behavioral clusters (also the transition state space size)
    pub n_clusters: usize,

    /// Independent k-means initialisations; the lowest inertia wins
    pub kmeans_restarts: usize,

    /// Lloyd iteration cap per restart
    pub kmeans_max_iterations: usize,

    /// Convergence tolerance on the centroid shift between iterations
    pub kmeans_tolerance: f64,

    /// Master seed for every random draw in the pipeline
    pub seed: u64,

    /// What to do when a cached clustering model does not match this run
    pub cached_model_policy: CachedModelPolicy,

    pub survival: SurvivalConfig,
    pub propensity: PropensityConfig,
    pub fusion: FusionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            n_clusters: 4,
            kmeans_restarts: 20,
            kmeans_max_iterations: 300,
            kmeans_tolerance: 1e-4,
            seed: 42,
            cached_model_policy: CachedModelPolicy::Fail,
            survival: SurvivalConfig::default(),
            propensity: PropensityConfig::default(),
            fusion: FusionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachedModelPolicy {
    /// Abort the transition stage with `IncompatibleModel`
    Fail,
    /// Fit a fresh model from the feature table and overwrite the cache
    Retrain,
}

/// Proportional-hazards fitting parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurvivalConfig {
    /// Horizons (months) at which P(adopt <= h) is reported
    pub horizons: Vec<u32>,
    /// L2 penalty on standardised coefficients
    pub penalizer: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for SurvivalConfig {
    fn default() -> Self {
        Self {
            horizons: vec![3, 6, 9],
            penalizer: 0.01,
            max_iterations: 50,
            tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoosterKind {
    GradientBoosting,
    Histogram,
}

impl std::str::FromStr for BoosterKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gradient_boosting" | "gbm" | "xgboost" => Ok(BoosterKind::GradientBoosting),
            "histogram" | "hist" => Ok(BoosterKind::Histogram),
            other => Err(PipelineError::Config(format!("unknown booster '{}'", other))),
        }
    }
}

/// Propensity classifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropensityConfig {
    /// Held-out fraction, stratified by label
    pub test_fraction: f64,
    pub booster: BoosterKind,
    pub gradient_boosting: GradientBoostingParams,
    pub histogram: HistogramParams,
}

impl Default for PropensityConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.25,
            booster: BoosterKind::GradientBoosting,
            gradient_boosting: GradientBoostingParams::default(),
            histogram: HistogramParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub colsample: f64,
    pub lambda: f64,
    pub min_child_weight: f64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: 4,
            learning_rate: 0.05,
            subsample: 0.9,
            colsample: 0.9,
            lambda: 1.0,
            min_child_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramParams {
    pub max_iter: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub max_bins: usize,
    pub min_samples_leaf: usize,
    pub l2_regularization: f64,
}

impl Default for HistogramParams {
    fn default() -> Self {
        Self {
            max_iter: 100,
            max_depth: 6,
            learning_rate: 0.06,
            max_bins: 255,
            min_samples_leaf: 20,
            l2_regularization: 0.0,
        }
    }
}

/// Weights and tier cut points for the composite score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub propensity_weight: f64,
    pub urgency_weight: f64,
    pub risk_weight: f64,
    /// Share of urgency driven by the short-horizon adoption probability
    pub urgency_probability_weight: f64,
    /// Share of urgency driven by (1 - normalised expected time)
    pub urgency_time_weight: f64,
    /// Upper (inclusive) edge of the Low tier
    pub low_cut: f64,
    /// Upper (inclusive) edge of the Medium tier
    pub medium_cut: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            propensity_weight: 0.50,
            urgency_weight: 0.30,
            risk_weight: 0.20,
            urgency_probability_weight: 0.6,
            urgency_time_weight: 0.4,
            low_cut: 0.33,
            medium_cut: 0.66,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file; absent fields keep their defaults
    pub fn from_json_path(path: &Path) -> PipelineResult<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(file)?;
        Ok(config)
    }

    /// Load from an optional file, apply environment overrides and validate
    pub fn resolve(path: Option<&Path>) -> PipelineResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_json_path(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SCORING_SEED` and `SCORING_BOOSTER` if set
    pub fn apply_env_overrides(&mut self) -> PipelineResult<()> {
        if let Ok(raw) = env::var("SCORING_SEED") {
            self.seed = raw
                .trim()
                .parse()
                .map_err(|_| PipelineError::Config(format!("SCORING_SEED='{}' is not a u64", raw)))?;
        }
        if let Ok(raw) = env::var("SCORING_BOOSTER") {
            self.propensity.booster = raw.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let fail = |msg: String| Err(PipelineError::Config(msg));

        if self.n_clusters < 2 {
            return fail(format!("n_clusters must be >= 2, got {}", self.n_clusters));
        }
        if self.kmeans_restarts == 0 || self.kmeans_max_iterations == 0 {
            return fail("k-means restarts and iterations must be >= 1".into());
        }
        let fraction = self.propensity.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return fail(format!("test_fraction must be in (0, 1), got {}", fraction));
        }
        if self.survival.horizons.is_empty() || self.survival.horizons.contains(&0) {
            return fail("survival horizons must be non-empty and >= 1".into());
        }
        if self.survival.penalizer < 0.0 {
            return fail("survival penalizer must be non-negative".into());
        }

        let f = &self.fusion;
        let weights = [
            f.propensity_weight,
            f.urgency_weight,
            f.risk_weight,
            f.urgency_probability_weight,
            f.urgency_time_weight,
        ];
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return fail("fusion weights must be finite and non-negative".into());
        }
        if !(0.0 <= f.low_cut && f.low_cut < f.medium_cut && f.medium_cut <= 1.0) {
            return fail(format!(
                "tier cut points must satisfy 0 <= low < medium <= 1, got {} / {}",
                f.low_cut, f.medium_cut
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_clusters, 4);
        assert_eq!(config.survival.horizons, vec![3, 6, 9]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"seed": 7, "propensity": {"booster": "histogram"}}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.propensity.booster, BoosterKind::Histogram);
        assert_eq!(config.propensity.test_fraction, 0.25);
        assert_eq!(config.kmeans_restarts, 20);
    }

    #[test]
    fn test_rejects_bad_cut_points() {
        let mut config = PipelineConfig::default();
        config.fusion.low_cut = 0.7;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_booster_parsing() {
        assert_eq!("hist".parse::<BoosterKind>().unwrap(), BoosterKind::Histogram);
        assert_eq!("XGBoost".parse::<BoosterKind>().unwrap(), BoosterKind::GradientBoosting);
        assert!("forest".parse::<BoosterKind>().is_err());
    }
}
