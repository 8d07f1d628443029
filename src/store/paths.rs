//! On-disk layout of every artifact the pipeline reads or writes

use crate::pipeline::Stage;
use std::path::{Path, PathBuf};

/// Default artifact root (the working directory)
pub const DEFAULT_ROOT: &str = ".";

/// Producer named in errors when the raw panel is missing
pub const RAW_PANEL_PRODUCER: &str = "generate_data (external panel generator)";

/// Resolved artifact locations under one root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    root: PathBuf,
}

impl ArtifactPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn join(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    // ---- data/ ----

    pub fn raw_panel(&self) -> PathBuf {
        self.join("data/raw/transactions_monthly.csv")
    }

    pub fn features(&self) -> PathBuf {
        self.join("data/processed/customer_features.csv")
    }

    pub fn clustered_features(&self) -> PathBuf {
        self.join("data/processed/customer_features_with_cluster.csv")
    }

    pub fn monthly_states(&self) -> PathBuf {
        self.join("data/processed/customer_monthly_with_cluster.csv")
    }

    // ---- reports/ ----

    pub fn cluster_summary(&self) -> PathBuf {
        self.join("reports/tables/cluster_summary.csv")
    }

    pub fn cluster_profile_cards(&self) -> PathBuf {
        self.join("reports/tables/cluster_profile_cards.csv")
    }

    pub fn cluster_cards_document(&self) -> PathBuf {
        self.join("reports/cluster_profile_cards.md")
    }

    pub fn cluster_report(&self) -> PathBuf {
        self.join("reports/cluster_report.md")
    }

    pub fn transition_counts(&self) -> PathBuf {
        self.join("reports/tables/markov_transition_counts.csv")
    }

    pub fn transition_matrix(&self) -> PathBuf {
        self.join("reports/tables/markov_transition_matrix.csv")
    }

    pub fn survival_probabilities(&self) -> PathBuf {
        self.join("reports/tables/survival_probabilities.csv")
    }

    pub fn survival_expected_time(&self) -> PathBuf {
        self.join("reports/tables/survival_expected_time.csv")
    }

    pub fn survival_summary(&self) -> PathBuf {
        self.join("reports/tables/survival_cox_summary.csv")
    }

    pub fn survival_report(&self) -> PathBuf {
        self.join("reports/survival_report.md")
    }

    pub fn propensity_scores(&self) -> PathBuf {
        self.join("reports/tables/propensity_scores.csv")
    }

    pub fn propensity_metrics(&self) -> PathBuf {
        self.join("reports/tables/propensity_metrics.csv")
    }

    pub fn final_scores(&self) -> PathBuf {
        self.join("reports/tables/final_scores.csv")
    }

    // ---- models/ ----

    pub fn cluster_model(&self) -> PathBuf {
        self.join("models/cluster_model.json")
    }

    pub fn survival_model(&self) -> PathBuf {
        self.join("models/survival_cox.json")
    }

    pub fn propensity_model(&self) -> PathBuf {
        self.join("models/propensity_model.json")
    }

    /// Stage that produces the artifact at `path`, used in error messages
    pub fn producer_of(&self, path: &Path) -> &'static str {
        if path == self.raw_panel() {
            RAW_PANEL_PRODUCER
        } else if path == self.features() {
            Stage::Features.name()
        } else if path == self.monthly_states()
            || path == self.transition_counts()
            || path == self.transition_matrix()
        {
            Stage::Transitions.name()
        } else if path == self.survival_probabilities()
            || path == self.survival_expected_time()
            || path == self.survival_summary()
            || path == self.survival_model()
        {
            Stage::Survival.name()
        } else if path == self.propensity_scores()
            || path == self.propensity_metrics()
            || path == self.propensity_model()
        {
            Stage::Propensity.name()
        } else if path == self.final_scores() {
            Stage::Score.name()
        } else {
            Stage::Clusters.name()
        }
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_root() {
        let paths = ArtifactPaths::new("/tmp/run");
        assert_eq!(
            paths.features(),
            PathBuf::from("/tmp/run/data/processed/customer_features.csv")
        );
        assert_eq!(
            paths.transition_matrix(),
            PathBuf::from("/tmp/run/reports/tables/markov_transition_matrix.csv")
        );
    }

    #[test]
    fn test_producer_lookup() {
        let paths = ArtifactPaths::default();
        assert_eq!(paths.producer_of(&paths.features()), "build_features");
        assert_eq!(paths.producer_of(&paths.cluster_profile_cards()), "cluster_profiles");
        assert_eq!(paths.producer_of(&paths.transition_matrix()), "markov_transitions");
        assert_eq!(paths.producer_of(&paths.raw_panel()), RAW_PANEL_PRODUCER);
    }
}
