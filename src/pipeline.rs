//! Stage ordering and sequential batch execution
//!
//! Each stage completes and persists its tables before the next one starts;
//! stages communicate only through the artifact store.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::store::{ArtifactPaths, TableStore};
use crate::{clustering, features, propensity, scoring, survival, transitions};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Pipeline stages in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Features,
    Clusters,
    Transitions,
    Survival,
    Propensity,
    Score,
}

impl Stage {
    /// All stages, in the order they must run
    pub fn all() -> [Stage; 6] {
        [
            Stage::Features,
            Stage::Clusters,
            Stage::Transitions,
            Stage::Survival,
            Stage::Propensity,
            Stage::Score,
        ]
    }

    /// Executable name of the stage
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Features => "build_features",
            Stage::Clusters => "cluster_profiles",
            Stage::Transitions => "markov_transitions",
            Stage::Survival => "survival_model",
            Stage::Propensity => "propensity_model",
            Stage::Score => "score_final",
        }
    }

    /// 1-based position in the pipeline
    pub fn number(&self) -> usize {
        Stage::all().iter().position(|s| s == self).map_or(0, |i| i + 1)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        if let Ok(n) = key.parse::<usize>() {
            return Stage::all()
                .get(n.wrapping_sub(1))
                .copied()
                .ok_or_else(|| PipelineError::Config(format!("no stage number {}", n)));
        }
        let alias = match key.as_str() {
            "features" => Some(Stage::Features),
            "clusters" | "clustering" => Some(Stage::Clusters),
            "transitions" | "markov" => Some(Stage::Transitions),
            "survival" => Some(Stage::Survival),
            "propensity" => Some(Stage::Propensity),
            "score" | "fusion" => Some(Stage::Score),
            _ => None,
        };
        alias
            .or_else(|| Stage::all().into_iter().find(|st| st.name() == key))
            .ok_or_else(|| PipelineError::Config(format!("unknown stage '{}'", s)))
    }
}

/// What a stage wrote and the headline numbers it computed
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub outputs: Vec<PathBuf>,
    pub metrics: Vec<(String, f64)>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            outputs: Vec::new(),
            metrics: Vec::new(),
        }
    }

    pub fn output(mut self, path: PathBuf) -> Self {
        self.outputs.push(path);
        self
    }

    pub fn metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.push((name.to_string(), value));
        self
    }

    pub fn get_metric(&self, name: &str) -> Option<f64> {
        self.metrics.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// Runs stages against one artifact root with one configuration
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    config: PipelineConfig,
    store: TableStore,
}

impl PipelineRunner {
    pub fn new(paths: ArtifactPaths, config: PipelineConfig) -> Self {
        let store = TableStore::new(paths, config.seed);
        Self { config, store }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    /// Run a single stage; its prerequisites must already be persisted
    pub fn run(&self, stage: Stage) -> PipelineResult<StageReport> {
        log::info!("stage {} ({}) starting", stage.number(), stage);
        let report = match stage {
            Stage::Features => features::build_features(&self.store),
            Stage::Clusters => clustering::cluster_profiles(&self.store, &self.config),
            Stage::Transitions => transitions::markov_transitions(&self.store, &self.config),
            Stage::Survival => survival::survival_model(&self.store, &self.config),
            Stage::Propensity => propensity::propensity_model(&self.store, &self.config),
            Stage::Score => scoring::score_final(&self.store, &self.config),
        }?;
        log::info!("stage {} ({}) wrote {} artifacts", stage.number(), stage, report.outputs.len());
        Ok(report)
    }

    /// Run every stage in order, stopping at the first failure
    pub fn run_all(&self) -> PipelineResult<Vec<StageReport>> {
        Stage::all().into_iter().map(|stage| self.run(stage)).collect()
    }
}
