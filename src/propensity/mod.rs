//! Stage 5: propensity to adopt
//!
//! After evaluation on the held-out split, the fitted model scores every
//! customer, including those it was trained on. Scores of training rows are
//! optimistic; they are acceptable for ranking customers descriptively but
//! are not an out-of-sample estimate.

mod boosting;
mod histogram;
pub mod metrics;
mod preprocess;
mod split;
mod tree;

pub use boosting::{Ensemble, GradientBoostedTrees};
pub use histogram::{BinMapper, HistogramBoostedTrees};
pub use metrics::{ks_statistic, roc_auc};
pub use preprocess::{CategoricalEncoder, Preprocessor, RawFeatures};
pub use split::{stratified_split, TrainTestSplit};
pub use tree::{Node, RegressionTree, TreeParams};

use crate::config::{BoosterKind, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::features::CLUSTER_FEATURES;
use crate::pipeline::{Stage, StageReport};
use crate::store::TableStore;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub const TARGET_COLUMN: &str = "adopted_ever";
pub const CATEGORICAL_COLUMN: &str = "cluster_name";

/// Probability-producing binary classifier
pub trait BinaryClassifier {
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &Array2<f64>, y: &[bool]) -> PipelineResult<()>;

    /// P(label = true) per row
    fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64>;

    /// Fitted trees, `None` before `fit`
    fn ensemble(&self) -> Option<&Ensemble>;
}

/// Classifier selected by configuration
pub fn classifier_for(config: &PipelineConfig) -> Box<dyn BinaryClassifier> {
    match config.propensity.booster {
        BoosterKind::GradientBoosting => Box::new(GradientBoostedTrees::new(
            config.propensity.gradient_boosting.clone(),
            config.seed,
        )),
        BoosterKind::Histogram => Box::new(HistogramBoostedTrees::new(
            config.propensity.histogram.clone(),
            config.seed,
        )),
    }
}

/// Numeric inputs used when present, in model order
pub fn candidate_features() -> Vec<&'static str> {
    let mut cols = CLUSTER_FEATURES.to_vec();
    cols.push("cluster");
    cols
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropensityMetrics {
    pub auc: f64,
    pub ks: f64,
    pub model: String,
    pub n_train: usize,
    pub n_test: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropensityScoreRow {
    pub customer_id: i64,
    pub propensity_investment: f64,
}

/// Persisted preprocessing and trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropensityArtifact {
    pub model: String,
    pub features: Vec<String>,
    pub preprocessor: Preprocessor,
    pub ensemble: Option<Ensemble>,
}

/// Train on a stratified split, evaluate on the held-out rows and score everyone
pub fn propensity_model(store: &TableStore, config: &PipelineConfig) -> PipelineResult<StageReport> {
    let paths = store.paths();
    let table = store.read_table(&paths.clustered_features())?;
    table.require(&["customer_id", TARGET_COLUMN])?;

    let ids = table.integer("customer_id")?;
    let labels: Vec<bool> = table
        .numeric(TARGET_COLUMN)?
        .into_iter()
        .map(|v| v.unwrap_or(0.0) > 0.0)
        .collect();
    if labels.iter().all(|&l| l) || labels.iter().all(|&l| !l) {
        return Err(PipelineError::InsufficientData(format!(
            "'{}' has a single class; a classifier cannot be trained",
            TARGET_COLUMN
        )));
    }

    let raw = RawFeatures::from_table(&table, &candidate_features(), CATEGORICAL_COLUMN)?;
    let split = stratified_split(&labels, config.propensity.test_fraction, config.seed);
    let preprocessor = Preprocessor::fit(&raw, &split.train);

    let x_train = preprocessor.transform(&raw, &split.train)?;
    let y_train: Vec<bool> = split.train.iter().map(|&i| labels[i]).collect();
    let mut classifier = classifier_for(config);
    classifier.fit(&x_train, &y_train)?;

    let x_test = preprocessor.transform(&raw, &split.test)?;
    let y_test: Vec<bool> = split.test.iter().map(|&i| labels[i]).collect();
    let p_test = classifier.predict_proba(&x_test);
    if y_test.iter().all(|&l| l) || y_test.iter().all(|&l| !l) {
        log::warn!("held-out split has a single class; AUC reported as 0.5");
    }
    let metrics = PropensityMetrics {
        auc: roc_auc(&y_test, &p_test),
        ks: ks_statistic(&y_test, &p_test),
        model: classifier.name().to_string(),
        n_train: split.train.len(),
        n_test: split.test.len(),
    };
    log::info!(
        "{}: auc={:.3} ks={:.3} (train {}, test {})",
        metrics.model,
        metrics.auc,
        metrics.ks,
        metrics.n_train,
        metrics.n_test
    );

    let everyone: Vec<usize> = (0..table.len()).collect();
    let p_all = classifier.predict_proba(&preprocessor.transform(&raw, &everyone)?);
    log::info!(
        "scoring all {} customers, {} of them seen in training",
        everyone.len(),
        split.train.len()
    );
    let scores: Vec<PropensityScoreRow> = ids
        .iter()
        .zip(&p_all)
        .map(|(&customer_id, &p)| PropensityScoreRow {
            customer_id,
            propensity_investment: p,
        })
        .collect();

    let stage = Stage::Propensity.name();
    store.write_records(&paths.propensity_metrics(), stage, std::slice::from_ref(&metrics))?;
    store.write_records(&paths.propensity_scores(), stage, &scores)?;
    let artifact = PropensityArtifact {
        model: classifier.name().to_string(),
        features: preprocessor.output_columns(),
        ensemble: classifier.ensemble().cloned(),
        preprocessor,
    };
    store.write_json(&paths.propensity_model(), &artifact)?;

    Ok(StageReport::new(Stage::Propensity)
        .output(paths.propensity_metrics())
        .output(paths.propensity_scores())
        .output(paths.propensity_model())
        .metric("auc", metrics.auc)
        .metric("ks", metrics.ks)
        .metric("rows", scores.len() as f64))
}
