//! Stage 3: Markov transitions between monthly behavioural states

mod matrix;
mod states;

pub use matrix::{count_transitions, labelled_rows, TransitionCounts};
pub use states::{assign_states, monthly_feature_vector, MonthlyStateRow};

use crate::clustering::{cluster_feature_matrix, cluster_schema, fit_cluster_model, ClusterModelArtifact};
use crate::config::{CachedModelPolicy, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::features::load_monthly_rows;
use crate::pipeline::{Stage, StageReport};
use crate::store::TableStore;

/// Reuse the persisted clustering model when it matches this run, else fit one
///
/// A cached model whose schema fingerprint or k differs from the current run
/// is an error under `CachedModelPolicy::Fail`; under `Retrain` it is
/// replaced by a fresh fit from the feature table.
pub fn load_or_fit_cluster_model(
    store: &TableStore,
    config: &PipelineConfig,
) -> PipelineResult<ClusterModelArtifact> {
    let paths = store.paths();
    let model_path = paths.cluster_model();
    let expected = cluster_schema();
    let k = config.n_clusters;

    if let Some(cached) = store.read_json::<ClusterModelArtifact>(&model_path)? {
        match cached.incompatibility(&expected, k) {
            None => {
                log::info!("reusing cached cluster model {}", model_path.display());
                return Ok(cached);
            }
            Some(reason) => match config.cached_model_policy {
                CachedModelPolicy::Fail => {
                    log::error!("cached cluster model is incompatible: {}", reason);
                    return Err(PipelineError::IncompatibleModel {
                        expected: format!("{}; k={}", expected, k),
                        found: format!("{}; k={}", cached.fingerprint, cached.kmeans.centroids().nrows()),
                    });
                }
                CachedModelPolicy::Retrain => {
                    log::warn!("cached cluster model is incompatible ({}), retraining", reason);
                }
            },
        }
    } else {
        log::info!("no cached cluster model, fitting from the feature table");
    }

    let features = store.read_table(&paths.features())?;
    let model = fit_cluster_model(&cluster_feature_matrix(&features)?, config)?;
    store.write_json(&model_path, &model)?;
    Ok(model)
}

/// Assign monthly states and persist the transition counts and probabilities
pub fn markov_transitions(store: &TableStore, config: &PipelineConfig) -> PipelineResult<StageReport> {
    let paths = store.paths();
    let raw = store.read_table(&paths.raw_panel())?;
    let rows = load_monthly_rows(&raw)?;

    let model = load_or_fit_cluster_model(store, config)?;
    let k = model.k;
    let states = assign_states(&rows, &model)?;

    let keyed: Vec<(i64, i64, usize)> = rows
        .iter()
        .zip(&states)
        .map(|(r, &s)| (r.customer_id, r.month, s))
        .collect();
    let counts = count_transitions(&keyed, k);
    let probabilities = counts.probabilities();

    let empty_states = counts
        .rows()
        .iter()
        .filter(|row| row.iter().all(|&c| c == 0))
        .count();
    if empty_states > 0 {
        log::warn!("{} of {} states have no observed successor", empty_states, k);
    }
    log::info!(
        "{} monthly rows, {} valid transitions across {} states",
        rows.len(),
        counts.total(),
        k
    );

    let stage = Stage::Transitions.name();
    let monthly: Vec<MonthlyStateRow> = rows
        .iter()
        .zip(&states)
        .map(|(r, &s)| MonthlyStateRow::new(r, s))
        .collect();
    store.write_records(&paths.monthly_states(), stage, &monthly)?;

    let (headers, body) = labelled_rows(counts.rows());
    store.write_rows(&paths.transition_counts(), stage, &headers, &body)?;
    let (headers, body) = labelled_rows(&probabilities);
    store.write_rows(&paths.transition_matrix(), stage, &headers, &body)?;

    Ok(StageReport::new(Stage::Transitions)
        .output(paths.monthly_states())
        .output(paths.transition_counts())
        .output(paths.transition_matrix())
        .output(paths.cluster_model())
        .metric("transitions", counts.total() as f64)
        .metric("empty_states", empty_states as f64))
}
