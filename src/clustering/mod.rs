//! Stage 2: behavioural clustering and profile labelling

mod artifact;
pub mod kmeans;
pub mod labeling;
mod profile;
mod scaler;
mod silhouette;

pub use artifact::{ClusterModelArtifact, SchemaFingerprint};
pub use kmeans::{KMeansModel, KMeansParams};
pub use labeling::{assign_profile, dense_rank_desc, AxisTops, ClusterProfile, DEFAULT_PROFILE, PROFILE_RULES};
pub use profile::{
    profile_cards, render_cards_document, render_cluster_report, summarize_clusters,
    ClusterProfileCard, ClusterSummaryRow,
};
pub use scaler::StandardScaler;
pub use silhouette::silhouette_score;

pub(crate) use profile::round_to;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::features::CLUSTER_FEATURES;
use crate::matrix::stack_columns;
use crate::pipeline::{Stage, StageReport};
use crate::store::{Table, TableStore};
use linfa::prelude::*;
use ndarray::{Array1, Array2};

/// Fingerprint of the clustering feature schema
pub fn cluster_schema() -> SchemaFingerprint {
    SchemaFingerprint::numeric(&CLUSTER_FEATURES)
}

/// Clustering features of a customer feature table, in `CLUSTER_FEATURES` order
pub fn cluster_feature_matrix(table: &Table) -> PipelineResult<Array2<f64>> {
    table.require(&CLUSTER_FEATURES)?;
    let columns = CLUSTER_FEATURES
        .iter()
        .map(|c| table.required_numeric(c))
        .collect::<PipelineResult<Vec<_>>>()?;
    stack_columns(table.len(), &columns)
}

/// Standardise and fit k-means on raw clustering features
pub fn fit_cluster_model(features: &Array2<f64>, config: &PipelineConfig) -> PipelineResult<ClusterModelArtifact> {
    let k = config.n_clusters;
    if features.nrows() < k {
        return Err(PipelineError::InsufficientData(format!(
            "{} customers cannot form {} clusters",
            features.nrows(),
            k
        )));
    }

    let scaler = StandardScaler::fit(features);
    let scaled = scaler.transform(features);
    let kmeans = kmeans::fit(
        &scaled,
        &KMeansParams {
            k,
            restarts: config.kmeans_restarts,
            max_iterations: config.kmeans_max_iterations,
            tolerance: config.kmeans_tolerance,
            seed: config.seed,
        },
    )?;
    log::debug!(
        "k-means kept the best of {} restarts, inertia {:.4}",
        config.kmeans_restarts,
        kmeans.inertia()
    );

    Ok(ClusterModelArtifact {
        fingerprint: cluster_schema(),
        k,
        seed: config.seed,
        scaler,
        kmeans,
    })
}

/// Cluster customers, label the clusters and persist tables, documents and model
pub fn cluster_profiles(store: &TableStore, config: &PipelineConfig) -> PipelineResult<StageReport> {
    let paths = store.paths();
    let table = store.read_table(&paths.features())?;
    table.require(&["customer_id"])?;
    let features = cluster_feature_matrix(&table)?;

    let model = fit_cluster_model(&features, config)?;
    let scaled = model.scaler.transform(&features);
    let labels: Array1<usize> = model.kmeans.predict(&scaled);
    let k = model.k;

    let silhouette = silhouette_score(&scaled, &labels)?;
    let labels = labels.to_vec();
    let summary = summarize_clusters(&features, &labels, k);
    let cards = profile_cards(&summary, &labels);
    log::info!(
        "clustered {} customers into k={} (silhouette {:.3}, inertia {:.3})",
        features.nrows(),
        k,
        silhouette,
        model.kmeans.inertia()
    );
    for card in &cards {
        log::info!("cluster {}: {} ({} customers)", card.cluster, card.cluster_name, card.n_customers);
    }

    let mut names = vec![String::new(); k];
    for card in &cards {
        names[card.cluster] = card.cluster_name.clone();
    }
    let mut headers = table.headers().to_vec();
    headers.push("cluster".into());
    headers.push("cluster_name".into());
    let rows: Vec<Vec<String>> = labels
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let mut cells = table.row_cells(i);
            cells.push(c.to_string());
            cells.push(names[c].clone());
            cells
        })
        .collect();

    let stage = Stage::Clusters.name();
    let clustered = paths.clustered_features();
    store.write_rows(&clustered, stage, &headers, &rows)?;
    store.write_records(&paths.cluster_summary(), stage, &summary)?;
    store.write_records(&paths.cluster_profile_cards(), stage, &cards)?;
    store.write_text(&paths.cluster_cards_document(), &render_cards_document(&cards, k, silhouette))?;
    store.write_text(&paths.cluster_report(), &render_cluster_report(&summary, k, silhouette))?;
    store.write_json(&paths.cluster_model(), &model)?;

    Ok(StageReport::new(Stage::Clusters)
        .output(clustered)
        .output(paths.cluster_summary())
        .output(paths.cluster_profile_cards())
        .output(paths.cluster_cards_document())
        .output(paths.cluster_report())
        .output(paths.cluster_model())
        .metric("rows", features.nrows() as f64)
        .metric("silhouette", silhouette)
        .metric("inertia", model.kmeans.inertia()))
}
