//! Stage 1: per-customer feature aggregation

mod aggregate;
pub mod panel;

pub use aggregate::{aggregate_customers, CustomerFeatureRow, CLUSTER_FEATURES};
pub use panel::{load_monthly_rows, load_panel_with_targets, MonthlyObservation, SurvivalTarget};

use crate::error::PipelineResult;
use crate::pipeline::{Stage, StageReport};
use crate::store::TableStore;

/// Read the raw panel, aggregate it and persist the feature table
pub fn build_features(store: &TableStore) -> PipelineResult<StageReport> {
    let paths = store.paths();
    let raw = store.read_table(&paths.raw_panel())?;
    let panel = load_panel_with_targets(&raw)?;
    let rows = aggregate_customers(&panel)?;

    let adopters = rows.iter().filter(|r| r.adopted_ever == 1).count();
    log::info!(
        "aggregated {} monthly rows into {} customers ({} adopters)",
        panel.len(),
        rows.len(),
        adopters
    );

    let out = paths.features();
    store.write_records(&out, Stage::Features.name(), &rows)?;

    Ok(StageReport::new(Stage::Features)
        .output(out)
        .metric("rows", rows.len() as f64)
        .metric("adoption_rate", adopters as f64 / rows.len() as f64))
}
