//! Stage 6: fuse propensity, urgency and transition risk into one score

mod fusion;
mod normalize;
mod risk;

pub use fusion::{fuse, FusionInputs, PriorityTier};
pub use normalize::minmax;
pub use risk::{find_risk_cluster, transition_risk, LabelledMatrix, RiskCluster, RiskResolution};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::matrix::median;
use crate::pipeline::{Stage, StageReport};
use crate::store::{Table, TableStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PROPENSITY_COLUMNS: [&str; 4] = ["propensity_investment", "propensity", "score", "p_investment"];
pub const SHORT_HORIZON_COLUMNS: [&str; 3] = ["p_adopt_3m", "p_adopt_30d", "p_30d"];

/// One row of the final score table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalScoreRow {
    pub customer_id: i64,
    pub cluster: i64,
    pub propensity: f64,
    pub p_adopt_3m: f64,
    pub expected_time_months: f64,
    pub p_next_risk: f64,
    pub final_score: f64,
    pub priority: PriorityTier,
}

/// Preferred column, else the first column other than `customer_id`
fn resolve_value_column(table: &Table, preferred: &[&str]) -> PipelineResult<String> {
    if let Some(c) = table.first_present(preferred) {
        return Ok(c.to_string());
    }
    let fallback = table.headers().iter().find(|h| h.as_str() != "customer_id").cloned();
    match fallback {
        Some(c) => {
            log::warn!("{}: none of [{}] present, using '{}'", table.name(), preferred.join(", "), c);
            Ok(c)
        }
        None => Err(PipelineError::SchemaViolation {
            table: table.name().to_string(),
            missing: vec![preferred[0].to_string()],
        }),
    }
}

/// customer_id -> value for a (customer_id, value) table; blank values are skipped
fn keyed_values(table: &Table, column: &str) -> PipelineResult<HashMap<i64, f64>> {
    table.require(&["customer_id", column])?;
    let ids = table.integer("customer_id")?;
    let values = table.numeric(column)?;
    Ok(ids
        .into_iter()
        .zip(values)
        .filter_map(|(id, v)| v.map(|v| (id, v)))
        .collect())
}

/// Join every upstream signal onto the clustered customer base and score it
pub fn score_final(store: &TableStore, config: &PipelineConfig) -> PipelineResult<StageReport> {
    let paths = store.paths();

    let base = store.read_table(&paths.clustered_features())?;
    base.require(&["customer_id", "cluster"])?;
    let ids = base.integer("customer_id")?;
    let clusters = base.integer("cluster")?;
    let cluster_names: Option<Vec<String>> = if base.has_column("cluster_name") {
        Some(base.text("cluster_name")?)
    } else {
        None
    };

    let propensity_table = store.read_table(&paths.propensity_scores())?;
    let propensity_column = resolve_value_column(&propensity_table, &PROPENSITY_COLUMNS)?;
    let propensity = keyed_values(&propensity_table, &propensity_column)?;

    let probability_table = store.read_table(&paths.survival_probabilities())?;
    let short_column = resolve_value_column(&probability_table, &SHORT_HORIZON_COLUMNS)?;
    let p_short = keyed_values(&probability_table, &short_column)?;

    let time_table = store.read_table(&paths.survival_expected_time())?;
    let expected_time = keyed_values(&time_table, "expected_time_months")?;

    let matrix = LabelledMatrix::from_table(&store.read_table(&paths.transition_matrix())?)?;
    let cards_path = paths.cluster_profile_cards();
    let risk_cluster = if cards_path.exists() {
        find_risk_cluster(&store.read_table(&cards_path)?)?
    } else {
        log::warn!("{} not found; transition risk set to 0", cards_path.display());
        None
    };
    match &risk_cluster {
        Some(r) => log::info!("risk cluster: {} ({})", r.id, r.name.as_deref().unwrap_or("unnamed")),
        None => log::warn!("no risk cluster identified; transition risk set to 0"),
    }

    let mut by_name = 0usize;
    let mut unresolved = 0usize;
    let risk: Vec<f64> = (0..ids.len())
        .map(|i| {
            let name = cluster_names.as_ref().map(|n| n[i].as_str());
            let (p, how) = transition_risk(&matrix, risk_cluster.as_ref(), Some(clusters[i]), name);
            match how {
                RiskResolution::ById => {}
                RiskResolution::ByName => by_name += 1,
                RiskResolution::Unresolved => unresolved += 1,
            }
            p
        })
        .collect();
    if by_name > 0 {
        log::info!("{} transition-risk lookups resolved by cluster name", by_name);
    }
    if unresolved > 0 {
        log::warn!("{} transition-risk lookups unresolved, set to 0", unresolved);
    }

    let lookup = |map: &HashMap<i64, f64>| -> Vec<Option<f64>> { ids.iter().map(|id| map.get(id).copied()).collect() };
    let filled = |values: Vec<Option<f64>>, fill: f64, what: &str| -> Vec<f64> {
        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            log::warn!("{} customers without {}, filled with {}", missing, what, fill);
        }
        values.into_iter().map(|v| v.unwrap_or(fill)).collect()
    };

    let times = lookup(&expected_time);
    let time_fill = median(&times).unwrap_or(0.0);
    let inputs = FusionInputs {
        propensity: filled(lookup(&propensity), 0.0, "a propensity score"),
        p_adopt_short: filled(lookup(&p_short), 0.0, "a short-horizon adoption probability"),
        expected_time: filled(times, time_fill, "an expected time"),
        transition_risk: risk,
    };
    let fused = fuse(&inputs, &config.fusion);

    let mut rows: Vec<FinalScoreRow> = (0..ids.len())
        .map(|i| FinalScoreRow {
            customer_id: ids[i],
            cluster: clusters[i],
            propensity: inputs.propensity[i],
            p_adopt_3m: inputs.p_adopt_short[i],
            expected_time_months: inputs.expected_time[i],
            p_next_risk: inputs.transition_risk[i],
            final_score: fused[i].0,
            priority: fused[i].1,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then(a.customer_id.cmp(&b.customer_id))
    });

    let count = |tier: PriorityTier| rows.iter().filter(|r| r.priority == tier).count();
    let (low, medium, high) = (count(PriorityTier::Low), count(PriorityTier::Medium), count(PriorityTier::High));
    log::info!("scored {} customers: {} High, {} Medium, {} Low", rows.len(), high, medium, low);

    let out = paths.final_scores();
    store.write_records(&out, Stage::Score.name(), &rows)?;

    Ok(StageReport::new(Stage::Score)
        .output(out)
        .metric("rows", rows.len() as f64)
        .metric("high", high as f64)
        .metric("medium", medium as f64)
        .metric("low", low as f64)
        .metric("unresolved_risk", unresolved as f64))
}
