//! Probability of moving into the risk cluster next month
//!
//! The transition matrix may be addressed by numeric cluster ids or by
//! state names. Lookups try the numeric id first, then the cluster name,
//! then fall back to 0. The name path only resolves when the matrix happens
//! to be labelled with profile names; matrices written by the transition
//! stage are labelled by id, so in practice it rarely fires.

use crate::error::PipelineResult;
use crate::store::Table;

/// Square matrix with string row and column labels
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledMatrix {
    rows: Vec<String>,
    columns: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl LabelledMatrix {
    /// First column holds the row labels, remaining headers are column labels
    pub fn from_table(table: &Table) -> PipelineResult<Self> {
        let headers = table.headers();
        let Some(label_column) = headers.first() else {
            return Ok(Self {
                rows: Vec::new(),
                columns: Vec::new(),
                values: Vec::new(),
            });
        };
        let rows = table.text(label_column)?;
        let columns: Vec<String> = headers[1..].to_vec();
        let by_column = columns
            .iter()
            .map(|c| table.numeric(c))
            .collect::<PipelineResult<Vec<_>>>()?;
        let values = (0..rows.len())
            .map(|i| by_column.iter().map(|col| col[i]).collect())
            .collect();
        Ok(Self { rows, columns, values })
    }

    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        let i = self.rows.iter().position(|r| r == row)?;
        let j = self.columns.iter().position(|c| c == column)?;
        self.values[i][j]
    }
}

/// The cluster customers are at risk of migrating into
#[derive(Debug, Clone, PartialEq)]
pub struct RiskCluster {
    pub id: i64,
    pub name: Option<String>,
}

pub const LATE_PAYMENT_COLUMNS: [&str; 3] = [
    "late_payment_rate",
    "m12_late_payment_rate",
    "m3_late_payment_rate",
];

/// Cluster with the highest late-payment rate in the profile cards
///
/// Ties go to the lowest cluster id. `None` when the cards lack the needed
/// columns or have no usable rows.
pub fn find_risk_cluster(cards: &Table) -> PipelineResult<Option<RiskCluster>> {
    let Some(rate_column) = cards.first_present(&LATE_PAYMENT_COLUMNS) else {
        log::warn!("profile cards have no late-payment column; no risk cluster");
        return Ok(None);
    };
    if !cards.has_column("cluster") {
        log::warn!("profile cards have no cluster column; no risk cluster");
        return Ok(None);
    }
    let ids = cards.integer_lenient("cluster")?;
    let rates = cards.numeric(rate_column)?;
    let names = if cards.has_column("cluster_name") {
        Some(cards.text("cluster_name")?)
    } else {
        None
    };

    let mut best: Option<(usize, i64, f64)> = None;
    for (i, (id, rate)) in ids.iter().zip(&rates).enumerate() {
        let (Some(id), Some(rate)) = (id, rate) else {
            continue;
        };
        let better = match best {
            None => true,
            Some((_, best_id, best_rate)) => *rate > best_rate || (*rate == best_rate && *id < best_id),
        };
        if better {
            best = Some((i, *id, *rate));
        }
    }

    Ok(best.map(|(i, id, _)| RiskCluster {
        id,
        name: names.as_ref().map(|n| n[i].clone()).filter(|n| !n.is_empty()),
    }))
}

/// How a transition-risk value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskResolution {
    ById,
    ByName,
    Unresolved,
}

/// Resolve P(next state = risk cluster | current cluster) for one customer
pub fn transition_risk(
    matrix: &LabelledMatrix,
    risk: Option<&RiskCluster>,
    cluster: Option<i64>,
    cluster_name: Option<&str>,
) -> (f64, RiskResolution) {
    let Some(risk) = risk else {
        return (0.0, RiskResolution::Unresolved);
    };

    if let Some(id) = cluster {
        if let Some(p) = matrix.get(&id.to_string(), &risk.id.to_string()) {
            return (p, RiskResolution::ById);
        }
        log::debug!("no numeric transition entry {} -> {}", id, risk.id);
    }

    if let (Some(name), Some(risk_name)) = (cluster_name, risk.name.as_deref()) {
        if let Some(p) = matrix.get(name, risk_name) {
            return (p, RiskResolution::ByName);
        }
        log::debug!("no named transition entry '{}' -> '{}'", name, risk_name);
    }

    (0.0, RiskResolution::Unresolved)
}
