//! Collapse the monthly panel into one feature row per customer

use super::panel::MonthlyObservation;
use crate::error::{PipelineError, PipelineResult};
use crate::matrix::{mean, sample_std};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated features used for clustering, survival and propensity models
pub const CLUSTER_FEATURES: [&str; 8] = [
    "age",
    "income",
    "mean_balance",
    "std_balance",
    "mean_card_spend",
    "mean_utilization",
    "mean_pix",
    "late_payment_rate",
];

/// One row per customer of the feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerFeatureRow {
    pub customer_id: i64,
    pub age: f64,
    pub income: f64,
    pub mean_balance: f64,
    /// Sample standard deviation; 0 for a single observation
    pub std_balance: f64,
    pub mean_card_spend: f64,
    pub mean_utilization: f64,
    pub mean_pix: f64,
    pub late_payment_rate: f64,
    pub adopted_ever: i64,
    pub time_to_investment: i64,
}

impl CustomerFeatureRow {
    /// Values in `CLUSTER_FEATURES` order
    pub fn cluster_features(&self) -> [f64; 8] {
        [
            self.age,
            self.income,
            self.mean_balance,
            self.std_balance,
            self.mean_card_spend,
            self.mean_utilization,
            self.mean_pix,
            self.late_payment_rate,
        ]
    }
}

/// Group observations by customer and compute summary statistics
///
/// Customer-level fields (age, income, survival targets) must be identical on
/// every monthly row of a customer. The targets must also satisfy the
/// censoring contract: adopters carry their adoption month, non-adopters
/// carry the panel horizon.
pub fn aggregate_customers(panel: &[MonthlyObservation]) -> PipelineResult<Vec<CustomerFeatureRow>> {
    if panel.is_empty() {
        return Err(PipelineError::InsufficientData("raw panel has no rows".into()));
    }
    let horizon = panel.iter().map(|o| o.month).max().unwrap_or(0);

    let mut groups: BTreeMap<i64, Vec<&MonthlyObservation>> = BTreeMap::new();
    for obs in panel {
        groups.entry(obs.customer_id).or_default().push(obs);
    }

    groups
        .into_iter()
        .map(|(customer_id, rows)| aggregate_one(customer_id, &rows, horizon))
        .collect()
}

fn aggregate_one(
    customer_id: i64,
    rows: &[&MonthlyObservation],
    horizon: i64,
) -> PipelineResult<CustomerFeatureRow> {
    let first = rows[0];

    let inconsistent = |field: &str| PipelineError::InconsistentCustomer {
        customer_id,
        field: field.to_string(),
    };
    if rows.iter().any(|r| r.age != first.age) {
        return Err(inconsistent("age"));
    }
    if rows.iter().any(|r| r.income != first.income) {
        return Err(inconsistent("income"));
    }
    if rows.iter().any(|r| r.target != first.target) {
        return Err(inconsistent("time_to_investment/event_investment"));
    }

    let target = first.target.ok_or_else(|| PipelineError::InvalidTarget {
        customer_id,
        detail: "survival targets missing".into(),
    })?;
    validate_target(customer_id, target.time_to_investment, target.event, horizon)?;

    let collect = |f: fn(&MonthlyObservation) -> f64| -> Vec<f64> { rows.iter().map(|r| f(r)).collect() };
    let balance = collect(|r| r.balance);

    Ok(CustomerFeatureRow {
        customer_id,
        age: first.age,
        income: first.income,
        mean_balance: mean(&balance),
        std_balance: sample_std(&balance),
        mean_card_spend: mean(&collect(|r| r.card_spend)),
        mean_utilization: mean(&collect(|r| r.utilization)),
        mean_pix: mean(&collect(|r| r.pix_count)),
        late_payment_rate: mean(&collect(|r| r.late_payment)),
        adopted_ever: target.event,
        time_to_investment: target.time_to_investment,
    })
}

fn validate_target(customer_id: i64, duration: i64, event: i64, horizon: i64) -> PipelineResult<()> {
    let invalid = |detail: String| Err(PipelineError::InvalidTarget { customer_id, detail });

    if event != 0 && event != 1 {
        return invalid(format!("event_investment={} is not 0/1", event));
    }
    if duration < 1 || duration > horizon {
        return invalid(format!("time_to_investment={} outside [1, {}]", duration, horizon));
    }
    if event == 0 && duration != horizon {
        return invalid(format!(
            "censored customer must carry time_to_investment={} (got {})",
            horizon, duration
        ));
    }
    Ok(())
}
