//! Stage 4: time-to-adoption modelling
//!
//! Expected time is Σ_{t=1..T_max} S(t) on the integer month grid, with
//! T_max the longest observed duration. The sum stops at the censoring
//! horizon, so customers who would adopt very late are given an expected
//! time that is too short.

mod cox;
mod linalg;

pub use cox::{CoefficientRow, CoxModel, CoxParams};

use crate::clustering::round_to;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::features::CLUSTER_FEATURES;
use crate::matrix::{impute_median, population_std, stack_columns};
use crate::pipeline::{Stage, StageReport};
use crate::store::{Table, TableStore};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

pub const DURATION_COLUMN: &str = "time_to_investment";
pub const EVENT_COLUMN: &str = "adopted_ever";

/// Covariates used when present, in model order
pub fn candidate_covariates() -> Vec<&'static str> {
    let mut cols = CLUSTER_FEATURES.to_vec();
    cols.push("cluster");
    cols
}

/// Survival design prepared from a customer table
#[derive(Debug, Clone)]
pub struct SurvivalInput {
    pub customer_ids: Vec<i64>,
    pub durations: Vec<f64>,
    pub events: Vec<bool>,
    pub covariate_names: Vec<String>,
    /// One row per kept customer, one column per covariate (possibly none)
    pub covariates: Array2<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedTimeRow {
    pub customer_id: i64,
    pub expected_time_months: f64,
}

/// Extract durations, events and the available covariates
///
/// Absent candidate covariates are skipped, missing covariate values take the
/// column median and rows without a duration are dropped. A missing event
/// flag counts as censored. Constant covariates carry no information and are
/// left out of the design.
pub fn prepare_input(table: &Table) -> PipelineResult<SurvivalInput> {
    table.require(&["customer_id", DURATION_COLUMN, EVENT_COLUMN])?;

    let ids = table.integer("customer_id")?;
    let durations = table.numeric(DURATION_COLUMN)?;
    let events = table.numeric(EVENT_COLUMN)?;
    let keep: Vec<usize> = (0..table.len()).filter(|&i| durations[i].is_some()).collect();
    if keep.len() < table.len() {
        log::warn!("dropped {} rows without a duration", table.len() - keep.len());
    }

    let mut names = Vec::new();
    let mut columns = Vec::new();
    for name in candidate_covariates() {
        if !table.has_column(name) {
            log::debug!("covariate '{}' not present, skipped", name);
            continue;
        }
        let raw = table.numeric(name)?;
        let kept: Vec<Option<f64>> = keep.iter().map(|&i| raw[i]).collect();
        let values = impute_median(&kept);
        if population_std(&values) == 0.0 {
            log::warn!("covariate '{}' is constant, excluded from the model", name);
            continue;
        }
        names.push(name.to_string());
        columns.push(values);
    }

    if names.is_empty() {
        log::warn!("no informative covariates, fitting the baseline hazard only");
    }
    let covariates = stack_columns(keep.len(), &columns)?;

    Ok(SurvivalInput {
        customer_ids: keep.iter().map(|&i| ids[i]).collect(),
        durations: keep.iter().filter_map(|&i| durations[i]).collect(),
        events: keep.iter().map(|&i| events[i].unwrap_or(0.0) > 0.0).collect(),
        covariate_names: names,
        covariates,
    })
}

/// P(adopt <= h) for each horizon, one row per customer
pub fn horizon_probabilities(model: &CoxModel, covariates: &Array2<f64>, horizons: &[u32]) -> Vec<Vec<f64>> {
    covariates
        .rows()
        .into_iter()
        .map(|x| horizons.iter().map(|&h| 1.0 - model.survival(x, h as f64)).collect())
        .collect()
}

/// Σ_{t=1..max_t} S(t), rounded to 3 decimals
pub fn expected_time(model: &CoxModel, x: ArrayView1<f64>, max_t: u32) -> f64 {
    let total: f64 = (1..=max_t).map(|t| model.survival(x, t as f64)).sum();
    round_to(total, 3)
}

fn render_report(input: &SurvivalInput, summary: &[CoefficientRow], outputs: &[String]) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "# Survival Model Report (Cox proportional hazards)\n");
    let _ = writeln!(doc, "- duration: {}", DURATION_COLUMN);
    let _ = writeln!(doc, "- event: {}", EVENT_COLUMN);
    let _ = writeln!(doc, "- covariates: {}\n", input.covariate_names.join(", "));
    let _ = writeln!(doc, "## Coefficients (top)\n");
    let _ = writeln!(doc, "| covariate | coef | exp(coef) | se(coef) | z | p | lower 95% | upper 95% |");
    let _ = writeln!(doc, "|---|---:|---:|---:|---:|---:|---:|---:|");

    let mut ranked: Vec<&CoefficientRow> = summary.iter().collect();
    ranked.sort_by(|a, b| a.p.total_cmp(&b.p));
    for r in ranked.into_iter().take(15) {
        let _ = writeln!(
            doc,
            "| {} | {:.6} | {:.6} | {:.6} | {:.3} | {:.4} | {:.6} | {:.6} |",
            r.covariate, r.coef, r.exp_coef, r.se_coef, r.z, r.p, r.coef_lower_95, r.coef_upper_95
        );
    }
    let _ = writeln!(doc, "\nSaved tables:");
    for o in outputs {
        let _ = writeln!(doc, "- {}", o);
    }
    doc
}

/// Fit the hazards model and persist probabilities, expected times and coefficients
pub fn survival_model(store: &TableStore, config: &PipelineConfig) -> PipelineResult<StageReport> {
    let paths = store.paths();
    let (source, table) = Table::read_first_existing(&[
        (paths.clustered_features(), Stage::Clusters.name()),
        (paths.features(), Stage::Features.name()),
    ])?;
    log::info!("survival input: {}", source.display());

    let input = prepare_input(&table)?;
    if input.customer_ids.is_empty() {
        return Err(PipelineError::InsufficientData("no customers with a duration".into()));
    }

    let params = CoxParams {
        penalizer: config.survival.penalizer,
        max_iterations: config.survival.max_iterations,
        tolerance: config.survival.tolerance,
    };
    let model = CoxModel::fit(
        &input.covariates,
        &input.covariate_names,
        &input.durations,
        &input.events,
        &params,
    )?;
    log::info!(
        "fitted hazards model on {} customers, {} covariates ({} iterations, log-likelihood {:.4})",
        input.customer_ids.len(),
        model.covariates.len(),
        model.iterations,
        model.log_likelihood
    );

    let horizons = &config.survival.horizons;
    let probabilities = horizon_probabilities(&model, &input.covariates, horizons);
    let mut headers = vec!["customer_id".to_string()];
    headers.extend(horizons.iter().map(|h| format!("p_adopt_{}m", h)));
    let prob_rows: Vec<Vec<String>> = input
        .customer_ids
        .iter()
        .zip(&probabilities)
        .map(|(id, ps)| {
            let mut cells = vec![id.to_string()];
            cells.extend(ps.iter().map(f64::to_string));
            cells
        })
        .collect();

    let max_t = input.durations.iter().fold(0.0f64, |m, &d| m.max(d)).floor().max(0.0) as u32;
    let expected: Vec<ExpectedTimeRow> = input
        .customer_ids
        .iter()
        .zip(input.covariates.rows())
        .map(|(&customer_id, x)| ExpectedTimeRow {
            customer_id,
            expected_time_months: expected_time(&model, x, max_t),
        })
        .collect();
    let summary = model.coefficient_summary();

    let stage = Stage::Survival.name();
    store.write_rows(&paths.survival_probabilities(), stage, &headers, &prob_rows)?;
    store.write_records(&paths.survival_expected_time(), stage, &expected)?;
    store.write_records(&paths.survival_summary(), stage, &summary)?;
    let saved = [
        paths.survival_probabilities(),
        paths.survival_expected_time(),
        paths.survival_summary(),
    ];
    let saved_names: Vec<String> = saved.iter().map(|p| p.display().to_string()).collect();
    store.write_text(&paths.survival_report(), &render_report(&input, &summary, &saved_names))?;
    store.write_json(&paths.survival_model(), &model)?;

    let mean_expected =
        expected.iter().map(|r| r.expected_time_months).sum::<f64>() / expected.len() as f64;
    let [probs, times, coefs] = saved;
    Ok(StageReport::new(Stage::Survival)
        .output(probs)
        .output(times)
        .output(coefs)
        .output(paths.survival_report())
        .output(paths.survival_model())
        .metric("rows", expected.len() as f64)
        .metric("max_duration", max_t as f64)
        .metric("mean_expected_time", mean_expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
customer_id,age,income,mean_balance,time_to_investment,adopted_ever,cluster_name
1,30,1000,200,2,1,a
2,40,,300,12,0,b
3,50,3000,,5,1,a
4,60,4000,500,,1,b
5,35,2500,250,12,,a
";

    #[test]
    fn test_prepare_input_is_schema_tolerant() {
        let table = Table::from_reader("features", TABLE.as_bytes()).unwrap();
        let input = prepare_input(&table).unwrap();

        assert_eq!(input.customer_ids, vec![1, 2, 3, 5]);
        assert_eq!(input.durations, vec![2.0, 12.0, 5.0, 12.0]);
        assert_eq!(input.events, vec![true, false, true, false]);
        assert_eq!(input.covariate_names, ["age", "income", "mean_balance"]);
        assert_eq!(input.covariates.dim(), (4, 3));
        // Median of the kept incomes (1000, 3000, 2500)
        assert_eq!(input.covariates[[1, 1]], 2500.0);
        // Median of the kept balances (200, 300, 250)
        assert_eq!(input.covariates[[2, 2]], 250.0);
    }

    #[test]
    fn test_missing_target_column_is_a_schema_violation() {
        let table = Table::from_reader("features", "customer_id,age\n1,30\n".as_bytes()).unwrap();
        match prepare_input(&table).unwrap_err() {
            PipelineError::SchemaViolation { missing, .. } => {
                assert_eq!(missing, vec!["time_to_investment", "adopted_ever"]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_expected_time_sums_survival_grid() {
        let x = Array2::zeros((4, 0));
        let model = CoxModel::fit(
            &x,
            &[],
            &[1.0, 2.0, 2.0, 3.0],
            &[true, true, false, true],
            &CoxParams {
                penalizer: 0.01,
                max_iterations: 10,
                tolerance: 1e-9,
            },
        )
        .unwrap();
        let s1 = (-0.25f64).exp();
        let s2 = (-(0.25 + 1.0 / 3.0f64)).exp();
        let s3 = (-(0.25 + 1.0 / 3.0 + 1.0f64)).exp();
        assert_eq!(expected_time(&model, x.row(0), 3), round_to(s1 + s2 + s3, 3));

        let probs = horizon_probabilities(&model, &x, &[1, 3]);
        assert_eq!(probs.len(), 4);
        assert!((probs[0][0] - (1.0 - s1)).abs() < 1e-12);
        assert!(probs[0][1] > probs[0][0]);
    }

    #[test]
    fn test_constant_covariates_still_give_one_row_per_customer() {
        let table = Table::from_reader(
            "features",
            "customer_id,age,time_to_investment,adopted_ever\n1,40,2,1\n2,40,5,0\n3,40,3,1\n".as_bytes(),
        )
        .unwrap();
        let input = prepare_input(&table).unwrap();
        assert!(input.covariate_names.is_empty());
        assert_eq!(input.covariates.dim(), (3, 0));

        let model = CoxModel::fit(
            &input.covariates,
            &input.covariate_names,
            &input.durations,
            &input.events,
            &CoxParams {
                penalizer: 0.01,
                max_iterations: 10,
                tolerance: 1e-9,
            },
        )
        .unwrap();
        let probs = horizon_probabilities(&model, &input.covariates, &[3, 6]);
        assert_eq!(probs.len(), 3);
        assert!(probs.iter().all(|p| p.len() == 2 && p[0] <= p[1]));
        assert_eq!(input.covariates.rows().into_iter().count(), input.customer_ids.len());
    }
}
