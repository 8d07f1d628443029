//! Deterministic synthetic transaction panel for end-to-end tests
//!
//! Each customer carries fixed attributes and a latent risk trait. Monthly
//! rows are drawn around those, and investment adoption is a sequence of
//! monthly Bernoulli trials that stops at the first success; a customer with
//! no success is censored at the last month.

#![allow(dead_code)]

use customer_scoring::config::PipelineConfig;
use customer_scoring::{ArtifactPaths, PipelineRunner};
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PANEL_HEADER: [&str; 11] = [
    "customer_id",
    "month",
    "age",
    "income",
    "balance",
    "card_spend",
    "utilization",
    "pix_count",
    "late_payment",
    "time_to_investment",
    "event_investment",
];

#[derive(Debug, Clone)]
pub struct PanelSpec {
    pub n_customers: i64,
    pub n_months: i64,
    pub seed: u64,
    /// Extra customer observed in month 1 only, adopting in that month
    pub single_month_customer: bool,
}

impl Default for PanelSpec {
    fn default() -> Self {
        Self {
            n_customers: 120,
            n_months: 12,
            seed: 7,
            single_month_customer: true,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// First month with a successful trial, `None` if every trial fails
fn first_success(rng: &mut Pcg64Mcg, p_month: &[f64]) -> Option<i64> {
    p_month
        .iter()
        .position(|&p| rng.gen_bool(p))
        .map(|i| i as i64 + 1)
}

/// Panel rows in `PANEL_HEADER` order
pub fn generate_panel(spec: &PanelSpec) -> Vec<Vec<String>> {
    let mut rng = Pcg64Mcg::seed_from_u64(spec.seed);
    let mut rows = Vec::new();

    for customer_id in 1..=spec.n_customers {
        let age = rng.gen_range(22..70) as f64;
        let income = round2(rng.gen_range(1500.0..20000.0) * (0.85 + (age - 22.0) / 48.0 * 0.35));
        let risk: f64 = rng.gen_range(-1.5..1.5);

        let p_month: Vec<f64> = (1..=spec.n_months)
            .map(|m| {
                let maturity = (m - 1) as f64 / (spec.n_months - 1).max(1) as f64;
                let hazard = sigmoid(income / 6000.0 - 1.5 - 0.8 * risk + 0.6 * maturity);
                (0.15 * hazard).clamp(0.005, 0.3)
            })
            .collect();
        let adopted = first_success(&mut rng, &p_month);
        let (duration, event) = match adopted {
            Some(m) => (m, 1),
            None => (spec.n_months, 0),
        };

        for month in 1..=spec.n_months {
            let season = (2.0 * std::f64::consts::PI * (month - 1) as f64 / 12.0).sin();
            let balance = round2(income * rng.gen_range(0.5..1.5) * (1.0 - 0.2 * risk) * (1.0 + 0.1 * season));
            let card_spend = round2(0.06 * income + rng.gen_range(0.0..300.0) + 120.0 * (season + 1.0));
            let utilization = (0.35 + 0.15 * risk + rng.gen_range(-0.05..0.05)).clamp(0.01, 0.98);
            let pix_count = (10.0 + (60.0 - age) * 0.25 + rng.gen_range(0.0..5.0)).round().max(0.0);
            let late = rng.gen_bool(sigmoid(-2.0 + 1.2 * risk)) as i64;
            rows.push(vec![
                customer_id.to_string(),
                month.to_string(),
                age.to_string(),
                income.to_string(),
                balance.to_string(),
                card_spend.to_string(),
                format!("{:.4}", utilization),
                pix_count.to_string(),
                late.to_string(),
                duration.to_string(),
                event.to_string(),
            ]);
        }
    }

    if spec.single_month_customer {
        let id = spec.n_customers + 1;
        rows.push(
            [id, 1, 35, 8000, 4000, 500, 0, 20, 0, 1, 1]
                .iter()
                .map(|v| v.to_string())
                .collect(),
        );
    }
    rows
}

/// Write a panel under `<root>/data/raw/`, optionally dropping one column
pub fn write_panel(root: &Path, spec: &PanelSpec, drop_column: Option<&str>) -> PathBuf {
    let path = ArtifactPaths::new(root).raw_panel();
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    let keep: Vec<usize> = (0..PANEL_HEADER.len())
        .filter(|&i| Some(PANEL_HEADER[i]) != drop_column)
        .collect();
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer
        .write_record(keep.iter().map(|&i| PANEL_HEADER[i]))
        .unwrap();
    for row in generate_panel(spec) {
        writer.write_record(keep.iter().map(|&i| &row[i])).unwrap();
    }
    writer.flush().unwrap();
    path
}

/// Defaults with fewer restarts and boosting rounds so the suite stays quick
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.kmeans_restarts = 4;
    config.propensity.gradient_boosting.n_estimators = 40;
    config.propensity.histogram.max_iter = 30;
    config
}

/// Fresh artifact root holding only the raw panel
pub fn fixture(config: PipelineConfig) -> (TempDir, PipelineRunner) {
    let dir = tempfile::tempdir().unwrap();
    write_panel(dir.path(), &PanelSpec::default(), None);
    let runner = PipelineRunner::new(ArtifactPaths::new(dir.path()), config);
    (dir, runner)
}
