//! Cox proportional-hazards model
//!
//! Efron's approximation for tied event times, an L2 penalty on internally
//! standardised coefficients, Newton-Raphson with step halving, and a Breslow
//! baseline cumulative hazard evaluated at the covariate means.

use super::linalg::{dot, invert, mat_vec};
use crate::error::{PipelineError, PipelineResult};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

const Z_95: f64 = 1.959_963_984_540_054;
const MAX_STEP_HALVINGS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoxParams {
    pub penalizer: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

/// Fitted model; coefficients are stored on the standardised scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoxModel {
    pub covariates: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub beta: Vec<f64>,
    /// Standard errors of `beta`
    pub standard_errors: Vec<f64>,
    /// (event time, cumulative baseline hazard at that time), ascending
    pub baseline: Vec<(f64, f64)>,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// One row of the coefficient table, in original covariate units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    pub covariate: String,
    pub coef: f64,
    pub exp_coef: f64,
    pub se_coef: f64,
    pub z: f64,
    pub p: f64,
    pub coef_lower_95: f64,
    pub coef_upper_95: f64,
}

/// Event times grouped for the partial likelihood, latest first
struct RiskSets {
    /// Row indices sorted by duration descending
    order: Vec<usize>,
    /// (start, end) ranges into `order` sharing one duration
    blocks: Vec<(usize, usize)>,
}

impl RiskSets {
    fn new(durations: &[f64]) -> Self {
        let mut order: Vec<usize> = (0..durations.len()).collect();
        order.sort_by(|&a, &b| durations[b].total_cmp(&durations[a]).then(a.cmp(&b)));
        let mut blocks = Vec::new();
        let mut start = 0;
        while start < order.len() {
            let t = durations[order[start]];
            let mut end = start + 1;
            while end < order.len() && durations[order[end]] == t {
                end += 1;
            }
            blocks.push((start, end));
            start = end;
        }
        Self { order, blocks }
    }
}

struct Derivatives {
    log_likelihood: f64,
    gradient: Vec<f64>,
    /// Negative Hessian (observed information)
    information: Vec<Vec<f64>>,
}

/// Efron partial log-likelihood and its first two derivatives (unpenalised)
fn efron_derivatives(z: &Array2<f64>, events: &[bool], beta: &[f64], sets: &RiskSets) -> Derivatives {
    let p = beta.len();
    let beta_v = ArrayView1::from(beta);
    let mut ll = 0.0;
    let mut gradient = vec![0.0; p];
    let mut information = vec![vec![0.0; p]; p];

    // Running sums over the risk set (everyone with duration >= current time)
    let mut s0 = 0.0;
    let mut s1 = vec![0.0; p];
    let mut s2 = vec![vec![0.0; p]; p];

    for &(start, end) in &sets.blocks {
        let mut d = 0usize;
        let mut d0 = 0.0;
        let mut d1 = vec![0.0; p];
        let mut d2 = vec![vec![0.0; p]; p];

        for &i in &sets.order[start..end] {
            let x = z.row(i);
            let eta = x.dot(&beta_v);
            let w = eta.exp();
            s0 += w;
            for a in 0..p {
                s1[a] += w * x[a];
                for b in 0..p {
                    s2[a][b] += w * x[a] * x[b];
                }
            }
            if events[i] {
                d += 1;
                d0 += w;
                ll += eta;
                for a in 0..p {
                    d1[a] += w * x[a];
                    gradient[a] += x[a];
                    for b in 0..p {
                        d2[a][b] += w * x[a] * x[b];
                    }
                }
            }
        }

        for l in 0..d {
            let frac = l as f64 / d as f64;
            let phi = s0 - frac * d0;
            ll -= phi.ln();
            let m1: Vec<f64> = (0..p).map(|a| (s1[a] - frac * d1[a]) / phi).collect();
            for a in 0..p {
                gradient[a] -= m1[a];
                for b in 0..p {
                    information[a][b] += (s2[a][b] - frac * d2[a][b]) / phi - m1[a] * m1[b];
                }
            }
        }
    }

    Derivatives {
        log_likelihood: ll,
        gradient,
        information,
    }
}

fn penalised(deriv: &mut Derivatives, beta: &[f64], penalizer: f64) {
    deriv.log_likelihood -= 0.5 * penalizer * dot(beta, beta);
    for (a, b) in beta.iter().enumerate() {
        deriv.gradient[a] -= penalizer * b;
        deriv.information[a][a] += penalizer;
    }
}

impl CoxModel {
    /// Fit on raw covariates; `names` label the columns of `covariates`
    pub fn fit(
        covariates: &Array2<f64>,
        names: &[String],
        durations: &[f64],
        events: &[bool],
        params: &CoxParams,
    ) -> PipelineResult<Self> {
        let (n, p) = covariates.dim();
        if n == 0 || !events.iter().any(|&e| e) {
            return Err(PipelineError::InsufficientData(
                "proportional-hazards fit needs at least one observed event".into(),
            ));
        }
        if names.len() != p || durations.len() != n || events.len() != n {
            return Err(PipelineError::InsufficientData(format!(
                "proportional-hazards input is misaligned: {} rows, {} columns, {} names, {} durations, {} events",
                n,
                p,
                names.len(),
                durations.len(),
                events.len()
            )));
        }

        let means = covariates.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));
        let scales = covariates
            .std_axis(Axis(0), 0.0)
            .mapv(|sd| if sd > 0.0 { sd } else { 1.0 });
        let z = (covariates - &means) / &scales;

        let sets = RiskSets::new(durations);
        let mut beta = vec![0.0; p];
        let mut current = efron_derivatives(&z, events, &beta, &sets);
        penalised(&mut current, &beta, params.penalizer);

        let mut iterations = 0;
        let mut converged = false;
        while iterations < params.max_iterations {
            iterations += 1;
            let inv = invert(&current.information).ok_or_else(|| {
                PipelineError::InsufficientData("singular information matrix in proportional-hazards fit".into())
            })?;
            let delta = mat_vec(&inv, &current.gradient);

            let mut step = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_STEP_HALVINGS {
                let candidate: Vec<f64> = beta.iter().zip(&delta).map(|(b, d)| b + step * d).collect();
                let mut next = efron_derivatives(&z, events, &candidate, &sets);
                penalised(&mut next, &candidate, params.penalizer);
                if next.log_likelihood.is_finite() && next.log_likelihood >= current.log_likelihood - 1e-12 {
                    accepted = Some((candidate, next));
                    break;
                }
                step *= 0.5;
            }

            let Some((candidate, next)) = accepted else {
                log::warn!("proportional-hazards step halving exhausted after {} iterations", iterations);
                break;
            };
            let improvement = next.log_likelihood - current.log_likelihood;
            let max_change = delta.iter().fold(0.0f64, |m, d| m.max((step * d).abs()));
            beta = candidate;
            current = next;
            if improvement.abs() < params.tolerance || max_change < params.tolerance.sqrt() {
                converged = true;
                break;
            }
        }
        if !converged {
            log::warn!("proportional-hazards fit did not converge in {} iterations", iterations);
        }

        let standard_errors = match invert(&current.information) {
            Some(inv) => (0..p).map(|a| inv[a][a].max(0.0).sqrt()).collect(),
            None => vec![f64::NAN; p],
        };

        let baseline = breslow_baseline(&z, durations, events, &beta, &sets);

        Ok(Self {
            covariates: names.to_vec(),
            means: means.to_vec(),
            scales: scales.to_vec(),
            beta,
            standard_errors,
            baseline,
            log_likelihood: current.log_likelihood,
            iterations,
            converged,
        })
    }

    /// Centred linear predictor (x - mean) . beta
    pub fn linear_predictor(&self, x: ArrayView1<f64>) -> f64 {
        x.iter()
            .zip(&self.means)
            .zip(&self.scales)
            .zip(&self.beta)
            .map(|(((v, m), s), b)| (v - m) / s * b)
            .sum()
    }

    /// Baseline cumulative hazard, right-continuous step function of `t`
    pub fn baseline_cumulative_hazard(&self, t: f64) -> f64 {
        let idx = self.baseline.partition_point(|(time, _)| *time <= t);
        if idx == 0 {
            0.0
        } else {
            self.baseline[idx - 1].1
        }
    }

    /// S(t | x)
    pub fn survival(&self, x: ArrayView1<f64>, t: f64) -> f64 {
        (-self.baseline_cumulative_hazard(t) * self.linear_predictor(x).exp()).exp()
    }

    /// Coefficient table in original covariate units
    pub fn coefficient_summary(&self) -> Vec<CoefficientRow> {
        let standard_normal = Normal::standard();
        (0..self.beta.len())
            .map(|j| {
                let coef = self.beta[j] / self.scales[j];
                let se = self.standard_errors[j] / self.scales[j];
                let z = if se > 0.0 { coef / se } else { 0.0 };
                CoefficientRow {
                    covariate: self.covariates[j].clone(),
                    coef,
                    exp_coef: coef.exp(),
                    se_coef: se,
                    z,
                    p: 2.0 * (1.0 - standard_normal.cdf(z.abs())),
                    coef_lower_95: coef - Z_95 * se,
                    coef_upper_95: coef + Z_95 * se,
                }
            })
            .collect()
    }
}

/// Breslow estimate: dH0(t) = d(t) / sum over the risk set of exp(z . beta)
fn breslow_baseline(z: &Array2<f64>, durations: &[f64], events: &[bool], beta: &[f64], sets: &RiskSets) -> Vec<(f64, f64)> {
    let beta_v = ArrayView1::from(beta);
    let mut increments = Vec::new();
    let mut s0 = 0.0;
    for &(start, end) in &sets.blocks {
        let mut d = 0usize;
        for &i in &sets.order[start..end] {
            s0 += z.row(i).dot(&beta_v).exp();
            if events[i] {
                d += 1;
            }
        }
        if d > 0 {
            increments.push((durations[sets.order[start]], d as f64 / s0));
        }
    }
    // Blocks were visited latest first
    increments.reverse();
    let mut cumulative = 0.0;
    increments
        .into_iter()
        .map(|(t, h)| {
            cumulative += h;
            (t, cumulative)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::stack_rows;
    use approx::assert_abs_diff_eq;
    use ndarray::aview1;

    fn params() -> CoxParams {
        CoxParams {
            penalizer: 0.01,
            max_iterations: 50,
            tolerance: 1e-9,
        }
    }

    #[test]
    fn test_no_covariates_gives_nelson_aalen() {
        let x = Array2::zeros((4, 0));
        let model = CoxModel::fit(&x, &[], &[1.0, 2.0, 2.0, 3.0], &[true, true, false, true], &params()).unwrap();

        assert_abs_diff_eq!(model.baseline_cumulative_hazard(0.5), 0.0);
        assert_abs_diff_eq!(model.baseline_cumulative_hazard(1.0), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(model.baseline_cumulative_hazard(2.5), 0.25 + 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.baseline_cumulative_hazard(3.0), 0.25 + 1.0 / 3.0 + 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.survival(aview1(&[]), 2.0), (-(0.25 + 1.0 / 3.0f64)).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let z = stack_rows(
            2,
            &[
                vec![0.5, -1.0],
                vec![-0.3, 0.2],
                vec![1.2, 0.7],
                vec![-1.0, 0.1],
                vec![0.1, -0.4],
                vec![-0.5, 0.4],
            ],
        )
        .unwrap();
        let durations = [2.0, 2.0, 1.0, 4.0, 2.0, 3.0];
        let events = [true, true, true, false, false, true];
        let sets = RiskSets::new(&durations);
        let beta = [0.3, -0.2];
        let at = efron_derivatives(&z, &events, &beta, &sets);

        let h = 1e-6;
        for a in 0..2 {
            let mut up = beta;
            let mut down = beta;
            up[a] += h;
            down[a] -= h;
            let numeric = (efron_derivatives(&z, &events, &up, &sets).log_likelihood
                - efron_derivatives(&z, &events, &down, &sets).log_likelihood)
                / (2.0 * h);
            assert_abs_diff_eq!(at.gradient[a], numeric, epsilon = 1e-6);

            let g_up = efron_derivatives(&z, &events, &up, &sets).gradient;
            let g_down = efron_derivatives(&z, &events, &down, &sets).gradient;
            for b in 0..2 {
                let numeric_info = -(g_up[b] - g_down[b]) / (2.0 * h);
                assert_abs_diff_eq!(at.information[a][b], numeric_info, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_faster_group_gets_positive_coefficient() {
        // Group 1 adopts early, group 0 late or never
        let mut rows = Vec::new();
        let mut durations = Vec::new();
        let mut events = Vec::new();
        for i in 0..20 {
            let treated = i % 2 == 0;
            rows.push(vec![if treated { 1.0 } else { 0.0 }]);
            durations.push(if treated { 1.0 + (i % 3) as f64 } else { 6.0 + (i % 4) as f64 });
            events.push(treated || i % 4 == 1);
        }
        let x = stack_rows(1, &rows).unwrap();
        let model = CoxModel::fit(&x, &["treated".to_string()], &durations, &events, &params()).unwrap();

        let summary = model.coefficient_summary();
        assert!(summary[0].coef > 0.0, "coef {}", summary[0].coef);
        assert!(summary[0].coef_lower_95 < summary[0].coef && summary[0].coef < summary[0].coef_upper_95);
        assert!((0.0..=1.0).contains(&summary[0].p));
        let standard_normal = Normal::standard();
        assert_abs_diff_eq!(
            summary[0].p,
            2.0 * (1.0 - standard_normal.cdf(summary[0].z.abs())),
            epsilon = 1e-12
        );

        let mut prev = 1.0;
        for t in 1..=10 {
            let s = model.survival(aview1(&[1.0]), t as f64);
            assert!(s <= prev && s >= 0.0);
            prev = s;
        }
        assert!(model.survival(aview1(&[1.0]), 3.0) < model.survival(aview1(&[0.0]), 3.0));
    }

    #[test]
    fn test_wald_p_value_of_a_known_z() {
        let model = CoxModel {
            covariates: vec!["a".into()],
            means: vec![0.0],
            scales: vec![1.0],
            beta: vec![1.959_963_984_540_054],
            standard_errors: vec![1.0],
            baseline: Vec::new(),
            log_likelihood: 0.0,
            iterations: 1,
            converged: true,
        };
        let row = &model.coefficient_summary()[0];
        assert_abs_diff_eq!(row.z, 1.959_963_984_540_054, epsilon = 1e-12);
        assert_abs_diff_eq!(row.p, 0.05, epsilon = 1e-9);
        assert_abs_diff_eq!(row.coef_lower_95, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_no_events_is_insufficient() {
        let x = stack_rows(1, &[vec![1.0], vec![2.0]]).unwrap();
        let err = CoxModel::fit(&x, &["a".to_string()], &[3.0, 3.0], &[false, false], &params()).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData(_)));
    }
}
