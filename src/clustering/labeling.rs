//! Human-readable cluster labels from a first-match rule cascade
//!
//! Clusters are ranked on four axes (late-payment rate, income, mean PIX
//! count as the digital-usage proxy, utilisation). A cluster is "top" on an
//! axis when its dense rank there is 1, so several clusters can be top at
//! once. The rules below are evaluated in order and the first match wins.

/// Which axes a cluster leads on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisTops {
    pub risk: bool,
    pub income: bool,
    pub digital: bool,
    pub credit: bool,
}

/// Label and description given to a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterProfile {
    pub label: &'static str,
    pub description: &'static str,
}

pub struct ProfileRule {
    pub profile: ClusterProfile,
    pub applies: fn(&AxisTops) -> bool,
}

fn risky_and_digital(t: &AxisTops) -> bool {
    t.risk && t.digital
}

fn top_income(t: &AxisTops) -> bool {
    t.income
}

fn top_digital(t: &AxisTops) -> bool {
    t.digital
}

/// Rules in priority order
pub const PROFILE_RULES: [ProfileRule; 3] = [
    ProfileRule {
        profile: ClusterProfile {
            label: "high-risk digital-intensive",
            description: "Heavy digital (PIX) usage with the highest late-payment rate. \
                          Sensitive to credit management and delinquency prevention.",
        },
        applies: risky_and_digital,
    },
    ProfileRule {
        profile: ClusterProfile {
            label: "stable high-income",
            description: "Highest income with low risk. Strong potential for investment \
                          products and premium cross-sell.",
        },
        applies: top_income,
    },
    ProfileRule {
        profile: ClusterProfile {
            label: "stable digital",
            description: "High digital usage with low delinquency. Good candidate for \
                          portfolio expansion (investments, insurance).",
        },
        applies: top_digital,
    },
];

/// Used when no rule matches
pub const DEFAULT_PROFILE: ClusterProfile = ClusterProfile {
    label: "traditional conservative",
    description: "Moderate digital usage and low risk. A more traditional profile that \
                  responds well to simple offers and financial education.",
};

pub fn assign_profile(tops: &AxisTops) -> ClusterProfile {
    PROFILE_RULES
        .iter()
        .find(|rule| (rule.applies)(tops))
        .map_or(DEFAULT_PROFILE, |rule| rule.profile)
}

/// Dense rank, highest value first (equal values share a rank, no gaps)
pub fn dense_rank_desc(values: &[f64]) -> Vec<usize> {
    let mut distinct: Vec<f64> = values.to_vec();
    distinct.sort_by(|a, b| b.total_cmp(a));
    distinct.dedup();
    values
        .iter()
        .map(|v| distinct.iter().position(|d| d == v).map_or(0, |p| p + 1))
        .collect()
}

/// Per-cluster means on the ranking axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingAxes {
    pub late_payment_rate: f64,
    pub income: f64,
    pub mean_pix: f64,
    pub mean_utilization: f64,
}

pub fn axis_tops(clusters: &[RankingAxes]) -> Vec<AxisTops> {
    let top = |f: fn(&RankingAxes) -> f64| -> Vec<bool> {
        let values: Vec<f64> = clusters.iter().map(f).collect();
        dense_rank_desc(&values).into_iter().map(|r| r == 1).collect()
    };
    let risk = top(|c| c.late_payment_rate);
    let income = top(|c| c.income);
    let digital = top(|c| c.mean_pix);
    let credit = top(|c| c.mean_utilization);

    (0..clusters.len())
        .map(|i| AxisTops {
            risk: risk[i],
            income: income[i],
            digital: digital[i],
            credit: credit[i],
        })
        .collect()
}
