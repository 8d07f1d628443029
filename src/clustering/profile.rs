//! Per-cluster summaries, profile cards and their Markdown documents

use super::labeling::{assign_profile, axis_tops, RankingAxes};
use crate::features::CLUSTER_FEATURES;
use crate::matrix::mean;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Cluster means of the clustering features, rounded to 3 decimals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummaryRow {
    pub cluster: usize,
    pub age: f64,
    pub income: f64,
    pub mean_balance: f64,
    pub std_balance: f64,
    pub mean_card_spend: f64,
    pub mean_utilization: f64,
    pub mean_pix: f64,
    pub late_payment_rate: f64,
}

impl ClusterSummaryRow {
    fn from_means(cluster: usize, m: &[f64]) -> Self {
        Self {
            cluster,
            age: m[0],
            income: m[1],
            mean_balance: m[2],
            std_balance: m[3],
            mean_card_spend: m[4],
            mean_utilization: m[5],
            mean_pix: m[6],
            late_payment_rate: m[7],
        }
    }

    fn ranking_axes(&self) -> RankingAxes {
        RankingAxes {
            late_payment_rate: self.late_payment_rate,
            income: self.income,
            mean_pix: self.mean_pix,
            mean_utilization: self.mean_utilization,
        }
    }
}

/// One row of the profile cards table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfileCard {
    pub cluster: usize,
    pub cluster_name: String,
    pub n_customers: usize,
    pub age: f64,
    pub income: f64,
    pub mean_balance: f64,
    pub std_balance: f64,
    pub mean_card_spend: f64,
    pub mean_utilization: f64,
    pub mean_pix: f64,
    pub late_payment_rate: f64,
    pub profile_description: String,
}

/// Means per non-empty cluster, in cluster id order
///
/// `features` must hold the clustering features in `CLUSTER_FEATURES` order.
pub fn summarize_clusters(features: &Array2<f64>, labels: &[usize], k: usize) -> Vec<ClusterSummaryRow> {
    (0..k)
        .filter_map(|c| {
            let members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == c).collect();
            if members.is_empty() {
                return None;
            }
            let means: Vec<f64> = (0..CLUSTER_FEATURES.len())
                .map(|j| {
                    let col: Vec<f64> = members.iter().map(|&i| features[[i, j]]).collect();
                    round_to(mean(&col), 3)
                })
                .collect();
            Some(ClusterSummaryRow::from_means(c, &means))
        })
        .collect()
}

/// Label every summarised cluster and attach its size
pub fn profile_cards(summary: &[ClusterSummaryRow], labels: &[usize]) -> Vec<ClusterProfileCard> {
    let axes: Vec<RankingAxes> = summary.iter().map(ClusterSummaryRow::ranking_axes).collect();
    summary
        .iter()
        .zip(axis_tops(&axes))
        .map(|(s, tops)| {
            let profile = assign_profile(&tops);
            ClusterProfileCard {
                cluster: s.cluster,
                cluster_name: profile.label.to_string(),
                n_customers: labels.iter().filter(|&&l| l == s.cluster).count(),
                age: s.age,
                income: s.income,
                mean_balance: s.mean_balance,
                std_balance: s.std_balance,
                mean_card_spend: s.mean_card_spend,
                mean_utilization: s.mean_utilization,
                mean_pix: s.mean_pix,
                late_payment_rate: s.late_payment_rate,
                profile_description: profile.description.to_string(),
            }
        })
        .collect()
}

/// Markdown profile cards, one section per cluster
pub fn render_cards_document(cards: &[ClusterProfileCard], k: usize, silhouette: f64) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "# Customer Profiles (Clusters)\n");
    let _ = writeln!(doc, "- k = {}", k);
    let _ = writeln!(doc, "- Silhouette = {:.3}\n", silhouette);
    for card in cards {
        let _ = writeln!(doc, "## Cluster {}: {}", card.cluster, card.cluster_name);
        let _ = writeln!(doc, "- Customers: {}", card.n_customers);
        let _ = writeln!(doc, "- Mean age: {:.1}", card.age);
        let _ = writeln!(doc, "- Mean income: {:.0}", card.income);
        let _ = writeln!(doc, "- Mean utilization: {:.3}", card.mean_utilization);
        let _ = writeln!(doc, "- Mean PIX count: {:.1}", card.mean_pix);
        let _ = writeln!(doc, "- Late payment rate: {:.3}", card.late_payment_rate);
        let _ = writeln!(doc, "- Description: {}\n", card.profile_description);
    }
    doc
}

/// Markdown report with the cluster means table
pub fn render_cluster_report(summary: &[ClusterSummaryRow], k: usize, silhouette: f64) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "# Cluster Report (K-Means)\n");
    let _ = writeln!(doc, "- k = {}", k);
    let _ = writeln!(doc, "- Silhouette = {:.3}\n", silhouette);
    let _ = writeln!(doc, "## Cluster Summary (means)\n");

    let _ = writeln!(doc, "| cluster | {} |", CLUSTER_FEATURES.join(" | "));
    let _ = writeln!(doc, "|---:|{}", "---:|".repeat(CLUSTER_FEATURES.len()));
    for s in summary {
        let _ = writeln!(
            doc,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            s.cluster,
            s.age,
            s.income,
            s.mean_balance,
            s.std_balance,
            s.mean_card_spend,
            s.mean_utilization,
            s.mean_pix,
            s.late_payment_rate
        );
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::stack_rows;

    fn features() -> Array2<f64> {
        let rows = vec![
            vec![30.0, 2000.0, 500.0, 50.0, 300.0, 0.7, 40.0, 0.3],
            vec![32.0, 2200.0, 700.0, 70.0, 310.0, 0.6, 38.0, 0.25],
            vec![55.0, 9000.0, 8000.0, 400.0, 900.0, 0.2, 8.0, 0.02],
        ];
        stack_rows(CLUSTER_FEATURES.len(), &rows).unwrap()
    }

    #[test]
    fn test_summary_skips_empty_clusters_and_rounds() {
        let summary = summarize_clusters(&features(), &[0, 0, 2], 4);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].cluster, 0);
        assert_eq!(summary[0].age, 31.0);
        assert_eq!(summary[0].late_payment_rate, 0.275);
        assert_eq!(summary[1].cluster, 2);
        assert_eq!(summary[1].income, 9000.0);
    }

    #[test]
    fn test_cards_carry_labels_and_sizes() {
        let labels = [0, 0, 2];
        let summary = summarize_clusters(&features(), &labels, 4);
        let cards = profile_cards(&summary, &labels);

        assert_eq!(cards[0].cluster_name, "high-risk digital-intensive");
        assert_eq!(cards[0].n_customers, 2);
        assert_eq!(cards[1].cluster_name, "stable high-income");
        assert_eq!(cards[1].n_customers, 1);

        let doc = render_cards_document(&cards, 4, 0.41234);
        assert!(doc.contains("- Silhouette = 0.412"));
        assert!(doc.contains("## Cluster 2: stable high-income"));
    }

    #[test]
    fn test_report_has_one_table_row_per_cluster() {
        let labels = [0, 1, 2];
        let summary = summarize_clusters(&features(), &labels, 3);
        let report = render_cluster_report(&summary, 3, 0.5);
        let table_rows = report.lines().filter(|l| l.starts_with("| ") && !l.starts_with("| cluster")).count();
        assert_eq!(table_rows, 3);
    }
}
