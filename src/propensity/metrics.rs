//! Discrimination metrics for the held-out split

/// ROC-AUC via the Mann-Whitney statistic with average ranks for ties
///
/// Returns 0.5 when either class is absent.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks start..end (1-based: start+1..=end) share their mean
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        rank_sum += order[start..end].iter().filter(|&&i| labels[i]).count() as f64 * avg_rank;
        start = end;
    }

    let u = rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos as f64 * n_neg as f64)
}

/// Kolmogorov-Smirnov separation between positive and negative score distributions
///
/// Scores are sorted ascending (ties keep input order) and the cumulative
/// share of each class is compared after every row, so tied scores are not
/// pooled. The result lies in [0, 1].
pub fn ks_statistic(labels: &[bool], scores: &[f64]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l).count().max(1) as f64;
    let n_neg = labels.iter().filter(|&&l| !l).count().max(1) as f64;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)));

    let (mut pos, mut neg, mut ks) = (0.0, 0.0, 0.0f64);
    for &i in &order {
        if labels[i] {
            pos += 1.0;
        } else {
            neg += 1.0;
        }
        ks = ks.max((pos / n_pos - neg / n_neg).abs());
    }
    ks
}
