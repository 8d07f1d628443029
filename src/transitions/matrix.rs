//! Empirical state-transition counts and probabilities

/// k x k tally of (state at t, state at t + 1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCounts {
    counts: Vec<Vec<u64>>,
}

impl TransitionCounts {
    pub fn new(k: usize) -> Self {
        Self {
            counts: vec![vec![0; k]; k],
        }
    }

    pub fn from_rows(counts: Vec<Vec<u64>>) -> Self {
        Self { counts }
    }

    pub fn k(&self) -> usize {
        self.counts.len()
    }

    pub fn rows(&self) -> &[Vec<u64>] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Row-normalised probabilities; a row with no observations stays all zero
    pub fn probabilities(&self) -> Vec<Vec<f64>> {
        self.counts
            .iter()
            .map(|row| {
                let total: u64 = row.iter().sum();
                if total == 0 {
                    vec![0.0; row.len()]
                } else {
                    row.iter().map(|&c| c as f64 / total as f64).collect()
                }
            })
            .collect()
    }
}

/// Tally transitions over `(customer_id, month, state)` rows
///
/// Rows must be sorted by (customer_id, month). A pair is counted only when
/// the next row belongs to the same customer and its month is exactly t + 1;
/// gaps break the chain and are never imputed. States outside `0..k` are
/// ignored.
pub fn count_transitions(rows: &[(i64, i64, usize)], k: usize) -> TransitionCounts {
    let mut counts = TransitionCounts::new(k);
    for pair in rows.windows(2) {
        let (id, month, from) = pair[0];
        let (next_id, next_month, to) = pair[1];
        if id == next_id && next_month == month + 1 && from < k && to < k {
            counts.counts[from][to] += 1;
        }
    }
    counts
}

/// Header row and body for a square matrix labelled by state index
pub fn labelled_rows<T: ToString>(matrix: &[Vec<T>]) -> (Vec<String>, Vec<Vec<String>>) {
    let mut headers = vec!["state".to_string()];
    headers.extend((0..matrix.len()).map(|j| j.to_string()));
    let rows = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut cells = vec![i.to_string()];
            cells.extend(row.iter().map(ToString::to_string));
            cells
        })
        .collect();
    (headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_two_state_probabilities() {
        let counts = TransitionCounts::from_rows(vec![vec![8, 2], vec![1, 9]]);
        let p = counts.probabilities();
        assert_abs_diff_eq!(p[0][0], 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(p[0][1], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1][0], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1][1], 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_gaps_and_customer_boundaries_break_pairs() {
        let rows = vec![
            (1, 1, 0),
            (1, 2, 1),
            (1, 4, 1), // gap: 2 -> 4
            (1, 5, 2),
            (2, 6, 0), // new customer
            (2, 7, 0),
        ];
        let counts = count_transitions(&rows, 4);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.rows()[0][1], 1);
        assert_eq!(counts.rows()[1][2], 1);
        assert_eq!(counts.rows()[0][0], 1);
    }

    #[test]
    fn test_unobserved_states_give_zero_rows() {
        let counts = count_transitions(&[(1, 1, 0), (1, 2, 0)], 3);
        let p = counts.probabilities();
        assert_eq!(p.len(), 3);
        assert_eq!(p[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(p[1], vec![0.0; 3]);
        assert_eq!(p[2], vec![0.0; 3]);
    }

    #[test]
    fn test_labelled_rows_layout() {
        let (headers, rows) = labelled_rows(&[vec![1u64, 2], vec![3, 4]]);
        assert_eq!(headers, vec!["state", "0", "1"]);
        assert_eq!(rows[1], vec!["1", "3", "4"]);
    }
}
