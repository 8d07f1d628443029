//! Second-order regression trees shared by both boosters

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    /// L2 penalty on leaf weights
    pub lambda: f64,
    /// Minimum hessian sum in a child
    pub min_child_weight: f64,
    /// Minimum number of rows in a child
    pub min_samples_leaf: usize,
}

impl TreeParams {
    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.lambda)
    }

    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.lambda;
        if denom > 0.0 {
            -g / denom
        } else {
            0.0
        }
    }

    /// Gain of splitting (g, h) into left and right parts, if the split is admissible
    pub fn split_gain(&self, left: (f64, f64, usize), total: (f64, f64, usize)) -> Option<f64> {
        let right = (total.0 - left.0, total.1 - left.1, total.2 - left.2);
        if left.2 < self.min_samples_leaf.max(1) || right.2 < self.min_samples_leaf.max(1) {
            return None;
        }
        if left.1 < self.min_child_weight || right.1 < self.min_child_weight {
            return None;
        }
        let gain = 0.5
            * (self.score(left.0, left.1) + self.score(right.0, right.1) - self.score(total.0, total.1));
        (gain > MIN_GAIN).then_some(gain)
    }
}

/// Rows with `x[feature] <= threshold` go left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split {
    pub feature: usize,
    pub threshold: f64,
    pub gain: f64,
}

/// Best split of a node on one feature
pub trait SplitFinder: Sync {
    fn best_split_on(
        &self,
        feature: usize,
        rows: &[usize],
        grad: &[f64],
        hess: &[f64],
        params: &TreeParams,
    ) -> Option<Split>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf { value: f64 },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split { feature, threshold, left, right } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Multiply every leaf value by `factor` (shrinkage)
    pub fn scaled(mut self, factor: f64) -> Self {
        for node in &mut self.nodes {
            if let Node::Leaf { value } = node {
                *value *= factor;
            }
        }
        self
    }

    /// Grow a tree depth-first over `rows`, searching `features` only
    pub fn grow(
        x: &Array2<f64>,
        rows: Vec<usize>,
        grad: &[f64],
        hess: &[f64],
        features: &[usize],
        params: &TreeParams,
        finder: &dyn SplitFinder,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(x, rows, 0, grad, hess, features, params, finder);
        tree
    }

    #[allow(clippy::too_many_arguments)]
    fn grow_node(
        &mut self,
        x: &Array2<f64>,
        rows: Vec<usize>,
        depth: usize,
        grad: &[f64],
        hess: &[f64],
        features: &[usize],
        params: &TreeParams,
        finder: &dyn SplitFinder,
    ) -> usize {
        let idx = self.nodes.len();
        let g: f64 = rows.iter().map(|&r| grad[r]).sum();
        let h: f64 = rows.iter().map(|&r| hess[r]).sum();
        self.nodes.push(Node::Leaf {
            value: params.leaf_weight(g, h),
        });
        if depth >= params.max_depth || rows.len() < 2 {
            return idx;
        }

        // Candidates are reduced in feature order so ties resolve the same way
        // regardless of how rayon schedules the search
        let candidates: Vec<Option<Split>> = features
            .par_iter()
            .map(|&f| finder.best_split_on(f, &rows, grad, hess, params))
            .collect();
        let best = candidates.into_iter().flatten().fold(None, |best: Option<Split>, s| match best {
            Some(b) if b.gain >= s.gain => Some(b),
            _ => Some(s),
        });
        let Some(split) = best else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| x[[r, split.feature]] <= split.threshold);
        if left_rows.is_empty() || right_rows.is_empty() {
            return idx;
        }
        let left = self.grow_node(x, left_rows, depth + 1, grad, hess, features, params, finder);
        let right = self.grow_node(x, right_rows, depth + 1, grad, hess, features, params, finder);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::stack_rows;
    use ndarray::aview1;

    /// Exhaustive search over midpoints, for testing the grower in isolation
    struct Midpoints<'a>(&'a Array2<f64>);

    impl SplitFinder for Midpoints<'_> {
        fn best_split_on(&self, feature: usize, rows: &[usize], grad: &[f64], hess: &[f64], params: &TreeParams) -> Option<Split> {
            let total = (
                rows.iter().map(|&r| grad[r]).sum(),
                rows.iter().map(|&r| hess[r]).sum(),
                rows.len(),
            );
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| self.0[[a, feature]].total_cmp(&self.0[[b, feature]]));
            let mut left = (0.0, 0.0, 0);
            let mut best: Option<Split> = None;
            for w in sorted.windows(2) {
                left = (left.0 + grad[w[0]], left.1 + hess[w[0]], left.2 + 1);
                let (a, b) = (self.0[[w[0], feature]], self.0[[w[1], feature]]);
                if a == b {
                    continue;
                }
                if let Some(gain) = params.split_gain(left, total) {
                    if best.map_or(true, |s| gain > s.gain) {
                        best = Some(Split { feature, threshold: (a + b) / 2.0, gain });
                    }
                }
            }
            best
        }
    }

    fn params(depth: usize) -> TreeParams {
        TreeParams {
            max_depth: depth,
            lambda: 0.0,
            min_child_weight: 0.0,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn test_stump_separates_gradient_signs() {
        let x = stack_rows(1, &[vec![1.0], vec![2.0], vec![3.0], vec![4.0]]).unwrap();
        let grad = [1.0, 1.0, -1.0, -1.0];
        let hess = [1.0; 4];
        let tree = RegressionTree::grow(&x, (0..4).collect(), &grad, &hess, &[0], &params(1), &Midpoints(&x));

        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.predict(aview1(&[1.5])), -1.0);
        assert_eq!(tree.predict(aview1(&[3.5])), 1.0);
        assert_eq!(tree.clone().scaled(0.1).predict(aview1(&[3.5])), 0.1);
    }

    #[test]
    fn test_depth_zero_is_a_single_leaf() {
        let x = stack_rows(1, &[vec![1.0], vec![2.0]]).unwrap();
        let tree = RegressionTree::grow(&x, vec![0, 1], &[1.0, -3.0], &[1.0, 1.0], &[0], &params(0), &Midpoints(&x));
        assert_eq!(tree.nodes, vec![Node::Leaf { value: 1.0 }]);
        assert_eq!(tree.predict(aview1(&[9.0])), 1.0);
    }

    #[test]
    fn test_min_samples_leaf_blocks_small_children() {
        let p = TreeParams {
            min_samples_leaf: 3,
            ..params(2)
        };
        assert_eq!(p.split_gain((1.0, 1.0, 2), (0.0, 4.0, 4)), None);
        assert!(params(2).split_gain((2.0, 2.0, 2), (0.0, 4.0, 4)).is_some());
    }
}
