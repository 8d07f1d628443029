//! Label-stratified train/test split

use crate::rng::{stream_rng, Stream};
use rand::seq::SliceRandom;

/// Row indices of the train and test partitions, each sorted ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Hold out `round(n_class * test_fraction)` rows of each class
///
/// A class with at least two rows keeps at least one row on each side.
pub fn stratified_split(labels: &[bool], test_fraction: f64, seed: u64) -> TrainTestSplit {
    let mut train = Vec::new();
    let mut test = Vec::new();

    for (stream_index, class) in [false, true].into_iter().enumerate() {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        let n = members.len();
        let mut n_test = (n as f64 * test_fraction).round() as usize;
        if n >= 2 {
            n_test = n_test.clamp(1, n - 1);
        } else {
            n_test = 0;
        }

        let mut rng = stream_rng(seed, Stream::Split, stream_index as u64);
        members.shuffle(&mut rng);
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    TrainTestSplit { train, test }
}
