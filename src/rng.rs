//! Deterministic random number streams
//!
//! All randomness flows from the configured master seed. Each consumer
//! (a k-means restart, the train/test split, a boosting round) derives its own
//! stream from (master_seed, stream index), so parallel work produces the same
//! result regardless of scheduling.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

pub type StreamRng = Pcg64Mcg;

/// Stable stream namespaces; append only, reordering changes every result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum Stream {
    KMeans = 1,
    Split = 2,
    Boosting = 3,
}

/// RNG for sub-stream `index` of `stream` under `master_seed`
pub fn stream_rng(master_seed: u64, stream: Stream, index: u64) -> StreamRng {
    let salt = (stream as u64)
        .wrapping_mul(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(index.wrapping_mul(0xbf58_476d_1ce4_e5b9));
    Pcg64Mcg::seed_from_u64(master_seed ^ salt)
}
