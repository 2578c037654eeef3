//! Workload generators shared by the benchmarks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The size classes of the mixed-allocation workload.
pub const MIXED_SIZES: [usize; 8] = [8, 16, 32, 64, 128, 256, 512, 1024];

/// Returns a reproducible sequence of `count` sizes drawn from
/// [`MIXED_SIZES`].
#[must_use]
pub fn mixed_size_pattern(count: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| MIXED_SIZES[rng.gen_range(0..MIXED_SIZES.len())])
        .collect()
}
