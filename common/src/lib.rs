pub mod curve;
pub mod error;
pub mod polynomial;
pub mod precompute;
pub mod random;
pub mod secret_sharing;
pub mod utils;

pub const BENCH_N_T: [(usize, usize); 3] = [(3, 2), (16, 9), (64, 33)];
