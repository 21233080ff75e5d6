use curve25519_dalek::Scalar;
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use zeroize::Zeroize;

pub fn random_scalar<R>(rng: &mut R) -> Scalar
where
    R: CryptoRng + RngCore,
{
    let mut bytes = [0u8; 64];
    rng.fill_bytes(&mut bytes);
    let scalar = Scalar::from_bytes_mod_order_wide(&bytes);
    bytes.zeroize();
    scalar
}

pub fn random_scalars<R>(rng: &mut R, k: usize) -> Vec<Scalar>
where
    R: CryptoRng + RngCore,
{
    (0..k).map(|_| random_scalar(rng)).collect()
}

/// Deterministic generator for reproducible runs. Never share a seed between two runs.
pub fn seeded_rng(seed: [u8; 32]) -> ChaCha20Rng {
    ChaCha20Rng::from_seed(seed)
}
