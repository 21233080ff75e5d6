use std::ops::Mul;

use blake3::Hasher;
use curve25519_dalek::{RistrettoPoint, Scalar, ristretto::CompressedRistretto};
use rayon::prelude::*;
use zeroize::Zeroize;

/// Fiat-Shamir challenge over a domain tag and a transcript of compressed points.
pub fn compute_d_from_point_commitments(
    hasher: &mut Hasher,
    buf: &mut [u8; 64],
    domain: &[u8],
    commitments: &[CompressedRistretto],
) -> Scalar {
    hasher.update(domain);
    commitments.iter().for_each(|c| {
        hasher.update(c.as_bytes());
    });

    hasher.finalize_xof().fill(buf);
    hasher.reset();

    let d = Scalar::from_bytes_mod_order_wide(buf);
    buf.zeroize();
    d
}

pub fn compute_lagrange_bases(qualified_set: &[usize]) -> Vec<Scalar> {
    qualified_set
        .par_iter()
        .map(|i| compute_lagrange_basis(*i, qualified_set))
        .collect()
}

// lambda_i = prod_{j != i} j / (j - i), i.e. the basis polynomial evaluated at 0
pub fn compute_lagrange_basis(i: usize, qualified_set: &[usize]) -> Scalar {
    let zq_i = Scalar::from(i as u64);

    qualified_set
        .par_iter()
        .map(|j| {
            if i == *j {
                Scalar::ONE
            } else {
                let zq_j = Scalar::from(*j as u64);
                zq_j * ((zq_j - zq_i).invert())
            }
        })
        .reduce(|| Scalar::ONE, Scalar::mul)
}

/// `sum_k commitments[k] * x^k`, the public image of a polynomial evaluated at `x`.
pub fn evaluate_exponent(commitments: &[RistrettoPoint], x: usize) -> RistrettoPoint {
    let x = Scalar::from(x as u64);
    let mut x_pow = Scalar::ONE;

    commitments
        .iter()
        .map(|c| {
            let term = c * x_pow;
            x_pow *= x;
            term
        })
        .sum()
}
