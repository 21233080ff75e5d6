//! Feldman verifiable secret sharing.
//!
//! A dealer samples `f(x)` of degree `t - 1`, hands `f(i)` to party `i` and publishes
//! `C_k = a_k * G` for every coefficient. Any `t` shares interpolate `f(0)`.

use std::collections::BTreeMap;

use curve25519_dalek::{RistrettoPoint, Scalar, ristretto::CompressedRistretto};
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    curve::batch_decompress_ristretto_points,
    error::{
        Error,
        ErrorKind::{CountMismatch, InsufficientShares, InvalidParameterSet},
    },
    polynomial::Polynomial,
    precompute::gen_powers,
    random::seeded_rng,
    utils::{compute_lagrange_bases, evaluate_exponent},
};

/// `n` parties, any `t` of which reconstruct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub n: usize,
    pub t: usize,
}

impl Params {
    pub fn new(n: usize, t: usize) -> Result<Self, Error> {
        if t >= 1 && t <= n {
            Ok(Self { n, t })
        } else {
            Err(InvalidParameterSet(n, t, 0).into())
        }
    }

    pub fn check_index(&self, index: usize) -> Result<(), Error> {
        if index >= 1 && index <= self.n {
            Ok(())
        } else {
            Err(InvalidParameterSet(self.n, self.t, index).into())
        }
    }
}

/// Public commitment to every coefficient of a dealer's polynomial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShareCommitment {
    points: Vec<RistrettoPoint>,
}

impl ShareCommitment {
    pub fn from_points(points: Vec<RistrettoPoint>) -> Self {
        Self { points }
    }

    /// Decompresses a published commitment, which must have exactly `t` entries.
    pub fn from_compressed(t: usize, compressed: &[CompressedRistretto]) -> Result<Self, Error> {
        if compressed.len() != t {
            return Err(CountMismatch(t, "coefficients", compressed.len(), "commitments").into());
        }
        Ok(Self {
            points: batch_decompress_ristretto_points(compressed)?,
        })
    }

    pub fn compress(&self) -> Vec<CompressedRistretto> {
        self.points.iter().map(RistrettoPoint::compress).collect()
    }

    pub fn points(&self) -> &[RistrettoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `C_0 = f(0) * G`, the dealer's contribution to a joint public key.
    pub fn public_contribution(&self) -> RistrettoPoint {
        self.points[0]
    }

    /// `f(index) * G`, computed from public data only.
    pub fn evaluate_exponent(&self, index: usize) -> RistrettoPoint {
        evaluate_exponent(&self.points, index)
    }
}

pub fn generate<R>(rng: &mut R, params: Params) -> (Polynomial, ShareCommitment)
where
    R: CryptoRng + RngCore,
{
    let polynomial = Polynomial::sample(params.t, rng);
    let commitment = ShareCommitment::from_points(polynomial.commit());
    (polynomial, commitment)
}

pub fn generate_from_seed(params: Params, seed: [u8; 32]) -> (Polynomial, ShareCommitment) {
    generate(&mut seeded_rng(seed), params)
}

pub fn evaluate_share(polynomial: &Polynomial, index: usize) -> Result<Scalar, Error> {
    if index == 0 {
        // f(0) is the secret itself
        return Err(InvalidParameterSet(0, polynomial.len(), index).into());
    }
    Ok(polynomial.evaluate(index))
}

/// Shares for parties `1..=n`, in index order.
pub fn evaluate_all(polynomial: &Polynomial, n: usize) -> Vec<Scalar> {
    let x_pows = gen_powers(n, polynomial.len());
    polynomial.evaluate_range_precomp(&x_pows, 1, n)
}

/// `share * G == sum_k commitment[k] * index^k`
pub fn verify_share(index: usize, share: &Scalar, commitment: &ShareCommitment) -> bool {
    index != 0
        && !commitment.is_empty()
        && RistrettoPoint::mul_base(share) == commitment.evaluate_exponent(index)
}

/// Picks the `t` lowest indices, failing when fewer than `t` are available.
fn qualified_indices<T>(shares: &BTreeMap<usize, T>, t: usize) -> Result<Vec<usize>, Error> {
    if shares.len() < t || t == 0 {
        return Err(InsufficientShares(shares.len(), t).into());
    }
    if shares.contains_key(&0) {
        return Err(InvalidParameterSet(shares.len(), t, 0).into());
    }
    Ok(shares.keys().take(t).copied().collect())
}

/// Lagrange interpolation of `f(0)` from verified shares.
pub fn combine(shares: &BTreeMap<usize, Scalar>, t: usize) -> Result<Scalar, Error> {
    let indices = qualified_indices(shares, t)?;
    let lambdas = compute_lagrange_bases(&indices);

    Ok(indices
        .par_iter()
        .zip(lambdas.par_iter())
        .map(|(i, lambda)| lambda * shares[i])
        .sum())
}

/// Same as [`combine`] with the weights applied to points: recovers `f(0) * P` from `f(i) * P`.
pub fn combine_exponent(
    shares: &BTreeMap<usize, RistrettoPoint>,
    t: usize,
) -> Result<RistrettoPoint, Error> {
    let indices = qualified_indices(shares, t)?;
    let lambdas = compute_lagrange_bases(&indices);

    Ok(indices
        .par_iter()
        .zip(lambdas.par_iter())
        .map(|(i, lambda)| lambda * shares[i])
        .sum())
}
