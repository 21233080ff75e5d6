//! Group operations over the Ristretto prime-order group.
//!
//! Every decoded point is a valid group element: Ristretto has no cofactor, so a
//! successful decompression also implies subgroup membership.

use curve25519_dalek::{
    RistrettoPoint, Scalar, constants::RISTRETTO_BASEPOINT_POINT, ristretto::CompressedRistretto,
    traits::Identity,
};
use rayon::prelude::*;

use crate::error::{
    Error,
    ErrorKind::{InvalidEncoding, PointNotOnCurve},
};

pub const POINT_BYTES: usize = 32;
pub const SCALAR_BYTES: usize = 32;

pub fn base_point() -> RistrettoPoint {
    RISTRETTO_BASEPOINT_POINT
}

pub fn identity() -> RistrettoPoint {
    RistrettoPoint::identity()
}

pub fn add(p: &RistrettoPoint, q: &RistrettoPoint) -> RistrettoPoint {
    p + q
}

/// Constant time in the bits of `k`.
pub fn scalar_mul(k: &Scalar, p: &RistrettoPoint) -> RistrettoPoint {
    k * p
}

/// Constant time in the bits of `k`.
pub fn mul_base(k: &Scalar) -> RistrettoPoint {
    RistrettoPoint::mul_base(k)
}

pub fn encode(p: &RistrettoPoint) -> [u8; POINT_BYTES] {
    p.compress().to_bytes()
}

pub fn decode(bytes: &[u8]) -> Result<RistrettoPoint, Error> {
    let compressed = CompressedRistretto::from_slice(bytes).map_err(|_| {
        Error::from_kind(InvalidEncoding(format!(
            "expected {POINT_BYTES} bytes for a point, got {}",
            bytes.len()
        )))
    })?;
    decompress_ristretto_point(compressed)
}

pub fn decompress_ristretto_point(
    compressed_point: CompressedRistretto,
) -> Result<RistrettoPoint, Error> {
    match compressed_point.decompress() {
        Some(decompressed_point) => Ok(decompressed_point),
        None => Err(Error::from_kind(PointNotOnCurve(format!(
            "{compressed_point:?}",
        )))),
    }
}

pub fn batch_decompress_ristretto_points(
    compressed_points: &[CompressedRistretto],
) -> Result<Vec<RistrettoPoint>, Error> {
    compressed_points
        .par_iter()
        .map(|compressed_point| decompress_ristretto_point(*compressed_point))
        .collect()
}

pub fn encode_scalar(k: &Scalar) -> [u8; SCALAR_BYTES] {
    k.to_bytes()
}

/// Rejects non-canonical encodings, i.e. values not reduced mod the group order.
pub fn decode_scalar(bytes: &[u8]) -> Result<Scalar, Error> {
    let bytes: [u8; SCALAR_BYTES] = bytes.try_into().map_err(|_| {
        Error::from_kind(InvalidEncoding(format!(
            "expected {SCALAR_BYTES} bytes for a scalar, got {}",
            bytes.len()
        )))
    })?;

    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes)).ok_or_else(|| {
        Error::from_kind(InvalidEncoding(format!(
            "non-canonical scalar {bytes:x?}"
        )))
    })
}
