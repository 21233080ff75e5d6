//! Ballot validity proofs.
//!
//! The ledger only needs the `prove`/`verify` contract of [`ProofBackend`]; the shipped
//! [`SigmaBackend`] is a Fiat-Shamir disjunctive Chaum-Pedersen proof. For every candidate
//! choice `b` it shows knowledge of `r` with `R = r * G` and
//! `M[j] - [j == b] * w * G = r * PK` for all slots `j`, real for the actual choice and
//! simulated for the other two, so the verifier learns neither `choice` nor `r`.

use blake3::Hasher;
use curve25519_dalek::{RistrettoPoint, Scalar, ristretto::CompressedRistretto};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use common::{
    curve::{SCALAR_BYTES, decode_scalar, mul_base},
    error::{
        Error,
        ErrorKind::{CountMismatch, InvalidProof},
    },
    random::random_scalar,
    utils::compute_d_from_point_commitments,
};

use crate::ballot::{Ballot, Choice, PublicSignals, SLOTS, encode};

/// Opaque proof bytes, as handed to and from a proving backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof(pub Vec<u8>);

pub trait ProofBackend: Send + Sync {
    /// Encodes the ballot for `choice` and proves it well formed for the registered `weight`.
    fn prove<R>(
        &self,
        rng: &mut R,
        joint_public_key: &RistrettoPoint,
        choice: Choice,
        weight: u64,
        r: &Scalar,
    ) -> (Ballot, Proof)
    where
        R: CryptoRng + RngCore;

    fn verify(
        &self,
        joint_public_key: &RistrettoPoint,
        ballot: &Ballot,
        weight: u64,
        proof: &Proof,
    ) -> bool;
}

/// A ballot whose proof has been checked. Only [`check_ballot`] produces one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifiedBallot {
    ballot: Ballot,
    weight: u64,
}

impl VerifiedBallot {
    pub fn ballot(&self) -> &Ballot {
        &self.ballot
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }
}

/// Decodes the public signals and verifies the proof against them.
pub fn check_ballot<B>(
    backend: &B,
    joint_public_key: &RistrettoPoint,
    signals: &PublicSignals,
    weight: u64,
    proof: &Proof,
) -> Result<VerifiedBallot, Error>
where
    B: ProofBackend,
{
    let ballot = signals.decode()?;
    if backend.verify(joint_public_key, &ballot, weight, proof) {
        Ok(VerifiedBallot { ballot, weight })
    } else {
        Err(InvalidProof(format!("ballot {:?}", signals.r)).into())
    }
}

const ONE_HOT_DOMAIN: &[u8] = b"nvote/one-hot/v1";

/// Per-branch challenges and responses; commitments are recomputed by the verifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OneHotProof {
    pub challenges: [Scalar; SLOTS],
    pub responses: [Scalar; SLOTS],
}

impl OneHotProof {
    pub const BYTES: usize = 2 * SLOTS * SCALAR_BYTES;

    pub fn to_proof(&self) -> Proof {
        Proof(
            self.challenges
                .iter()
                .chain(&self.responses)
                .flat_map(|s| s.to_bytes())
                .collect(),
        )
    }

    pub fn from_proof(proof: &Proof) -> Result<Self, Error> {
        if proof.0.len() != Self::BYTES {
            return Err(
                CountMismatch(Self::BYTES, "bytes expected", proof.0.len(), "bytes given").into(),
            );
        }
        let scalars = proof
            .0
            .chunks_exact(SCALAR_BYTES)
            .map(decode_scalar)
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self {
            challenges: [scalars[0], scalars[1], scalars[2]],
            responses: [scalars[3], scalars[4], scalars[5]],
        })
    }
}

/// `T_b[j] = M[j] - [j == b] * w * G`, which equals `r * PK` in every slot iff the
/// ballot encodes choice `b` with weight `w`.
fn branch_targets(
    ballot: &Ballot,
    weight: &RistrettoPoint,
    branch: usize,
) -> [RistrettoPoint; SLOTS] {
    let mut targets = ballot.m;
    targets[branch] -= weight;
    targets
}

/// `(z * G - c * R, z * PK - c * T_b[j])`
fn branch_commitments(
    joint_public_key: &RistrettoPoint,
    ballot: &Ballot,
    targets: &[RistrettoPoint; SLOTS],
    c: &Scalar,
    z: &Scalar,
) -> (RistrettoPoint, [RistrettoPoint; SLOTS]) {
    let z_pk = z * joint_public_key;
    (
        mul_base(z) - c * ballot.r,
        targets.map(|t| z_pk - c * t),
    )
}

fn one_hot_challenge(
    hasher: &mut Hasher,
    buf: &mut [u8; 64],
    joint_public_key: &RistrettoPoint,
    ballot: &Ballot,
    weight: u64,
    commitments: &[(RistrettoPoint, [RistrettoPoint; SLOTS]); SLOTS],
) -> Scalar {
    let mut transcript: Vec<CompressedRistretto> = Vec::with_capacity(1 + 4 + 4 * SLOTS);
    transcript.push(joint_public_key.compress());
    transcript.extend(ballot.public_signals().to_vec());
    for (a, b) in commitments {
        transcript.push(a.compress());
        transcript.extend(b.iter().map(RistrettoPoint::compress));
    }

    let mut domain = ONE_HOT_DOMAIN.to_vec();
    domain.extend_from_slice(&weight.to_le_bytes());

    compute_d_from_point_commitments(hasher, buf, &domain, &transcript)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SigmaBackend;

impl ProofBackend for SigmaBackend {
    fn prove<R>(
        &self,
        rng: &mut R,
        joint_public_key: &RistrettoPoint,
        choice: Choice,
        weight: u64,
        r: &Scalar,
    ) -> (Ballot, Proof)
    where
        R: CryptoRng + RngCore,
    {
        let ballot = encode(joint_public_key, choice, weight, r);
        let weight_point = mul_base(&Scalar::from(weight));
        let real = choice.slot();

        let mut challenges = [Scalar::ZERO; SLOTS];
        let mut responses = [Scalar::ZERO; SLOTS];
        let mut commitments =
            [(RistrettoPoint::default(), [RistrettoPoint::default(); SLOTS]); SLOTS];

        // simulated branches
        for branch in (0..SLOTS).filter(|b| *b != real) {
            challenges[branch] = random_scalar(rng);
            responses[branch] = random_scalar(rng);
            commitments[branch] = branch_commitments(
                joint_public_key,
                &ballot,
                &branch_targets(&ballot, &weight_point, branch),
                &challenges[branch],
                &responses[branch],
            );
        }

        let mut k = random_scalar(rng);
        let k_pk = k * joint_public_key;
        commitments[real] = (mul_base(&k), [k_pk; SLOTS]);

        let mut hasher = Hasher::new();
        let mut buf = [0u8; 64];
        let c = one_hot_challenge(
            &mut hasher,
            &mut buf,
            joint_public_key,
            &ballot,
            weight,
            &commitments,
        );

        challenges[real] = c - challenges.iter().sum::<Scalar>();
        responses[real] = k + challenges[real] * r;
        k.zeroize();

        let proof = OneHotProof {
            challenges,
            responses,
        };
        (ballot, proof.to_proof())
    }

    fn verify(
        &self,
        joint_public_key: &RistrettoPoint,
        ballot: &Ballot,
        weight: u64,
        proof: &Proof,
    ) -> bool {
        let Ok(proof) = OneHotProof::from_proof(proof) else {
            return false;
        };
        let weight_point = mul_base(&Scalar::from(weight));

        let commitments: [(RistrettoPoint, [RistrettoPoint; SLOTS]); SLOTS] =
            std::array::from_fn(|branch| {
                branch_commitments(
                    joint_public_key,
                    ballot,
                    &branch_targets(ballot, &weight_point, branch),
                    &proof.challenges[branch],
                    &proof.responses[branch],
                )
            });

        let mut hasher = Hasher::new();
        let mut buf = [0u8; 64];
        let c = one_hot_challenge(
            &mut hasher,
            &mut buf,
            joint_public_key,
            ballot,
            weight,
            &commitments,
        );

        c == proof.challenges.iter().sum::<Scalar>()
    }
}
