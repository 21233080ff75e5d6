use std::collections::{BTreeMap, BTreeSet};

use blake3::Hasher;
use curve25519_dalek::{RistrettoPoint, Scalar};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroize;

use common::{
    curve::{identity, mul_base},
    error::{
        Error,
        ErrorKind::{InvalidState, RoundAlreadyCompleted, TallyOutOfRange, WeightOverflow},
    },
    precompute::DiscreteLogTable,
    random::random_scalar,
    secret_sharing::combine_exponent,
    utils::compute_d_from_point_commitments,
};
use dkg::{KeyMaterial, KeyShare};

use crate::{
    ballot::{Ballot, Choice, SLOTS},
    proof::VerifiedBallot,
};

/// Point-wise sum of every accepted ballot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AggregateBallot {
    r: RistrettoPoint,
    m: [RistrettoPoint; SLOTS],
}

impl Default for AggregateBallot {
    fn default() -> Self {
        Self {
            r: identity(),
            m: [identity(); SLOTS],
        }
    }
}

impl AggregateBallot {
    pub fn r(&self) -> &RistrettoPoint {
        &self.r
    }

    pub fn m(&self) -> &[RistrettoPoint; SLOTS] {
        &self.m
    }

    fn add(&mut self, ballot: &Ballot) {
        self.r += ballot.r;
        self.m
            .iter_mut()
            .zip(&ballot.m)
            .for_each(|(acc, m)| *acc += m);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyResult {
    pub abstain: u64,
    pub nay: u64,
    pub yay: u64,
}

impl TallyResult {
    pub fn get(&self, choice: Choice) -> u64 {
        match choice {
            Choice::Abstain => self.abstain,
            Choice::Nay => self.nay,
            Choice::Yay => self.yay,
        }
    }

    /// `None` on overflow, which a result bounded by a `u64` total weight never hits.
    pub fn total(&self) -> Option<u64> {
        self.abstain.checked_add(self.nay)?.checked_add(self.yay)
    }
}

impl std::fmt::Display for TallyResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  Abstain: {}", self.abstain)?;
        writeln!(f, "  Nay    : {}", self.nay)?;
        write!(f, "  Yay    : {}", self.yay)
    }
}

const PARTIAL_DOMAIN: &[u8] = b"nvote/partial-decryption/v1";

/// `D_i = share_i * R` together with a proof that `log_G(Y_i) == log_R(D_i)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDecryption {
    pub index: usize,
    pub round: u64,
    pub point: RistrettoPoint,
    pub proof: (Scalar, Scalar),
}

fn partial_challenge(
    hasher: &mut Hasher,
    buf: &mut [u8; 64],
    verification_key: &RistrettoPoint,
    aggregate_r: &RistrettoPoint,
    point: &RistrettoPoint,
    a1: &RistrettoPoint,
    a2: &RistrettoPoint,
) -> Scalar {
    compute_d_from_point_commitments(
        hasher,
        buf,
        PARTIAL_DOMAIN,
        &[
            verification_key.compress(),
            aggregate_r.compress(),
            point.compress(),
            a1.compress(),
            a2.compress(),
        ],
    )
}

impl PartialDecryption {
    pub fn verify(&self, verification_key: &RistrettoPoint, aggregate_r: &RistrettoPoint) -> bool {
        let (d, z) = &self.proof;
        let a1 = mul_base(z) - verification_key * d;
        let a2 = aggregate_r * z - self.point * d;

        let mut hasher = Hasher::new();
        let mut buf = [0u8; 64];
        *d == partial_challenge(
            &mut hasher,
            &mut buf,
            verification_key,
            aggregate_r,
            &self.point,
            &a1,
            &a2,
        )
    }
}

/// `share * R`
pub fn contribute_partial(key_share: &KeyShare, aggregate: &AggregateBallot) -> RistrettoPoint {
    key_share.share() * aggregate.r
}

/// A committee member with finished key material. Contributes one partial per round.
pub struct Trustee {
    key_material: KeyMaterial,
    contributed: BTreeSet<u64>,
}

impl Trustee {
    pub fn new(key_material: KeyMaterial) -> Self {
        Self {
            key_material,
            contributed: BTreeSet::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.key_material.key_share.index
    }

    pub fn key_material(&self) -> &KeyMaterial {
        &self.key_material
    }

    pub fn contribute_partial<R>(
        &mut self,
        rng: &mut R,
        round: u64,
        aggregate: &AggregateBallot,
    ) -> Result<PartialDecryption, Error>
    where
        R: CryptoRng + RngCore,
    {
        if self.contributed.contains(&round) {
            return Err(RoundAlreadyCompleted("partial decryption", round, self.index()).into());
        }

        let key_share = &self.key_material.key_share;
        let point = contribute_partial(key_share, aggregate);

        let mut k = random_scalar(rng);
        let a1 = mul_base(&k);
        let a2 = k * aggregate.r;

        let mut hasher = Hasher::new();
        let mut buf = [0u8; 64];
        let d = partial_challenge(
            &mut hasher,
            &mut buf,
            &key_share.verification_key(),
            &aggregate.r,
            &point,
            &a1,
            &a2,
        );
        let z = k + d * key_share.share();
        k.zeroize();

        self.contributed.insert(round);
        debug!(member = self.index(), round, "partial decryption contributed");

        Ok(PartialDecryption {
            index: self.index(),
            round,
            point,
            proof: (d, z),
        })
    }
}

/// Recovers the per-slot totals from at least `t` partial decryptions of `aggregate`.
///
/// The partials must already be verified: an unverified one silently corrupts `D`, which
/// at best surfaces as `TallyOutOfRange`.
pub fn finalize(
    aggregate: &AggregateBallot,
    partials: &BTreeMap<usize, RistrettoPoint>,
    t: usize,
    total_weight: u64,
) -> Result<TallyResult, Error> {
    let d = combine_exponent(partials, t)?;
    let table = DiscreteLogTable::new(total_weight);

    let mut totals = [0u64; SLOTS];
    for (slot, m) in aggregate.m.iter().enumerate() {
        totals[slot] = table
            .get(&(m - d))
            .ok_or_else(|| Error::from_kind(TallyOutOfRange(slot, total_weight)))?;
    }

    Ok(TallyResult {
        abstain: totals[Choice::Abstain.slot()],
        nay: totals[Choice::Nay.slot()],
        yay: totals[Choice::Yay.slot()],
    })
}

/// Running homomorphic sum of accepted ballots for one tally round.
#[derive(Clone, Debug, Default)]
pub struct TallyAggregator {
    aggregate: AggregateBallot,
    accepted: usize,
    total_weight: u64,
    result: Option<TallyResult>,
}

impl TallyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregate(&self) -> &AggregateBallot {
        &self.aggregate
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn result(&self) -> Option<TallyResult> {
        self.result
    }

    pub fn accept(&mut self, ballot: &VerifiedBallot) -> Result<(), Error> {
        if self.result.is_some() {
            return Err(InvalidState("tally open", "tally finalized".into()).into());
        }
        self.total_weight = self
            .total_weight
            .checked_add(ballot.weight())
            .ok_or_else(|| Error::from_kind(WeightOverflow("accepted ballot weights")))?;
        self.aggregate.add(ballot.ballot());
        self.accepted += 1;
        Ok(())
    }

    /// The first successful result is kept; later calls return it unchanged.
    pub fn finalize(
        &mut self,
        partials: &BTreeMap<usize, PartialDecryption>,
        t: usize,
    ) -> Result<TallyResult, Error> {
        if let Some(result) = self.result {
            return Ok(result);
        }

        let points = partials
            .iter()
            .map(|(index, partial)| (*index, partial.point))
            .collect();
        let result = finalize(&self.aggregate, &points, t, self.total_weight)?;

        info!(
            ballots = self.accepted,
            abstain = result.abstain,
            nay = result.nay,
            yay = result.yay,
            "tally finalized"
        );
        Ok(*self.result.insert(result))
    }
}
