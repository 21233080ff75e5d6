use std::collections::{BTreeMap, BTreeSet};

use curve25519_dalek::{RistrettoPoint, Scalar};
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use common::{
    error::{
        Error,
        ErrorKind::{InsufficientShares, InvalidState, RoundAlreadyCompleted, UninitializedValue},
    },
    secret_sharing::{Params, ShareCommitment, verify_share},
};

use crate::dealer::{Dealer, PrivateShare, Round1Broadcast};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DkgPhase {
    Init,
    Round1Published,
    Round2Verified,
    Ready,
}

/// Filed by `accuser` when `accused` sent no share, a malformed one, or one that fails
/// verification against its commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint {
    pub run_id: u64,
    pub accuser: usize,
    pub accused: usize,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyShare {
    pub index: usize,
    share: Scalar,
}

impl KeyShare {
    pub fn new(index: usize, share: Scalar) -> Self {
        Self { index, share }
    }

    pub fn share(&self) -> &Scalar {
        &self.share
    }

    pub fn verification_key(&self) -> RistrettoPoint {
        RistrettoPoint::mul_base(&self.share)
    }
}

impl std::fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyShare")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Everything a member holds once the DKG is `Ready`.
#[derive(Clone, Debug)]
pub struct KeyMaterial {
    pub params: Params,
    pub run_id: u64,
    pub key_share: KeyShare,
    pub joint_public_key: RistrettoPoint,
    /// `share_j * G` for every member `j`, derivable from the commitments alone.
    pub verification_keys: BTreeMap<usize, RistrettoPoint>,
    pub qualified: BTreeSet<usize>,
}

/// `sum_{i in qualified} C_i[0]`
pub fn joint_public_key(
    commitments: &BTreeMap<usize, ShareCommitment>,
    qualified: &BTreeSet<usize>,
) -> RistrettoPoint {
    qualified
        .iter()
        .filter_map(|dealer| commitments.get(dealer))
        .map(ShareCommitment::public_contribution)
        .sum()
}

/// `sum_{i in qualified} f_i(index) * G`
pub fn verification_key(
    index: usize,
    commitments: &BTreeMap<usize, ShareCommitment>,
    qualified: &BTreeSet<usize>,
) -> RistrettoPoint {
    qualified
        .par_iter()
        .filter_map(|dealer| commitments.get(dealer))
        .map(|commitment| commitment.evaluate_exponent(index))
        .sum()
}

/// Agreement on the accepted-dealer set: every dealer with an accepted commitment and
/// no complaint against it. All members derive the same set from the same ledger view.
pub fn qualified_dealers(
    params: Params,
    commitments: &BTreeMap<usize, ShareCommitment>,
    complaints: &[Complaint],
) -> Result<BTreeSet<usize>, Error> {
    let accused: BTreeSet<usize> = complaints.iter().map(|c| c.accused).collect();

    let qualified: BTreeSet<usize> = commitments
        .keys()
        .filter(|dealer| !accused.contains(dealer))
        .copied()
        .collect();

    if qualified.len() < params.t {
        Err(InsufficientShares(qualified.len(), params.t).into())
    } else {
        Ok(qualified)
    }
}

/// One committee member's view of a DKG run: `Init -> Round1Published -> Round2Verified -> Ready`.
pub struct DkgState {
    pub params: Params,
    pub index: usize,
    pub run_id: u64,
    phase: DkgPhase,
    commitments: BTreeMap<usize, ShareCommitment>,
    validated_shares: BTreeMap<usize, Scalar>,
    complaints: Vec<Complaint>,
    key_material: Option<KeyMaterial>,
}

impl DkgState {
    pub fn new(params: Params, index: usize, run_id: u64) -> Result<Self, Error> {
        params.check_index(index)?;

        Ok(Self {
            params,
            index,
            run_id,
            phase: DkgPhase::Init,
            commitments: BTreeMap::new(),
            validated_shares: BTreeMap::new(),
            complaints: vec![],
            key_material: None,
        })
    }

    pub fn phase(&self) -> DkgPhase {
        self.phase
    }

    pub fn complaints(&self) -> &[Complaint] {
        &self.complaints
    }

    pub fn key_material(&self) -> Option<&KeyMaterial> {
        self.key_material.as_ref()
    }

    fn enter(&mut self, round: &'static str, from: DkgPhase, to: DkgPhase) -> Result<(), Error> {
        if self.phase >= to {
            Err(RoundAlreadyCompleted(round, self.run_id, self.index).into())
        } else if self.phase != from {
            Err(InvalidState(round, format!("{:?}", self.phase)).into())
        } else {
            Ok(())
        }
    }

    /// Samples this member's polynomial and returns the broadcast plus one private share
    /// per member (its own included). The polynomial is dropped, and wiped, on return.
    pub fn round1<R>(&mut self, rng: &mut R) -> Result<(Round1Broadcast, Vec<PrivateShare>), Error>
    where
        R: CryptoRng + RngCore,
    {
        self.enter("round1", DkgPhase::Init, DkgPhase::Round1Published)?;

        let dealer = Dealer::new(rng, self.params, self.index, self.run_id)?;
        let out = (dealer.broadcast(), dealer.deal());

        self.phase = DkgPhase::Round1Published;
        debug!(member = self.index, run_id = self.run_id, "round 1 published");
        Ok(out)
    }

    /// Verifies the share received from every dealer whose commitment was accepted.
    /// Dealers that fail are excluded locally and returned as complaints to publish.
    pub fn round2(
        &mut self,
        commitments: &BTreeMap<usize, ShareCommitment>,
        shares: &[PrivateShare],
    ) -> Result<Vec<Complaint>, Error> {
        self.enter("round2", DkgPhase::Round1Published, DkgPhase::Round2Verified)?;

        let mut received: BTreeMap<usize, Vec<&PrivateShare>> = BTreeMap::new();
        shares
            .iter()
            .filter(|s| s.recipient == self.index && s.run_id == self.run_id)
            .for_each(|s| received.entry(s.dealer).or_default().push(s));

        let mut complaints = vec![];
        for (dealer, commitment) in commitments {
            let valid = match received.get(dealer).map(Vec::as_slice) {
                Some([share]) => {
                    commitment.len() == self.params.t
                        && verify_share(self.index, &share.share, commitment)
                }
                // missing, or conflicting shares from the same dealer
                _ => false,
            };

            if valid {
                if let Some([share]) = received.get(dealer).map(Vec::as_slice) {
                    self.validated_shares.insert(*dealer, share.share);
                }
            } else {
                warn!(
                    member = self.index,
                    dealer,
                    run_id = self.run_id,
                    "share failed verification, excluding dealer"
                );
                complaints.push(Complaint {
                    run_id: self.run_id,
                    accuser: self.index,
                    accused: *dealer,
                });
            }
        }

        self.commitments = commitments.clone();
        self.complaints = complaints.clone();
        self.phase = DkgPhase::Round2Verified;
        debug!(
            member = self.index,
            run_id = self.run_id,
            validated = self.validated_shares.len(),
            complaints = complaints.len(),
            "round 2 verified"
        );
        Ok(complaints)
    }

    /// Sums the shares of the agreed dealer set into this member's key share.
    pub fn finalize(&mut self, qualified: &BTreeSet<usize>) -> Result<&KeyMaterial, Error> {
        self.enter("finalize", DkgPhase::Round2Verified, DkgPhase::Ready)?;

        if qualified.len() < self.params.t {
            return Err(InsufficientShares(qualified.len(), self.params.t).into());
        }

        let mut share = Scalar::ZERO;
        for dealer in qualified {
            if !self.commitments.contains_key(dealer) {
                return Err(UninitializedValue("dkg.commitments[qualified dealer]").into());
            }
            match self.validated_shares.get(dealer) {
                Some(s) => share += s,
                None => {
                    return Err(InvalidState(
                        "verified share from every qualified dealer",
                        format!("no verified share from dealer {dealer}"),
                    )
                    .into());
                }
            }
        }

        let verification_keys = (1..=self.params.n)
            .map(|j| (j, verification_key(j, &self.commitments, qualified)))
            .collect();

        let key_material = KeyMaterial {
            params: self.params,
            run_id: self.run_id,
            key_share: KeyShare::new(self.index, share),
            joint_public_key: joint_public_key(&self.commitments, qualified),
            verification_keys,
            qualified: qualified.clone(),
        };
        share.zeroize();
        self.validated_shares.values_mut().for_each(Zeroize::zeroize);
        self.validated_shares.clear();

        self.phase = DkgPhase::Ready;
        info!(
            member = self.index,
            run_id = self.run_id,
            qualified = ?key_material.qualified,
            "dkg ready"
        );
        Ok(self.key_material.insert(key_material))
    }
}
