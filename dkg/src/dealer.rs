use curve25519_dalek::{Scalar, ristretto::CompressedRistretto};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use common::{
    error::Error,
    polynomial::Polynomial,
    secret_sharing::{Params, ShareCommitment, evaluate_all, generate},
};

/// Round 1 publication: the dealer's Feldman commitment, never the polynomial.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round1Broadcast {
    pub dealer: usize,
    pub run_id: u64,
    pub commitment: Vec<CompressedRistretto>,
}

/// `f_dealer(recipient)`, delivered over a private channel.
#[derive(Clone, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
pub struct PrivateShare {
    pub dealer: usize,
    pub recipient: usize,
    pub run_id: u64,
    pub share: Scalar,
}

impl std::fmt::Debug for PrivateShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateShare")
            .field("dealer", &self.dealer)
            .field("recipient", &self.recipient)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

pub struct Dealer {
    pub index: usize,
    pub run_id: u64,
    pub params: Params,
    polynomial: Polynomial,
    commitment: ShareCommitment,
}

impl Dealer {
    /// Samples a fresh polynomial; every run gets its own.
    pub fn new<R>(rng: &mut R, params: Params, index: usize, run_id: u64) -> Result<Self, Error>
    where
        R: CryptoRng + RngCore,
    {
        params.check_index(index)?;
        let (polynomial, commitment) = generate(rng, params);

        Ok(Self {
            index,
            run_id,
            params,
            polynomial,
            commitment,
        })
    }

    pub fn t(&self) -> usize {
        self.params.t
    }

    pub fn commitment(&self) -> &ShareCommitment {
        &self.commitment
    }

    pub fn broadcast(&self) -> Round1Broadcast {
        Round1Broadcast {
            dealer: self.index,
            run_id: self.run_id,
            commitment: self.commitment.compress(),
        }
    }

    /// One share per party `1..=n`, the dealer's own included.
    pub fn deal(&self) -> Vec<PrivateShare> {
        evaluate_all(&self.polynomial, self.params.n)
            .into_iter()
            .enumerate()
            .map(|(i, share)| PrivateShare {
                dealer: self.index,
                recipient: i + 1,
                run_id: self.run_id,
                share,
            })
            .collect()
    }
}
