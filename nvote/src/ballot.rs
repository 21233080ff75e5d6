use std::collections::HashSet;

use curve25519_dalek::{RistrettoPoint, Scalar, ristretto::CompressedRistretto};
use serde::{Deserialize, Serialize};

use common::{
    curve::{POINT_BYTES, batch_decompress_ristretto_points, decode, mul_base},
    error::{
        Error,
        ErrorKind::{CountMismatch, RandomnessReuse},
    },
};

pub const SLOTS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    Abstain = 0,
    Nay = 1,
    Yay = 2,
}

impl Choice {
    pub const ALL: [Choice; SLOTS] = [Choice::Abstain, Choice::Nay, Choice::Yay];

    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn from_slot(slot: usize) -> Option<Self> {
        Self::ALL.get(slot).copied()
    }
}

/// ElGamal-style ballot: `R = r * G` and one ciphertext per choice, all masked by `r * PK`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ballot {
    pub r: RistrettoPoint,
    pub m: [RistrettoPoint; SLOTS],
}

impl Ballot {
    pub fn public_signals(&self) -> PublicSignals {
        PublicSignals {
            r: self.r.compress(),
            m: self.m.map(|m| m.compress()),
        }
    }
}

/// Wire form of a ballot, laid out as `R, M[0], M[1], M[2]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicSignals {
    pub r: CompressedRistretto,
    pub m: [CompressedRistretto; SLOTS],
}

impl PublicSignals {
    pub const LEN: usize = SLOTS + 1;

    pub fn to_vec(&self) -> Vec<CompressedRistretto> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.push(self.r);
        out.extend_from_slice(&self.m);
        out
    }

    pub fn from_slice(signals: &[CompressedRistretto]) -> Result<Self, Error> {
        match signals {
            [r, m0, m1, m2] => Ok(Self {
                r: *r,
                m: [*m0, *m1, *m2],
            }),
            _ => Err(CountMismatch(Self::LEN, "public signals", signals.len(), "points").into()),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_vec()
            .iter()
            .flat_map(|p| p.to_bytes())
            .collect()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != Self::LEN * POINT_BYTES {
            return Err(CountMismatch(
                Self::LEN * POINT_BYTES,
                "bytes expected",
                bytes.len(),
                "bytes given",
            )
            .into());
        }
        let points = bytes
            .chunks_exact(POINT_BYTES)
            .map(|chunk| decode(chunk).map(|p| p.compress()))
            .collect::<Result<Vec<_>, Error>>()?;
        Self::from_slice(&points)
    }

    /// Rejects anything that is not a valid group element.
    pub fn decode(&self) -> Result<Ballot, Error> {
        let points = batch_decompress_ristretto_points(&self.to_vec())?;
        Ok(Ballot {
            r: points[0],
            m: [points[1], points[2], points[3]],
        })
    }
}

/// `R = r * G`, `M[s] = r * PK + [s == choice] * weight * G`.
pub fn encode(
    joint_public_key: &RistrettoPoint,
    choice: Choice,
    weight: u64,
    r: &Scalar,
) -> Ballot {
    let mask = r * joint_public_key;
    let vote = mask + mul_base(&Scalar::from(weight));

    let mut m = [mask; SLOTS];
    m[choice.slot()] = vote;

    Ballot {
        r: mul_base(r),
        m,
    }
}

/// Encodes ballots under one key and refuses a blinding factor it has already used.
pub struct BallotEncoder {
    joint_public_key: RistrettoPoint,
    used: HashSet<CompressedRistretto>,
}

impl BallotEncoder {
    pub fn new(joint_public_key: RistrettoPoint) -> Self {
        Self {
            joint_public_key,
            used: HashSet::new(),
        }
    }

    pub fn joint_public_key(&self) -> &RistrettoPoint {
        &self.joint_public_key
    }

    pub fn encode(&mut self, choice: Choice, weight: u64, r: &Scalar) -> Result<Ballot, Error> {
        let ballot = encode(&self.joint_public_key, choice, weight, r);
        let r_point = ballot.r.compress();

        if self.used.insert(r_point) {
            Ok(ballot)
        } else {
            Err(RandomnessReuse(format!("{r_point:?}")).into())
        }
    }
}

#[cfg(test)]
mod test {
    use curve25519_dalek::{RistrettoPoint, Scalar};

    use common::{error::ErrorKind, random::random_scalar};

    use crate::ballot::{BallotEncoder, Choice, PublicSignals, encode};

    #[test]
    fn one_hot_layout() {
        let mut rng = rand::rng();
        let sk = random_scalar(&mut rng);
        let pk = RistrettoPoint::mul_base(&sk);
        let r = random_scalar(&mut rng);

        for choice in Choice::ALL {
            let ballot = encode(&pk, choice, 5, &r);
            assert_eq!(ballot.r, RistrettoPoint::mul_base(&r));

            for slot in 0..3 {
                // decrypting with the full key leaves only the weight in the chosen slot
                let plain = ballot.m[slot] - sk * ballot.r;
                let expected = if slot == choice.slot() { 5u64 } else { 0 };
                assert_eq!(plain, RistrettoPoint::mul_base(&Scalar::from(expected)));
            }
        }
    }

    #[test]
    fn randomness_reuse_is_detected() {
        let mut rng = rand::rng();
        let pk = RistrettoPoint::mul_base(&random_scalar(&mut rng));
        let mut encoder = BallotEncoder::new(pk);
        let r = random_scalar(&mut rng);

        encoder.encode(Choice::Yay, 1, &r).unwrap();
        let err = encoder.encode(Choice::Nay, 2, &r).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RandomnessReuse(_)));

        encoder
            .encode(Choice::Nay, 2, &random_scalar(&mut rng))
            .unwrap();
    }

    #[test]
    fn public_signals_layout() {
        let mut rng = rand::rng();
        let pk = RistrettoPoint::mul_base(&random_scalar(&mut rng));
        let ballot = encode(&pk, Choice::Nay, 3, &random_scalar(&mut rng));
        let signals = ballot.public_signals();

        let flat = signals.to_vec();
        assert_eq!(flat[0], ballot.r.compress());
        assert_eq!(flat[2], ballot.m[1].compress());
        assert_eq!(PublicSignals::from_slice(&flat).unwrap(), signals);
        assert_eq!(PublicSignals::from_bytes(&signals.to_bytes()).unwrap(), signals);
        assert_eq!(signals.decode().unwrap(), ballot);

        let err = PublicSignals::from_slice(&flat[..3]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CountMismatch(..)));
    }

    #[test]
    fn invalid_points_are_rejected() {
        let mut rng = rand::rng();
        let pk = RistrettoPoint::mul_base(&random_scalar(&mut rng));
        let mut bytes = encode(&pk, Choice::Yay, 1, &random_scalar(&mut rng))
            .public_signals()
            .to_bytes();
        bytes[32..64].copy_from_slice(&[0xff; 32]);

        let err = PublicSignals::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::PointNotOnCurve(_)));
    }

    #[test]
    fn choice_slots() {
        assert_eq!(Choice::from_slot(2), Some(Choice::Yay));
        assert_eq!(Choice::from_slot(3), None);
        assert_eq!(Choice::Abstain.slot(), 0);
    }
}
