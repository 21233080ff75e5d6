//! The shared bulletin board every party coordinates through.
//!
//! [`Ledger`] is the contract the protocol needs from it; [`InMemoryLedger`] is a
//! process-local implementation that enforces the same rules an on-chain contract would.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use curve25519_dalek::{RistrettoPoint, ristretto::CompressedRistretto};
use tracing::{debug, error, info, warn};

use common::{
    error::{
        Error,
        ErrorKind::{
            DuplicateSubmission, InvalidProof, InvalidState, RandomnessReuse, UninitializedValue,
            UnknownVoter, WeightOverflow,
        },
    },
    secret_sharing::{Params, ShareCommitment},
};
use dkg::{Complaint, Round1Broadcast, joint_public_key, qualified_dealers, verification_key};

use crate::{
    ballot::PublicSignals,
    proof::{Proof, ProofBackend, check_ballot},
    tally::{AggregateBallot, PartialDecryption, TallyAggregator, TallyResult},
};

pub trait Ledger: Send + Sync {
    fn params(&self) -> Params;

    fn run_id(&self) -> u64;

    /// Registered voter indices.
    fn voters(&self) -> Vec<usize>;

    fn submit_share_commitment(&self, broadcast: &Round1Broadcast) -> Result<(), Error>;

    fn get_share_commitments(&self) -> BTreeMap<usize, ShareCommitment>;

    /// Stops accepting commitments and returns the final set members verify against.
    fn close_round1(&self) -> BTreeMap<usize, ShareCommitment>;

    /// Only accepted once round 1 is closed.
    fn submit_complaint(&self, complaint: &Complaint) -> Result<(), Error>;

    /// Closes the DKG on first call. Every later call returns the same set. Drawn only from
    /// the commitments accepted before round 1 closed.
    fn qualified_dealers(&self) -> Result<BTreeSet<usize>, Error>;

    fn joint_public_key(&self) -> Result<RistrettoPoint, Error>;

    fn voter_weight(&self, voter: usize) -> Result<u64, Error>;

    /// Verifies the ballot against the voter's registered weight before adding it.
    fn submit_vote(&self, voter: usize, signals: &PublicSignals, proof: &Proof)
    -> Result<(), Error>;

    fn get_aggregate(&self) -> AggregateBallot;

    /// The first partial closes voting.
    fn submit_partial_decryption(&self, partial: &PartialDecryption) -> Result<(), Error>;

    fn get_partials(&self) -> BTreeMap<usize, PartialDecryption>;

    /// `InsufficientShares` until `t` valid partials are in.
    fn get_totals(&self) -> Result<TallyResult, Error>;
}

#[derive(Default)]
struct Board {
    commitments: BTreeMap<usize, ShareCommitment>,
    round1_closed: bool,
    complaints: Vec<Complaint>,
    qualified: Option<BTreeSet<usize>>,
    joint_public_key: Option<RistrettoPoint>,
    verification_keys: BTreeMap<usize, RistrettoPoint>,
    voted: BTreeSet<usize>,
    randomness: HashSet<CompressedRistretto>,
    tally: TallyAggregator,
    partials: BTreeMap<usize, PartialDecryption>,
}

impl Board {
    fn check_vote(&self, voter: usize, signals: &PublicSignals) -> Result<(), Error> {
        if !self.partials.is_empty() {
            return Err(InvalidState("voting open", "tally started".into()).into());
        }
        if self.voted.contains(&voter) {
            warn!(voter, "second vote rejected");
            return Err(DuplicateSubmission("vote", voter).into());
        }
        if self.randomness.contains(&signals.r) {
            warn!(voter, "ballot randomness reused");
            return Err(RandomnessReuse(format!("{:?}", signals.r)).into());
        }
        Ok(())
    }
}

pub struct InMemoryLedger<B: ProofBackend> {
    params: Params,
    run_id: u64,
    weights: BTreeMap<usize, u64>,
    backend: B,
    board: Mutex<Board>,
}

impl<B: ProofBackend> InMemoryLedger<B> {
    /// Voter `i` is registered with `voting_weights[i]`.
    pub fn new(params: Params, run_id: u64, voting_weights: &[u64], backend: B) -> Self {
        Self {
            params,
            run_id,
            weights: voting_weights.iter().copied().enumerate().collect(),
            backend,
            board: Mutex::new(Board::default()),
        }
    }

    pub fn total_weight(&self) -> Result<u64, Error> {
        self.weights
            .values()
            .try_fold(0u64, |acc, w| acc.checked_add(*w))
            .ok_or_else(|| WeightOverflow("registered voting weights").into())
    }

    fn board(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_run(&self, kind: &'static str, run_id: u64) -> Result<(), Error> {
        if run_id == self.run_id {
            Ok(())
        } else {
            let found = format!("run {run_id}, ledger is on run {}", self.run_id);
            Err(InvalidState(kind, found).into())
        }
    }
}

impl<B: ProofBackend> Ledger for InMemoryLedger<B> {
    fn params(&self) -> Params {
        self.params
    }

    fn run_id(&self) -> u64 {
        self.run_id
    }

    fn voters(&self) -> Vec<usize> {
        self.weights.keys().copied().collect()
    }

    fn submit_share_commitment(&self, broadcast: &Round1Broadcast) -> Result<(), Error> {
        self.check_run("share commitment for the current run", broadcast.run_id)?;
        self.params.check_index(broadcast.dealer)?;

        let mut board = self.board();
        if board.round1_closed {
            warn!(dealer = broadcast.dealer, "share commitment after round 1 closed");
            return Err(InvalidState("round 1 open", "round 1 closed".into()).into());
        }
        if board.commitments.contains_key(&broadcast.dealer) {
            warn!(dealer = broadcast.dealer, "duplicate share commitment rejected");
            return Err(DuplicateSubmission("share commitment", broadcast.dealer).into());
        }

        let commitment = ShareCommitment::from_compressed(self.params.t, &broadcast.commitment)
            .inspect_err(|e| warn!(dealer = broadcast.dealer, %e, "share commitment rejected"))?;
        board.commitments.insert(broadcast.dealer, commitment);
        debug!(dealer = broadcast.dealer, "share commitment accepted");
        Ok(())
    }

    fn get_share_commitments(&self) -> BTreeMap<usize, ShareCommitment> {
        self.board().commitments.clone()
    }

    fn close_round1(&self) -> BTreeMap<usize, ShareCommitment> {
        let mut board = self.board();
        if !board.round1_closed {
            board.round1_closed = true;
            info!(dealers = board.commitments.len(), "round 1 closed");
        }
        board.commitments.clone()
    }

    fn submit_complaint(&self, complaint: &Complaint) -> Result<(), Error> {
        self.check_run("complaint for the current run", complaint.run_id)?;
        self.params.check_index(complaint.accuser)?;
        self.params.check_index(complaint.accused)?;

        let mut board = self.board();
        if !board.round1_closed {
            return Err(InvalidState("round 1 closed", "round 1 open".into()).into());
        }
        if board.qualified.is_some() {
            return Err(InvalidState("dkg open", "dkg closed".into()).into());
        }
        if board.complaints.contains(complaint) {
            return Err(DuplicateSubmission("complaint", complaint.accuser).into());
        }

        warn!(
            accuser = complaint.accuser,
            accused = complaint.accused,
            "complaint recorded"
        );
        board.complaints.push(complaint.clone());
        Ok(())
    }

    fn qualified_dealers(&self) -> Result<BTreeSet<usize>, Error> {
        let mut board = self.board();
        if let Some(qualified) = &board.qualified {
            return Ok(qualified.clone());
        }
        if !board.round1_closed {
            return Err(InvalidState("round 1 closed", "round 1 open".into()).into());
        }

        let qualified = qualified_dealers(self.params, &board.commitments, &board.complaints)?;
        let public_key = joint_public_key(&board.commitments, &qualified);
        board.verification_keys = (1..=self.params.n)
            .map(|j| (j, verification_key(j, &board.commitments, &qualified)))
            .collect();
        board.joint_public_key = Some(public_key);
        board.qualified = Some(qualified.clone());

        info!(qualified = ?qualified, "dkg closed, joint public key published");
        Ok(qualified)
    }

    fn joint_public_key(&self) -> Result<RistrettoPoint, Error> {
        self.board()
            .joint_public_key
            .ok_or_else(|| UninitializedValue("ledger.joint_public_key").into())
    }

    fn voter_weight(&self, voter: usize) -> Result<u64, Error> {
        self.weights
            .get(&voter)
            .copied()
            .ok_or_else(|| UnknownVoter(voter).into())
    }

    fn submit_vote(
        &self,
        voter: usize,
        signals: &PublicSignals,
        proof: &Proof,
    ) -> Result<(), Error> {
        let weight = self.voter_weight(voter)?;
        let public_key = {
            let board = self.board();
            let public_key = board
                .joint_public_key
                .ok_or_else(|| Error::from_kind(UninitializedValue("ledger.joint_public_key")))?;
            board.check_vote(voter, signals)?;
            public_key
        };

        // proof checked without the lock held; board state is re-checked after
        let ballot = check_ballot(&self.backend, &public_key, signals, weight, proof)
            .inspect_err(|e| warn!(voter, %e, "ballot rejected"))?;

        let mut board = self.board();
        board.check_vote(voter, signals)?;
        board.tally.accept(&ballot)?;
        board.voted.insert(voter);
        board.randomness.insert(signals.r);

        debug!(voter, ballots = board.tally.accepted(), "vote accepted");
        Ok(())
    }

    fn get_aggregate(&self) -> AggregateBallot {
        *self.board().tally.aggregate()
    }

    fn submit_partial_decryption(&self, partial: &PartialDecryption) -> Result<(), Error> {
        self.check_run("partial decryption for the current round", partial.round)?;
        self.params.check_index(partial.index)?;

        let mut board = self.board();
        let verification_key = *board.verification_keys.get(&partial.index).ok_or_else(|| {
            Error::from_kind(UninitializedValue("ledger.verification_keys"))
        })?;
        if board.partials.contains_key(&partial.index) {
            warn!(member = partial.index, "second partial decryption rejected");
            return Err(DuplicateSubmission("partial decryption", partial.index).into());
        }
        if !partial.verify(&verification_key, board.tally.aggregate().r()) {
            warn!(member = partial.index, "partial decryption proof rejected");
            return Err(
                InvalidProof(format!("partial decryption from member {}", partial.index)).into(),
            );
        }

        if board.partials.is_empty() {
            info!(ballots = board.tally.accepted(), "voting closed");
        }
        board.partials.insert(partial.index, *partial);
        debug!(
            member = partial.index,
            received = board.partials.len(),
            "partial decryption accepted"
        );

        if board.partials.len() >= self.params.t && board.tally.result().is_none() {
            let Board { tally, partials, .. } = &mut *board;
            if let Err(e) = tally.finalize(partials, self.params.t) {
                error!(%e, "tally failed");
            }
        }
        Ok(())
    }

    fn get_partials(&self) -> BTreeMap<usize, PartialDecryption> {
        self.board().partials.clone()
    }

    fn get_totals(&self) -> Result<TallyResult, Error> {
        let mut board = self.board();
        let Board { tally, partials, .. } = &mut *board;
        tally.finalize(partials, self.params.t)
    }
}

#[cfg(test)]
mod test {
    use common::{
        error::{Error, ErrorKind},
        random::random_scalar,
        secret_sharing::Params,
    };
    use dkg::{Complaint, DkgState, KeyMaterial};

    use crate::{
        ballot::Choice,
        ledger::{InMemoryLedger, Ledger},
        proof::{Proof, ProofBackend, SigmaBackend},
        tally::Trustee,
    };

    /// Runs an honest DKG through the ledger.
    fn setup(
        n: usize,
        t: usize,
        weights: &[u64],
    ) -> (InMemoryLedger<SigmaBackend>, Vec<KeyMaterial>) {
        let mut rng = rand::rng();
        let params = Params::new(n, t).unwrap();
        let ledger = InMemoryLedger::new(params, 0, weights, SigmaBackend);

        let mut members: Vec<DkgState> =
            (1..=n).map(|i| DkgState::new(params, i, 0).unwrap()).collect();
        let mut shares = vec![];
        for member in members.iter_mut() {
            let (broadcast, private) = member.round1(&mut rng).unwrap();
            ledger.submit_share_commitment(&broadcast).unwrap();
            shares.extend(private);
        }

        let commitments = ledger.close_round1();
        for member in members.iter_mut() {
            assert!(member.round2(&commitments, &shares).unwrap().is_empty());
        }
        let qualified = ledger.qualified_dealers().unwrap();

        let keys = members
            .iter_mut()
            .map(|m| m.finalize(&qualified).unwrap().clone())
            .collect();
        (ledger, keys)
    }

    fn vote(
        ledger: &InMemoryLedger<SigmaBackend>,
        voter: usize,
        choice: Choice,
    ) -> Result<(), Error> {
        let mut rng = rand::rng();
        let pk = ledger.joint_public_key().unwrap();
        // unregistered voters still get a well-formed ballot to submit
        let weight = ledger.voter_weight(voter).unwrap_or(1);
        let r = random_scalar(&mut rng);
        let (ballot, proof) = SigmaBackend.prove(&mut rng, &pk, choice, weight, &r);
        ledger.submit_vote(voter, &ballot.public_signals(), &proof)
    }

    #[test]
    fn ledger_key_matches_members() {
        let (ledger, keys) = setup(3, 2, &[1]);
        let pk = ledger.joint_public_key().unwrap();
        for key in &keys {
            assert_eq!(key.joint_public_key, pk);
        }
        assert_eq!(ledger.qualified_dealers().unwrap(), keys[0].qualified);
    }

    #[test]
    fn second_vote_leaves_aggregate_unchanged() {
        let (ledger, _) = setup(3, 2, &[1, 2, 3]);
        vote(&ledger, 0, Choice::Yay).unwrap();
        let before = ledger.get_aggregate();

        let err = vote(&ledger, 0, Choice::Nay).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateSubmission("vote", 0)));
        assert_eq!(ledger.get_aggregate(), before);
    }

    #[test]
    fn bad_ballots_are_dropped() {
        let (ledger, _) = setup(3, 2, &[1, 2, 3]);
        let mut rng = rand::rng();
        let pk = ledger.joint_public_key().unwrap();

        let err = vote(&ledger, 7, Choice::Yay).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownVoter(7)));

        // proven for a weight the voter does not hold
        let r = random_scalar(&mut rng);
        let (ballot, proof) = SigmaBackend.prove(&mut rng, &pk, Choice::Yay, 5, &r);
        let err = ledger
            .submit_vote(0, &ballot.public_signals(), &proof)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidProof(_)));

        let err = ledger
            .submit_vote(0, &ballot.public_signals(), &Proof(vec![0; 3]))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidProof(_)));
        assert_eq!(ledger.get_aggregate(), Default::default());

        // the rejected voter can still vote properly
        vote(&ledger, 0, Choice::Nay).unwrap();

        // same blinding factor from another voter
        let r = random_scalar(&mut rng);
        let (ballot, proof) = SigmaBackend.prove(&mut rng, &pk, Choice::Yay, 2, &r);
        ledger.submit_vote(1, &ballot.public_signals(), &proof).unwrap();
        let (ballot, proof) = SigmaBackend.prove(&mut rng, &pk, Choice::Nay, 3, &r);
        let err = ledger
            .submit_vote(2, &ballot.public_signals(), &proof)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RandomnessReuse(_)));
        vote(&ledger, 2, Choice::Nay).unwrap();
    }

    #[test]
    fn totals_appear_at_threshold() {
        let (ledger, keys) = setup(3, 2, &[1, 2, 3]);
        for (voter, choice) in [(0, Choice::Yay), (1, Choice::Nay), (2, Choice::Abstain)] {
            vote(&ledger, voter, choice).unwrap();
        }

        let mut rng = rand::rng();
        let mut trustees: Vec<Trustee> = keys.into_iter().map(Trustee::new).collect();
        let aggregate = ledger.get_aggregate();

        let err = ledger.get_totals().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InsufficientShares(0, 2)));

        let first = trustees[2].contribute_partial(&mut rng, 0, &aggregate).unwrap();
        ledger.submit_partial_decryption(&first).unwrap();
        assert!(ledger.get_totals().unwrap_err().kind().is_retryable());

        // voting is closed once tallying starts
        let err = vote(&ledger, 0, Choice::Yay).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidState(..)));

        let err = ledger.submit_partial_decryption(&first).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateSubmission(_, 3)));

        // a partial that does not match the member's verification key
        let mut forged = trustees[0].contribute_partial(&mut rng, 0, &aggregate).unwrap();
        forged.point = first.point;
        let err = ledger.submit_partial_decryption(&forged).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidProof(_)));

        let second = trustees[1].contribute_partial(&mut rng, 0, &aggregate).unwrap();
        ledger.submit_partial_decryption(&second).unwrap();

        let totals = ledger.get_totals().unwrap();
        assert_eq!((totals.abstain, totals.nay, totals.yay), (3, 2, 1));
        assert_eq!(ledger.get_partials().keys().copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn dkg_closes_once() {
        let (ledger, _) = setup(2, 1, &[]);
        let complaint = Complaint {
            run_id: 0,
            accuser: 1,
            accused: 2,
        };
        let err = ledger.submit_complaint(&complaint).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidState(..)));

        let params = Params::new(2, 1).unwrap();
        let ledger = InMemoryLedger::new(params, 4, &[], SigmaBackend);
        assert!(ledger.joint_public_key().is_err());

        let mut member = DkgState::new(params, 1, 3).unwrap();
        let (stale, _) = member.round1(&mut rand::rng()).unwrap();
        let err = ledger.submit_share_commitment(&stale).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidState(..)));
    }

    #[test]
    fn late_commitment_is_shut_out() {
        let mut rng = rand::rng();
        let params = Params::new(3, 2).unwrap();
        let ledger = InMemoryLedger::new(params, 0, &[1], SigmaBackend);

        let mut members: Vec<DkgState> =
            (1..=3).map(|i| DkgState::new(params, i, 0).unwrap()).collect();
        let mut broadcasts = vec![];
        let mut shares = vec![];
        for member in members.iter_mut() {
            let (broadcast, private) = member.round1(&mut rng).unwrap();
            broadcasts.push(broadcast);
            shares.extend(private);
        }

        // dealer 3 is too slow
        ledger.submit_share_commitment(&broadcasts[0]).unwrap();
        ledger.submit_share_commitment(&broadcasts[1]).unwrap();
        let err = ledger.qualified_dealers().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidState(..)));

        let commitments = ledger.close_round1();
        assert_eq!(commitments.len(), 2);
        for member in members.iter_mut() {
            assert!(member.round2(&commitments, &shares).unwrap().is_empty());
        }

        let err = ledger.submit_share_commitment(&broadcasts[2]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidState(..)));
        assert_eq!(ledger.close_round1().len(), 2);

        let qualified = ledger.qualified_dealers().unwrap();
        assert_eq!(qualified, [1, 2].into());

        let pk = ledger.joint_public_key().unwrap();
        for member in members.iter_mut() {
            assert_eq!(member.finalize(&qualified).unwrap().joint_public_key, pk);
        }
        vote(&ledger, 0, Choice::Yay).unwrap();
    }

    #[test]
    fn complaints_wait_for_round1() {
        let params = Params::new(2, 1).unwrap();
        let ledger = InMemoryLedger::new(params, 0, &[], SigmaBackend);
        let complaint = Complaint {
            run_id: 0,
            accuser: 1,
            accused: 2,
        };

        let err = ledger.submit_complaint(&complaint).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidState(..)));

        ledger.close_round1();
        ledger.submit_complaint(&complaint).unwrap();
        let err = ledger.submit_complaint(&complaint).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateSubmission("complaint", 1)));
    }

    #[test]
    fn registered_weight_overflow() {
        let params = Params::new(1, 1).unwrap();
        let ledger = InMemoryLedger::new(params, 0, &[u64::MAX, 1], SigmaBackend);
        let err = ledger.total_weight().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::WeightOverflow(_)));

        let ledger = InMemoryLedger::new(params, 0, &[2, 5], SigmaBackend);
        assert_eq!(ledger.total_weight().unwrap(), 7);
    }

    #[test]
    fn concurrent_votes_from_one_voter() {
        use rayon::prelude::*;

        let (ledger, _) = setup(3, 2, &[4, 1]);
        let pk = ledger.joint_public_key().unwrap();

        let accepted = Choice::ALL
            .par_iter()
            .chain(Choice::ALL.par_iter())
            .map_init(rand::rng, |rng, choice| {
                let r = random_scalar(rng);
                let (ballot, proof) = SigmaBackend.prove(rng, &pk, *choice, 4, &r);
                ledger.submit_vote(0, &ballot.public_signals(), &proof)
            })
            .filter(Result::is_ok)
            .count();
        assert_eq!(accepted, 1);

        vote(&ledger, 1, Choice::Nay).unwrap();
        assert_eq!(
            ledger.board().tally.total_weight(),
            5,
            "exactly one ballot per voter"
        );
    }
}
