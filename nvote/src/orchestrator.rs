use curve25519_dalek::RistrettoPoint;
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use tracing::{info, warn};
use zeroize::Zeroize;

use common::{
    error::{Error, ErrorKind::InvalidParameterSet},
    random::random_scalar,
    secret_sharing::Params,
};
use dkg::{DkgState, PrivateShare};

use crate::{
    ballot::Choice,
    config::ElectionConfig,
    ledger::{InMemoryLedger, Ledger},
    proof::{ProofBackend, SigmaBackend},
    retry::{classify, retry_with_backoff},
    tally::{TallyResult, Trustee},
};

/// Voter `i` picks Yay, Nay, Abstain by `i % 3`.
pub fn rotating_choices(voters: usize) -> Vec<(usize, Choice)> {
    (0..voters)
        .map(|i| {
            let choice = match i % 3 {
                0 => Choice::Yay,
                1 => Choice::Nay,
                _ => Choice::Abstain,
            };
            (i, choice)
        })
        .collect()
}

/// Drives one election end to end: DKG, voting, threshold decryption, polling.
///
/// Every committee member and voter talks to the others only through the ledger; the
/// election just runs their steps in order within one process.
pub struct Election<L, B> {
    config: ElectionConfig,
    params: Params,
    ledger: L,
    backend: B,
    trustees: Vec<Trustee>,
}

impl Election<InMemoryLedger<SigmaBackend>, SigmaBackend> {
    pub fn in_memory(config: ElectionConfig) -> Result<Self, Error> {
        let params = config.params()?;
        let ledger =
            InMemoryLedger::new(params, config.run_id, &config.voting_weights, SigmaBackend);
        Self::new(config, ledger, SigmaBackend)
    }
}

impl<L: Ledger, B: ProofBackend> Election<L, B> {
    pub fn new(config: ElectionConfig, ledger: L, backend: B) -> Result<Self, Error> {
        let params = config.params()?;
        if ledger.params() != params {
            let Params { n, t } = ledger.params();
            return Err(InvalidParameterSet(n, t, 0).into());
        }

        Ok(Self {
            config,
            params,
            ledger,
            backend,
            trustees: vec![],
        })
    }

    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn trustees(&self) -> &[Trustee] {
        &self.trustees
    }

    pub fn run_dkg<R>(&mut self, rng: &mut R) -> Result<RistrettoPoint, Error>
    where
        R: CryptoRng + RngCore,
    {
        self.run_dkg_with(rng, |_| {})
    }

    /// Runs both DKG rounds for every member. `channel` sees each private share in
    /// transit and may alter it.
    pub fn run_dkg_with<R, F>(
        &mut self,
        rng: &mut R,
        mut channel: F,
    ) -> Result<RistrettoPoint, Error>
    where
        R: CryptoRng + RngCore,
        F: FnMut(&mut PrivateShare),
    {
        let run_id = self.ledger.run_id();
        let mut members = (1..=self.params.n)
            .map(|i| DkgState::new(self.params, i, run_id))
            .collect::<Result<Vec<_>, Error>>()?;

        let mut in_transit = vec![];
        for member in members.iter_mut() {
            let (broadcast, shares) = member.round1(rng)?;
            self.ledger.submit_share_commitment(&broadcast)?;
            in_transit.extend(shares);
        }
        in_transit.iter_mut().for_each(&mut channel);

        let commitments = self.ledger.close_round1();
        for member in members.iter_mut() {
            for complaint in member.round2(&commitments, &in_transit)? {
                self.ledger.submit_complaint(&complaint)?;
            }
        }

        let qualified = self.ledger.qualified_dealers()?;
        self.trustees = members
            .iter_mut()
            .map(|member| member.finalize(&qualified).map(|km| Trustee::new(km.clone())))
            .collect::<Result<_, Error>>()?;

        self.ledger.joint_public_key()
    }

    pub fn cast_vote<R>(&self, rng: &mut R, voter: usize, choice: Choice) -> Result<(), Error>
    where
        R: CryptoRng + RngCore,
    {
        let joint_public_key = self.ledger.joint_public_key()?;
        let weight = self.ledger.voter_weight(voter)?;

        let mut r = random_scalar(rng);
        let (ballot, proof) = self
            .backend
            .prove(rng, &joint_public_key, choice, weight, &r);
        r.zeroize();

        self.ledger
            .submit_vote(voter, &ballot.public_signals(), &proof)
    }

    /// Encodes, proves and submits every ballot in parallel. Rejected ballots are logged and
    /// dropped; returns how many were accepted.
    pub fn cast_votes(&self, votes: &[(usize, Choice)]) -> usize {
        let accepted = votes
            .par_iter()
            .map_init(rand::rng, |rng, (voter, choice)| {
                self.cast_vote(rng, *voter, *choice)
                    .inspect_err(|e| warn!(voter, %e, "vote not counted"))
                    .is_ok()
            })
            .filter(|ok| *ok)
            .count();

        info!(accepted, submitted = votes.len(), "voting done");
        accepted
    }

    /// Has each listed member publish its partial decryption of the current aggregate.
    pub fn tally<R>(&mut self, rng: &mut R, members: &[usize]) -> Result<(), Error>
    where
        R: CryptoRng + RngCore,
    {
        let run_id = self.ledger.run_id();
        let aggregate = self.ledger.get_aggregate();

        for trustee in self
            .trustees
            .iter_mut()
            .filter(|trustee| members.contains(&trustee.index()))
        {
            let partial = trustee.contribute_partial(rng, run_id, &aggregate)?;
            self.ledger.submit_partial_decryption(&partial)?;
        }
        Ok(())
    }

    /// Polls the ledger until the totals are in.
    pub fn await_totals(&self) -> Result<TallyResult, Error> {
        retry_with_backoff(&self.config.retry, || {
            self.ledger.get_totals().map_err(classify)
        })
    }

    pub fn run<R>(&mut self, rng: &mut R, votes: &[(usize, Choice)]) -> Result<TallyResult, Error>
    where
        R: CryptoRng + RngCore,
    {
        self.run_dkg(rng)?;
        self.cast_votes(votes);

        let members: Vec<usize> = (1..=self.params.n).collect();
        self.tally(rng, &members)?;
        self.await_totals()
    }
}
