//! Anonymous weighted voting with a threshold-decrypted tally.
//!
//! A committee runs the DKG from the `dkg` crate to agree on a joint public key. Each
//! voter encrypts a one-hot ballot under it ([`ballot`]) and proves it well formed
//! ([`proof`]); the [`ledger`] verifies and sums ballots homomorphically. Any `t`
//! committee members then publish proven partial decryptions of the sum, from which the
//! per-choice totals are recovered ([`tally`]). No single ballot is ever decrypted.

pub mod ballot;
pub mod config;
pub mod ledger;
pub mod orchestrator;
pub mod proof;
pub mod retry;
pub mod tally;

pub use ballot::{Ballot, BallotEncoder, Choice, PublicSignals};
pub use config::{ElectionConfig, RetryConfig};
pub use ledger::{InMemoryLedger, Ledger};
pub use orchestrator::{Election, rotating_choices};
pub use proof::{Proof, ProofBackend, SigmaBackend, VerifiedBallot, check_ballot};
pub use tally::{AggregateBallot, PartialDecryption, TallyAggregator, TallyResult, Trustee};
