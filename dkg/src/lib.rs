//! Two-round Feldman DKG with a complaint-based agreement step.
//!
//! Round 1: every member deals a fresh polynomial, publishes the commitment and sends
//! each peer its share privately. Round 2: every member checks what it received and
//! complains about the dealers that fail. The agreed qualified set is the accepted
//! dealers nobody complained about; each member's key share is the sum of the
//! qualified dealers' shares and the joint public key the sum of their `C_0`.

pub mod dealer;
pub mod party;

pub use dealer::{Dealer, PrivateShare, Round1Broadcast};
pub use party::{
    Complaint, DkgPhase, DkgState, KeyMaterial, KeyShare, joint_public_key, qualified_dealers,
    verification_key,
};
