//! Stake proofs and the containers that hold them.
//!
//! A proof is a signed declaration staking UTXOs toward participation in the
//! overlay. This crate defines the proof payload and the two containers the
//! peer manager builds on:
//!
//! - [`pool`] — a set of proofs with pairwise-disjoint stake outpoints,
//!   with conflict-aware admission (`add_if_no_conflict`, `add_if_preferred`).
//! - [`trie`] — a radix trie over proof ids, used to advertise the proofs a
//!   node is willing to share with gossip partners.
//!
//! Cryptographic verification is out of scope: the [`ProofVerifier`] trait is
//! the seam behind which signature checks, the UTXO set, and maturity rules
//! live.

pub mod error;
pub mod pool;
pub mod proof;
pub mod trie;

pub use error::ProofError;
pub use pool::{PoolAddOutcome, ProofPool};
pub use proof::{MasterPubkey, Proof, ProofStatus, ProofVerifier, Stake, STAKE_AMOUNT_PER_SCORE};
pub use trie::ProofTrie;
