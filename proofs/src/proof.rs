//! The proof payload and the verification seam.
//!
//! Proofs are immutable once constructed and are shared by strong reference:
//! a peer, a proof pool, and the shareable trie may all hold the same
//! `Arc<Proof>` at once. There are no back-pointers from a proof to its peer;
//! that lookup goes through the manager's proof-id index.

use crate::error::ProofError;
use serac_types::{ProofId, StakeOutpoint};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Raw staked units required per point of selection score.
pub const STAKE_AMOUNT_PER_SCORE: u64 = 100;

/// The master public key authorizing a proof. Opaque to the overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MasterPubkey(pub [u8; 32]);

/// A single staked output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub outpoint: StakeOutpoint,
    /// Staked amount in raw units.
    pub amount: u64,
}

impl Stake {
    pub fn new(outpoint: StakeOutpoint, amount: u64) -> Self {
        Self { outpoint, amount }
    }
}

/// A stake proof authorizing overlay participation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proof {
    id: ProofId,
    master: MasterPubkey,
    stakes: Vec<Stake>,
}

impl Proof {
    /// Build a proof from its stakes.
    ///
    /// The stake set must be non-empty and must not reference the same
    /// outpoint twice.
    pub fn new(id: ProofId, master: MasterPubkey, stakes: Vec<Stake>) -> Result<Self, ProofError> {
        if stakes.is_empty() {
            return Err(ProofError::EmptyStakes);
        }

        let mut seen = HashSet::with_capacity(stakes.len());
        for stake in &stakes {
            if !seen.insert(stake.outpoint) {
                return Err(ProofError::DuplicateStakeOutpoint(stake.outpoint));
            }
        }

        Ok(Self { id, master, stakes })
    }

    pub fn id(&self) -> ProofId {
        self.id
    }

    pub fn master(&self) -> &MasterPubkey {
        &self.master
    }

    pub fn stakes(&self) -> &[Stake] {
        &self.stakes
    }

    /// Total staked amount across all stakes.
    pub fn staked_amount(&self) -> u64 {
        self.stakes
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.amount))
    }

    /// Selection score derived from the staked amount.
    ///
    /// The peer's sampling probability is `score / slot_count` once a node
    /// attaches to it.
    pub fn score(&self) -> u32 {
        (self.staked_amount() / STAKE_AMOUNT_PER_SCORE).min(u64::from(u32::MAX)) as u32
    }

    /// Iterate over the staked outpoints.
    pub fn outpoints(&self) -> impl Iterator<Item = &StakeOutpoint> {
        self.stakes.iter().map(|s| &s.outpoint)
    }
}

/// Outcome of verifying a proof against the current chain state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProofStatus {
    /// The proof is well formed and every staked UTXO is spendable and mature.
    Valid,
    /// Structurally valid, but a staked UTXO has not reached maturity depth.
    Immature,
    /// A staked UTXO is unknown or already spent.
    MissingUtxo,
    /// The proof fails structural or signature checks.
    Invalid,
}

/// The seam behind which signature checks and chain state live.
///
/// Implementations hold their own chain-state snapshot; the manager assumes
/// the embedder refreshes it before block-tip driven revalidation.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, dust_threshold: u64, proof: &Proof) -> ProofStatus;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serac_types::TxId;

    fn outpoint(byte: u8, index: u32) -> StakeOutpoint {
        StakeOutpoint::new(TxId::new([byte; 32]), index)
    }

    fn proof_id(byte: u8) -> ProofId {
        ProofId::new([byte; 32])
    }

    #[test]
    fn rejects_empty_stakes() {
        let result = Proof::new(proof_id(1), MasterPubkey::default(), vec![]);
        assert_eq!(result.unwrap_err(), ProofError::EmptyStakes);
    }

    #[test]
    fn rejects_duplicate_outpoint() {
        let result = Proof::new(
            proof_id(1),
            MasterPubkey::default(),
            vec![
                Stake::new(outpoint(1, 0), 1_000),
                Stake::new(outpoint(1, 0), 2_000),
            ],
        );
        assert_eq!(
            result.unwrap_err(),
            ProofError::DuplicateStakeOutpoint(outpoint(1, 0))
        );
    }

    #[test]
    fn same_txid_distinct_indexes_allowed() {
        let proof = Proof::new(
            proof_id(1),
            MasterPubkey::default(),
            vec![
                Stake::new(outpoint(1, 0), 1_000),
                Stake::new(outpoint(1, 1), 2_000),
            ],
        )
        .unwrap();
        assert_eq!(proof.stakes().len(), 2);
    }

    #[test]
    fn score_is_staked_amount_over_unit() {
        let proof = Proof::new(
            proof_id(1),
            MasterPubkey::default(),
            vec![
                Stake::new(outpoint(1, 0), 10_000),
                Stake::new(outpoint(2, 0), 5_050),
            ],
        )
        .unwrap();
        assert_eq!(proof.staked_amount(), 15_050);
        assert_eq!(proof.score(), 150);
    }

    #[test]
    fn score_saturates_at_u32() {
        let proof = Proof::new(
            proof_id(1),
            MasterPubkey::default(),
            vec![
                Stake::new(outpoint(1, 0), u64::MAX),
                Stake::new(outpoint(2, 0), u64::MAX),
            ],
        )
        .unwrap();
        assert_eq!(proof.score(), u32::MAX);
    }
}
