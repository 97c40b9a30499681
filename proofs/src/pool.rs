//! Conflict-aware proof pools.
//!
//! A pool holds proofs whose stake outpoints are pairwise disjoint. The
//! outpoint index makes conflict detection O(stakes) and gives the peer
//! manager its UTXO-exclusivity guarantee: admission either succeeds cleanly
//! or reports the exact set of colliding proofs without mutating anything.

use crate::proof::Proof;
use serac_types::{ProofId, StakeOutpoint};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Outcome of a pool admission attempt.
#[derive(Clone, Debug)]
pub enum PoolAddOutcome {
    /// The proof was inserted. `evicted` lists the conflicting proofs that
    /// were displaced (empty for `add_if_no_conflict`).
    Added { evicted: Vec<Arc<Proof>> },
    /// The pool already holds a proof with this id.
    Duplicate,
    /// The proof was not inserted; `conflicts` lists the proofs holding the
    /// contested outpoints.
    Rejected { conflicts: Vec<Arc<Proof>> },
}

impl PoolAddOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, PoolAddOutcome::Added { .. })
    }
}

/// A set of proofs with pairwise-disjoint stake outpoints.
#[derive(Default)]
pub struct ProofPool {
    proofs: HashMap<ProofId, Arc<Proof>>,
    by_outpoint: HashMap<StakeOutpoint, ProofId>,
}

impl ProofPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// The proofs currently claiming any of `proof`'s outpoints, deduplicated
    /// and ordered by proof id.
    fn conflicts_for(&self, proof: &Proof) -> Vec<Arc<Proof>> {
        let mut conflicts: BTreeMap<ProofId, Arc<Proof>> = BTreeMap::new();
        for outpoint in proof.outpoints() {
            if let Some(id) = self.by_outpoint.get(outpoint) {
                if let Some(existing) = self.proofs.get(id) {
                    conflicts.insert(*id, Arc::clone(existing));
                }
            }
        }
        conflicts.into_values().collect()
    }

    fn insert_unchecked(&mut self, proof: Arc<Proof>) {
        for outpoint in proof.outpoints() {
            self.by_outpoint.insert(*outpoint, proof.id());
        }
        self.proofs.insert(proof.id(), proof);
    }

    /// Insert `proof` only if none of its outpoints is already claimed.
    pub fn add_if_no_conflict(&mut self, proof: Arc<Proof>) -> PoolAddOutcome {
        if self.proofs.contains_key(&proof.id()) {
            return PoolAddOutcome::Duplicate;
        }

        let conflicts = self.conflicts_for(&proof);
        if !conflicts.is_empty() {
            return PoolAddOutcome::Rejected { conflicts };
        }

        self.insert_unchecked(proof);
        PoolAddOutcome::Added { evicted: vec![] }
    }

    /// Insert `proof` if it is strictly preferred over every conflicting
    /// proof. Preference is by score; an equal score loses, so an attacker
    /// cannot churn the pool with same-weight replacements. On success the
    /// displaced proofs are removed and returned.
    pub fn add_if_preferred(&mut self, proof: Arc<Proof>) -> PoolAddOutcome {
        if self.proofs.contains_key(&proof.id()) {
            return PoolAddOutcome::Duplicate;
        }

        let conflicts = self.conflicts_for(&proof);
        if conflicts.iter().any(|c| c.score() >= proof.score()) {
            return PoolAddOutcome::Rejected { conflicts };
        }

        for conflicting in &conflicts {
            self.remove(&conflicting.id());
        }
        self.insert_unchecked(proof);
        PoolAddOutcome::Added { evicted: conflicts }
    }

    /// Remove a proof and release its outpoints.
    pub fn remove(&mut self, proof_id: &ProofId) -> Option<Arc<Proof>> {
        let proof = self.proofs.remove(proof_id)?;
        for outpoint in proof.outpoints() {
            self.by_outpoint.remove(outpoint);
        }
        Some(proof)
    }

    pub fn get(&self, proof_id: &ProofId) -> Option<&Arc<Proof>> {
        self.proofs.get(proof_id)
    }

    pub fn get_by_outpoint(&self, outpoint: &StakeOutpoint) -> Option<&Arc<Proof>> {
        self.by_outpoint
            .get(outpoint)
            .and_then(|id| self.proofs.get(id))
    }

    pub fn contains(&self, proof_id: &ProofId) -> bool {
        self.proofs.contains_key(proof_id)
    }

    /// The proof with the lowest score, ties broken by proof id so eviction
    /// under the immature-pool cap is deterministic.
    pub fn lowest_score_proof(&self) -> Option<Arc<Proof>> {
        self.proofs
            .values()
            .min_by_key(|p| (p.score(), p.id()))
            .map(Arc::clone)
    }

    /// Number of proofs held.
    pub fn len(&self) -> usize {
        self.proofs.len()
    }

    /// Number of outpoints claimed across all held proofs.
    pub fn outpoint_count(&self) -> usize {
        self.by_outpoint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }

    /// Proof ids held, in ascending order.
    pub fn proof_ids(&self) -> Vec<ProofId> {
        let mut ids: Vec<ProofId> = self.proofs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Empty the pool, returning the proofs in proof-id order. Used by the
    /// block-tip rescan, which re-registers each drained proof.
    pub fn drain(&mut self) -> Vec<Arc<Proof>> {
        self.by_outpoint.clear();
        let mut proofs: Vec<Arc<Proof>> = self.proofs.drain().map(|(_, p)| p).collect();
        proofs.sort_unstable_by_key(|p| p.id());
        proofs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::{MasterPubkey, Stake};
    use serac_types::TxId;

    fn outpoint(byte: u8) -> StakeOutpoint {
        StakeOutpoint::new(TxId::new([byte; 32]), 0)
    }

    fn proof(id_byte: u8, amount: u64, outpoints: &[u8]) -> Arc<Proof> {
        let stakes = outpoints
            .iter()
            .map(|&b| Stake::new(outpoint(b), amount / outpoints.len() as u64))
            .collect();
        Arc::new(Proof::new(ProofId::new([id_byte; 32]), MasterPubkey::default(), stakes).unwrap())
    }

    #[test]
    fn add_without_conflict() {
        let mut pool = ProofPool::new();
        assert!(pool.add_if_no_conflict(proof(1, 10_000, &[1])).is_added());
        assert!(pool.add_if_no_conflict(proof(2, 10_000, &[2])).is_added());
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.outpoint_count(), 2);
    }

    #[test]
    fn duplicate_id_is_reported() {
        let mut pool = ProofPool::new();
        pool.add_if_no_conflict(proof(1, 10_000, &[1]));
        assert!(matches!(
            pool.add_if_no_conflict(proof(1, 10_000, &[1])),
            PoolAddOutcome::Duplicate
        ));
        assert!(matches!(
            pool.add_if_preferred(proof(1, 10_000, &[1])),
            PoolAddOutcome::Duplicate
        ));
    }

    #[test]
    fn conflict_reports_colliding_proofs_without_mutation() {
        let mut pool = ProofPool::new();
        pool.add_if_no_conflict(proof(1, 10_000, &[1, 2]));
        pool.add_if_no_conflict(proof(2, 10_000, &[3]));

        let outcome = pool.add_if_no_conflict(proof(3, 50_000, &[2, 3]));
        match outcome {
            PoolAddOutcome::Rejected { conflicts } => {
                assert_eq!(conflicts.len(), 2);
                assert_eq!(conflicts[0].id(), ProofId::new([1; 32]));
                assert_eq!(conflicts[1].id(), ProofId::new([2; 32]));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(pool.len(), 2);
        assert!(pool.get(&ProofId::new([3; 32])).is_none());
    }

    #[test]
    fn preferred_replaces_all_lower_scores() {
        let mut pool = ProofPool::new();
        pool.add_if_no_conflict(proof(1, 10_000, &[1]));
        pool.add_if_no_conflict(proof(2, 20_000, &[2]));

        let outcome = pool.add_if_preferred(proof(3, 50_000, &[1, 2]));
        match outcome {
            PoolAddOutcome::Added { evicted } => {
                assert_eq!(evicted.len(), 2);
            }
            other => panic!("expected added, got {other:?}"),
        }
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&ProofId::new([3; 32])));
        assert_eq!(pool.outpoint_count(), 2);
    }

    #[test]
    fn preferred_rejects_on_equal_score() {
        let mut pool = ProofPool::new();
        pool.add_if_no_conflict(proof(1, 10_000, &[1]));

        let outcome = pool.add_if_preferred(proof(2, 10_000, &[1]));
        assert!(matches!(outcome, PoolAddOutcome::Rejected { .. }));
        assert!(pool.contains(&ProofId::new([1; 32])));
    }

    #[test]
    fn preferred_rejects_if_any_conflict_wins() {
        let mut pool = ProofPool::new();
        pool.add_if_no_conflict(proof(1, 10_000, &[1]));
        pool.add_if_no_conflict(proof(2, 90_000, &[2]));

        // Beats proof 1 but not proof 2: whole insertion is rejected.
        let outcome = pool.add_if_preferred(proof(3, 50_000, &[1, 2]));
        assert!(matches!(outcome, PoolAddOutcome::Rejected { .. }));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn remove_releases_outpoints() {
        let mut pool = ProofPool::new();
        pool.add_if_no_conflict(proof(1, 10_000, &[1, 2]));
        assert!(pool.remove(&ProofId::new([1; 32])).is_some());
        assert_eq!(pool.outpoint_count(), 0);
        assert!(pool.add_if_no_conflict(proof(2, 10_000, &[1])).is_added());
    }

    #[test]
    fn remove_unknown_is_none() {
        let mut pool = ProofPool::new();
        assert!(pool.remove(&ProofId::new([9; 32])).is_none());
    }

    #[test]
    fn get_by_outpoint() {
        let mut pool = ProofPool::new();
        pool.add_if_no_conflict(proof(1, 10_000, &[1, 2]));
        let found = pool.get_by_outpoint(&outpoint(2)).unwrap();
        assert_eq!(found.id(), ProofId::new([1; 32]));
        assert!(pool.get_by_outpoint(&outpoint(3)).is_none());
    }

    #[test]
    fn lowest_score_proof_breaks_ties_by_id() {
        let mut pool = ProofPool::new();
        pool.add_if_no_conflict(proof(5, 10_000, &[1]));
        pool.add_if_no_conflict(proof(3, 10_000, &[2]));
        pool.add_if_no_conflict(proof(7, 20_000, &[3]));

        let lowest = pool.lowest_score_proof().unwrap();
        assert_eq!(lowest.id(), ProofId::new([3; 32]));
    }

    #[test]
    fn drain_returns_proofs_in_id_order() {
        let mut pool = ProofPool::new();
        pool.add_if_no_conflict(proof(9, 10_000, &[1]));
        pool.add_if_no_conflict(proof(2, 10_000, &[2]));
        pool.add_if_no_conflict(proof(5, 10_000, &[3]));

        let drained = pool.drain();
        let ids: Vec<u8> = drained.iter().map(|p| p.id().as_bytes()[0]).collect();
        assert_eq!(ids, vec![2, 5, 9]);
        assert!(pool.is_empty());
        assert_eq!(pool.outpoint_count(), 0);
    }
}
