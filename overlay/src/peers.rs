//! Peer records and their multi-keyed index.

use serac_proofs::Proof;
use serac_types::{PeerId, ProofId, Timestamp};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A manager-local binding of a single proof to an allocated identifier.
#[derive(Clone, Debug)]
pub struct Peer {
    pub peer_id: PeerId,
    /// The bound proof. Shared with the valid pool and the shareable trie;
    /// treated as immutable for the peer's lifetime.
    pub proof: Arc<Proof>,
    /// Number of currently attached nodes.
    pub node_count: u32,
    /// Position in the slot table. Meaningful only while `node_count > 0`.
    pub index: usize,
    pub registration_time: Timestamp,
    /// Monotonic lower bound on when a conflicting proof may replace this
    /// one. Only ever moved forward.
    pub next_possible_conflict_time: Timestamp,
    /// One-shot flag set when the poll protocol finalizes this peer's proof.
    pub has_finalized: bool,
}

impl Peer {
    pub fn new(
        peer_id: PeerId,
        proof: Arc<Proof>,
        registration_time: Timestamp,
        next_possible_conflict_time: Timestamp,
    ) -> Self {
        Self {
            peer_id,
            proof,
            node_count: 0,
            index: 0,
            registration_time,
            next_possible_conflict_time,
            has_finalized: false,
        }
    }

    pub fn proof_id(&self) -> ProofId {
        self.proof.id()
    }

    pub fn score(&self) -> u32 {
        self.proof.score()
    }
}

/// Peers keyed by peer id (primary, ordered) and by proof id.
///
/// The primary store is ordered so that compaction walks peers in ascending
/// id order, giving the rebuilt slot table a stable layout. Mutation through
/// `get_mut` must leave the bound proof untouched; the proof-id index is not
/// re-derived.
#[derive(Default)]
pub struct PeerIndex {
    by_id: BTreeMap<PeerId, Peer>,
    by_proof: HashMap<ProofId, PeerId>,
}

impl PeerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new peer. Fails if either key is already present.
    pub fn insert(&mut self, peer: Peer) -> bool {
        if self.by_id.contains_key(&peer.peer_id) || self.by_proof.contains_key(&peer.proof_id()) {
            return false;
        }
        self.by_proof.insert(peer.proof_id(), peer.peer_id);
        self.by_id.insert(peer.peer_id, peer);
        true
    }

    pub fn remove(&mut self, peer_id: PeerId) -> Option<Peer> {
        let peer = self.by_id.remove(&peer_id)?;
        self.by_proof.remove(&peer.proof_id());
        Some(peer)
    }

    pub fn get(&self, peer_id: PeerId) -> Option<&Peer> {
        self.by_id.get(&peer_id)
    }

    pub fn get_mut(&mut self, peer_id: PeerId) -> Option<&mut Peer> {
        self.by_id.get_mut(&peer_id)
    }

    pub fn peer_id_for_proof(&self, proof_id: &ProofId) -> Option<PeerId> {
        self.by_proof.get(proof_id).copied()
    }

    pub fn get_by_proof(&self, proof_id: &ProofId) -> Option<&Peer> {
        self.by_proof
            .get(proof_id)
            .and_then(|peer_id| self.by_id.get(peer_id))
    }

    pub fn contains_proof(&self, proof_id: &ProofId) -> bool {
        self.by_proof.contains_key(proof_id)
    }

    /// Iterate peers in ascending peer-id order.
    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.by_id.values()
    }

    /// Mutable iteration in ascending peer-id order. Callers must not touch
    /// the bound proof.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Peer> {
        self.by_id.values_mut()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
