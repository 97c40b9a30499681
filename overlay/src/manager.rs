//! The peer manager — orchestrates proof registration, node binding,
//! stake-weighted selection, and the periodic sweeps that keep the whole
//! structure consistent.
//!
//! All mutating methods assume exclusive access and all read-only methods at
//! least shared access; the embedding layer provides the reader-writer lock.
//! Every time-dependent operation takes an explicit `now`, so the manager is
//! a pure state machine over its inputs.

use crate::config::PeerManagerConfig;
use crate::error::RegistrationError;
use crate::nodes::{Node, NodeIndex, PendingNodeIndex};
use crate::peers::{Peer, PeerIndex};
use crate::slots::{select_slot, Slot};
use rand::Rng;
use serac_proofs::{PoolAddOutcome, Proof, ProofPool, ProofStatus, ProofTrie, ProofVerifier};
use serac_types::{NodeId, PeerId, ProofId, StakeOutpoint, Timestamp};
use std::collections::HashSet;
use std::sync::Arc;

/// How a proof registration attempt should treat existing state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationMode {
    /// The proof is expected to be unknown.
    Default,
    /// The proof may currently live in the conflicting pool; it displaces
    /// the peers it conflicts with regardless of score or cooldown.
    ForceAccept,
}

/// How a proof rejection should treat the conflicting pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionMode {
    /// Keep the proof around as a conflicting candidate.
    Default,
    /// Remove the proof completely.
    Invalidate,
}

/// Stake-weighted peer manager for the voting overlay.
pub struct PeerManager {
    config: PeerManagerConfig,
    verifier: Arc<dyn ProofVerifier>,

    peers: PeerIndex,
    nodes: NodeIndex,
    pending_nodes: PendingNodeIndex,

    valid_pool: ProofPool,
    conflicting_pool: ProofPool,
    immature_pool: ProofPool,

    /// Proofs advertised to gossip partners; exactly the peers' proofs.
    shareable_proofs: ProofTrie,

    slots: Vec<Slot>,
    /// End of the last slot, or 0 when the table is empty.
    slot_count: u64,
    /// Sum of the scores of dead slots.
    fragmentation: u64,

    /// Sum of the scores of all peers.
    total_peers_score: u64,
    /// Sum of the scores of peers with at least one node attached.
    connected_peers_score: u64,

    /// Proofs recently evicted for lack of attached nodes.
    dangling_proof_ids: HashSet<ProofId>,
    unbroadcast_proof_ids: HashSet<ProofId>,

    need_more_nodes: bool,
    next_peer_id: u64,
}

impl PeerManager {
    pub fn new(verifier: Arc<dyn ProofVerifier>) -> Self {
        Self::with_config(PeerManagerConfig::default(), verifier)
    }

    pub fn with_config(config: PeerManagerConfig, verifier: Arc<dyn ProofVerifier>) -> Self {
        Self {
            config,
            verifier,
            peers: PeerIndex::new(),
            nodes: NodeIndex::new(),
            pending_nodes: PendingNodeIndex::new(),
            valid_pool: ProofPool::new(),
            conflicting_pool: ProofPool::new(),
            immature_pool: ProofPool::new(),
            shareable_proofs: ProofTrie::new(),
            slots: Vec::new(),
            slot_count: 0,
            fragmentation: 0,
            total_peers_score: 0,
            connected_peers_score: 0,
            dangling_proof_ids: HashSet::new(),
            unbroadcast_proof_ids: HashSet::new(),
            need_more_nodes: false,
            next_peer_id: 0,
        }
    }

    // -- Registration ----------------------------------------------------------

    /// Run a proof through the registration pipeline.
    ///
    /// On success the proof is bound to a freshly allocated peer, advertised
    /// in the shareable trie, and any nodes waiting for it are attached.
    pub fn register_proof(
        &mut self,
        proof: Arc<Proof>,
        mode: RegistrationMode,
        now: Timestamp,
    ) -> Result<PeerId, RegistrationError> {
        let proof_id = proof.id();

        // In default mode the proof must be unknown; in forced-accept mode it
        // may sit in the conflicting pool.
        if (mode != RegistrationMode::ForceAccept || !self.is_in_conflicting_pool(&proof_id))
            && self.exists(&proof_id)
        {
            return Err(RegistrationError::AlreadyRegistered(proof_id));
        }

        // A proof we evicted as dangling only comes back once a node asks for
        // it; until then, what we actually need is more nodes.
        if self.dangling_proof_ids.contains(&proof_id)
            && !self.pending_nodes.has_nodes_for(&proof_id)
        {
            self.need_more_nodes = true;
            return Err(RegistrationError::Dangling(proof_id));
        }

        match self
            .verifier
            .verify(self.config.stake_dust_threshold, &proof)
        {
            ProofStatus::Valid => {}
            ProofStatus::Immature => {
                self.park_immature(Arc::clone(&proof));
                return Err(RegistrationError::Immature(proof_id));
            }
            ProofStatus::MissingUtxo => {
                return Err(RegistrationError::MissingUtxo(proof_id));
            }
            ProofStatus::Invalid => {
                return Err(RegistrationError::Invalid(proof_id));
            }
        }

        let next_cooldown = now.saturating_add_secs(self.config.conflicting_proof_cooldown_secs);

        match self.valid_pool.add_if_no_conflict(Arc::clone(&proof)) {
            PoolAddOutcome::Duplicate => {
                return Err(RegistrationError::AlreadyRegistered(proof_id));
            }
            PoolAddOutcome::Added { .. } => {}
            PoolAddOutcome::Rejected { conflicts } => {
                if mode == RegistrationMode::ForceAccept {
                    self.conflicting_pool.remove(&proof_id);
                    self.move_to_conflicting_pool(&conflicts);
                    let outcome = self.valid_pool.add_if_no_conflict(Arc::clone(&proof));
                    debug_assert!(outcome.is_added());
                } else {
                    // The most recent replacement over the contested
                    // outpoints gates this attempt; every contested peer's
                    // cooldown restarts either way.
                    let mut best_conflict_time = Timestamp::EPOCH;
                    for conflicting in &conflicts {
                        if let Some(peer_id) = self.peers.peer_id_for_proof(&conflicting.id()) {
                            if let Some(peer) = self.peers.get(peer_id) {
                                best_conflict_time =
                                    best_conflict_time.max(peer.next_possible_conflict_time);
                            }
                            self.update_next_possible_conflict_time(peer_id, next_cooldown);
                        }
                    }

                    if best_conflict_time > now {
                        return Err(RegistrationError::CooldownNotElapsed(proof_id));
                    }

                    let mut replaced = false;
                    if self.config.enable_proof_replacement {
                        if self
                            .valid_pool
                            .add_if_preferred(Arc::clone(&proof))
                            .is_added()
                        {
                            // The displaced peers move to the conflicting
                            // pool; they may come back if this proof dies.
                            self.move_to_conflicting_pool(&conflicts);
                            replaced = true;
                        }
                    }

                    if !replaced {
                        return match self.conflicting_pool.add_if_preferred(Arc::clone(&proof)) {
                            PoolAddOutcome::Rejected { .. } => {
                                Err(RegistrationError::Rejected(proof_id))
                            }
                            _ => Err(RegistrationError::Conflicting(proof_id)),
                        };
                    }
                }
            }
        }

        // The proof is in the valid pool now; it must not linger as a
        // conflicting candidate.
        self.conflicting_pool.remove(&proof_id);

        let peer_id = PeerId::new(self.next_peer_id);
        self.next_peer_id += 1;

        let score = proof.score();
        let inserted = self
            .peers
            .insert(Peer::new(peer_id, Arc::clone(&proof), now, next_cooldown));
        debug_assert!(inserted);

        let advertised = self.shareable_proofs.insert(Arc::clone(&proof));
        debug_assert!(advertised);

        self.total_peers_score += u64::from(score);

        // Attach the nodes that were waiting for this proof.
        for node_id in self.pending_nodes.take_nodes(&proof_id) {
            self.add_or_update_node(peer_id, node_id);
        }

        Ok(peer_id)
    }

    /// Park a proof in the immature pool, evicting the lowest-score proof
    /// when the pool overflows its cap.
    fn park_immature(&mut self, proof: Arc<Proof>) {
        self.immature_pool.add_if_preferred(proof);
        if self.immature_pool.len() > self.config.max_immature_proofs {
            if let Some(lowest) = self.immature_pool.lowest_score_proof() {
                let lowest_id = lowest.id();
                self.immature_pool.remove(&lowest_id);
                tracing::debug!(
                    proof = %lowest_id,
                    "evicted lowest-score proof from full immature pool"
                );
            }
        }
    }

    /// Evict the peers bound to `proofs` and park the proofs as conflicting
    /// candidates.
    fn move_to_conflicting_pool(&mut self, proofs: &[Arc<Proof>]) {
        for proof in proofs {
            if let Some(peer_id) = self.peers.peer_id_for_proof(&proof.id()) {
                self.remove_peer(peer_id);
            }
            self.conflicting_pool.add_if_preferred(Arc::clone(proof));
        }
    }

    /// Reject a proof wherever it currently lives. Returns false when the
    /// proof is unknown.
    pub fn reject_proof(&mut self, proof_id: &ProofId, mode: RejectionMode, now: Timestamp) -> bool {
        if !self.exists(proof_id) {
            return false;
        }

        if self.immature_pool.remove(proof_id).is_some() {
            return true;
        }

        if mode == RejectionMode::Default && self.conflicting_pool.contains(proof_id) {
            // Keep it as a conflicting candidate.
            return true;
        }

        if mode == RejectionMode::Invalidate && self.conflicting_pool.remove(proof_id).is_some() {
            return true;
        }

        // Not pooled anywhere else: it is a valid-pool peer.
        let Some(peer_id) = self.peers.peer_id_for_proof(proof_id) else {
            debug_assert!(false, "proof exists but is neither pooled nor bound");
            return false;
        };
        let Some(peer) = self.peers.get(peer_id) else {
            return false;
        };
        let proof = Arc::clone(&peer.proof);

        if !self.remove_peer(peer_id) {
            return false;
        }

        // The freed outpoints may unblock proofs that lost a conflict
        // earlier; give each of them a chance to become a peer. The
        // conflicting pool is outpoint-disjoint, so this recurses at most one
        // level.
        for stake in proof.stakes() {
            let Some(conflicting) = self.conflicting_pool.get_by_outpoint(&stake.outpoint) else {
                continue;
            };
            let conflicting = Arc::clone(conflicting);
            self.conflicting_pool.remove(&conflicting.id());
            let _ = self.register_proof(conflicting, RegistrationMode::Default, now);
        }

        if mode == RejectionMode::Default {
            self.conflicting_pool.add_if_preferred(proof);
        }

        true
    }

    /// Tear down a peer: free its slot, re-home its nodes into the pending
    /// set, release its outpoints, and stop advertising its proof.
    fn remove_peer(&mut self, peer_id: PeerId) -> bool {
        let Some(peer) = self.peers.get(peer_id) else {
            return false;
        };
        let proof_id = peer.proof_id();
        let node_count = peer.node_count;
        let score = peer.score();

        self.remove_node_from_peer(peer_id, node_count);

        // The nodes chose this proof; have them wait for it to come back
        // rather than dropping them on the floor.
        for node_id in self.nodes.nodes_for_peer(peer_id) {
            self.nodes.remove(node_id);
            self.pending_nodes.insert(proof_id, node_id);
        }

        self.valid_pool.remove(&proof_id);
        let removed = self.shareable_proofs.remove(&proof_id);
        debug_assert!(removed.is_some());
        self.unbroadcast_proof_ids.remove(&proof_id);

        debug_assert!(self.total_peers_score >= u64::from(score));
        self.total_peers_score = self.total_peers_score.saturating_sub(u64::from(score));
        self.peers.remove(peer_id);
        true
    }

    // -- Node binding ----------------------------------------------------------

    /// Bind `node_id` to the peer owning `proof_id`, or park it as pending
    /// when no such peer exists yet. Returns true iff the node is bound.
    pub fn add_node(&mut self, node_id: NodeId, proof_id: ProofId) -> bool {
        let Some(peer_id) = self.peers.peer_id_for_proof(&proof_id) else {
            // The node may be switching to a proof we have not seen; it
            // cannot be both active and pending at the same time.
            self.remove_node(node_id);
            self.pending_nodes.insert(proof_id, node_id);
            return false;
        };

        self.add_or_update_node(peer_id, node_id)
    }

    /// Bind a node to an existing peer, rebinding it if it is already bound
    /// elsewhere. Returns false when the peer does not exist.
    pub fn add_or_update_node(&mut self, peer_id: PeerId, node_id: NodeId) -> bool {
        if self.peers.get(peer_id).is_none() {
            return false;
        }

        if self.nodes.contains(&node_id) {
            let Some(old_peer) = self.nodes.rebind(node_id, peer_id) else {
                return false;
            };
            let detached = self.remove_node_from_peer(old_peer, 1);
            debug_assert!(detached);
        } else {
            let inserted = self.nodes.insert(Node::new(node_id, peer_id));
            debug_assert!(inserted);
        }

        let attached = self.add_node_to_peer(peer_id);
        debug_assert!(attached);

        // The node is active now; drop any pending entry it had.
        self.pending_nodes.remove_node(node_id);

        true
    }

    /// Account one more node on `peer_id`, materializing its slot on the
    /// 0 → 1 transition.
    fn add_node_to_peer(&mut self, peer_id: PeerId) -> bool {
        let next_index = self.slots.len();
        let slot_start = self.slot_count;
        let Some(peer) = self.peers.get_mut(peer_id) else {
            return false;
        };

        peer.node_count += 1;
        if peer.node_count > 1 {
            return true;
        }

        peer.index = next_index;
        let score = peer.score();
        self.slots.push(Slot::new(slot_start, score, Some(peer_id)));
        self.slot_count = slot_start + u64::from(score);
        self.connected_peers_score += u64::from(score);
        true
    }

    /// Account `count` fewer nodes on `peer_id`, releasing its slot on the
    /// transition to zero. A missing peer is a no-op success.
    fn remove_node_from_peer(&mut self, peer_id: PeerId, count: u32) -> bool {
        let Some(peer) = self.peers.get_mut(peer_id) else {
            return true;
        };

        debug_assert!(count <= peer.node_count);
        if count == 0 {
            return false;
        }

        peer.node_count = peer.node_count.saturating_sub(count);
        if peer.node_count > 0 {
            return true;
        }

        let index = peer.index;
        debug_assert!(index < self.slots.len());
        let slot_score = u64::from(self.slots[index].score());
        debug_assert!(self.connected_peers_score >= slot_score);
        self.connected_peers_score = self.connected_peers_score.saturating_sub(slot_score);

        if index + 1 == self.slots.len() {
            self.slots.pop();
            self.slot_count = self.slots.last().map(Slot::stop).unwrap_or(0);
        } else {
            self.fragmentation += slot_score;
            self.slots[index] = self.slots[index].with_peer(None);
        }
        true
    }

    /// Detach a node wherever it lives. True if it was known.
    pub fn remove_node(&mut self, node_id: NodeId) -> bool {
        if self.pending_nodes.remove_node(node_id) {
            return true;
        }

        let Some(node) = self.nodes.remove(node_id) else {
            return false;
        };
        let detached = self.remove_node_from_peer(node.peer_id, 1);
        debug_assert!(detached);
        true
    }

    /// Set a node's query cooldown after dispatching a query to it.
    pub fn update_next_request_time(&mut self, node_id: NodeId, time: Timestamp) -> bool {
        self.nodes.set_next_request_time(node_id, time)
    }

    /// One-shot latch marking that the proof summary was sent to this node.
    /// True iff this call performed the transition.
    pub fn latch_avaproofs_sent(&mut self, node_id: NodeId) -> bool {
        self.nodes.latch_avaproofs_sent(node_id)
    }

    // -- Peer bookkeeping ------------------------------------------------------

    /// Move a peer's conflict gate forward. Never moves it back; returns
    /// true when the gate now equals `time`.
    pub fn update_next_possible_conflict_time(&mut self, peer_id: PeerId, time: Timestamp) -> bool {
        let Some(peer) = self.peers.get_mut(peer_id) else {
            return false;
        };
        peer.next_possible_conflict_time = peer.next_possible_conflict_time.max(time);
        peer.next_possible_conflict_time == time
    }

    /// Mark a peer's proof as finalized by the poll protocol.
    pub fn set_finalized(&mut self, peer_id: PeerId) -> bool {
        let Some(peer) = self.peers.get_mut(peer_id) else {
            return false;
        };
        peer.has_finalized = true;
        true
    }

    // -- Selection -------------------------------------------------------------

    /// Sample a peer with probability proportional to its score.
    pub fn select_peer(&self) -> Option<PeerId> {
        if self.slots.is_empty() || self.slot_count == 0 {
            return None;
        }

        let mut rng = rand::thread_rng();
        for _ in 0..self.config.select_peer_max_retry {
            let target = rng.gen_range(0..self.slot_count);
            if let Some(peer_id) = select_slot(&self.slots, target, self.slot_count) {
                return Some(peer_id);
            }
        }

        None
    }

    /// Pick the node to query next: sample a peer, then take its
    /// earliest-due node whose cooldown has elapsed.
    pub fn select_node(&mut self, now: Timestamp) -> Option<NodeId> {
        for _ in 0..self.config.select_node_max_retry {
            let Some(peer_id) = self.select_peer() else {
                // Repeated misses usually mean heavy fragmentation.
                self.compact();
                continue;
            };

            if let Some(node_id) = self.nodes.first_ready(peer_id, now) {
                return Some(node_id);
            }
        }

        self.need_more_nodes = true;
        None
    }

    /// Rebuild the slot table without gaps. Returns the number of slots
    /// reclaimed from the number line.
    pub fn compact(&mut self) -> u64 {
        if self.fragmentation == 0 {
            return 0;
        }

        let mut new_slots = Vec::with_capacity(self.peers.len());
        let mut prev_stop = 0u64;
        let mut index = 0usize;
        for peer in self.peers.iter_mut() {
            if peer.node_count == 0 {
                continue;
            }
            let slot = Slot::new(prev_stop, peer.score(), Some(peer.peer_id));
            prev_stop = slot.stop();
            new_slots.push(slot);
            peer.index = index;
            index += 1;
        }

        self.slots = new_slots;
        let saved = self.slot_count - prev_stop;
        self.slot_count = prev_stop;
        self.fragmentation = 0;
        saved
    }

    // -- Periodic sweeps -------------------------------------------------------

    /// Evict peers that have gone too long without a single attached node.
    ///
    /// `local_proof` shields this node's own proof from eviction. Sets
    /// `need_more_nodes` to whether anything was evicted this sweep.
    pub fn cleanup_dangling_proofs(&mut self, local_proof: Option<&ProofId>, now: Timestamp) {
        let timeout = self.config.dangling_timeout_secs;
        let newly_dangling: Vec<ProofId> = self
            .peers
            .iter()
            .filter(|peer| {
                local_proof.map_or(true, |local| *local != peer.proof_id())
                    && peer.node_count == 0
                    && peer.registration_time.has_expired(timeout, now)
            })
            .map(|peer| peer.proof_id())
            .collect();

        for proof_id in &newly_dangling {
            self.reject_proof(proof_id, RejectionMode::Invalidate, now);
            self.dangling_proof_ids.insert(*proof_id);
            tracing::debug!(proof = %proof_id, "dropped dangling proof with no connected node");
        }

        // Dangling proofs are a strong hint that we should be asking our
        // peers for more nodes.
        self.need_more_nodes = !newly_dangling.is_empty();
    }

    /// Revalidate every peer proof against the (externally refreshed) chain
    /// state, then rescan the immature pool. Returns the proofs that
    /// graduated to peers during the rescan.
    pub fn updated_block_tip(&mut self, now: Timestamp) -> Vec<Arc<Proof>> {
        let mut invalid_proof_ids = Vec::new();
        let mut new_immatures = Vec::new();

        for peer in self.peers.iter() {
            match self
                .verifier
                .verify(self.config.stake_dust_threshold, &peer.proof)
            {
                ProofStatus::Valid => {}
                ProofStatus::Immature => {
                    new_immatures.push(Arc::clone(&peer.proof));
                    invalid_proof_ids.push(peer.proof_id());
                }
                ProofStatus::MissingUtxo | ProofStatus::Invalid => {
                    invalid_proof_ids.push(peer.proof_id());
                }
            }
        }

        // Remove the invalid proofs before the rescan so previously
        // conflicting proofs can claim the freed outpoints.
        for proof_id in &invalid_proof_ids {
            self.reject_proof(proof_id, RejectionMode::Invalidate, now);
        }

        let mut registered = Vec::new();
        for proof in self.immature_pool.drain() {
            if self
                .register_proof(Arc::clone(&proof), RegistrationMode::Default, now)
                .is_ok()
            {
                registered.push(proof);
            }
            // Still-immature proofs re-parked themselves during the attempt.
        }

        for proof in new_immatures {
            self.park_immature(proof);
        }

        registered
    }

    // -- Queries ---------------------------------------------------------------

    /// Whether the proof is known in any capacity.
    pub fn exists(&self, proof_id: &ProofId) -> bool {
        self.is_bound_to_peer(proof_id)
            || self.conflicting_pool.contains(proof_id)
            || self.immature_pool.contains(proof_id)
    }

    pub fn is_bound_to_peer(&self, proof_id: &ProofId) -> bool {
        self.peers.contains_proof(proof_id)
    }

    pub fn is_immature(&self, proof_id: &ProofId) -> bool {
        self.immature_pool.contains(proof_id)
    }

    pub fn is_in_conflicting_pool(&self, proof_id: &ProofId) -> bool {
        self.conflicting_pool.contains(proof_id)
    }

    pub fn is_dangling(&self, proof_id: &ProofId) -> bool {
        self.dangling_proof_ids.contains(proof_id)
    }

    /// Fetch a proof from wherever it lives: peer, conflicting, or immature.
    pub fn get_proof(&self, proof_id: &ProofId) -> Option<Arc<Proof>> {
        self.for_peer(proof_id, |peer| Arc::clone(&peer.proof))
            .or_else(|| self.conflicting_pool.get(proof_id).map(Arc::clone))
            .or_else(|| self.immature_pool.get(proof_id).map(Arc::clone))
    }

    /// Run `f` against the peer bound to `proof_id`, if any.
    pub fn for_peer<R>(&self, proof_id: &ProofId, f: impl FnOnce(&Peer) -> R) -> Option<R> {
        self.peers.get_by_proof(proof_id).map(f)
    }

    pub fn peer(&self, peer_id: PeerId) -> Option<&Peer> {
        self.peers.get(peer_id)
    }

    // -- Unbroadcast tracking --------------------------------------------------

    /// Track a locally submitted proof until it has been announced. Only
    /// proofs bound to a peer are tracked.
    pub fn add_unbroadcast_proof(&mut self, proof_id: ProofId) {
        if self.is_bound_to_peer(&proof_id) {
            self.unbroadcast_proof_ids.insert(proof_id);
        }
    }

    pub fn remove_unbroadcast_proof(&mut self, proof_id: &ProofId) {
        self.unbroadcast_proof_ids.remove(proof_id);
    }

    /// Proof ids still awaiting announcement, in ascending order.
    pub fn unbroadcast_proofs(&self) -> Vec<ProofId> {
        let mut ids: Vec<ProofId> = self.unbroadcast_proof_ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    // -- Accessors -------------------------------------------------------------

    pub fn config(&self) -> &PeerManagerConfig {
        &self.config
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn bound_node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn pending_node_count(&self) -> usize {
        self.pending_nodes.len()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot_count(&self) -> u64 {
        self.slot_count
    }

    pub fn fragmentation(&self) -> u64 {
        self.fragmentation
    }

    pub fn total_peers_score(&self) -> u64 {
        self.total_peers_score
    }

    pub fn connected_peers_score(&self) -> u64 {
        self.connected_peers_score
    }

    /// The proofs this node is willing to share, for the gossip layer.
    pub fn shareable_proofs(&self) -> &ProofTrie {
        &self.shareable_proofs
    }

    pub fn need_more_nodes(&self) -> bool {
        self.need_more_nodes
    }

    /// Read and reset the more-nodes hint.
    pub fn should_request_more_nodes(&mut self) -> bool {
        std::mem::take(&mut self.need_more_nodes)
    }

    // -- Self-audit ------------------------------------------------------------

    /// Walk the entire state and check every structural invariant. Intended
    /// for tests and periodic debug assertions.
    pub fn verify(&self) -> bool {
        // Slot geometry: starts non-decreasing, spans non-overlapping, live
        // slots back-referenced by their peer.
        let mut prev_stop = 0u64;
        let mut score_from_slots = 0u64;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.start() < prev_stop {
                return false;
            }
            prev_stop = slot.stop();

            let Some(peer_id) = slot.peer() else {
                continue;
            };
            let Some(peer) = self.peers.get(peer_id) else {
                return false;
            };
            if peer.index != i {
                return false;
            }
            score_from_slots += u64::from(slot.score());
        }

        if self.slot_count != self.slots.last().map(Slot::stop).unwrap_or(0) {
            return false;
        }
        if score_from_slots != self.connected_peers_score {
            return false;
        }

        let mut score_from_all_peers = 0u64;
        let mut score_from_connected = 0u64;
        let mut peer_outpoints: HashSet<StakeOutpoint> = HashSet::new();
        for peer in self.peers.iter() {
            score_from_all_peers += u64::from(peer.score());

            // Pool disjointness: a peer's proof lives in the valid pool only.
            let proof_id = peer.proof_id();
            if self.conflicting_pool.contains(&proof_id) || self.immature_pool.contains(&proof_id)
            {
                return false;
            }

            // Every stake outpoint maps back to this exact proof, and no
            // outpoint is claimed twice across peers.
            for stake in peer.proof.stakes() {
                match self.valid_pool.get_by_outpoint(&stake.outpoint) {
                    Some(pool_proof) if Arc::ptr_eq(pool_proof, &peer.proof) => {}
                    _ => return false,
                }
                if !peer_outpoints.insert(stake.outpoint) {
                    return false;
                }
            }

            // The advertised set is exactly the peers' proofs.
            if self.shareable_proofs.get(&proof_id).is_none() {
                return false;
            }

            // The cached node count matches the node index.
            if peer.node_count as usize != self.nodes.count_for_peer(peer.peer_id) {
                return false;
            }
            if peer.node_count == 0 {
                continue;
            }

            score_from_connected += u64::from(peer.score());

            // The index points to a live slot carrying this peer's score.
            if peer.index >= self.slots.len() {
                return false;
            }
            let slot = self.slots[peer.index];
            if slot.peer() != Some(peer.peer_id) || slot.score() != peer.score() {
                return false;
            }
        }

        if score_from_all_peers != self.total_peers_score {
            return false;
        }
        if score_from_connected != self.connected_peers_score {
            return false;
        }

        // The valid pool holds exactly the peers' outpoints.
        if self.valid_pool.outpoint_count() != peer_outpoints.len() {
            return false;
        }
        for proof_id in self.valid_pool.proof_ids() {
            if !self.peers.contains_proof(&proof_id) {
                return false;
            }
        }

        // The conflicting pool is disjoint from the other pools and from the
        // peer set.
        for proof_id in self.conflicting_pool.proof_ids() {
            if self.immature_pool.contains(&proof_id) || self.peers.contains_proof(&proof_id) {
                return false;
            }
        }

        if self.immature_pool.len() > self.config.max_immature_proofs {
            return false;
        }

        // Every bound node points at a live peer and is not also pending.
        for node in self.nodes.iter() {
            if self.peers.get(node.peer_id).is_none() {
                return false;
            }
            if self.pending_nodes.contains_node(node.node_id) {
                return false;
            }
        }

        // Every pending node waits on a proof with no bound peer.
        for (_, proof_id) in self.pending_nodes.iter() {
            if self.peers.contains_proof(proof_id) {
                return false;
            }
        }

        // No proof sits in the advertisement trie without a bound peer.
        self.shareable_proofs
            .for_each_leaf(|proof| self.is_bound_to_peer(&proof.id()))
    }
}
