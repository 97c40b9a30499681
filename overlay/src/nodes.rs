//! Node records, the query-schedule index, and the pending set.
//!
//! A node is either *bound* (attached to a live peer, present in
//! [`NodeIndex`]) or *pending* (waiting for a proof the manager has not
//! registered yet, present in [`PendingNodeIndex`]) — never both. The bound
//! side keeps an ordered view keyed by `(peer, next_request_time, node)` so
//! the earliest-due node of a sampled peer is one range lookup away.

use serac_types::{NodeId, PeerId, ProofId, Timestamp};
use std::collections::{BTreeSet, HashMap};

/// A remote participant bound to a peer.
#[derive(Clone, Copy, Debug)]
pub struct Node {
    pub node_id: NodeId,
    pub peer_id: PeerId,
    /// Earliest point on the caller's monotonic timeline at which this node
    /// may be queried again.
    pub next_request_time: Timestamp,
    /// One-shot latch: whether the proof short-id summary was sent.
    pub avaproofs_sent: bool,
}

impl Node {
    pub fn new(node_id: NodeId, peer_id: PeerId) -> Self {
        Self {
            node_id,
            peer_id,
            next_request_time: Timestamp::EPOCH,
            avaproofs_sent: false,
        }
    }
}

/// Nodes keyed by id, with an ordered view by `(peer, next_request_time)`.
#[derive(Default)]
pub struct NodeIndex {
    by_id: HashMap<NodeId, Node>,
    by_request_time: BTreeSet<(PeerId, Timestamp, NodeId)>,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new node. Fails if the id is already present.
    pub fn insert(&mut self, node: Node) -> bool {
        if self.by_id.contains_key(&node.node_id) {
            return false;
        }
        self.by_request_time
            .insert((node.peer_id, node.next_request_time, node.node_id));
        self.by_id.insert(node.node_id, node);
        true
    }

    pub fn remove(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.by_id.remove(&node_id)?;
        self.by_request_time
            .remove(&(node.peer_id, node.next_request_time, node.node_id));
        Some(node)
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&Node> {
        self.by_id.get(node_id)
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.by_id.contains_key(node_id)
    }

    /// Move a node to a different peer, keeping its request schedule and
    /// latch state. Returns the previous peer id.
    pub fn rebind(&mut self, node_id: NodeId, peer_id: PeerId) -> Option<PeerId> {
        let node = self.by_id.get_mut(&node_id)?;
        let old_peer = node.peer_id;
        self.by_request_time
            .remove(&(old_peer, node.next_request_time, node_id));
        node.peer_id = peer_id;
        self.by_request_time
            .insert((peer_id, node.next_request_time, node_id));
        Some(old_peer)
    }

    /// Update a node's query cooldown. Returns false for an unknown node.
    pub fn set_next_request_time(&mut self, node_id: NodeId, time: Timestamp) -> bool {
        let Some(node) = self.by_id.get_mut(&node_id) else {
            return false;
        };
        self.by_request_time
            .remove(&(node.peer_id, node.next_request_time, node_id));
        node.next_request_time = time;
        self.by_request_time
            .insert((node.peer_id, time, node_id));
        true
    }

    /// Latch the one-shot avaproofs flag. True iff this call flipped it.
    pub fn latch_avaproofs_sent(&mut self, node_id: NodeId) -> bool {
        match self.by_id.get_mut(&node_id) {
            Some(node) if !node.avaproofs_sent => {
                node.avaproofs_sent = true;
                true
            }
            _ => false,
        }
    }

    /// The earliest-due node of `peer` whose cooldown has elapsed.
    pub fn first_ready(&self, peer: PeerId, now: Timestamp) -> Option<NodeId> {
        self.by_request_time
            .range((peer, Timestamp::EPOCH, NodeId::MIN)..=(peer, now, NodeId::MAX))
            .next()
            .map(|&(_, _, node_id)| node_id)
    }

    /// All nodes bound to `peer`, in ascending request-time order.
    pub fn nodes_for_peer(&self, peer: PeerId) -> Vec<NodeId> {
        self.by_request_time
            .range((peer, Timestamp::EPOCH, NodeId::MIN)..=(peer, Timestamp::MAX, NodeId::MAX))
            .map(|&(_, _, node_id)| node_id)
            .collect()
    }

    pub fn count_for_peer(&self, peer: PeerId) -> usize {
        self.by_request_time
            .range((peer, Timestamp::EPOCH, NodeId::MIN)..=(peer, Timestamp::MAX, NodeId::MAX))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Nodes waiting for a proof the manager does not know yet, grouped by the
/// awaited proof id.
#[derive(Default)]
pub struct PendingNodeIndex {
    by_node: HashMap<NodeId, ProofId>,
    by_proof: HashMap<ProofId, BTreeSet<NodeId>>,
}

impl PendingNodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `node_id` waits for `proof_id`. A node already waiting on
    /// another proof is moved.
    pub fn insert(&mut self, proof_id: ProofId, node_id: NodeId) {
        self.remove_node(node_id);
        self.by_node.insert(node_id, proof_id);
        self.by_proof.entry(proof_id).or_default().insert(node_id);
    }

    /// Drop a pending node. True if it was present.
    pub fn remove_node(&mut self, node_id: NodeId) -> bool {
        let Some(proof_id) = self.by_node.remove(&node_id) else {
            return false;
        };
        if let Some(group) = self.by_proof.get_mut(&proof_id) {
            group.remove(&node_id);
            if group.is_empty() {
                self.by_proof.remove(&proof_id);
            }
        }
        true
    }

    /// Remove and return every node waiting for `proof_id`, in id order.
    pub fn take_nodes(&mut self, proof_id: &ProofId) -> Vec<NodeId> {
        let Some(group) = self.by_proof.remove(proof_id) else {
            return Vec::new();
        };
        let nodes: Vec<NodeId> = group.into_iter().collect();
        for node_id in &nodes {
            self.by_node.remove(node_id);
        }
        nodes
    }

    pub fn has_nodes_for(&self, proof_id: &ProofId) -> bool {
        self.by_proof.contains_key(proof_id)
    }

    pub fn count_for_proof(&self, proof_id: &ProofId) -> usize {
        self.by_proof.get(proof_id).map_or(0, BTreeSet::len)
    }

    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.by_node.contains_key(&node_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &ProofId)> {
        self.by_node.iter()
    }

    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}
