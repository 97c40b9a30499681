//! Peer manager tunables.

use serde::{Deserialize, Serialize};

/// Configuration for the peer manager.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerManagerConfig {
    /// Minimum wall-clock seconds between successive proof replacements
    /// touching the same outpoints.
    pub conflicting_proof_cooldown_secs: u64,

    /// Whether a higher-scoring proof may evict the peers it conflicts with
    /// once their cooldown has elapsed.
    pub enable_proof_replacement: bool,

    /// Upper bound on the immature pool. Overflow evicts the lowest-score
    /// proof.
    pub max_immature_proofs: usize,

    /// Seconds a peer may stay nodeless before a sweep evicts it.
    pub dangling_timeout_secs: u64,

    /// Sampling retries before `select_peer` gives up on a fragmented table.
    pub select_peer_max_retry: u32,

    /// Peer-selection rounds before `select_node` reports no node available.
    pub select_node_max_retry: u32,

    /// Minimum staked amount per output, forwarded to the proof verifier.
    pub stake_dust_threshold: u64,
}

impl Default for PeerManagerConfig {
    fn default() -> Self {
        Self {
            conflicting_proof_cooldown_secs: 60,
            enable_proof_replacement: false,
            max_immature_proofs: 4000,
            dangling_timeout_secs: 15 * 60,
            select_peer_max_retry: 3,
            select_node_max_retry: 10,
            stake_dust_threshold: 100,
        }
    }
}
