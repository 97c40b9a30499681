//! Nullable proof verifier — programmable verification outcomes.

use serac_proofs::{Proof, ProofStatus, ProofVerifier};
use serac_types::ProofId;
use std::collections::HashMap;
use std::sync::Mutex;

/// A deterministic verifier for testing.
///
/// Returns a programmed status per proof id, falling back to a default.
/// Unprogrammed proofs still fail the dust check: any stake below the
/// threshold is reported `Invalid`, so tests exercise the same gate a real
/// verifier applies. Statuses can be changed between calls to simulate
/// chain-state movement (maturation, spent stakes) across block tips.
pub struct NullVerifier {
    statuses: Mutex<HashMap<ProofId, ProofStatus>>,
    default_status: ProofStatus,
}

impl NullVerifier {
    /// A verifier that accepts everything passing the dust check.
    pub fn valid() -> Self {
        Self::with_default(ProofStatus::Valid)
    }

    pub fn with_default(default_status: ProofStatus) -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            default_status,
        }
    }

    /// Program the outcome for a specific proof id.
    pub fn set_status(&self, proof_id: ProofId, status: ProofStatus) {
        self.statuses
            .lock()
            .expect("verifier status lock poisoned")
            .insert(proof_id, status);
    }

    /// Drop a programmed outcome, reverting the proof to the default.
    pub fn clear_status(&self, proof_id: &ProofId) {
        self.statuses
            .lock()
            .expect("verifier status lock poisoned")
            .remove(proof_id);
    }
}

impl ProofVerifier for NullVerifier {
    fn verify(&self, dust_threshold: u64, proof: &Proof) -> ProofStatus {
        if let Some(status) = self
            .statuses
            .lock()
            .expect("verifier status lock poisoned")
            .get(&proof.id())
        {
            return *status;
        }

        if proof.stakes().iter().any(|s| s.amount < dust_threshold) {
            return ProofStatus::Invalid;
        }

        self.default_status
    }
}
