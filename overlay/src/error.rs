use serac_types::ProofId;
use thiserror::Error;

/// Why a proof registration did not produce a new peer.
///
/// Each variant carries the proof id; the `Display` form doubles as the
/// machine-readable rejection tag reported to the embedding layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("proof-already-registered: {0}")]
    AlreadyRegistered(ProofId),

    #[error("dangling-proof: {0}")]
    Dangling(ProofId),

    #[error("immature-proof: {0}")]
    Immature(ProofId),

    #[error("utxo-missing-or-spent: {0}")]
    MissingUtxo(ProofId),

    #[error("invalid-proof: {0}")]
    Invalid(ProofId),

    #[error("cooldown-not-elapsed: {0}")]
    CooldownNotElapsed(ProofId),

    #[error("rejected-proof: {0}")]
    Rejected(ProofId),

    #[error("conflicting-utxos: {0}")]
    Conflicting(ProofId),
}

impl RegistrationError {
    /// The id of the proof the registration attempt concerned.
    pub fn proof_id(&self) -> ProofId {
        match self {
            Self::AlreadyRegistered(id)
            | Self::Dangling(id)
            | Self::Immature(id)
            | Self::MissingUtxo(id)
            | Self::Invalid(id)
            | Self::CooldownNotElapsed(id)
            | Self::Rejected(id)
            | Self::Conflicting(id) => *id,
        }
    }
}
