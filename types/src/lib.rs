//! Fundamental types for the serac overlay.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: proof and transaction identifiers, peer and node identifiers,
//! stake outpoints, and timestamps.

pub mod ids;
pub mod outpoint;
pub mod time;

pub use ids::{NodeId, PeerId, ProofId, TxId};
pub use outpoint::StakeOutpoint;
pub use time::Timestamp;
