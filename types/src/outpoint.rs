//! Stake outpoints — the UTXO references a proof stakes.

use crate::ids::TxId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reference to a transaction output staked by a proof.
///
/// Outpoints are the unit of exclusivity across proofs: within the valid
/// pool, no two proofs may reference the same outpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StakeOutpoint {
    /// Hash of the transaction holding the staked output.
    pub txid: TxId,
    /// Index of the output within that transaction.
    pub index: u32,
}

impl StakeOutpoint {
    pub fn new(txid: TxId, index: u32) -> Self {
        Self { txid, index }
    }
}

impl fmt::Display for StakeOutpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}
