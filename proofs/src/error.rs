use serac_types::StakeOutpoint;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("a proof must stake at least one outpoint")]
    EmptyStakes,

    #[error("outpoint {0} is staked twice within the same proof")]
    DuplicateStakeOutpoint(StakeOutpoint),
}
