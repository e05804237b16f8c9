use bitcoin::{Amount, Txid};
use thiserror::Error;

/// Inscription error
#[derive(Error, Debug)]
pub enum OrdError {
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    #[error("no funding output is worth at least the dust floor of {0}")]
    NoEligibleFunds(Amount),
    #[error("insufficient funds: {required} required, {available} available")]
    InsufficientFunds { required: Amount, available: Amount },
    #[error("inscription body of {size} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("reveal transaction of {weight} WU exceeds the standard weight of {max} WU")]
    RevealTooHeavy { weight: u64, max: u64 },
    #[error("invalid content type: {0}")]
    InvalidContentType(String),
    #[error("no inscriptions to write")]
    NoInscriptions,
    #[error("invalid BRC-20 operation: {0}")]
    InvalidBrc20(String),
    #[error("utxo lookup failed: {0}")]
    Lookup(String),
    #[error("transaction rejected: {0}")]
    ChainReject(String),
    #[error("{0}")]
    PartialBroadcast(Box<PartialBroadcast>),
    #[error("inscription cancelled before the commit transaction was broadcast")]
    Cancelled,
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("bitcoin sighash error: {0}")]
    BitcoinSigHash(#[from] bitcoin::sighash::Error),
    #[error("bitcoin script error: {0}")]
    PushBytes(#[from] bitcoin::script::PushBytesError),
    #[error("secp256k1 error: {0}")]
    Secp256k1(#[from] bitcoin::secp256k1::Error),
    #[error("failed to compute taproot commitment")]
    TaprootCompute,
    #[error("bad transaction input: {0}")]
    InputNotFound(usize),
    #[error("transaction inputs don't match the outputs they spend")]
    InvalidInputs,
    #[error("fee computation overflowed")]
    FeeOverflow,
}

/// The commit transaction was accepted, but not every reveal made it.
///
/// The commit can't be rolled back, so the caller gets the full picture:
/// which reveal (by payload index) was accepted and which one wasn't.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialBroadcast {
    pub commit_txid: Txid,
    /// Payload index and reveal txid of every accepted reveal
    pub succeeded: Vec<(usize, Txid)>,
    /// Payload index and reason of every reveal that was rejected or not sent
    pub failed: Vec<(usize, String)>,
}

impl std::fmt::Display for PartialBroadcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "commit transaction {} broadcast, but {} reveal(s) failed (indices {:?}); {} succeeded",
            self.commit_txid,
            self.failed.len(),
            self.failed.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            self.succeeded.len(),
        )
    }
}

impl From<PartialBroadcast> for OrdError {
    fn from(partial: PartialBroadcast) -> Self {
        Self::PartialBroadcast(Box::new(partial))
    }
}
