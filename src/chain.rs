use bitcoin::{Address, Txid};

use crate::wallet::builder::Utxo;
use crate::OrdResult;

/// Source of the outputs an address can spend.
#[async_trait::async_trait]
pub trait UtxoSource {
    /// Lists the unspent outputs of `address`.
    ///
    /// Fails with [`crate::OrdError::Lookup`] when the lookup can't be completed.
    async fn list_spendable_outputs(&self, address: &Address) -> OrdResult<Vec<Utxo>>;
}

/// Relay of raw transactions to the network.
///
/// Implementations must not retry a submission: a blind retry may hide
/// whether the transaction was accepted.
#[async_trait::async_trait]
pub trait Broadcaster {
    /// Submits a consensus-encoded transaction and returns its txid.
    ///
    /// Fails with [`crate::OrdError::ChainReject`] carrying the node rejection reason.
    async fn submit(&self, raw_tx: &[u8]) -> OrdResult<Txid>;
}
