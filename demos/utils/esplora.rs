use std::str::FromStr;
use std::time::Duration;

use bitcoin::{Address, Amount, Network, Txid};
use brc20_inscriber::{Broadcaster, OrdError, OrdResult, UtxoSource, Utxo};
use log::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Esplora REST client, as served by mempool.space.
pub struct EsploraClient {
    client: reqwest::Client,
    base_url: String,
}

impl EsploraClient {
    pub fn new(network: Network) -> anyhow::Result<Self> {
        let base_url = match network {
            Network::Bitcoin => "https://mempool.space/api",
            Network::Testnet => "https://mempool.space/testnet/api",
            Network::Signet => "https://mempool.space/signet/api",
            network => anyhow::bail!("no public esplora instance for {network}"),
        };

        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl UtxoSource for EsploraClient {
    async fn list_spendable_outputs(&self, address: &Address) -> OrdResult<Vec<Utxo>> {
        let url = format!("{}/address/{address}/utxo", self.base_url);
        debug!("GET {url}");

        let utxos: Vec<ApiUtxo> = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| OrdError::Lookup(err.to_string()))?
            .json()
            .await
            .map_err(|err| OrdError::Lookup(err.to_string()))?;

        Ok(utxos
            .into_iter()
            .map(|utxo| Utxo {
                id: utxo.txid,
                index: utxo.vout,
                amount: Amount::from_sat(utxo.value),
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl Broadcaster for EsploraClient {
    async fn submit(&self, raw_tx: &[u8]) -> OrdResult<Txid> {
        let url = format!("{}/tx", self.base_url);
        debug!("POST {url}");

        let response = self
            .client
            .post(&url)
            .body(hex::encode(raw_tx))
            .send()
            .await
            .map_err(|err| OrdError::ChainReject(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| OrdError::ChainReject(err.to_string()))?;
        if !status.is_success() {
            return Err(OrdError::ChainReject(format!("{status}: {text}")));
        }

        Txid::from_str(text.trim()).map_err(|err| OrdError::ChainReject(err.to_string()))
    }
}

#[derive(Debug, serde::Deserialize)]
struct ApiUtxo {
    txid: Txid,
    vout: u32,
    value: u64,
}
