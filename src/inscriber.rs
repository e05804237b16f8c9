use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bitcoin::consensus::encode::serialize;
use bitcoin::{Address, Amount, FeeRate, Network, PrivateKey, ScriptBuf, Transaction, Txid};

use crate::chain::{Broadcaster, UtxoSource};
use crate::error::PartialBroadcast;
use crate::inscription::InscriptionPayload;
use crate::utils::constants::{DUST_FLOOR, MAX_BODY_SIZE};
use crate::utils::fees::{FeePlan, FeePlanArgs};
use crate::wallet::builder::envelope::EnvelopeBuilder;
use crate::wallet::builder::signer::signer_address;
use crate::wallet::builder::taproot::{Commitment, TaprootKeypair};
use crate::wallet::builder::{FundingOutput, OrdTransactionBuilder, RevealMode, RevealPlan};
use crate::{OrdError, OrdResult};

/// Settings shared by every request of an [`Inscriber`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InscriberConfig {
    pub network: Network,
    /// Funding outputs below this value are not spent, and change below it is left to the miners
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub dust_floor: Amount,
    /// Value of every inscription output
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub postage: Amount,
    /// Largest inscription body accepted, in bytes
    pub max_body_size: usize,
}

impl Default for InscriberConfig {
    fn default() -> Self {
        Self::new(Network::Bitcoin)
    }
}

impl InscriberConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            dust_floor: Amount::from_sat(DUST_FLOOR),
            postage: Amount::from_sat(DUST_FLOOR),
            max_body_size: MAX_BODY_SIZE,
        }
    }
}

/// Everything needed to inscribe a batch of payloads.
#[derive(Debug, Clone)]
pub struct InscriptionRequest {
    /// Outputs funding the commit transaction
    pub funding: Vec<FundingOutput>,
    /// Inscriptions to write, in order
    pub payloads: Vec<InscriptionPayload>,
    pub commit_fee_rate: FeeRate,
    pub reveal_fee_rate: FeeRate,
    pub reveal_mode: RevealMode,
    /// Receives the change of the commit transaction; the signer address if unset
    pub change_address: Option<Address>,
    /// Key locking the envelopes; the key of the first funding output if unset
    pub reveal_key: Option<TaprootKeypair>,
}

impl InscriptionRequest {
    /// A request paying `fee_rate` for both the commit and the reveal transactions.
    pub fn new(
        funding: Vec<FundingOutput>,
        payloads: Vec<InscriptionPayload>,
        fee_rate: FeeRate,
    ) -> Self {
        Self {
            funding,
            payloads,
            commit_fee_rate: fee_rate,
            reveal_fee_rate: fee_rate,
            reveal_mode: RevealMode::default(),
            change_address: None,
            reveal_key: None,
        }
    }

    pub fn with_reveal_fee_rate(mut self, reveal_fee_rate: FeeRate) -> Self {
        self.reveal_fee_rate = reveal_fee_rate;
        self
    }

    pub fn with_reveal_mode(mut self, reveal_mode: RevealMode) -> Self {
        self.reveal_mode = reveal_mode;
        self
    }

    pub fn with_change_address(mut self, change_address: Address) -> Self {
        self.change_address = Some(change_address);
        self
    }

    pub fn with_reveal_key(mut self, reveal_key: TaprootKeypair) -> Self {
        self.reveal_key = Some(reveal_key);
        self
    }
}

/// Progress of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    EnvelopesBuilt,
    CommitmentsComputed,
    FeePlanned,
    CommitSigned,
    RevealsSigned,
    CommitBroadcast,
    RevealsBroadcast,
    Done,
}

impl Stage {
    fn advance(&mut self, next: Stage) {
        debug!("stage: {self:?} -> {next:?}");
        *self = next;
    }
}

/// Lets a caller stop an inscription in progress.
///
/// Before the commit transaction is broadcast, cancelling aborts cleanly.
/// Afterwards the commit can't be undone, and cancelling only stops
/// broadcasting the reveals not sent yet.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where the funding of a request ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSummary {
    pub funding_total: Amount,
    /// Fees of the commit and reveal transactions
    pub network_fee: Amount,
    /// Value locked into the inscription outputs
    pub postage: Amount,
    /// Value sent back to the change address
    pub change: Amount,
}

/// Signed commit and reveal transactions of a request, not broadcast yet.
#[derive(Debug, Clone)]
pub struct SignedInscription {
    pub commit_tx: Transaction,
    pub reveal: RevealPlan,
    pub commitments: Vec<Commitment>,
    pub fee_plan: FeePlan,
    pub funding: Vec<FundingOutput>,
    stage: Stage,
}

impl SignedInscription {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Network fees plus postage: what the signer pays for the request.
    pub fn total_fee(&self) -> Amount {
        self.fee_plan.total_spent()
    }

    pub fn summary(&self) -> FeeSummary {
        FeeSummary {
            funding_total: self
                .funding
                .iter()
                .fold(Amount::ZERO, |total, output| total + output.value),
            network_fee: self.fee_plan.network_fee(),
            postage: self.fee_plan.total_postage(),
            change: self.fee_plan.change.unwrap_or(Amount::ZERO),
        }
    }

    /// Payload indices revealed by the reveal transaction at `index`.
    fn revealed_by(&self, index: usize) -> Range<usize> {
        match &self.reveal {
            RevealPlan::Individual(_) => index..index + 1,
            RevealPlan::Aggregated(_) => 0..self.commitments.len(),
        }
    }
}

/// Result of a fully broadcast request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InscribeOutcome {
    pub commit_txid: Txid,
    /// Reveal txid of every payload, in payload order
    pub reveal_txids: Vec<Txid>,
    pub commit_vsize: usize,
    pub total_fee: Amount,
    pub summary: FeeSummary,
    pub stage: Stage,
}

/// Runs requests from the funding outputs to the broadcast reveal transactions.
pub struct Inscriber<C> {
    chain: C,
    config: InscriberConfig,
    builder: OrdTransactionBuilder,
}

impl<C> Inscriber<C> {
    pub fn new(chain: C, config: InscriberConfig) -> Self {
        Self {
            chain,
            config,
            builder: OrdTransactionBuilder::new(),
        }
    }

    pub fn config(&self) -> &InscriberConfig {
        &self.config
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// Returns what `request` would cost: network fees plus postage.
    ///
    /// Builds and signs every transaction without broadcasting anything, so
    /// the result is exactly what [`Inscriber::inscribe`] would spend.
    pub fn calculate_fee(&self, request: &InscriptionRequest) -> OrdResult<Amount> {
        Ok(self.prepare(request)?.total_fee())
    }

    /// Builds and signs the commit and reveal transactions of `request`.
    pub fn prepare(&self, request: &InscriptionRequest) -> OrdResult<SignedInscription> {
        let mut stage = Stage::Init;
        if request.payloads.is_empty() {
            return Err(OrdError::NoInscriptions);
        }

        let funding = self.eligible_funding(&request.funding)?;
        let funding_total = funding
            .iter()
            .try_fold(Amount::ZERO, |total, output| total.checked_add(output.value))
            .ok_or(OrdError::FeeOverflow)?;
        let signer_key = funding[0].owner_key;

        let change_script = match &request.change_address {
            Some(address) => address.script_pubkey(),
            None => signer_address(&signer_key, self.config.network).script_pubkey(),
        };
        let (reveal_keypair, reveal_key) = request
            .reveal_key
            .clone()
            .unwrap_or_else(|| TaprootKeypair::from(&signer_key))
            .generate_keypair(self.builder.secp());

        let envelope_builder = EnvelopeBuilder::new(self.config.max_body_size);
        let envelopes = request
            .payloads
            .iter()
            .map(|payload| envelope_builder.build(payload, &reveal_key))
            .collect::<OrdResult<Vec<_>>>()?;
        stage.advance(Stage::EnvelopesBuilt);

        let commitments = envelopes
            .iter()
            .map(|envelope| Commitment::derive(self.builder.secp(), reveal_key, envelope))
            .collect::<OrdResult<Vec<_>>>()?;
        stage.advance(Stage::CommitmentsComputed);

        let destinations = request
            .payloads
            .iter()
            .map(|payload| payload.destination.script_pubkey())
            .collect::<Vec<ScriptBuf>>();
        let fee_plan = FeePlan::plan(FeePlanArgs {
            funding_count: funding.len(),
            funding_total,
            commitments: &commitments,
            destinations: &destinations,
            change_script: &change_script,
            postage: self.config.postage,
            dust_floor: self.config.dust_floor,
            commit_fee_rate: request.commit_fee_rate,
            reveal_fee_rate: request.reveal_fee_rate,
            reveal_mode: request.reveal_mode,
        })?;
        stage.advance(Stage::FeePlanned);

        let commit_tx = self.builder.assemble_commit(
            &funding,
            &commitments,
            &fee_plan,
            &change_script,
        )?;
        let commit_tx = self.builder.sign_commit(&funding, commit_tx)?;
        stage.advance(Stage::CommitSigned);

        let reveal = self
            .builder
            .assemble_reveal(&commit_tx, &request.payloads, &fee_plan)?;
        let reveal = self
            .builder
            .sign_reveal(reveal, &commit_tx, &commitments, &reveal_keypair)?;
        stage.advance(Stage::RevealsSigned);

        Ok(SignedInscription {
            commit_tx,
            reveal,
            commitments,
            fee_plan,
            funding,
            stage,
        })
    }

    fn eligible_funding(&self, funding: &[FundingOutput]) -> OrdResult<Vec<FundingOutput>> {
        let (eligible, skipped): (Vec<_>, Vec<_>) = funding
            .iter()
            .cloned()
            .partition(|output| output.value >= self.config.dust_floor);

        for output in &skipped {
            debug!(
                "skipping funding output {} of {}: below the dust floor",
                output.outpoint, output.value
            );
        }
        if eligible.is_empty() {
            return Err(OrdError::NoEligibleFunds(self.config.dust_floor));
        }

        Ok(eligible)
    }
}

impl<C> Inscriber<C>
where
    C: UtxoSource + Broadcaster,
{
    /// Looks up the outputs spendable by `private_key` that are worth funding a request.
    pub async fn spendable_funding(
        &self,
        private_key: &PrivateKey,
    ) -> OrdResult<Vec<FundingOutput>> {
        let address = signer_address(private_key, self.config.network);
        let utxos = self.chain.list_spendable_outputs(&address).await?;
        debug!("{} outputs found for {address}", utxos.len());

        let funding = utxos
            .iter()
            .map(|utxo| FundingOutput::from_utxo(utxo, *private_key))
            .collect::<Vec<_>>();

        self.eligible_funding(&funding)
    }

    /// Inscribes every payload of `request`.
    pub async fn inscribe(&self, request: &InscriptionRequest) -> OrdResult<InscribeOutcome> {
        self.inscribe_with_cancel(request, &CancelToken::default())
            .await
    }

    /// Inscribes every payload of `request`, checking `cancel` before each broadcast.
    ///
    /// Reveals are broadcast in payload order, and a rejected reveal doesn't stop the
    /// next ones. If any reveal is not accepted, the commit transaction is already on its
    /// way and the error is [`OrdError::PartialBroadcast`].
    pub async fn inscribe_with_cancel(
        &self,
        request: &InscriptionRequest,
        cancel: &CancelToken,
    ) -> OrdResult<InscribeOutcome> {
        let mut signed = self.prepare(request)?;

        if cancel.is_cancelled() {
            warn!("inscription cancelled before broadcasting the commit transaction");
            return Err(OrdError::Cancelled);
        }
        let commit_txid = self.submit(&signed.commit_tx).await?;
        info!("commit transaction broadcast: {commit_txid}");
        signed.stage.advance(Stage::CommitBroadcast);

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (index, tx) in signed.reveal.transactions().iter().enumerate() {
            let revealed = signed.revealed_by(index);

            if cancel.is_cancelled() {
                warn!("inscription cancelled, reveal {index} not broadcast");
                failed.extend(revealed.map(|payload| (payload, "cancelled".to_string())));
                continue;
            }

            match self.submit(tx).await {
                Ok(txid) => {
                    info!("reveal transaction broadcast: {txid}");
                    succeeded.extend(revealed.map(|payload| (payload, txid)));
                }
                Err(err) => {
                    warn!("reveal transaction {} rejected: {err}", tx.txid());
                    failed.extend(revealed.map(|payload| (payload, err.to_string())));
                }
            }
        }

        if !failed.is_empty() {
            return Err(PartialBroadcast {
                commit_txid,
                succeeded,
                failed,
            }
            .into());
        }
        signed.stage.advance(Stage::RevealsBroadcast);
        signed.stage.advance(Stage::Done);

        Ok(InscribeOutcome {
            commit_txid,
            reveal_txids: succeeded.into_iter().map(|(_, txid)| txid).collect(),
            commit_vsize: signed.fee_plan.commit_vsize,
            total_fee: signed.total_fee(),
            summary: signed.summary(),
            stage: signed.stage,
        })
    }

    async fn submit(&self, tx: &Transaction) -> OrdResult<Txid> {
        let raw_tx = serialize(tx);
        debug!("submitting {}: {}", tx.txid(), hex::encode(&raw_tx));

        self.chain.submit(&raw_tx).await
    }
}
