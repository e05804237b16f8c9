pub mod envelope;
pub mod signer;
pub mod taproot;

use bitcoin::absolute::LockTime;
use bitcoin::key::Keypair;
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, OutPoint, PrivateKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use signer::Wallet;

use self::taproot::Commitment;
use crate::inscription::InscriptionPayload;
use crate::utils::fees::FeePlan;
use crate::{OrdError, OrdResult};

/// Output spent by the commit transaction, along with the key owning it.
///
/// The output must be a key-path P2TR output of `owner_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingOutput {
    pub outpoint: OutPoint,
    pub value: Amount,
    pub owner_key: PrivateKey,
}

impl FundingOutput {
    pub fn new(outpoint: OutPoint, value: Amount, owner_key: PrivateKey) -> Self {
        Self {
            outpoint,
            value,
            owner_key,
        }
    }

    pub fn from_utxo(utxo: &Utxo, owner_key: PrivateKey) -> Self {
        Self::new(utxo.outpoint(), utxo.amount, owner_key)
    }

    pub fn script_pubkey(&self, secp: &Secp256k1<All>) -> ScriptBuf {
        let (x_public_key, _) = self.owner_key.inner.x_only_public_key(secp);
        ScriptBuf::new_p2tr(secp, x_public_key, None)
    }

    /// The output being spent, as required to compute Taproot sighashes.
    pub fn prevout(&self, secp: &Secp256k1<All>) -> TxOut {
        TxOut {
            value: self.value,
            script_pubkey: self.script_pubkey(secp),
        }
    }
}

/// Unspent transaction output to be used as input of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub id: Txid,
    pub index: u32,
    pub amount: Amount,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.id,
            vout: self.index,
        }
    }
}

/// How commitments are revealed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealMode {
    /// One reveal transaction per inscription
    #[default]
    Individual,
    /// A single reveal transaction spending every commitment
    Aggregated,
}

/// Reveal transaction(s) of a commit transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealPlan {
    /// `transactions[i]` reveals inscription `i`
    Individual(Vec<Transaction>),
    /// Input and output `i` belong to inscription `i`
    Aggregated(Transaction),
}

impl RevealPlan {
    /// Reveal transactions, in broadcast order.
    pub fn transactions(&self) -> &[Transaction] {
        match self {
            Self::Individual(transactions) => transactions,
            Self::Aggregated(transaction) => std::slice::from_ref(transaction),
        }
    }

    /// Txid of the reveal of each inscription, in payload order.
    pub fn txid_per_inscription(&self) -> Vec<Txid> {
        match self {
            Self::Individual(transactions) => transactions.iter().map(|tx| tx.txid()).collect(),
            Self::Aggregated(transaction) => vec![transaction.txid(); transaction.output.len()],
        }
    }
}

/// Assembles and signs commit and reveal transactions.
#[derive(Debug, Clone)]
pub struct OrdTransactionBuilder {
    signer: Wallet,
    secp: Secp256k1<All>,
}

impl Default for OrdTransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrdTransactionBuilder {
    pub fn new() -> Self {
        Self {
            signer: Wallet::new(),
            secp: Secp256k1::new(),
        }
    }

    pub fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }

    /// Builds the unsigned commit transaction.
    ///
    /// Spends every funding output and creates one output per commitment, in order,
    /// followed by the change output, if the fee plan has one.
    pub fn assemble_commit(
        &self,
        funding: &[FundingOutput],
        commitments: &[Commitment],
        fee_plan: &FeePlan,
        change_script: &ScriptBuf,
    ) -> OrdResult<Transaction> {
        if commitments.len() != fee_plan.funding_per_commitment.len() {
            return Err(OrdError::InvalidInputs);
        }

        let tx_in = funding
            .iter()
            .map(|output| unsigned_input(output.outpoint))
            .collect();

        let mut tx_out = commitments
            .iter()
            .zip(&fee_plan.funding_per_commitment)
            .map(|(commitment, value)| TxOut {
                value: *value,
                script_pubkey: commitment.script_pubkey(),
            })
            .collect::<Vec<_>>();
        if let Some(change) = fee_plan.change {
            tx_out.push(TxOut {
                value: change,
                script_pubkey: change_script.clone(),
            });
        }

        Ok(Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: tx_in,
            output: tx_out,
        })
    }

    pub fn sign_commit(
        &self,
        funding: &[FundingOutput],
        unsigned_commit_tx: Transaction,
    ) -> OrdResult<Transaction> {
        let tx = self
            .signer
            .sign_commit_transaction(funding, unsigned_commit_tx)?;
        debug!("commit transaction signed: {}", tx.txid());

        Ok(tx)
    }

    /// Builds the unsigned reveal transaction(s) spending the commitment outputs of `commit_tx`.
    ///
    /// Every inscription output pays the postage to the payload destination.
    pub fn assemble_reveal(
        &self,
        commit_tx: &Transaction,
        payloads: &[InscriptionPayload],
        fee_plan: &FeePlan,
    ) -> OrdResult<RevealPlan> {
        if commit_tx.output.len() < payloads.len() {
            return Err(OrdError::InvalidInputs);
        }

        let commit_txid = commit_tx.txid();
        let input = |index: usize| {
            unsigned_input(OutPoint {
                txid: commit_txid,
                vout: index as u32,
            })
        };
        let output = |payload: &InscriptionPayload| TxOut {
            value: fee_plan.postage,
            script_pubkey: payload.destination.script_pubkey(),
        };

        let plan = match fee_plan.reveal_mode {
            RevealMode::Individual => RevealPlan::Individual(
                payloads
                    .iter()
                    .enumerate()
                    .map(|(index, payload)| Transaction {
                        version: Version::TWO,
                        lock_time: LockTime::ZERO,
                        input: vec![input(index)],
                        output: vec![output(payload)],
                    })
                    .collect(),
            ),
            RevealMode::Aggregated => RevealPlan::Aggregated(Transaction {
                version: Version::TWO,
                lock_time: LockTime::ZERO,
                input: (0..payloads.len()).map(input).collect(),
                output: payloads.iter().map(output).collect(),
            }),
        };

        Ok(plan)
    }

    /// Signs every reveal input with `keypair`, the key locking the envelope leaves.
    pub fn sign_reveal(
        &self,
        plan: RevealPlan,
        commit_tx: &Transaction,
        commitments: &[Commitment],
        keypair: &Keypair,
    ) -> OrdResult<RevealPlan> {
        let prevout = |index: usize| {
            commit_tx
                .output
                .get(index)
                .cloned()
                .ok_or(OrdError::InputNotFound(index))
        };

        let signed = match plan {
            RevealPlan::Individual(transactions) => {
                if transactions.len() != commitments.len() {
                    return Err(OrdError::InvalidInputs);
                }

                let mut signed = Vec::with_capacity(transactions.len());
                for (index, (tx, commitment)) in transactions.into_iter().zip(commitments).enumerate()
                {
                    let tx = self.signer.sign_reveal_transaction(
                        keypair,
                        &[commitment],
                        &[prevout(index)?],
                        tx,
                    )?;
                    debug!("reveal transaction {index} signed: {}", tx.txid());
                    signed.push(tx);
                }
                RevealPlan::Individual(signed)
            }
            RevealPlan::Aggregated(tx) => {
                let prevouts = (0..commitments.len())
                    .map(prevout)
                    .collect::<OrdResult<Vec<_>>>()?;
                let tx = self.signer.sign_reveal_transaction(
                    keypair,
                    &commitments.iter().collect::<Vec<_>>(),
                    &prevouts,
                    tx,
                )?;
                debug!("aggregated reveal transaction signed: {}", tx.txid());
                RevealPlan::Aggregated(tx)
            }
        };

        Ok(signed)
    }
}

fn unsigned_input(previous_output: OutPoint) -> TxIn {
    TxIn {
        previous_output,
        script_sig: ScriptBuf::new(),
        sequence: Sequence::from_consensus(0xffffffff),
        witness: Witness::new(),
    }
}

#[cfg(test)]
mod test {
    use bitcoin::FeeRate;

    use super::*;
    use crate::utils::fees::FeePlanArgs;
    use crate::utils::test_utils::{
        funding_output, test_address, test_keypair, verify_key_path_spend,
        verify_script_path_spend,
    };
    use crate::wallet::builder::envelope::EnvelopeBuilder;
    use crate::wallet::parser::ParsedEnvelope;
    use crate::Brc20;

    struct Round {
        funding: Vec<FundingOutput>,
        payloads: Vec<InscriptionPayload>,
        commitments: Vec<Commitment>,
        fee_plan: FeePlan,
    }

    fn round(funding: Vec<FundingOutput>, repeat: usize, reveal_mode: RevealMode) -> Round {
        let builder = OrdTransactionBuilder::new();
        let (_, x_public_key) = test_keypair();
        let payloads =
            InscriptionPayload::from_inscription(&Brc20::mint("ordi", "100"), test_address())
                .unwrap()
                .repeat(repeat);
        let commitments = payloads
            .iter()
            .map(|payload| {
                let envelope = EnvelopeBuilder::default()
                    .build(payload, &x_public_key)
                    .unwrap();
                Commitment::derive(builder.secp(), x_public_key, &envelope).unwrap()
            })
            .collect::<Vec<_>>();
        let destinations = payloads
            .iter()
            .map(|payload| payload.destination.script_pubkey())
            .collect::<Vec<_>>();
        let change_script = test_address().script_pubkey();

        let fee_plan = FeePlan::plan(FeePlanArgs {
            funding_count: funding.len(),
            funding_total: funding
                .iter()
                .fold(Amount::ZERO, |total, output| total + output.value),
            commitments: &commitments,
            destinations: &destinations,
            change_script: &change_script,
            postage: Amount::from_sat(10_000),
            dust_floor: Amount::from_sat(10_000),
            commit_fee_rate: FeeRate::from_sat_per_vb(10).unwrap(),
            reveal_fee_rate: FeeRate::from_sat_per_vb(12).unwrap(),
            reveal_mode,
        })
        .unwrap();

        Round {
            funding,
            payloads,
            commitments,
            fee_plan,
        }
    }

    #[test]
    fn test_should_build_commit_transaction() {
        let builder = OrdTransactionBuilder::new();
        let round = round(
            vec![funding_output(30_000, 0), funding_output(40_000, 1)],
            2,
            RevealMode::Individual,
        );
        let change_script = test_address().script_pubkey();

        let unsigned = builder
            .assemble_commit(
                &round.funding,
                &round.commitments,
                &round.fee_plan,
                &change_script,
            )
            .unwrap();

        // txin
        assert_eq!(unsigned.input.len(), 2);
        for (input, funding) in unsigned.input.iter().zip(&round.funding) {
            assert_eq!(input.previous_output, funding.outpoint);
            assert_eq!(input.sequence, Sequence::from_consensus(0xffffffff));
            assert!(input.witness.is_empty());
        }

        // txout
        assert_eq!(unsigned.output.len(), 3);
        for (index, commitment) in round.commitments.iter().enumerate() {
            assert_eq!(unsigned.output[index].script_pubkey, commitment.script_pubkey());
            assert_eq!(
                unsigned.output[index].value,
                round.fee_plan.funding_per_commitment[index]
            );
        }
        assert_eq!(unsigned.output[2].script_pubkey, change_script);
        assert_eq!(Some(unsigned.output[2].value), round.fee_plan.change);

        let signed = builder.sign_commit(&round.funding, unsigned).unwrap();
        assert_eq!(signed.vsize(), round.fee_plan.commit_vsize);

        let prevouts = round
            .funding
            .iter()
            .map(|output| output.prevout(builder.secp()))
            .collect::<Vec<_>>();
        assert!(verify_key_path_spend(&signed, 0, &prevouts));
        assert!(verify_key_path_spend(&signed, 1, &prevouts));
    }

    #[test]
    fn test_should_build_individual_reveals() {
        let builder = OrdTransactionBuilder::new();
        let (keypair, _) = test_keypair();
        let round = round(vec![funding_output(100_000, 0)], 3, RevealMode::Individual);
        let commit_tx = builder
            .assemble_commit(
                &round.funding,
                &round.commitments,
                &round.fee_plan,
                &test_address().script_pubkey(),
            )
            .and_then(|tx| builder.sign_commit(&round.funding, tx))
            .unwrap();

        let unsigned = builder
            .assemble_reveal(&commit_tx, &round.payloads, &round.fee_plan)
            .unwrap();
        let plan = builder
            .sign_reveal(unsigned, &commit_tx, &round.commitments, &keypair)
            .unwrap();

        let RevealPlan::Individual(transactions) = &plan else {
            panic!("expected individual reveals");
        };
        assert_eq!(transactions.len(), 3);

        for (index, tx) in transactions.iter().enumerate() {
            assert_eq!(tx.input.len(), 1);
            assert_eq!(tx.output.len(), 1);
            assert_eq!(tx.input[0].previous_output.txid, commit_tx.txid());
            assert_eq!(tx.input[0].previous_output.vout, index as u32);
            assert_eq!(tx.output[0].value, Amount::from_sat(10_000));
            assert_eq!(
                tx.output[0].script_pubkey,
                round.payloads[index].destination.script_pubkey()
            );
            assert_eq!(tx.vsize(), round.fee_plan.reveal_vsizes[index]);

            assert!(verify_script_path_spend(
                tx,
                0,
                &[commit_tx.output[index].clone()]
            ));

            let parsed = ParsedEnvelope::from_transaction(tx);
            assert_eq!(parsed.len(), 1);
            assert_eq!(parsed[0].body, round.payloads[index].body);
        }

        // each reveal pays exactly its planned fee
        for (index, tx) in transactions.iter().enumerate() {
            let fee = commit_tx.output[index].value - tx.output[0].value;
            assert_eq!(
                fee,
                Amount::from_sat(round.fee_plan.reveal_vsizes[index] as u64 * 12)
            );
        }

        let txids = plan.txid_per_inscription();
        assert_eq!(txids.len(), 3);
        assert_eq!(txids[0], transactions[0].txid());
    }

    #[test]
    fn test_should_build_aggregated_reveal() {
        let builder = OrdTransactionBuilder::new();
        let (keypair, _) = test_keypair();
        let round = round(vec![funding_output(100_000, 0)], 3, RevealMode::Aggregated);
        let commit_tx = builder
            .assemble_commit(
                &round.funding,
                &round.commitments,
                &round.fee_plan,
                &test_address().script_pubkey(),
            )
            .and_then(|tx| builder.sign_commit(&round.funding, tx))
            .unwrap();

        let unsigned = builder
            .assemble_reveal(&commit_tx, &round.payloads, &round.fee_plan)
            .unwrap();
        let plan = builder
            .sign_reveal(unsigned, &commit_tx, &round.commitments, &keypair)
            .unwrap();

        let RevealPlan::Aggregated(tx) = &plan else {
            panic!("expected an aggregated reveal");
        };
        assert_eq!(tx.input.len(), 3);
        assert_eq!(tx.output.len(), 3);
        assert_eq!(tx.vsize(), round.fee_plan.reveal_vsizes[0]);

        for index in 0..3 {
            assert_eq!(tx.input[index].previous_output.vout, index as u32);
            assert_eq!(
                tx.output[index].script_pubkey,
                round.payloads[index].destination.script_pubkey()
            );
            assert!(verify_script_path_spend(tx, index, &commit_tx.output[..3]));
        }

        let parsed = ParsedEnvelope::from_transaction(tx);
        assert_eq!(
            parsed.iter().map(|envelope| envelope.input).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(plan.transactions().len(), 1);
        assert_eq!(plan.txid_per_inscription(), vec![tx.txid(); 3]);
    }

    #[test]
    fn test_should_reject_mismatching_reveal_plan() {
        let builder = OrdTransactionBuilder::new();
        let (keypair, _) = test_keypair();
        let round = round(vec![funding_output(100_000, 0)], 2, RevealMode::Individual);
        let commit_tx = builder
            .assemble_commit(
                &round.funding,
                &round.commitments,
                &round.fee_plan,
                &test_address().script_pubkey(),
            )
            .unwrap();
        let unsigned = builder
            .assemble_reveal(&commit_tx, &round.payloads, &round.fee_plan)
            .unwrap();

        assert!(matches!(
            builder.sign_reveal(unsigned, &commit_tx, &round.commitments[..1], &keypair),
            Err(OrdError::InvalidInputs)
        ));
    }
}
