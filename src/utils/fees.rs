use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, FeeRate, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

use super::constants::{MAX_STANDARD_TX_WEIGHT, SCHNORR_SIGNATURE_SIZE};
use crate::wallet::builder::taproot::Commitment;
use crate::wallet::builder::RevealMode;
use crate::{OrdError, OrdResult};

/// Fees, sizes and output values of one commit/reveal round.
///
/// Sizes are measured on dummy transactions carrying witnesses of the same
/// length as the final ones. `SIGHASH_DEFAULT` Schnorr signatures are always
/// 64 bytes long, so the estimate matches the signed transactions exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeePlan {
    pub commit_fee_rate: FeeRate,
    pub reveal_fee_rate: FeeRate,
    pub reveal_mode: RevealMode,
    pub commit_vsize: usize,
    /// One entry per reveal transaction
    pub reveal_vsizes: Vec<usize>,
    /// Value of the commit output locked by each commitment
    pub funding_per_commitment: Vec<Amount>,
    /// Fee of the commit transaction, including any leftover too small for a change output
    pub commit_fee: Amount,
    pub total_reveal_fee: Amount,
    /// Value of every inscription output
    pub postage: Amount,
    /// Value returned to the signer, if worth an output
    pub change: Option<Amount>,
}

/// Arguments for planning the fees of a commit/reveal round
#[derive(Debug, Clone)]
pub struct FeePlanArgs<'a> {
    /// Number of funding outputs spent by the commit transaction
    pub funding_count: usize,
    /// Total value of the funding outputs
    pub funding_total: Amount,
    pub commitments: &'a [Commitment],
    /// Script pubkey of each inscription destination, in commitment order
    pub destinations: &'a [ScriptBuf],
    /// Script pubkey receiving the change of the commit transaction
    pub change_script: &'a ScriptBuf,
    pub postage: Amount,
    pub dust_floor: Amount,
    pub commit_fee_rate: FeeRate,
    pub reveal_fee_rate: FeeRate,
    pub reveal_mode: RevealMode,
}

impl FeePlan {
    pub fn plan(args: FeePlanArgs) -> OrdResult<Self> {
        if args.commitments.is_empty() {
            return Err(OrdError::NoInscriptions);
        }
        if args.commitments.len() != args.destinations.len() {
            return Err(OrdError::InvalidInputs);
        }

        let inscription_outputs = args
            .destinations
            .iter()
            .map(|destination| TxOut {
                value: args.postage,
                script_pubkey: destination.clone(),
            })
            .collect::<Vec<_>>();

        let (reveal_vsizes, reveal_fees) = match args.reveal_mode {
            RevealMode::Individual => {
                let mut vsizes = Vec::with_capacity(args.commitments.len());
                let mut fees = Vec::with_capacity(args.commitments.len());
                for (commitment, output) in args.commitments.iter().zip(&inscription_outputs) {
                    let vsize = standard_reveal_vsize(&[commitment], vec![output.clone()])?;
                    vsizes.push(vsize);
                    fees.push(fee(args.reveal_fee_rate, vsize)?);
                }
                (vsizes, fees)
            }
            RevealMode::Aggregated => {
                let commitments = args.commitments.iter().collect::<Vec<_>>();
                let vsize = standard_reveal_vsize(&commitments, inscription_outputs.clone())?;
                let fee = fee(args.reveal_fee_rate, vsize)?;

                // each commitment carries an equal share, the first one the remainder
                let count = args.commitments.len() as u64;
                let share = fee.to_sat() / count;
                let remainder = fee.to_sat() % count;
                let fees = (0..count)
                    .map(|index| {
                        Amount::from_sat(if index == 0 { share + remainder } else { share })
                    })
                    .collect::<Vec<_>>();
                (vec![vsize], fees)
            }
        };

        let funding_per_commitment = reveal_fees
            .iter()
            .map(|fee| fee.checked_add(args.postage).ok_or(OrdError::FeeOverflow))
            .collect::<OrdResult<Vec<_>>>()?;
        let total_reveal_fee = checked_sum(reveal_fees.iter().copied())?;
        let commitments_total = checked_sum(funding_per_commitment.iter().copied())?;

        let mut commit_outputs = args
            .commitments
            .iter()
            .zip(&funding_per_commitment)
            .map(|(commitment, value)| TxOut {
                value: *value,
                script_pubkey: commitment.script_pubkey(),
            })
            .collect::<Vec<_>>();

        let vsize_without_change = estimate_commit_vsize(args.funding_count, commit_outputs.clone());
        let fee_without_change = fee(args.commit_fee_rate, vsize_without_change)?;
        let required = commitments_total
            .checked_add(fee_without_change)
            .ok_or(OrdError::FeeOverflow)?;
        debug!(
            "required funding: {required} ({commitments_total} locked into commitments, {fee_without_change} commit fee); available: {}",
            args.funding_total
        );
        if args.funding_total < required {
            return Err(OrdError::InsufficientFunds {
                required,
                available: args.funding_total,
            });
        }

        commit_outputs.push(TxOut {
            value: Amount::ZERO,
            script_pubkey: args.change_script.clone(),
        });
        let vsize_with_change = estimate_commit_vsize(args.funding_count, commit_outputs);
        let fee_with_change = fee(args.commit_fee_rate, vsize_with_change)?;
        let leftover = args
            .funding_total
            .checked_sub(commitments_total)
            .and_then(|left| left.checked_sub(fee_with_change));

        let (commit_vsize, commit_fee, change) = match leftover {
            Some(change) if change > args.dust_floor => {
                (vsize_with_change, fee_with_change, Some(change))
            }
            _ => {
                debug!("leftover below the dust floor, leaving it to the miners");
                (
                    vsize_without_change,
                    args.funding_total - commitments_total,
                    None,
                )
            }
        };

        let plan = Self {
            commit_fee_rate: args.commit_fee_rate,
            reveal_fee_rate: args.reveal_fee_rate,
            reveal_mode: args.reveal_mode,
            commit_vsize,
            reveal_vsizes,
            funding_per_commitment,
            commit_fee,
            total_reveal_fee,
            postage: args.postage,
            change,
        };
        info!(
            "fee plan: commit {} vB for {}, reveals {:?} vB for {}, change {:?}",
            plan.commit_vsize, plan.commit_fee, plan.reveal_vsizes, plan.total_reveal_fee, plan.change
        );

        Ok(plan)
    }

    /// Fees paid to the miners by the commit and every reveal transaction.
    pub fn network_fee(&self) -> Amount {
        self.commit_fee + self.total_reveal_fee
    }

    /// Value locked into the inscription outputs.
    pub fn total_postage(&self) -> Amount {
        self.postage * self.funding_per_commitment.len() as u64
    }

    /// Everything the signer pays for the round: network fees and postage.
    pub fn total_spent(&self) -> Amount {
        self.network_fee() + self.total_postage()
    }
}

/// Virtual size of a transaction spending `inputs` Taproot outputs by key path.
pub fn estimate_commit_vsize(inputs: usize, outputs: Vec<TxOut>) -> usize {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: (0..inputs)
            .map(|_| dummy_input(Witness::from_slice(&[[0u8; SCHNORR_SIGNATURE_SIZE]])))
            .collect(),
        output: outputs,
    }
    .vsize()
}

/// Virtual size of a transaction spending each of `commitments` through its envelope leaf.
pub fn estimate_reveal_vsize(commitments: &[&Commitment], outputs: Vec<TxOut>) -> usize {
    dummy_reveal(commitments, outputs).vsize()
}

/// Like [`estimate_reveal_vsize`], but fails when the reveal would be too heavy to relay.
fn standard_reveal_vsize(commitments: &[&Commitment], outputs: Vec<TxOut>) -> OrdResult<usize> {
    let reveal = dummy_reveal(commitments, outputs);
    let weight = reveal.weight().to_wu();
    if weight > MAX_STANDARD_TX_WEIGHT {
        return Err(OrdError::RevealTooHeavy {
            weight,
            max: MAX_STANDARD_TX_WEIGHT,
        });
    }

    Ok(reveal.vsize())
}

fn dummy_reveal(commitments: &[&Commitment], outputs: Vec<TxOut>) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: commitments
            .iter()
            .map(|commitment| {
                let mut witness = Witness::new();
                witness.push([0u8; SCHNORR_SIGNATURE_SIZE]);
                witness.push(commitment.leaf_script.as_bytes());
                witness.push(commitment.control_block.serialize());
                dummy_input(witness)
            })
            .collect(),
        output: outputs,
    }
}

fn dummy_input(witness: Witness) -> TxIn {
    TxIn {
        previous_output: OutPoint::null(),
        script_sig: ScriptBuf::new(),
        sequence: Sequence::from_consensus(0xffffffff),
        witness,
    }
}

fn fee(fee_rate: FeeRate, vsize: usize) -> OrdResult<Amount> {
    fee_rate
        .fee_vb(vsize as u64)
        .ok_or(OrdError::FeeOverflow)
}

fn checked_sum(amounts: impl Iterator<Item = Amount>) -> OrdResult<Amount> {
    amounts
        .into_iter()
        .try_fold(Amount::ZERO, |total, amount| total.checked_add(amount))
        .ok_or(OrdError::FeeOverflow)
}
