use bitcoin::hashes::Hash as _;
use bitcoin::key::{Keypair, Secp256k1, TapTweak as _};
use bitcoin::secp256k1::{self, All};
use bitcoin::sighash::{Prevouts, SighashCache};
use bitcoin::{
    Address, Network, PrivateKey, TapSighashType, Transaction, TxOut, Witness, XOnlyPublicKey,
};

use super::taproot::Commitment;
use super::FundingOutput;
use crate::{OrdError, OrdResult};

/// Key-path-only P2TR address of `private_key`; funding outputs are looked up here
/// and change goes back to it.
pub fn signer_address(private_key: &PrivateKey, network: Network) -> Address {
    let secp = Secp256k1::new();
    let (x_public_key, _) = private_key.inner.x_only_public_key(&secp);
    Address::p2tr(&secp, x_public_key, None, network)
}

/// Decodes a WIF signing key for `network`.
///
/// WIF only tells mainnet and test networks apart, so a testnet key is accepted
/// for testnet, signet and regtest.
pub fn decode_signing_key(wif: &str, network: Network) -> OrdResult<PrivateKey> {
    let private_key =
        PrivateKey::from_wif(wif.trim()).map_err(|err| OrdError::InvalidKey(err.to_string()))?;

    let is_mainnet_key = private_key.network == Network::Bitcoin;
    if is_mainnet_key != (network == Network::Bitcoin) {
        return Err(OrdError::InvalidKey(format!(
            "key is for {}, but {network} was requested",
            private_key.network
        )));
    }

    Ok(private_key)
}

/// Signs commit and reveal transactions with local keys.
///
/// Signatures use no auxiliary randomness, so the same transaction signed
/// twice gets the same witness and the same txid.
#[derive(Debug, Clone)]
pub struct Wallet {
    secp: Secp256k1<All>,
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wallet {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Signs every input of the commit transaction with a key-path spend.
    ///
    /// `funding[i]` must be the output spent by input `i`.
    pub fn sign_commit_transaction(
        &self,
        funding: &[FundingOutput],
        transaction: Transaction,
    ) -> OrdResult<Transaction> {
        if transaction.input.len() != funding.len() {
            return Err(OrdError::InvalidInputs);
        }

        let prevouts_array = funding
            .iter()
            .map(|output| output.prevout(&self.secp))
            .collect::<Vec<_>>();
        let prevouts = Prevouts::All(&prevouts_array);

        let mut sighash_cache = SighashCache::new(transaction);
        for (index, output) in funding.iter().enumerate() {
            let sighash = sighash_cache.taproot_key_spend_signature_hash(
                index,
                &prevouts,
                TapSighashType::Default,
            )?;

            let keypair = Keypair::from_secret_key(&self.secp, &output.owner_key.inner)
                .tap_tweak(&self.secp, None)
                .to_inner();

            let msg = secp256k1::Message::from_digest(sighash.to_byte_array());
            let sig = self.secp.sign_schnorr_no_aux_rand(&msg, &keypair);

            // verify
            self.secp
                .verify_schnorr(&sig, &msg, &keypair.x_only_public_key().0)?;

            let signature = bitcoin::taproot::Signature {
                sig,
                hash_ty: TapSighashType::Default,
            };
            self.append_witness_to_input(
                &mut sighash_cache,
                index,
                Witness::from_slice(&[signature.to_vec()]),
            )?;
        }

        Ok(sighash_cache.into_transaction())
    }

    /// Signs every input of a reveal transaction with a script-path spend of its envelope leaf.
    ///
    /// Input `i` spends `prevouts[i]`, which is locked by `commitments[i]`.
    pub fn sign_reveal_transaction(
        &self,
        keypair: &Keypair,
        commitments: &[&Commitment],
        prevouts: &[TxOut],
        transaction: Transaction,
    ) -> OrdResult<Transaction> {
        if transaction.input.len() != commitments.len() || commitments.len() != prevouts.len() {
            return Err(OrdError::InvalidInputs);
        }

        let x_public_key = XOnlyPublicKey::from_keypair(keypair).0;
        let prevouts_all = Prevouts::All(prevouts);

        let mut sighash_cache = SighashCache::new(transaction);
        for (index, commitment) in commitments.iter().enumerate() {
            if commitment.internal_key != x_public_key {
                return Err(OrdError::InvalidKey(format!(
                    "reveal key {x_public_key} can't spend commitment of {}",
                    commitment.internal_key
                )));
            }

            let sighash = sighash_cache.taproot_script_spend_signature_hash(
                index,
                &prevouts_all,
                commitment.leaf_hash(),
                TapSighashType::Default,
            )?;

            let msg = secp256k1::Message::from_digest(sighash.to_byte_array());
            let sig = self.secp.sign_schnorr_no_aux_rand(&msg, keypair);

            // verify
            self.secp.verify_schnorr(&sig, &msg, &x_public_key)?;

            let signature = bitcoin::taproot::Signature {
                sig,
                hash_ty: TapSighashType::Default,
            };
            let mut witness = Witness::new();
            witness.push(signature.to_vec());
            witness.push(commitment.leaf_script.as_bytes());
            witness.push(commitment.control_block.serialize());

            self.append_witness_to_input(&mut sighash_cache, index, witness)?;
        }

        Ok(sighash_cache.into_transaction())
    }

    fn append_witness_to_input(
        &self,
        sighasher: &mut SighashCache<Transaction>,
        index: usize,
        witness: Witness,
    ) -> OrdResult<()> {
        debug!("witness of input {index}: {} items", witness.len());

        *sighasher
            .witness_mut(index)
            .ok_or(OrdError::InputNotFound(index))? = witness;

        Ok(())
    }
}
