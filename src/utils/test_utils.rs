use std::str::FromStr as _;
use std::sync::Mutex;

use bitcoin::hashes::Hash as _;
use bitcoin::key::{Keypair, Secp256k1};
use bitcoin::secp256k1::{schnorr, Message};
use bitcoin::sighash::{Prevouts, SighashCache};
use bitcoin::taproot::{ControlBlock, LeafVersion, TapLeafHash};
use bitcoin::{
    Address, Amount, Network, OutPoint, PrivateKey, Script, TapSighashType, Transaction, TxOut,
    Txid, XOnlyPublicKey,
};

use crate::chain::{Broadcaster, UtxoSource};
use crate::inscriber::CancelToken;
use crate::inscription::InscriptionPayload;
use crate::wallet::builder::envelope::EnvelopeBuilder;
use crate::wallet::builder::signer::signer_address;
use crate::wallet::builder::taproot::Commitment;
use crate::wallet::builder::{FundingOutput, Utxo};
use crate::{OrdError, OrdResult};

// <https://mempool.space/testnet/address/tb1qzc8dhpkg5e4t6xyn4zmexxljc4nkje59dg3ark>
pub const TEST_WIF: &str = "cVkWbHmoCx6jS8AyPNQqvFr8V9r2qzDHJLaxGDQgDJfxT73w6fuU";
/// The transaction that funded the test wallet
const FUNDING_TXID: &str = "791b415dc6946d864d368a0e5ec5c09ee2ad39cf298bc6e3f9aec293732cfda7";

pub fn test_private_key() -> PrivateKey {
    PrivateKey::from_wif(TEST_WIF).unwrap()
}

pub fn test_keypair() -> (Keypair, XOnlyPublicKey) {
    let keypair = Keypair::from_secret_key(&Secp256k1::new(), &test_private_key().inner);
    let x_public_key = keypair.x_only_public_key().0;
    (keypair, x_public_key)
}

/// Key-path P2TR address of the test key.
pub fn test_address() -> Address {
    signer_address(&test_private_key(), Network::Testnet)
}

pub fn test_utxo(sats: u64, index: u32) -> Utxo {
    Utxo {
        id: Txid::from_str(FUNDING_TXID).unwrap(),
        index,
        amount: Amount::from_sat(sats),
    }
}

pub fn funding_output(sats: u64, index: u32) -> FundingOutput {
    FundingOutput::new(
        OutPoint {
            txid: Txid::from_str(FUNDING_TXID).unwrap(),
            vout: index,
        },
        Amount::from_sat(sats),
        test_private_key(),
    )
}

/// Commitment to a `text/plain;charset=utf-8` envelope of `body`, locked by the test key.
pub fn test_commitment(body: &[u8]) -> Commitment {
    let (_, x_public_key) = test_keypair();
    let envelope = EnvelopeBuilder::default()
        .build(
            &InscriptionPayload::new("text/plain;charset=utf-8", body, test_address()),
            &x_public_key,
        )
        .unwrap();

    Commitment::derive(&Secp256k1::new(), x_public_key, &envelope).unwrap()
}

/// Verifies the key-path spend of input `index` as a validating node would.
pub fn verify_key_path_spend(tx: &Transaction, index: usize, prevouts: &[TxOut]) -> bool {
    let secp = Secp256k1::verification_only();
    let witness = &tx.input[index].witness;
    if witness.len() != 1 {
        return false;
    }

    let Ok(signature) = schnorr::Signature::from_slice(&witness[0]) else {
        return false;
    };
    let Some(output_key) = output_key(&prevouts[index].script_pubkey) else {
        return false;
    };
    let Ok(sighash) = SighashCache::new(tx).taproot_key_spend_signature_hash(
        index,
        &Prevouts::All(prevouts),
        TapSighashType::Default,
    ) else {
        return false;
    };

    let msg = Message::from_digest(sighash.to_byte_array());
    secp.verify_schnorr(&signature, &msg, &output_key).is_ok()
}

/// Verifies the script-path spend of input `index` through an envelope leaf
/// `<key> OP_CHECKSIG ...`, as a validating node would.
pub fn verify_script_path_spend(tx: &Transaction, index: usize, prevouts: &[TxOut]) -> bool {
    let secp = Secp256k1::verification_only();
    let witness = &tx.input[index].witness;
    if witness.len() != 3 {
        return false;
    }

    let Ok(signature) = schnorr::Signature::from_slice(&witness[0]) else {
        return false;
    };
    let leaf_script = Script::from_bytes(&witness[1]);
    let Ok(control_block) = ControlBlock::decode(&witness[2]) else {
        return false;
    };
    let Some(output_key) = output_key(&prevouts[index].script_pubkey) else {
        return false;
    };
    if !control_block.verify_taproot_commitment(&secp, output_key, leaf_script) {
        return false;
    }

    // the leaf starts with a 32 bytes push of the key
    let Some(Ok(leaf_key)) = leaf_script
        .as_bytes()
        .get(1..33)
        .map(XOnlyPublicKey::from_slice)
    else {
        return false;
    };
    let Ok(sighash) = SighashCache::new(tx).taproot_script_spend_signature_hash(
        index,
        &Prevouts::All(prevouts),
        TapLeafHash::from_script(leaf_script, LeafVersion::TapScript),
        TapSighashType::Default,
    ) else {
        return false;
    };

    let msg = Message::from_digest(sighash.to_byte_array());
    secp.verify_schnorr(&signature, &msg, &leaf_key).is_ok()
}

fn output_key(script_pubkey: &Script) -> Option<XOnlyPublicKey> {
    if !script_pubkey.is_p2tr() {
        return None;
    }
    XOnlyPublicKey::from_slice(&script_pubkey.as_bytes()[2..34]).ok()
}

/// In-memory chain recording every submitted transaction.
#[derive(Debug, Default)]
pub struct MockChain {
    utxos: Vec<Utxo>,
    submitted: Mutex<Vec<Transaction>>,
    /// Submissions to reject, by submission order
    rejected: Vec<usize>,
    fail_lookup: bool,
    cancel_after: Option<(usize, CancelToken)>,
}

impl MockChain {
    pub fn with_utxos(utxos: Vec<Utxo>) -> Self {
        Self {
            utxos,
            ..Default::default()
        }
    }

    /// Rejects the `submission`-th submitted transaction, counting from 0.
    pub fn rejecting(mut self, submission: usize) -> Self {
        self.rejected.push(submission);
        self
    }

    /// Cancels `token` once `submissions` transactions were submitted.
    pub fn cancelling_after(mut self, submissions: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((submissions, token));
        self
    }

    pub fn failing_lookup(mut self) -> Self {
        self.fail_lookup = true;
        self
    }

    pub fn submitted(&self) -> Vec<Transaction> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl UtxoSource for MockChain {
    async fn list_spendable_outputs(&self, _address: &Address) -> OrdResult<Vec<Utxo>> {
        if self.fail_lookup {
            return Err(OrdError::Lookup("connection refused".to_string()));
        }

        Ok(self.utxos.clone())
    }
}

#[async_trait::async_trait]
impl Broadcaster for MockChain {
    async fn submit(&self, raw_tx: &[u8]) -> OrdResult<Txid> {
        let tx: Transaction = bitcoin::consensus::deserialize(raw_tx)
            .map_err(|err| OrdError::ChainReject(err.to_string()))?;

        let mut submitted = self.submitted.lock().unwrap();
        let submission = submitted.len();
        submitted.push(tx.clone());

        if let Some((after, token)) = &self.cancel_after {
            if submitted.len() == *after {
                token.cancel();
            }
        }
        if self.rejected.contains(&submission) {
            return Err(OrdError::ChainReject(format!(
                "submission {submission} rejected: bad-txns-inputs-missingorspent"
            )));
        }

        Ok(tx.txid())
    }
}
