mod taproot_keypair;

use bitcoin::key::TweakedPublicKey;
use bitcoin::secp256k1::{Secp256k1, Verification};
use bitcoin::taproot::{ControlBlock, LeafVersion, TapLeafHash, TapNodeHash, TaprootBuilder};
use bitcoin::{Address, Network, ScriptBuf, XOnlyPublicKey};

pub use self::taproot_keypair::TaprootKeypair;
use super::envelope::Envelope;
use crate::{OrdError, OrdResult};

/// Taproot commitment to a single envelope leaf.
///
/// `output_key` goes into the commit transaction output, `control_block`
/// into the reveal witness to prove the leaf is committed under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    pub internal_key: XOnlyPublicKey,
    pub leaf_script: ScriptBuf,
    pub merkle_root: TapNodeHash,
    pub output_key: TweakedPublicKey,
    pub control_block: ControlBlock,
}

impl Commitment {
    /// Builds a single-leaf script tree over `envelope` and tweaks `internal_key` with its root.
    pub fn derive<C: Verification>(
        secp: &Secp256k1<C>,
        internal_key: XOnlyPublicKey,
        envelope: &Envelope,
    ) -> OrdResult<Self> {
        let taproot_spend_info = TaprootBuilder::new()
            .add_leaf(0, envelope.script.clone())
            .map_err(|_| OrdError::TaprootCompute)?
            .finalize(secp, internal_key)
            .map_err(|_| OrdError::TaprootCompute)?;

        let control_block = taproot_spend_info
            .control_block(&(envelope.script.clone(), LeafVersion::TapScript))
            .ok_or(OrdError::TaprootCompute)?;
        let merkle_root = taproot_spend_info
            .merkle_root()
            .ok_or(OrdError::TaprootCompute)?;

        Ok(Self {
            internal_key,
            leaf_script: envelope.script.clone(),
            merkle_root,
            output_key: taproot_spend_info.output_key(),
            control_block,
        })
    }

    pub fn script_pubkey(&self) -> ScriptBuf {
        ScriptBuf::new_p2tr_tweaked(self.output_key)
    }

    pub fn address(&self, network: Network) -> Address {
        Address::p2tr_tweaked(self.output_key, network)
    }

    pub fn leaf_hash(&self) -> TapLeafHash {
        TapLeafHash::from_script(&self.leaf_script, LeafVersion::TapScript)
    }

    /// Checks the control block against the output key, as a validating node would.
    pub fn verify<C: Verification>(&self, secp: &Secp256k1<C>) -> bool {
        self.control_block
            .verify_taproot_commitment(secp, self.output_key.to_inner(), &self.leaf_script)
    }
}

#[cfg(test)]
mod test {
    use bitcoin::key::TapTweak;
    use bitcoin::taproot::TAPROOT_CONTROL_BASE_SIZE;

    use super::*;
    use crate::inscription::InscriptionPayload;
    use crate::utils::test_utils::{test_address, test_keypair};
    use crate::wallet::builder::envelope::EnvelopeBuilder;

    fn envelope(body: &[u8]) -> Envelope {
        let (_, x_public_key) = test_keypair();
        EnvelopeBuilder::default()
            .build(
                &InscriptionPayload::new("text/plain", body, test_address()),
                &x_public_key,
            )
            .unwrap()
    }

    #[test]
    fn test_should_derive_verifiable_commitment() {
        let secp = Secp256k1::new();
        let (_, internal_key) = test_keypair();

        for body in [Vec::new(), b"hello".to_vec(), vec![42u8; 2_000]] {
            let commitment = Commitment::derive(&secp, internal_key, &envelope(&body)).unwrap();

            assert!(commitment.verify(&secp));
            assert_eq!(commitment.control_block.internal_key, internal_key);
            assert_eq!(commitment.control_block.leaf_version, LeafVersion::TapScript);
            assert_eq!(
                commitment.control_block.serialize().len(),
                TAPROOT_CONTROL_BASE_SIZE
            );
        }
    }

    #[test]
    fn test_should_tweak_with_leaf_hash() {
        let secp = Secp256k1::new();
        let (_, internal_key) = test_keypair();
        let commitment = Commitment::derive(&secp, internal_key, &envelope(b"hello")).unwrap();

        // a single leaf tree has the leaf hash as root
        assert_eq!(
            commitment.merkle_root,
            TapNodeHash::from(commitment.leaf_hash())
        );
        let (expected, _) = internal_key.tap_tweak(&secp, Some(commitment.merkle_root));
        assert_eq!(commitment.output_key, expected);
        assert_ne!(commitment.output_key.to_inner(), internal_key);
    }

    #[test]
    fn test_should_not_verify_another_leaf() {
        let secp = Secp256k1::new();
        let (_, internal_key) = test_keypair();
        let commitment = Commitment::derive(&secp, internal_key, &envelope(b"hello")).unwrap();
        let other = envelope(b"world");

        assert!(!commitment.control_block.verify_taproot_commitment(
            &secp,
            commitment.output_key.to_inner(),
            &other.script
        ));
    }

    #[test]
    fn test_should_pay_to_output_key() {
        let secp = Secp256k1::new();
        let (_, internal_key) = test_keypair();
        let commitment = Commitment::derive(&secp, internal_key, &envelope(b"hello")).unwrap();

        let address = commitment.address(Network::Testnet);
        assert_eq!(address.script_pubkey(), commitment.script_pubkey());
        assert!(commitment.script_pubkey().is_p2tr());
    }
}
