use bitcoin::key::{Keypair, Secp256k1};
use bitcoin::secp256k1::{All, SecretKey};
use bitcoin::{PrivateKey, XOnlyPublicKey};

/// Key locking the envelope leaf, and internal key of its commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaprootKeypair {
    /// Use the given secret key; the same inputs always yield the same transactions
    SecretKey(SecretKey),
    /// Generate a fresh keypair for every request
    #[cfg(feature = "rand")]
    Random,
}

impl TaprootKeypair {
    /// Returns the keypair signing the reveal inputs, and its x-only public key
    /// written into the envelope leaf.
    pub fn generate_keypair(&self, secp: &Secp256k1<All>) -> (Keypair, XOnlyPublicKey) {
        let keypair = match self {
            Self::SecretKey(secret_key) => Keypair::from_secret_key(secp, secret_key),
            #[cfg(feature = "rand")]
            Self::Random => Keypair::new(secp, &mut rand::thread_rng()),
        };

        let (x_public_key, _) = keypair.x_only_public_key();
        (keypair, x_public_key)
    }
}

impl From<&PrivateKey> for TaprootKeypair {
    fn from(private_key: &PrivateKey) -> Self {
        Self::SecretKey(private_key.inner)
    }
}
