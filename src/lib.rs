//! # brc20-inscriber
//!
//! Builds, signs and broadcasts the commit/reveal transaction pair that
//! inscribes BRC-20 operations (or any other content) into a Taproot
//! script-path witness, following the ordinals envelope convention.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::str::FromStr;
//!
//! use bitcoin::{Amount, FeeRate, Network, OutPoint, PrivateKey};
//! use brc20_inscriber::{
//!     signer_address, Brc20, FundingOutput, Inscriber, InscriberConfig, InscriptionPayload,
//!     InscriptionRequest, RevealMode,
//! };
//!
//! # fn run<C: brc20_inscriber::UtxoSource + brc20_inscriber::Broadcaster>(chain: C) -> brc20_inscriber::OrdResult<()> {
//! let key = PrivateKey::from_wif("cVkWbHmoCx6jS8AyPNQqvFr8V9r2qzDHJLaxGDQgDJfxT73w6fuU").unwrap();
//! let address = signer_address(&key, Network::Testnet);
//!
//! let request = InscriptionRequest::new(
//!     vec![FundingOutput::new(OutPoint::from_str(
//!         "791b415dc6946d864d368a0e5ec5c09ee2ad39cf298bc6e3f9aec293732cfda7:1",
//!     ).unwrap(), Amount::from_sat(50_000), key)],
//!     InscriptionPayload::from_inscription(&Brc20::mint("ordi", "100"), address)?.repeat(2),
//!     FeeRate::from_sat_per_vb(10).unwrap(),
//! )
//! .with_reveal_mode(RevealMode::Individual);
//!
//! let inscriber = Inscriber::new(chain, InscriberConfig::new(Network::Testnet));
//! let fee = inscriber.calculate_fee(&request)?;
//! println!("total fee: {fee}");
//! # Ok(())
//! # }
//! ```
//!

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

mod chain;
mod error;
pub mod inscriber;
pub mod inscription;
mod result;
pub mod utils;
pub mod wallet;

pub use bitcoin;
pub use chain::{Broadcaster, UtxoSource};
pub use error::{OrdError, PartialBroadcast};
pub use inscriber::{
    CancelToken, FeeSummary, InscribeOutcome, Inscriber, InscriberConfig, InscriptionRequest,
    SignedInscription, Stage,
};
pub use inscription::brc20::Brc20;
pub use inscription::{Inscription, InscriptionPayload};
pub use result::OrdResult;
pub use utils::fees::FeePlan;
pub use wallet::builder::envelope::{Envelope, EnvelopeBuilder};
pub use wallet::builder::signer::{decode_signing_key, signer_address};
pub use wallet::builder::taproot::{Commitment, TaprootKeypair};
pub use wallet::builder::{FundingOutput, OrdTransactionBuilder, RevealMode, RevealPlan, Utxo};
pub use wallet::parser::ParsedEnvelope;
