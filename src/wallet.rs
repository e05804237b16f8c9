pub mod builder;
pub mod parser;

pub use builder::{FundingOutput, OrdTransactionBuilder, RevealMode, RevealPlan, Utxo};
pub use parser::ParsedEnvelope;
