pub const PROTOCOL_ID: [u8; 3] = *b"ord";
pub const BODY_TAG: [u8; 0] = [];
/// Tag 1, representing the MIME type of the body.
pub const CONTENT_TYPE_TAG: [u8; 1] = [1];
/// Largest data push a tapscript accepts.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;
/// Minimum value of a funding output, and the default postage of an inscription.
pub const DUST_FLOOR: u64 = 10_000;
/// Largest weight a standard transaction may have.
pub const MAX_STANDARD_TX_WEIGHT: u64 = 400_000;
/// Default maximum inscription body size.
///
/// The body is witness data, so it weighs one unit per byte; the slack is left for the
/// transaction itself, the push opcodes and the envelope header.
pub const MAX_BODY_SIZE: usize = 390_000;
/// Schnorr signature size with `SIGHASH_DEFAULT`, which carries no sighash byte.
pub const SCHNORR_SIGNATURE_SIZE: usize = 64;
