use bitcoin::opcodes::all::{OP_CHECKSIG, OP_ENDIF, OP_IF};
use bitcoin::opcodes::OP_FALSE;
use bitcoin::script::Builder as ScriptBuilder;
use bitcoin::{ScriptBuf, XOnlyPublicKey};

use crate::inscription::InscriptionPayload;
use crate::utils::bytes_to_push_bytes;
use crate::utils::constants::{
    BODY_TAG, CONTENT_TYPE_TAG, MAX_BODY_SIZE, MAX_SCRIPT_ELEMENT_SIZE, PROTOCOL_ID,
};
use crate::{OrdError, OrdResult};

/// Leaf script carrying one inscription.
///
/// The script is `<reveal key> OP_CHECKSIG` followed by the envelope:
///
/// - OP_FALSE
/// - OP_IF
/// - ord
/// - 0x01
/// - {content type}
/// - 0x00
/// - {body, in pushes of at most 520 bytes}
/// - OP_ENDIF
///
/// `OP_FALSE OP_IF` never executes, so the envelope is inert and only the
/// signature check decides whether the leaf can be spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub script: ScriptBuf,
    pub content_type: String,
    pub body_len: usize,
}

impl Envelope {
    /// Number of body pushes in the envelope.
    pub fn chunks(&self) -> usize {
        self.body_len.div_ceil(MAX_SCRIPT_ELEMENT_SIZE)
    }
}

/// Builds the [`Envelope`] of an inscription payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeBuilder {
    max_body_size: usize,
}

impl Default for EnvelopeBuilder {
    fn default() -> Self {
        Self::new(MAX_BODY_SIZE)
    }
}

impl EnvelopeBuilder {
    pub fn new(max_body_size: usize) -> Self {
        Self { max_body_size }
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Writes `payload` into a leaf script spendable by `reveal_key`.
    pub fn build(
        &self,
        payload: &InscriptionPayload,
        reveal_key: &XOnlyPublicKey,
    ) -> OrdResult<Envelope> {
        if payload.body.len() > self.max_body_size {
            return Err(OrdError::PayloadTooLarge {
                size: payload.body.len(),
                max: self.max_body_size,
            });
        }
        if payload.content_type.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(OrdError::InvalidContentType(format!(
                "{} bytes long, at most {MAX_SCRIPT_ELEMENT_SIZE} allowed",
                payload.content_type.len()
            )));
        }

        let mut builder = ScriptBuilder::new()
            .push_x_only_key(reveal_key)
            .push_opcode(OP_CHECKSIG)
            .push_opcode(OP_FALSE)
            .push_opcode(OP_IF)
            .push_slice(PROTOCOL_ID)
            .push_slice(CONTENT_TYPE_TAG)
            .push_slice(bytes_to_push_bytes(payload.content_type.as_bytes())?.as_push_bytes())
            .push_slice(BODY_TAG);

        for chunk in payload.body.chunks(MAX_SCRIPT_ELEMENT_SIZE) {
            builder = builder.push_slice(bytes_to_push_bytes(chunk)?.as_push_bytes());
        }

        let script = builder.push_opcode(OP_ENDIF).into_script();
        debug!(
            "envelope: {} bytes script, {} bytes body",
            script.len(),
            payload.body.len()
        );

        Ok(Envelope {
            script,
            content_type: payload.content_type.clone(),
            body_len: payload.body.len(),
        })
    }
}
