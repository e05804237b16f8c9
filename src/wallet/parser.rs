// Envelope decoding follows the layout described in
// https://docs.ordinals.com/inscriptions.html

use bitcoin::opcodes::all::{OP_ENDIF, OP_IF};
use bitcoin::script::Instruction;
use bitcoin::{Script, Transaction};

use crate::utils::constants::{CONTENT_TYPE_TAG, PROTOCOL_ID};

/// An inscription read back from a leaf script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEnvelope {
    /// Index of the transaction input carrying the envelope
    pub input: usize,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ParsedEnvelope {
    /// Reads every envelope revealed by `transaction`, in input order.
    pub fn from_transaction(transaction: &Transaction) -> Vec<Self> {
        transaction
            .input
            .iter()
            .enumerate()
            .filter_map(|(index, input)| {
                let tapscript = input.witness.tapscript()?;
                let envelope = Self::from_script(tapscript)?;
                Some(Self {
                    input: index,
                    ..envelope
                })
            })
            .collect()
    }

    /// Reads the first envelope found in `script`.
    pub fn from_script(script: &Script) -> Option<Self> {
        let instructions = script
            .instructions()
            .collect::<Result<Vec<_>, _>>()
            .ok()?;

        let start = instructions.windows(3).position(|window| {
            is_push(&window[0], &[])
                && window[1] == Instruction::Op(OP_IF)
                && is_push(&window[2], &PROTOCOL_ID)
        })?;

        let mut instructions = instructions[start + 3..].iter();
        let mut content_type = None;

        // fields come in tag/value pairs until the empty body tag
        loop {
            match instructions.next()? {
                Instruction::Op(op) if *op == OP_ENDIF => {
                    return Some(Self {
                        content_type,
                        ..Default::default()
                    })
                }
                Instruction::PushBytes(tag) if tag.is_empty() => break,
                Instruction::PushBytes(tag) => {
                    let Instruction::PushBytes(value) = instructions.next()? else {
                        return None;
                    };
                    if tag.as_bytes() == CONTENT_TYPE_TAG {
                        content_type = String::from_utf8(value.as_bytes().to_vec()).ok();
                    }
                }
                Instruction::Op(_) => return None,
            }
        }

        let mut body = Vec::new();
        for instruction in instructions {
            match instruction {
                Instruction::PushBytes(chunk) => body.extend_from_slice(chunk.as_bytes()),
                Instruction::Op(op) if *op == OP_ENDIF => {
                    return Some(Self {
                        input: 0,
                        content_type,
                        body,
                    })
                }
                Instruction::Op(_) => return None,
            }
        }

        None
    }
}

fn is_push(instruction: &Instruction, expected: &[u8]) -> bool {
    matches!(instruction, Instruction::PushBytes(bytes) if bytes.as_bytes() == expected)
}
