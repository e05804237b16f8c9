pub mod brc20;

use bitcoin::Address;

use crate::OrdResult;

/// The inscription trait is used to write data to the leaf script of a commit and reveal transaction.
pub trait Inscription {
    /// Returns the content type of the inscription.
    fn content_type(&self) -> String;

    /// Returns the body of the inscription.
    ///
    /// The body is written in the envelope after the header:
    ///
    /// - OP_FALSE
    /// - OP_IF
    /// - ord
    /// - 0x01
    /// - {inscription.content_type()}
    /// - 0x00
    ///
    /// split into pushes of at most 520 bytes, and then the footer:
    ///
    /// - OP_ENDIF
    fn body(&self) -> OrdResult<Vec<u8>>;
}

/// A single inscription to write, along with the address receiving the inscribed sat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InscriptionPayload {
    pub content_type: String,
    pub body: Vec<u8>,
    pub destination: Address,
}

impl InscriptionPayload {
    pub fn new(content_type: impl ToString, body: impl Into<Vec<u8>>, destination: Address) -> Self {
        Self {
            content_type: content_type.to_string(),
            body: body.into(),
            destination,
        }
    }

    /// Builds the payload of any [`Inscription`].
    pub fn from_inscription<T>(inscription: &T, destination: Address) -> OrdResult<Self>
    where
        T: Inscription,
    {
        Ok(Self::new(
            inscription.content_type(),
            inscription.body()?,
            destination,
        ))
    }

    /// Repeats the payload `times` times, one inscription each.
    pub fn repeat(self, times: usize) -> Vec<Self> {
        vec![self; times]
    }
}
