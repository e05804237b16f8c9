use std::str::FromStr;

use serde_with::{serde_as, DisplayFromStr};

use crate::{Inscription, OrdError, OrdResult};

const PROTOCOL: &str = "brc-20";
const CONTENT_TYPE: &str = "text/plain;charset=utf-8";

/// Represents a BRC-20 operation: (Deploy, Mint, Transfer)
///
/// Encodes as `{"p":"brc-20","op":...,"tick":...,...}`, with the protocol and the
/// operation leading, which is the layout indexers expect to find in the inscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brc20 {
    /// Protocol (required): Helps other systems identify and process brc-20 events
    #[serde(rename = "p")]
    protocol: String,
    #[serde(flatten)]
    pub op: Brc20Op,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Brc20Op {
    /// Deploy a BRC-20 token
    #[serde(rename = "deploy")]
    Deploy(Brc20Deploy),
    /// Mint BRC-20 tokens
    #[serde(rename = "mint")]
    Mint(Brc20Mint),
    /// Transfer BRC-20 tokens
    #[serde(rename = "transfer")]
    Transfer(Brc20Transfer),
}

impl Brc20 {
    /// Create a new BRC-20 deploy operation
    pub fn deploy(
        tick: impl ToString,
        max: impl ToString,
        lim: Option<String>,
        dec: Option<u8>,
    ) -> Self {
        Self::from_op(Brc20Op::Deploy(Brc20Deploy {
            tick: tick.to_string(),
            max: max.to_string(),
            lim,
            dec,
        }))
    }

    /// Create a new BRC-20 mint operation
    pub fn mint(tick: impl ToString, amt: impl ToString) -> Self {
        Self::from_op(Brc20Op::Mint(Brc20Mint {
            tick: tick.to_string(),
            amt: amt.to_string(),
        }))
    }

    /// Create a new BRC-20 transfer operation
    pub fn transfer(tick: impl ToString, amt: impl ToString) -> Self {
        Self::from_op(Brc20Op::Transfer(Brc20Transfer {
            tick: tick.to_string(),
            amt: amt.to_string(),
        }))
    }

    /// Builds an operation from its name and parameters, as typed on a command line.
    ///
    /// For `deploy`, `amt` is the max supply.
    pub fn from_parts(op: &str, tick: &str, amt: &str) -> OrdResult<Self> {
        if tick.is_empty() {
            return Err(OrdError::InvalidBrc20("tick is required".to_string()));
        }
        if amt.is_empty() {
            return Err(OrdError::InvalidBrc20("amt is required".to_string()));
        }

        match op {
            "mint" => Ok(Self::mint(tick, amt)),
            "transfer" => Ok(Self::transfer(tick, amt)),
            "deploy" => Ok(Self::deploy(tick, amt, None, None)),
            "" => Err(OrdError::InvalidBrc20("op is required".to_string())),
            other => Err(OrdError::InvalidBrc20(format!(
                "op must be `mint`, `transfer` or `deploy`, got `{other}`"
            ))),
        }
    }

    fn from_op(op: Brc20Op) -> Self {
        Self {
            protocol: PROTOCOL.to_string(),
            op,
        }
    }

    /// Encodes `Self` as a JSON string.
    pub fn encode(&self) -> OrdResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn tick(&self) -> &str {
        match &self.op {
            Brc20Op::Deploy(deploy) => &deploy.tick,
            Brc20Op::Mint(mint) => &mint.tick,
            Brc20Op::Transfer(transfer) => &transfer.tick,
        }
    }
}

impl FromStr for Brc20 {
    type Err = OrdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op: Self = serde_json::from_str(s)?;
        if op.protocol != PROTOCOL {
            return Err(OrdError::InvalidBrc20(format!(
                "unknown protocol `{}`",
                op.protocol
            )));
        }

        Ok(op)
    }
}

impl Inscription for Brc20 {
    fn content_type(&self) -> String {
        CONTENT_TYPE.to_string()
    }

    fn body(&self) -> OrdResult<Vec<u8>> {
        Ok(self.encode()?.into_bytes())
    }
}

/// `deploy` op
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brc20Deploy {
    /// Ticker (required): 4 or 5 letter identifier of the brc-20
    pub tick: String,
    /// Max supply (required): Set max supply of the brc-20
    pub max: String,
    /// Mint limit (optional): If letting users mint to themsleves, limit per ordinal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lim: Option<String>,
    /// Decimals (optional): Set decimal precision, default to 18
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub dec: Option<u8>,
}

/// `mint` op
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brc20Mint {
    /// Ticker (required): 4 or 5 letter identifier of the brc-20
    pub tick: String,
    /// Amount to mint (required): States the amount of the brc-20 to mint.
    /// Has to be less than "lim" of the `deploy` op if stated.
    pub amt: String,
}

/// `transfer` op
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brc20Transfer {
    /// Ticker (required): 4 or 5 letter identifier of the brc-20
    pub tick: String,
    /// Amount to transfer (required): States the amount of the brc-20 to transfer.
    pub amt: String,
}
