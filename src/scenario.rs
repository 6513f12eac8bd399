//! JSON scenario input: user transactions injected at chosen block heights.

use serde::Deserialize;
use signum_core::{AssetQuantity, Transaction};
use signum_types::{hex_to_message_array, text_to_message_array, TypesError};
use std::num::IntErrorKind;
use thiserror::Error;

/// NQT per Signa
const NQT_PER_SIGNA: u128 = 100_000_000;
const SIGNA_DECIMALS: usize = 8;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Invalid scenario JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transaction {index}: field `{field}` is not a valid number: {value}")]
    InvalidNumber {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("Transaction {index}: field `{field}` does not fit in 64 bits: {value}")]
    OutOfRange {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("Transaction {index}: messageText and messageHex are mutually exclusive")]
    ConflictingMessage { index: usize },

    #[error("Transaction {index}: invalid messageHex: {source}")]
    InvalidMessageHex { index: usize, source: TypesError },
}

pub type Result<T> = std::result::Result<T, ScenarioError>;

/// A validated scenario transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioTransaction {
    pub sender: u64,
    pub recipient: u64,
    pub amount: u64,
    pub blockheight: u64,
    pub tokens: Vec<AssetQuantity>,
    /// Whole message pages; empty when the entry carries no message
    pub message: Vec<u64>,
}

impl ScenarioTransaction {
    pub fn to_transaction(&self) -> Transaction {
        Transaction::new(
            self.sender,
            self.recipient,
            self.amount,
            self.tokens.clone(),
            self.message.clone(),
            self.blockheight,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Integer(u64),
    Text(String),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct RawToken {
    asset: RawNumber,
    quantity: RawNumber,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransaction {
    sender: RawNumber,
    recipient: RawNumber,
    amount: RawNumber,
    blockheight: RawNumber,
    #[serde(default)]
    tokens: Vec<RawToken>,
    message_text: Option<String>,
    message_hex: Option<String>,
}

/// Parses and validates a JSON array of transactions. Either every entry is
/// valid or nothing is returned.
pub fn parse_scenario(json: &str) -> Result<Vec<ScenarioTransaction>> {
    let raw: Vec<RawTransaction> = serde_json::from_str(json)?;
    raw.into_iter()
        .enumerate()
        .map(|(index, tx)| validate(index, tx))
        .collect()
}

fn validate(index: usize, raw: RawTransaction) -> Result<ScenarioTransaction> {
    let number = |field: &'static str, value: &RawNumber| -> Result<u64> {
        match value {
            RawNumber::Integer(n) => Ok(*n),
            RawNumber::Text(text) => parse_numeric_literal(text).map_err(|kind| kind.into_error(index, field, text)),
            RawNumber::Other(other) if exceeds_u64(other) => Err(ScenarioError::OutOfRange {
                index,
                field,
                value: other.to_string(),
            }),
            RawNumber::Other(other) => Err(ScenarioError::InvalidNumber {
                index,
                field,
                value: other.to_string(),
            }),
        }
    };

    let tokens = raw
        .tokens
        .iter()
        .map(|token| {
            Ok(AssetQuantity {
                asset: number("tokens.asset", &token.asset)?,
                quantity: number("tokens.quantity", &token.quantity)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let message = match (&raw.message_text, &raw.message_hex) {
        (Some(_), Some(_)) => return Err(ScenarioError::ConflictingMessage { index }),
        (Some(text), None) => text_to_message_array(text),
        (None, Some(hex)) => hex_to_message_array(hex)
            .map_err(|source| ScenarioError::InvalidMessageHex { index, source })?,
        (None, None) => Vec::new(),
    };

    Ok(ScenarioTransaction {
        sender: number("sender", &raw.sender)?,
        recipient: number("recipient", &raw.recipient)?,
        amount: number("amount", &raw.amount)?,
        blockheight: number("blockheight", &raw.blockheight)?,
        tokens,
        message,
    })
}

/// JSON integers past `u64::MAX` arrive as floats.
fn exceeds_u64(value: &serde_json::Value) -> bool {
    value
        .as_f64()
        .map_or(false, |n| n >= u64::MAX as f64 && n.fract() == 0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralError {
    Invalid,
    OutOfRange,
}

impl LiteralError {
    fn into_error(self, index: usize, field: &'static str, value: &str) -> ScenarioError {
        let value = value.to_string();
        match self {
            LiteralError::Invalid => ScenarioError::InvalidNumber { index, field, value },
            LiteralError::OutOfRange => ScenarioError::OutOfRange { index, field, value },
        }
    }
}

/// Parses `1_000`, `1000n`, `0xff` or `1.5 signa` (8 decimals) into an
/// exact u64.
pub fn parse_numeric_literal(text: &str) -> std::result::Result<u64, LiteralError> {
    let cleaned = text.trim().replace('_', "").to_ascii_lowercase();

    if let Some(signa) = cleaned.strip_suffix("signa") {
        return parse_signa(signa.trim());
    }

    let digits = cleaned.strip_suffix('n').unwrap_or(&cleaned);
    let parsed = match digits.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    };
    parsed.map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow => LiteralError::OutOfRange,
        _ => LiteralError::Invalid,
    })
}

fn parse_signa(text: &str) -> std::result::Result<u64, LiteralError> {
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(LiteralError::Invalid);
    }
    if fraction.len() > SIGNA_DECIMALS || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LiteralError::Invalid);
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|err: std::num::ParseIntError| match err.kind() {
            IntErrorKind::PosOverflow => LiteralError::OutOfRange,
            _ => LiteralError::Invalid,
        })?
    };
    let fraction: u128 = format!("{fraction:0<width$}", width = SIGNA_DECIMALS)
        .parse()
        .map_err(|_| LiteralError::Invalid)?;

    let total = whole
        .checked_mul(NQT_PER_SIGNA)
        .and_then(|nqt| nqt.checked_add(fraction))
        .ok_or(LiteralError::OutOfRange)?;
    u64::try_from(total).map_err(|_| LiteralError::OutOfRange)
}
