//! Unsigned integers as the ledger hands them back. Depending on the node and the
//! client library a uint256 arrives either as a native integer or as a string
//! (decimal, `0x` hex, or a big-integer literal with a trailing `n`).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LedgerUint {
    Fixed(u128),
    Encoded(String),
}

impl LedgerUint {
    pub fn to_u128(&self) -> Result<u128, String> {
        match self {
            LedgerUint::Fixed(value) => Ok(*value),
            LedgerUint::Encoded(raw) => parse_encoded(raw).ok_or_else(|| raw.clone()),
        }
    }

    /// Same as [`to_u128`](Self::to_u128) but bounded to a signed 64-bit timestamp.
    pub fn to_timestamp(&self) -> Result<i64, String> {
        let value = self.to_u128()?;
        i64::try_from(value).map_err(|_| self.to_string())
    }
}

fn parse_encoded(raw: &str) -> Option<u128> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('n').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u128::from_str_radix(hex, 16).ok();
    }
    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

impl From<u128> for LedgerUint {
    fn from(value: u128) -> Self {
        LedgerUint::Fixed(value)
    }
}

impl From<i64> for LedgerUint {
    fn from(value: i64) -> Self {
        LedgerUint::Fixed(value.max(0) as u128)
    }
}

impl fmt::Display for LedgerUint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerUint::Fixed(value) => write!(f, "{value}"),
            LedgerUint::Encoded(raw) => f.write_str(raw),
        }
    }
}
