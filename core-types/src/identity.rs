// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Ledger addresses. The ledger treats addresses case-insensitively but does not
//! hand them back in a canonical casing, so every address is lowercased on entry
//! and all comparisons happen on the normalized form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Conventional "unset" address used by the ledger for empty identity slots.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// A participant, manager, or winner address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    /// The sentinel identity (zero address).
    pub fn sentinel() -> Self {
        Self(ZERO_ADDRESS.to_string())
    }

    /// True for the empty string and for any all-zero address, with or without `0x`.
    pub fn is_sentinel(&self) -> bool {
        let digits = self.0.strip_prefix("0x").unwrap_or(&self.0);
        digits.chars().all(|c| c == '0')
    }

    pub fn is_set(&self) -> bool {
        !self.is_sentinel()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines, e.g. `0x1234...abcd`.
    /// Counts characters, not bytes, so malformed non-ASCII input cannot split a char.
    pub fn short(&self) -> String {
        let chars = self.0.chars().count();
        if chars <= 10 {
            return self.0.clone();
        }
        let head: String = self.0.chars().take(6).collect();
        let tail: String = self.0.chars().skip(chars - 4).collect();
        format!("{head}...{tail}")
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::sentinel()
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of one lottery record on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Identity);

impl RecordId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(Identity::new(raw))
    }

    /// Registry listings use the zero address (or an empty slot) to mean "no record".
    pub fn is_placeholder(&self) -> bool {
        self.0.is_sentinel()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn short(&self) -> String {
        self.0.short()
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
