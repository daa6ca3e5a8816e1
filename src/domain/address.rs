//! Configured address classification.
//!
//! Deployments ship with placeholder addresses ("0xYourVault…", the zero
//! address, sample constants) until the real contracts are known. Those
//! must be recognised and skipped instead of being sent to the chain.

use std::str::FromStr;

use alloy::primitives::Address;

/// Result of inspecting an address string from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfiguredAddress {
    /// Well-formed, non-placeholder address.
    Usable(Address),
    /// Parses, but is the zero address or a known placeholder.
    Placeholder(Address),
    /// Not a 20-byte hex address at all.
    Malformed,
}

impl ConfiguredAddress {
    /// Classify `raw` against the given list of known placeholders.
    pub fn classify(raw: &str, placeholders: &[Address]) -> Self {
        let trimmed = raw.trim();
        if !trimmed.starts_with("0x") && !trimmed.starts_with("0X") {
            return Self::Malformed;
        }
        match Address::from_str(trimmed) {
            Ok(addr) if addr.is_zero() || placeholders.contains(&addr) => Self::Placeholder(addr),
            Ok(addr) => Self::Usable(addr),
            Err(_) => Self::Malformed,
        }
    }

    /// The usable address, if any.
    pub fn usable(self) -> Option<Address> {
        match self {
            Self::Usable(addr) => Some(addr),
            _ => None,
        }
    }
}

/// Abbreviated `0x1234…abcd` form for status lines.
pub fn short_address(addr: &Address) -> String {
    let full = addr.to_checksum(None);
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}
