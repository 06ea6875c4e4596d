//! EVM address normalization.
//!
//! Every address that becomes part of a storage key or a processor
//! metadata tag goes through [`normalize_address`] first, so lookups are
//! case-insensitive while stored values are always EIP-55 checksummed.

use std::str::FromStr;

use alloy::primitives::Address;

use crate::error::GatewayError;

/// Returns the EIP-55 checksummed form of `input`.
///
/// Accepts `0x`-prefixed 40-digit hex strings in all-lowercase,
/// all-uppercase, or correctly checksummed mixed case. Mixed case that
/// does not match its checksum is rejected, as it most likely carries a
/// typo.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidAddress`] for anything that is not a
/// valid address.
pub fn normalize_address(input: &str) -> Result<String, GatewayError> {
    let trimmed = input.trim();
    let invalid = || GatewayError::InvalidAddress(input.to_string());

    let digits = trimmed.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let address = Address::from_str(digits).map_err(|_| invalid())?;
    let checksummed = address.to_checksum(None);

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && checksummed != trimmed {
        return Err(invalid());
    }

    Ok(checksummed)
}

/// Normalizes every address in `inputs`, preserving order.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidAddress`] for the first invalid entry.
pub fn normalize_all<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<String>, GatewayError> {
    inputs
        .iter()
        .map(|a| normalize_address(a.as_ref()))
        .collect()
}
