//! Ether amounts
//!
//! Amounts are configured as decimal ether strings (`"0.01"`) and handled
//! internally as `u128` wei.

use thiserror::Error;

pub const ETHER_DECIMALS: u32 = 18;

const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,

    #[error("invalid amount: {0}")]
    Invalid(String),

    #[error("too many decimal places: {0}")]
    TooPrecise(String),

    #[error("amount out of range: {0}")]
    Overflow(String),
}

/// Parse a decimal ether string into wei.
pub fn parse_ether(s: &str) -> Result<u128, AmountError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if (whole.is_empty() && frac.is_empty())
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if frac.len() > ETHER_DECIMALS as usize {
        return Err(AmountError::TooPrecise(s.to_string()));
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| AmountError::Overflow(s.to_string()))?
    };
    let frac_wei: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = ETHER_DECIMALS as usize);
        padded
            .parse()
            .map_err(|_| AmountError::Invalid(s.to_string()))?
    };

    whole
        .checked_mul(WEI_PER_ETHER)
        .and_then(|w| w.checked_add(frac_wei))
        .ok_or_else(|| AmountError::Overflow(s.to_string()))
}

/// Format wei as a decimal ether string with at least one fractional digit.
pub fn format_ether(wei: u128) -> String {
    let whole = wei / WEI_PER_ETHER;
    let frac = wei % WEI_PER_ETHER;

    let frac = format!("{:0>width$}", frac, width = ETHER_DECIMALS as usize);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{}.0", whole)
    } else {
        format!("{}.{}", whole, frac)
    }
}
