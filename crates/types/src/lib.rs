#![forbid(unsafe_code)]

mod covenant;
mod format;
mod log;
mod views;

pub use alloy_primitives::{Address, B256, Bytes, I256, U256};

pub use covenant::{
    CovenantStatus, CovenantView, DISPUTE_STEPS, PaymentToken, dispute_stage, dispute_status_label,
};
pub use format::{
    TokenUnit, evidence_link, format_bps_percent, format_integrity, format_iso_timestamp,
    format_reason, format_relative_time, format_token, format_units_fixed, safe_address,
    short_address,
};
pub use log::{DecodedLog, EventArg, EventArgs, TrailItem, TrailLink, trail_item_id};
pub use views::{
    AppiCategoryStats, ResourceView, TemplateView, UnclaimedDay, crystallized_estimate,
    reporter_diversity,
};

pub const TOKEN_DECIMALS: u8 = 18;
pub const SECONDS_PER_DAY: u64 = 86_400;
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Day index used by the treasury for UBI accrual and APPI reports.
pub fn day_index(block_timestamp: u64) -> u64 {
    block_timestamp / SECONDS_PER_DAY
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AmountParseError {
    #[error("amount cannot be empty")]
    Empty,
    #[error("invalid amount `{0}`: expected a non-negative decimal number")]
    NotDecimal(String),
    #[error("invalid amount `{raw}`: at most {max} fractional digits")]
    TooPrecise { raw: String, max: u8 },
    #[error("amount `{0}` overflows 256 bits")]
    Overflow(String),
}

/// Parses a human decimal amount ("12.5") into base units with `decimals` places.
pub fn parse_units(raw: &str, decimals: u8) -> Result<U256, AmountParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AmountParseError::Empty);
    }
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(AmountParseError::NotDecimal(trimmed.to_string()));
    }
    let all_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(AmountParseError::NotDecimal(trimmed.to_string()));
    }
    if fraction.len() > usize::from(decimals) {
        return Err(AmountParseError::TooPrecise {
            raw: trimmed.to_string(),
            max: decimals,
        });
    }

    let mut digits = String::with_capacity(whole.len() + usize::from(decimals));
    digits.push_str(if whole.is_empty() { "0" } else { whole });
    digits.push_str(fraction);
    for _ in fraction.len()..usize::from(decimals) {
        digits.push('0');
    }
    U256::from_str_radix(&digits, 10).map_err(|_| AmountParseError::Overflow(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_units_scales_whole_and_fractional_parts() {
        let one = U256::from(10_u64).pow(U256::from(18_u64));
        assert_eq!(parse_units("1", 18).expect("whole"), one);
        assert_eq!(
            parse_units("0.5", 18).expect("fraction"),
            one / U256::from(2_u64)
        );
        assert_eq!(
            parse_units(".25", 2).expect("leading dot"),
            U256::from(25_u64)
        );
        assert_eq!(parse_units(" 12 ", 0).expect("trimmed"), U256::from(12_u64));
    }

    #[test]
    fn parse_units_rejects_garbage() {
        assert_eq!(parse_units("", 18), Err(AmountParseError::Empty));
        assert!(matches!(
            parse_units("abc", 18),
            Err(AmountParseError::NotDecimal(_))
        ));
        assert!(matches!(
            parse_units("-1", 18),
            Err(AmountParseError::NotDecimal(_))
        ));
        assert!(matches!(
            parse_units("1.123", 2),
            Err(AmountParseError::TooPrecise { max: 2, .. })
        ));
        assert!(matches!(
            parse_units(".", 18),
            Err(AmountParseError::NotDecimal(_))
        ));
    }

    #[test]
    fn day_index_uses_whole_days() {
        assert_eq!(day_index(0), 0);
        assert_eq!(day_index(86_399), 0);
        assert_eq!(day_index(86_400 * 3 + 5), 3);
    }
}
