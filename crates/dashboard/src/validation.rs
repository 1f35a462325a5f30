//! Form input checks run before any network call. Each error renders as the
//! inline message shown next to the offending action.

use std::str::FromStr;

use fairsoil_types::{
    Address, AmountParseError, BPS_DENOMINATOR, TOKEN_DECIMALS, U256, parse_units,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No account configured. Set FAIRSOIL_ACCOUNT to send transactions.")]
    MissingAccount,
    #[error("Invalid {field}: {source}")]
    InvalidAmount {
        field: &'static str,
        source: AmountParseError,
    },
    #[error("Price must be positive.")]
    NonPositivePrice,
    #[error("Enter a number between 0 and 100 for {0}.")]
    InvalidPercent(&'static str),
    #[error("Invalid day index.")]
    InvalidDayIndex,
    #[error("Invalid day range for saved bonuses.")]
    InvalidDayRange,
    #[error("Enter category ids (comma separated).")]
    EmptyCategoryList,
    #[error("Invalid category list.")]
    InvalidCategoryList,
    #[error("Invalid category id.")]
    InvalidCategoryId,
    #[error("Confidence must be between 0 and 10000.")]
    ConfidenceOutOfRange,
    #[error("Max reports must be > 0.")]
    MaxReportsNotPositive,
    #[error("Invalid royalty BPS.")]
    InvalidRoyaltyBps,
    #[error("Invalid tax rate.")]
    InvalidTaxRate,
    #[error("Template ID must be > 0.")]
    TemplateIdNotPositive,
    #[error("Invalid covenant ID.")]
    InvalidCovenantId,
    #[error("Invalid integrity points.")]
    InvalidIntegrityPoints,
    #[error("Enter {0} address.")]
    MissingAddress(&'static str),
    #[error("Invalid {0} address.")]
    InvalidAddress(&'static str),
    #[error("APPI oracle not set.")]
    OracleNotSet,
    #[error("Enter a resource name.")]
    EmptyResourceName,
    #[error("Insufficient Balance")]
    InsufficientBalance,
    #[error("World ID config missing.")]
    WorldIdConfigMissing,
    #[error("ZK-NFC verifier URL missing.")]
    ZkNfcUrlMissing,
}

/// Non-negative decimal token amount with 18 decimals. Blank means zero.
pub fn parse_amount(raw: &str, field: &'static str) -> Result<U256, ValidationError> {
    if raw.trim().is_empty() {
        return Ok(U256::ZERO);
    }
    parse_units(raw, TOKEN_DECIMALS)
        .map_err(|source| ValidationError::InvalidAmount { field, source })
}

pub fn parse_price(raw: &str) -> Result<U256, ValidationError> {
    let price = parse_amount(raw, "price")?;
    if price.is_zero() {
        return Err(ValidationError::NonPositivePrice);
    }
    Ok(price)
}

/// A percentage clamped to 0..=100, returned as basis points.
pub fn parse_percent_bps(raw: &str, field: &'static str) -> Result<u64, ValidationError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or(ValidationError::InvalidPercent(field))?;
    let clamped = value.clamp(0.0, 100.0);
    Ok((clamped * 100.0).round() as u64)
}

/// Blank input falls back to `current_day` when it is known.
pub fn parse_day_index(raw: &str, current_day: Option<u64>) -> Result<u64, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return current_day.ok_or(ValidationError::InvalidDayIndex);
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| ValidationError::InvalidDayIndex)
}

pub fn parse_day_range(from: &str, to: &str) -> Result<(u64, u64), ValidationError> {
    let from = from
        .trim()
        .parse::<u64>()
        .map_err(|_| ValidationError::InvalidDayRange)?;
    let to = to
        .trim()
        .parse::<u64>()
        .map_err(|_| ValidationError::InvalidDayRange)?;
    if to < from {
        return Err(ValidationError::InvalidDayRange);
    }
    Ok((from, to))
}

/// Comma separated category ids. Entries that are not non-negative integers
/// are dropped; the list fails only when nothing usable remains.
pub fn parse_categories(raw: &str) -> Result<Vec<u64>, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::EmptyCategoryList);
    }
    let categories: Vec<u64> = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| entry.parse::<u64>().ok())
        .collect();
    if categories.is_empty() {
        return Err(ValidationError::InvalidCategoryList);
    }
    Ok(categories)
}

pub fn parse_category_id(raw: &str) -> Result<u64, ValidationError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ValidationError::InvalidCategoryId)
}

/// `(confidence_bps, max_reports)`. Blank fields read as zero.
pub fn parse_confidence(bps: &str, max_reports: &str) -> Result<(u64, u64), ValidationError> {
    let bps = parse_blank_as_zero(bps).ok_or(ValidationError::ConfidenceOutOfRange)?;
    if bps > BPS_DENOMINATOR {
        return Err(ValidationError::ConfidenceOutOfRange);
    }
    let max_reports =
        parse_blank_as_zero(max_reports).ok_or(ValidationError::MaxReportsNotPositive)?;
    if max_reports == 0 {
        return Err(ValidationError::MaxReportsNotPositive);
    }
    Ok((bps, max_reports))
}

pub fn parse_royalty_bps(raw: &str) -> Result<u64, ValidationError> {
    parse_blank_as_zero(raw).ok_or(ValidationError::InvalidRoyaltyBps)
}

pub fn parse_tax_rate_bps(raw: &str) -> Result<u64, ValidationError> {
    parse_blank_as_zero(raw).ok_or(ValidationError::InvalidTaxRate)
}

pub fn parse_template_id(raw: &str) -> Result<u64, ValidationError> {
    match parse_blank_as_zero(raw) {
        Some(id) if id > 0 => Ok(id),
        _ => Err(ValidationError::TemplateIdNotPositive),
    }
}

pub fn parse_covenant_id(raw: &str) -> Result<u64, ValidationError> {
    parse_blank_as_zero(raw).ok_or(ValidationError::InvalidCovenantId)
}

pub fn parse_integrity_points(raw: &str) -> Result<U256, ValidationError> {
    parse_blank_as_zero(raw)
        .map(U256::from)
        .ok_or(ValidationError::InvalidIntegrityPoints)
}

pub fn parse_address(raw: &str, field: &'static str) -> Result<Address, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingAddress(field));
    }
    Address::from_str(trimmed).map_err(|_| ValidationError::InvalidAddress(field))
}

pub fn parse_resource_name(raw: &str) -> Result<&str, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyResourceName);
    }
    Ok(trimmed)
}

/// Only blocks when the spendable balance is known and too small.
pub fn check_balance(required: U256, available: Option<U256>) -> Result<(), ValidationError> {
    match available {
        Some(balance) if required > balance => Err(ValidationError::InsufficientBalance),
        _ => Ok(()),
    }
}

fn parse_blank_as_zero(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0);
    }
    trimmed.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_accept_blank_and_reject_garbage() {
        assert_eq!(parse_amount("", "reward"), Ok(U256::ZERO));
        assert_eq!(
            parse_amount("1.5", "reward"),
            Ok(U256::from(1_500_000_000_000_000_000_u128))
        );
        let error = parse_amount("1.2.3", "reward").expect_err("garbage");
        assert!(error.to_string().starts_with("Invalid reward:"), "{error}");
        assert_eq!(parse_price("0"), Err(ValidationError::NonPositivePrice));
        assert_eq!(parse_price(""), Err(ValidationError::NonPositivePrice));
    }

    #[test]
    fn percent_is_clamped_then_scaled() {
        assert_eq!(parse_percent_bps("25", "claim"), Ok(2_500));
        assert_eq!(parse_percent_bps("33.3", "claim"), Ok(3_330));
        assert_eq!(parse_percent_bps("150", "claim"), Ok(10_000));
        assert_eq!(parse_percent_bps("-3", "claim"), Ok(0));
        assert_eq!(
            parse_percent_bps("lots", "claim"),
            Err(ValidationError::InvalidPercent("claim"))
        );
        assert_eq!(
            parse_percent_bps("NaN", "claim"),
            Err(ValidationError::InvalidPercent("claim"))
        );
    }

    #[test]
    fn day_inputs_follow_range_rules() {
        assert_eq!(parse_day_index("", Some(19_000)), Ok(19_000));
        assert_eq!(parse_day_index("", None), Err(ValidationError::InvalidDayIndex));
        assert_eq!(parse_day_index("-1", Some(3)), Err(ValidationError::InvalidDayIndex));
        assert_eq!(parse_day_range("3", "5"), Ok((3, 5)));
        assert_eq!(parse_day_range("5", "5"), Ok((5, 5)));
        assert_eq!(parse_day_range("6", "5"), Err(ValidationError::InvalidDayRange));
        assert_eq!(parse_day_range("", "5"), Err(ValidationError::InvalidDayRange));
    }

    #[test]
    fn categories_drop_unusable_entries() {
        assert_eq!(parse_categories("1, 2,,3"), Ok(vec![1, 2, 3]));
        assert_eq!(parse_categories("1, x, -2"), Ok(vec![1]));
        assert_eq!(parse_categories("  "), Err(ValidationError::EmptyCategoryList));
        assert_eq!(parse_categories("x,-1"), Err(ValidationError::InvalidCategoryList));
    }

    #[test]
    fn oracle_tuning_bounds() {
        assert_eq!(parse_confidence("7000", "5"), Ok((7_000, 5)));
        assert_eq!(
            parse_confidence("10001", "5"),
            Err(ValidationError::ConfidenceOutOfRange)
        );
        assert_eq!(
            parse_confidence("100", ""),
            Err(ValidationError::MaxReportsNotPositive)
        );
        assert_eq!(
            ValidationError::ConfidenceOutOfRange.to_string(),
            "Confidence must be between 0 and 10000."
        );
    }

    #[test]
    fn ids_and_bps() {
        assert_eq!(parse_template_id("0"), Err(ValidationError::TemplateIdNotPositive));
        assert_eq!(parse_template_id("4"), Ok(4));
        assert_eq!(parse_covenant_id("0"), Ok(0));
        assert_eq!(parse_covenant_id("-1"), Err(ValidationError::InvalidCovenantId));
        assert_eq!(parse_royalty_bps(""), Ok(0));
        assert_eq!(parse_royalty_bps("-5"), Err(ValidationError::InvalidRoyaltyBps));
        assert_eq!(parse_tax_rate_bps("x"), Err(ValidationError::InvalidTaxRate));
    }

    #[test]
    fn addresses_must_be_twenty_bytes_of_hex() {
        let parsed =
            parse_address(" 0x00000000000000000000000000000000000000aa ", "worker").expect("valid");
        assert_eq!(parsed, Address::with_last_byte(0xaa));
        assert_eq!(
            parse_address("", "worker"),
            Err(ValidationError::MissingAddress("worker"))
        );
        assert_eq!(
            parse_address("0xabc", "worker"),
            Err(ValidationError::InvalidAddress("worker"))
        );
    }

    #[test]
    fn balance_check_only_blocks_known_shortfalls() {
        let reward = U256::from(10_u64);
        assert_eq!(check_balance(reward, None), Ok(()));
        assert_eq!(check_balance(reward, Some(U256::from(10_u64))), Ok(()));
        assert_eq!(
            check_balance(reward, Some(U256::from(9_u64))),
            Err(ValidationError::InsufficientBalance)
        );
    }
}
