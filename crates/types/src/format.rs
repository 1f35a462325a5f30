use alloy_primitives::{Address, U256};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::TOKEN_DECIMALS;
use crate::log::TrailLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUnit {
    SoilA,
    SoilB,
}

impl TokenUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::SoilA => "SOILA",
            Self::SoilB => "SOILB",
        }
    }
}

/// `0x1234...abcd` using the checksummed form.
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

pub fn safe_address(address: Option<&Address>) -> String {
    address
        .map(short_address)
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Renders a fixed-point integer with `precision` decimals, rounding half up.
pub fn format_units_fixed(amount: U256, decimals: u8, precision: u8) -> String {
    let precision = precision.min(decimals);
    let ten = U256::from(10_u64);
    let divisor = ten.pow(U256::from(decimals - precision));
    let half = divisor / U256::from(2_u64);
    let scaled = amount.saturating_add(half) / divisor;
    if precision == 0 {
        return scaled.to_string();
    }
    let scale = ten.pow(U256::from(precision));
    let whole = scaled / scale;
    let fraction = (scaled % scale).to_string();
    format!(
        "{whole}.{fraction:0>width$}",
        width = usize::from(precision)
    )
}

/// `500.00 SOILB`
pub fn format_token(amount: U256, unit: TokenUnit) -> String {
    format!(
        "{} {}",
        format_units_fixed(amount, TOKEN_DECIMALS, 2),
        unit.symbol()
    )
}

pub fn format_integrity(points: U256) -> String {
    format!("+{points} integrity")
}

/// Basis points as a percent: whole numbers print without decimals, others with one.
pub fn format_bps_percent(bps: U256) -> String {
    let hundred = U256::from(100_u64);
    let whole = bps / hundred;
    let remainder = bps % hundred;
    if remainder.is_zero() {
        return whole.to_string();
    }
    // one decimal, rounded half up on the hundredths digit
    let tenths = (bps + U256::from(5_u64)) / U256::from(10_u64);
    let ten = U256::from(10_u64);
    format!("{}.{}", tenths / ten, tenths % ten)
}

/// Free-text reason with a fallback for empty input. Long hex words are truncated.
pub fn format_reason(value: Option<&str>, fallback: &str) -> String {
    let Some(trimmed) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return fallback.to_string();
    };
    if trimmed.starts_with("0x") && trimmed.chars().count() > 10 {
        let head: String = trimmed.chars().take(10).collect();
        return format!("{head}...");
    }
    trimmed.to_string()
}

/// Link for an evidence URI. Only `http://` and `https://` values become
/// links. Other schemes and bare text produce no link.
pub fn evidence_link(value: Option<&str>) -> Option<TrailLink> {
    let trimmed = value.map(str::trim).filter(|value| !value.is_empty())?;
    let lower = trimmed.to_ascii_lowercase();
    if !(lower.starts_with("https://") || lower.starts_with("http://")) {
        return None;
    }
    Some(TrailLink {
        label: "Evidence URL".to_string(),
        url: trimmed.to_string(),
    })
}

/// Relative age of a block timestamp against `now` (both unix seconds).
pub fn format_relative_time(timestamp: u64, now: u64) -> String {
    let diff_seconds = now.saturating_sub(timestamp);
    if diff_seconds < 60 {
        return "Just now".to_string();
    }
    let minutes = diff_seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    if hours < 48 {
        return "Yesterday".to_string();
    }
    match utc_datetime(timestamp) {
        Some(date) => date.format("%b %-d").to_string(),
        None => "--".to_string(),
    }
}

pub fn format_iso_timestamp(timestamp: u64) -> String {
    utc_datetime(timestamp)
        .map(|date| date.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| timestamp.to_string())
}

fn utc_datetime(timestamp: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(timestamp).ok()?;
    DateTime::<Utc>::from_timestamp(seconds, 0)
}
