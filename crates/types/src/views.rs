use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::BPS_DENOMINATOR;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateView {
    pub id: u64,
    pub creator: Address,
    pub royalty_bps: U256,
    pub metadata_uri: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceView {
    pub owner: Address,
    pub valuation: U256,
    pub tax_rate_bps: U256,
    pub last_tax_timestamp: U256,
    pub exists: bool,
    pub due: U256,
    pub elapsed: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppiCategoryStats {
    pub category: u64,
    pub reports: usize,
    pub unique_reporters: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnclaimedDay {
    pub day: u64,
    pub amount: U256,
}

/// Share of requested categories that received at least one report, as a
/// rounded whole percent. `None` when no categories were requested.
pub fn reporter_diversity(stats: &[AppiCategoryStats]) -> Option<u64> {
    if stats.is_empty() {
        return None;
    }
    let total = stats.len() as u64;
    let active = stats.iter().filter(|entry| entry.reports > 0).count() as u64;
    Some((active * 200 + total) / (total * 2))
}

/// Token A a covenant reward paid in token B would crystallize into, after fee.
pub fn crystallized_estimate(reward: U256, rate_bps: U256, fee_bps: U256) -> U256 {
    let denominator = U256::from(BPS_DENOMINATOR);
    let gross = reward.saturating_mul(rate_bps) / denominator;
    let keep_bps = denominator.saturating_sub(fee_bps);
    gross.saturating_mul(keep_bps) / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(category: u64, reports: usize) -> AppiCategoryStats {
        AppiCategoryStats {
            category,
            reports,
            unique_reporters: reports.min(1),
        }
    }

    #[test]
    fn diversity_rounds_to_whole_percent() {
        assert_eq!(reporter_diversity(&[]), None);
        assert_eq!(reporter_diversity(&[stats(1, 2), stats(2, 0)]), Some(50));
        assert_eq!(
            reporter_diversity(&[stats(1, 2), stats(2, 0), stats(3, 0)]),
            Some(33)
        );
        assert_eq!(
            reporter_diversity(&[stats(1, 2), stats(2, 1), stats(3, 0)]),
            Some(67)
        );
    }

    #[test]
    fn crystallized_estimate_applies_rate_then_fee() {
        let reward = U256::from(1_000_u64);
        let estimate = crystallized_estimate(reward, U256::from(5_000_u64), U256::from(1_000_u64));
        assert_eq!(estimate, U256::from(450_u64));
        assert_eq!(
            crystallized_estimate(reward, U256::from(5_000_u64), U256::from(20_000_u64)),
            U256::ZERO
        );
    }
}
