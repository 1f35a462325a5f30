use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use fairsoil_gateway::{ContractGateway, GatewayError};
use fairsoil_types::{
    Address, AppiCategoryStats, TokenUnit, U256, UnclaimedDay, crystallized_estimate, day_index,
    format_bps_percent, format_token, reporter_diversity, short_address,
};
use serde::Serialize;
use tracing::{debug, warn};

const ABSENT: &str = "--";

/// Every on-chain value the dashboard shows. A `None` field failed to load or
/// its contract is not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSnapshot {
    pub generation: u64,
    pub chain_id: Option<u64>,
    pub block_number: Option<u64>,
    pub block_timestamp: Option<u64>,
    pub current_day: Option<u64>,
    pub account: Option<Address>,
    pub token_a_balance: Option<U256>,
    pub token_a_owner: Option<Address>,
    pub is_primary: Option<bool>,
    pub token_b_balance: Option<U256>,
    pub token_b_locked: Option<U256>,
    pub token_b_unlocked: Option<U256>,
    pub treasury_owner: Option<Address>,
    pub integrity_score: Option<U256>,
    pub eligible_for_governance: Option<bool>,
    pub crystallization_rate_bps: Option<U256>,
    pub crystallization_fee_bps: Option<U256>,
    pub appi_oracle: Option<Address>,
    pub appi_confidence_bps: Option<U256>,
    pub appi_max_reports: Option<U256>,
    pub last_appi: Option<U256>,
    pub daily_ubi_amount: Option<U256>,
    pub treasury_in_total: Option<U256>,
    pub treasury_out_a_total: Option<U256>,
    pub treasury_out_b_total: Option<U256>,
    pub last_reserves_a: Option<U256>,
    pub last_reserves_b: Option<U256>,
    pub liabilities_a: Option<U256>,
    pub liabilities_b: Option<U256>,
    pub dispute_resolver: Option<Address>,
    pub covenant_count: Option<u64>,
    pub unclaimed: Vec<UnclaimedDay>,
}

impl DashboardSnapshot {
    /// Reads everything it can. Only an unreachable chain head is an error;
    /// individual reads that fail are left empty.
    pub async fn load(
        gateway: &ContractGateway,
        account: Option<Address>,
        unclaimed_lookback_days: u64,
    ) -> Result<Self, GatewayError> {
        let chain = gateway.chain();
        let block_number = chain.block_number().await?;
        let block_timestamp = optional("block_timestamp", chain.block_timestamp(block_number)).await;
        let current_day = block_timestamp.map(day_index);

        let mut snapshot = Self {
            chain_id: optional("chain_id", chain.chain_id()).await,
            block_number: Some(block_number),
            block_timestamp,
            current_day,
            account,
            token_a_owner: optional("token_a_owner", gateway.token_a_owner()).await,
            treasury_owner: optional("treasury_owner", gateway.treasury_owner()).await,
            crystallization_rate_bps: optional(
                "crystallization_rate_bps",
                gateway.crystallization_rate_bps(),
            )
            .await,
            crystallization_fee_bps: optional(
                "crystallization_fee_bps",
                gateway.crystallization_fee_bps(),
            )
            .await,
            appi_oracle: optional("appi_oracle", gateway.appi_oracle()).await,
            last_appi: optional("last_appi", gateway.last_appi()).await,
            daily_ubi_amount: optional("daily_ubi_amount", gateway.daily_ubi_amount()).await,
            treasury_in_total: optional("treasury_in_total", gateway.treasury_in_total()).await,
            treasury_out_a_total: optional(
                "treasury_out_a_total",
                gateway.treasury_out_a_total(),
            )
            .await,
            treasury_out_b_total: optional(
                "treasury_out_b_total",
                gateway.treasury_out_b_total(),
            )
            .await,
            last_reserves_a: optional("last_reserves_a", gateway.last_reserves_a()).await,
            last_reserves_b: optional("last_reserves_b", gateway.last_reserves_b()).await,
            liabilities_a: optional("liabilities_a", gateway.liabilities_a()).await,
            liabilities_b: optional("liabilities_b", gateway.liabilities_b()).await,
            dispute_resolver: optional("dispute_resolver", gateway.dispute_resolver()).await,
            covenant_count: optional("covenant_count", gateway.covenant_count()).await,
            ..Self::default()
        };

        if let Some(oracle) = snapshot.appi_oracle.filter(|oracle| !oracle.is_zero()) {
            snapshot.appi_confidence_bps =
                optional("appi_confidence_bps", gateway.confidence_bps(oracle)).await;
            snapshot.appi_max_reports = optional(
                "appi_max_reports",
                gateway.max_reports_per_category(oracle),
            )
            .await;
        }

        if let Some(account) = account {
            snapshot.token_a_balance =
                optional("token_a_balance", gateway.token_a_balance(account)).await;
            snapshot.is_primary = optional("is_primary", gateway.is_primary_address(account)).await;
            snapshot.token_b_balance =
                optional("token_b_balance", gateway.token_b_balance(account)).await;
            snapshot.token_b_locked =
                optional("token_b_locked", gateway.token_b_locked(account)).await;
            snapshot.token_b_unlocked =
                optional("token_b_unlocked", gateway.token_b_unlocked(account)).await;
            snapshot.integrity_score =
                optional("integrity_score", gateway.integrity_score(account)).await;
            snapshot.eligible_for_governance = optional(
                "eligible_for_governance",
                gateway.is_eligible_for_governance(account),
            )
            .await;
            if let Some(today) = current_day {
                for day in lookback_days(today, unclaimed_lookback_days) {
                    if let Some(amount) =
                        optional("unclaimed", gateway.unclaimed(account, day)).await
                    {
                        snapshot.unclaimed.push(UnclaimedDay { day, amount });
                    }
                }
            }
        }
        Ok(snapshot)
    }

    /// Token A a covenant reward would crystallize into, when rate and fee are known.
    pub fn crystallized_estimate(&self, reward: U256) -> Option<U256> {
        Some(crystallized_estimate(
            reward,
            self.crystallization_rate_bps?,
            self.crystallization_fee_bps?,
        ))
    }

    /// Display strings keyed by field name. Absent values render as `--`.
    pub fn display(&self) -> BTreeMap<&'static str, String> {
        let token_a = |value: Option<U256>| text(value.map(|v| format_token(v, TokenUnit::SoilA)));
        let token_b = |value: Option<U256>| text(value.map(|v| format_token(v, TokenUnit::SoilB)));
        let address = |value: Option<Address>| text(value.map(|v| short_address(&v)));
        let percent = |value: Option<U256>| text(value.map(|v| format!("{}%", format_bps_percent(v))));
        let plain = |value: Option<U256>| text(value.map(|v| v.to_string()));
        let yes_no = |value: Option<bool>| text(value.map(|v| if v { "Yes" } else { "No" }.to_string()));
        let unclaimed_total = (!self.unclaimed.is_empty()).then(|| {
            self.unclaimed
                .iter()
                .fold(U256::ZERO, |total, day| total.saturating_add(day.amount))
        });

        BTreeMap::from([
            ("block_number", text(self.block_number.map(|v| v.to_string()))),
            ("current_day", text(self.current_day.map(|v| v.to_string()))),
            ("account", address(self.account)),
            ("token_a_balance", token_a(self.token_a_balance)),
            ("token_a_owner", address(self.token_a_owner)),
            ("is_primary", yes_no(self.is_primary)),
            ("token_b_balance", token_b(self.token_b_balance)),
            ("token_b_locked", token_b(self.token_b_locked)),
            ("token_b_unlocked", token_b(self.token_b_unlocked)),
            ("treasury_owner", address(self.treasury_owner)),
            ("integrity_score", plain(self.integrity_score)),
            ("eligible_for_governance", yes_no(self.eligible_for_governance)),
            ("crystallization_rate", percent(self.crystallization_rate_bps)),
            ("crystallization_fee", percent(self.crystallization_fee_bps)),
            ("appi_oracle", address(self.appi_oracle)),
            ("appi_confidence", percent(self.appi_confidence_bps)),
            ("appi_max_reports", plain(self.appi_max_reports)),
            ("last_appi", plain(self.last_appi)),
            ("daily_ubi_amount", token_b(self.daily_ubi_amount)),
            ("treasury_in_total", token_b(self.treasury_in_total)),
            ("treasury_out_a_total", token_a(self.treasury_out_a_total)),
            ("treasury_out_b_total", token_b(self.treasury_out_b_total)),
            ("reserves_a", token_a(self.last_reserves_a)),
            ("reserves_b", token_b(self.last_reserves_b)),
            ("liabilities_a", token_a(self.liabilities_a)),
            ("liabilities_b", token_b(self.liabilities_b)),
            ("dispute_resolver", address(self.dispute_resolver)),
            ("covenant_count", text(self.covenant_count.map(|v| v.to_string()))),
            ("unclaimed_total", token_b(unclaimed_total)),
        ])
    }
}

/// `today` and the `days - 1` days before it, oldest first.
pub fn lookback_days(today: u64, days: u64) -> impl Iterator<Item = u64> {
    today.saturating_sub(days.saturating_sub(1))..=today
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppiStatsView {
    pub day: u64,
    pub oracle: Address,
    pub daily_index: Option<U256>,
    pub categories: Vec<AppiCategoryStats>,
    /// Whole percent of categories with at least one report.
    pub reporter_diversity: Option<u64>,
}

pub async fn load_appi_stats(
    gateway: &ContractGateway,
    oracle: Address,
    day: u64,
    categories: &[u64],
) -> Result<AppiStatsView, GatewayError> {
    let mut stats = Vec::with_capacity(categories.len());
    for &category in categories {
        let reports = gateway.reports(oracle, day, category).await?;
        let reporters: BTreeSet<Address> = reports.iter().map(|(reporter, _)| *reporter).collect();
        stats.push(AppiCategoryStats {
            category,
            reports: reports.len(),
            unique_reporters: reporters.len(),
        });
    }
    Ok(AppiStatsView {
        day,
        oracle,
        daily_index: optional("daily_index", gateway.daily_index(oracle, day)).await,
        reporter_diversity: reporter_diversity(&stats),
        categories: stats,
    })
}

async fn optional<T>(
    read: &'static str,
    future: impl Future<Output = Result<T, GatewayError>>,
) -> Option<T> {
    match future.await {
        Ok(value) => Some(value),
        Err(GatewayError::NotConfigured(kind)) => {
            debug!(read, %kind, "snapshot read skipped");
            None
        }
        Err(error) => {
            warn!(read, %error, "snapshot read failed");
            None
        }
    }
}

fn text(value: Option<String>) -> String {
    value.unwrap_or_else(|| ABSENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookback_covers_today_and_preceding_days() {
        assert_eq!(lookback_days(100, 7).collect::<Vec<_>>(), (94..=100).collect::<Vec<_>>());
        assert_eq!(lookback_days(3, 7).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(lookback_days(5, 1).collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn absent_fields_render_as_placeholder() {
        let snapshot = DashboardSnapshot {
            token_b_balance: Some(U256::from(1_500_000_000_000_000_000_u128)),
            crystallization_rate_bps: Some(U256::from(2_550_u64)),
            is_primary: Some(true),
            ..DashboardSnapshot::default()
        };
        let display = snapshot.display();
        assert_eq!(display["token_b_balance"], "1.50 SOILB");
        assert_eq!(display["crystallization_rate"], "25.5%");
        assert_eq!(display["is_primary"], "Yes");
        assert_eq!(display["token_a_balance"], "--");
        assert_eq!(display["unclaimed_total"], "--");
    }

    #[test]
    fn crystallized_estimate_needs_rate_and_fee() {
        let mut snapshot = DashboardSnapshot {
            crystallization_rate_bps: Some(U256::from(5_000_u64)),
            ..DashboardSnapshot::default()
        };
        assert_eq!(snapshot.crystallized_estimate(U256::from(1_000_u64)), None);
        snapshot.crystallization_fee_bps = Some(U256::from(1_000_u64));
        assert_eq!(
            snapshot.crystallized_estimate(U256::from(1_000_u64)),
            Some(U256::from(450_u64))
        );
    }
}
