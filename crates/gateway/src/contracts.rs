use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::{SolCall, SolEvent};
use fairsoil_types::{
    CovenantStatus, CovenantView, PaymentToken, ResourceView, TemplateView,
};

use crate::abi::{
    IAppiOracle, ICovenant, ICovenantLibrary, IResourceRegistry, ITokenA, ITokenB, ITreasury,
};
use crate::{ChainClient, GatewayError, TxReceipt, TxRequest};

pub const MAX_TEMPLATES_LISTED: u64 = 25;
pub const MAX_COVENANTS_LISTED: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    TokenA,
    TokenB,
    Treasury,
    Covenant,
    AppiOracle,
    ResourceRegistry,
    CovenantLibrary,
}

impl ContractKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::TokenA => "token A",
            Self::TokenB => "token B",
            Self::Treasury => "treasury",
            Self::Covenant => "covenant",
            Self::AppiOracle => "APPI oracle",
            Self::ResourceRegistry => "resource registry",
            Self::CovenantLibrary => "covenant library",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Deployment addresses. The oracle address is discovered through the treasury.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractAddresses {
    pub token_a: Option<Address>,
    pub token_b: Option<Address>,
    pub treasury: Option<Address>,
    pub covenant: Option<Address>,
    pub resource_registry: Option<Address>,
    pub covenant_library: Option<Address>,
}

impl ContractAddresses {
    pub const REQUIRED: [ContractKind; 4] = [
        ContractKind::TokenA,
        ContractKind::TokenB,
        ContractKind::Treasury,
        ContractKind::Covenant,
    ];

    pub fn get(&self, kind: ContractKind) -> Option<Address> {
        match kind {
            ContractKind::TokenA => self.token_a,
            ContractKind::TokenB => self.token_b,
            ContractKind::Treasury => self.treasury,
            ContractKind::Covenant => self.covenant,
            ContractKind::ResourceRegistry => self.resource_registry,
            ContractKind::CovenantLibrary => self.covenant_library,
            ContractKind::AppiOracle => None,
        }
    }

    pub fn require(&self, kind: ContractKind) -> Result<Address, GatewayError> {
        self.get(kind).ok_or(GatewayError::NotConfigured(kind))
    }

    pub fn missing_required(&self) -> Vec<ContractKind> {
        Self::REQUIRED
            .into_iter()
            .filter(|kind| self.get(*kind).is_none())
            .collect()
    }

    /// Contracts whose events feed the audit trail.
    pub fn trail_sources(&self) -> Vec<Address> {
        [self.covenant, self.treasury].into_iter().flatten().collect()
    }
}

/// Registry key for a free-form resource name.
pub fn resource_id(name: &str) -> B256 {
    keccak256(name.trim().as_bytes())
}

#[derive(Clone)]
pub struct ContractGateway {
    chain: Arc<dyn ChainClient>,
    addresses: ContractAddresses,
}

impl ContractGateway {
    pub fn new(chain: Arc<dyn ChainClient>, addresses: ContractAddresses) -> Self {
        Self { chain, addresses }
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    pub fn addresses(&self) -> &ContractAddresses {
        &self.addresses
    }

    async fn read<C: SolCall + Send + Sync>(
        &self,
        kind: ContractKind,
        call: C,
    ) -> Result<C::Return, GatewayError> {
        let to = self.addresses.require(kind)?;
        self.read_at(to, call).await
    }

    async fn read_at<C: SolCall + Send + Sync>(
        &self,
        to: Address,
        call: C,
    ) -> Result<C::Return, GatewayError> {
        let data = Bytes::from(call.abi_encode());
        let output = self.chain.call(to, data).await?;
        C::abi_decode_returns(&output).map_err(|error| GatewayError::Decode {
            function: C::SIGNATURE,
            message: error.to_string(),
        })
    }

    fn write<C: SolCall>(&self, kind: ContractKind, call: C) -> Result<TxRequest, GatewayError> {
        let to = self.addresses.require(kind)?;
        Ok(write_at(to, call))
    }

    // token A

    pub async fn token_a_balance(&self, account: Address) -> Result<U256, GatewayError> {
        self.read(ContractKind::TokenA, ITokenA::balanceOfCall { account })
            .await
    }

    pub async fn token_a_owner(&self) -> Result<Address, GatewayError> {
        self.read(ContractKind::TokenA, ITokenA::ownerCall {}).await
    }

    pub async fn is_primary_address(&self, account: Address) -> Result<bool, GatewayError> {
        self.read(ContractKind::TokenA, ITokenA::isPrimaryAddressCall { account })
            .await
    }

    pub fn set_primary_address(&self, account: Address) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::TokenA,
            ITokenA::setPrimaryAddressCall {
                account,
                isPrimary: true,
            },
        )
    }

    // token B

    pub async fn token_b_balance(&self, account: Address) -> Result<U256, GatewayError> {
        self.read(ContractKind::TokenB, ITokenB::balanceOfCall { account })
            .await
    }

    pub async fn token_b_locked(&self, account: Address) -> Result<U256, GatewayError> {
        self.read(ContractKind::TokenB, ITokenB::lockedBalanceCall { account })
            .await
    }

    pub async fn token_b_unlocked(&self, account: Address) -> Result<U256, GatewayError> {
        self.read(ContractKind::TokenB, ITokenB::unlockedBalanceOfCall { account })
            .await
    }

    /// Allowance for the covenant escrow on whichever token pays the reward.
    pub fn approve_escrow(
        &self,
        payment: PaymentToken,
        amount: U256,
    ) -> Result<TxRequest, GatewayError> {
        let spender = self.addresses.require(ContractKind::Covenant)?;
        match payment {
            PaymentToken::TokenA => {
                self.write(ContractKind::TokenA, ITokenA::approveCall { spender, amount })
            }
            PaymentToken::TokenB => {
                self.write(ContractKind::TokenB, ITokenB::approveCall { spender, amount })
            }
        }
    }

    // treasury

    pub async fn treasury_owner(&self) -> Result<Address, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::ownerCall {})
            .await
    }

    pub async fn integrity_score(&self, account: Address) -> Result<U256, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::integrityScoreCall { account })
            .await
    }

    pub async fn is_eligible_for_governance(&self, account: Address) -> Result<bool, GatewayError> {
        self.read(
            ContractKind::Treasury,
            ITreasury::isEligibleForGovernanceCall { account },
        )
        .await
    }

    pub async fn crystallization_rate_bps(&self) -> Result<U256, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::crystallizationRateBpsCall {})
            .await
    }

    pub async fn crystallization_fee_bps(&self) -> Result<U256, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::crystallizationFeeBpsCall {})
            .await
    }

    pub async fn appi_oracle(&self) -> Result<Address, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::appiOracleCall {})
            .await
    }

    pub async fn last_appi(&self) -> Result<U256, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::lastAPPICall {})
            .await
    }

    pub async fn daily_ubi_amount(&self) -> Result<U256, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::dailyUBIAmountCall {})
            .await
    }

    pub async fn treasury_in_total(&self) -> Result<U256, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::treasuryInTotalCall {})
            .await
    }

    pub async fn treasury_out_a_total(&self) -> Result<U256, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::treasuryOutATotalCall {})
            .await
    }

    pub async fn treasury_out_b_total(&self) -> Result<U256, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::treasuryOutBTotalCall {})
            .await
    }

    pub async fn last_reserves_a(&self) -> Result<U256, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::lastReservesACall {})
            .await
    }

    pub async fn last_reserves_b(&self) -> Result<U256, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::lastReservesBCall {})
            .await
    }

    pub async fn liabilities_a(&self) -> Result<U256, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::liabilitiesACall {})
            .await
    }

    pub async fn liabilities_b(&self) -> Result<U256, GatewayError> {
        self.read(ContractKind::Treasury, ITreasury::liabilitiesBCall {})
            .await
    }

    pub async fn unclaimed(&self, account: Address, day: u64) -> Result<U256, GatewayError> {
        self.read(
            ContractKind::Treasury,
            ITreasury::unclaimedCall {
                account,
                day: U256::from(day),
            },
        )
        .await
    }

    pub fn claim_ubi(&self) -> Result<TxRequest, GatewayError> {
        self.write(ContractKind::Treasury, ITreasury::claimUBICall {})
    }

    pub fn accrue_ubi(&self) -> Result<TxRequest, GatewayError> {
        self.write(ContractKind::Treasury, ITreasury::accrueUBICall {})
    }

    pub fn claim_unclaimed(&self, from_day: u64, to_day: u64) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Treasury,
            ITreasury::claimUnclaimedCall {
                fromDay: U256::from(from_day),
                toDay: U256::from(to_day),
            },
        )
    }

    pub fn report_task_completed(
        &self,
        worker: Address,
        token_b_reward: U256,
        integrity_points: U256,
    ) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Treasury,
            ITreasury::reportTaskCompletedCall {
                worker,
                tokenBReward: token_b_reward,
                integrityPoints: integrity_points,
            },
        )
    }

    pub fn set_appi_oracle(&self, oracle: Address) -> Result<TxRequest, GatewayError> {
        self.write(ContractKind::Treasury, ITreasury::setAPPIOracleCall { oracle })
    }

    pub fn apply_appi(&self, day: u64) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Treasury,
            ITreasury::applyAPPICall {
                day: U256::from(day),
            },
        )
    }

    // APPI oracle, addressed through the treasury's current setting

    pub async fn confidence_bps(&self, oracle: Address) -> Result<U256, GatewayError> {
        self.read_at(oracle, IAppiOracle::confidenceBpsCall {})
            .await
    }

    pub async fn max_reports_per_category(&self, oracle: Address) -> Result<U256, GatewayError> {
        self.read_at(oracle, IAppiOracle::maxReportsPerCategoryCall {})
            .await
    }

    pub async fn daily_index(&self, oracle: Address, day: u64) -> Result<U256, GatewayError> {
        self.read_at(
            oracle,
            IAppiOracle::dailyIndexCall {
                day: U256::from(day),
            },
        )
        .await
    }

    /// `(reporter, price)` pairs submitted for one category on one day.
    pub async fn reports(
        &self,
        oracle: Address,
        day: u64,
        category: u64,
    ) -> Result<Vec<(Address, U256)>, GatewayError> {
        let reports = self
            .read_at(
                oracle,
                IAppiOracle::getReportsCall {
                    day: U256::from(day),
                    category: U256::from(category),
                },
            )
            .await?;
        Ok(reports
            .into_iter()
            .map(|report| (report.reporter, report.price))
            .collect())
    }

    pub fn set_appi_categories(
        &self,
        oracle: Address,
        categories: &[u64],
    ) -> Result<TxRequest, GatewayError> {
        Ok(write_at(
            oracle,
            IAppiOracle::setCategoriesCall {
                categories: categories.iter().copied().map(U256::from).collect(),
            },
        ))
    }

    pub fn submit_appi_price(
        &self,
        oracle: Address,
        category: u64,
        price: U256,
    ) -> Result<TxRequest, GatewayError> {
        Ok(write_at(
            oracle,
            IAppiOracle::submitPriceCall {
                category: U256::from(category),
                price,
            },
        ))
    }

    pub fn set_appi_confidence(
        &self,
        oracle: Address,
        confidence_bps: u64,
        max_reports: u64,
    ) -> Result<TxRequest, GatewayError> {
        Ok(write_at(
            oracle,
            IAppiOracle::setConfidenceCall {
                confidenceBps: U256::from(confidence_bps),
                maxReports: U256::from(max_reports),
            },
        ))
    }

    // covenant escrow

    pub async fn covenant_count(&self) -> Result<u64, GatewayError> {
        let next = self
            .read(ContractKind::Covenant, ICovenant::nextIdCall {})
            .await?;
        Ok(next.saturating_to::<u64>())
    }

    pub async fn covenant(&self, id: u64) -> Result<CovenantView, GatewayError> {
        let raw = self
            .read(
                ContractKind::Covenant,
                ICovenant::covenantsCall { id: U256::from(id) },
            )
            .await?;
        Ok(CovenantView {
            id,
            creator: raw.creator,
            worker: raw.worker,
            token_b_reward: raw.tokenBReward,
            integrity_points: raw.integrityPoints,
            issue_claim_bps: raw.issueClaimBps,
            escrow_start: raw.escrowStart,
            milestone_progress: raw.milestoneProgress,
            proposed_worker_payout_bps: raw.proposedWorkerPayoutBps,
            proposed_integrity_points: raw.proposedIntegrityPoints,
            proposed_slashing_penalty: raw.proposedSlashingPenalty,
            payment_token: PaymentToken::from_code(raw.paymentToken),
            status: CovenantStatus::from_code(raw.status),
        })
    }

    /// The most recent covenants, oldest first.
    pub async fn covenants(&self) -> Result<Vec<CovenantView>, GatewayError> {
        let total = self.covenant_count().await?;
        let start = total.saturating_sub(MAX_COVENANTS_LISTED);
        let mut views = Vec::with_capacity((total - start) as usize);
        for id in start..total {
            views.push(self.covenant(id).await?);
        }
        Ok(views)
    }

    pub async fn dispute_resolver(&self) -> Result<Address, GatewayError> {
        self.read(ContractKind::Covenant, ICovenant::disputeResolverCall {})
            .await
    }

    pub fn create_covenant(
        &self,
        worker: Address,
        reward: U256,
        integrity_points: U256,
        payment: PaymentToken,
    ) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Covenant,
            ICovenant::createCovenantCall {
                worker,
                tokenBReward: reward,
                integrityPoints: integrity_points,
                payInTokenA: payment == PaymentToken::TokenA,
            },
        )
    }

    pub fn submit_work(&self, covenant_id: u64) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Covenant,
            ICovenant::submitWorkCall {
                covenantId: U256::from(covenant_id),
            },
        )
    }

    pub fn approve_work(&self, covenant_id: u64) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Covenant,
            ICovenant::approveWorkCall {
                covenantId: U256::from(covenant_id),
            },
        )
    }

    pub fn reject_work(&self, covenant_id: u64) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Covenant,
            ICovenant::rejectWorkCall {
                covenantId: U256::from(covenant_id),
            },
        )
    }

    pub fn cancel_covenant(&self, covenant_id: u64) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Covenant,
            ICovenant::cancelCall {
                covenantId: U256::from(covenant_id),
            },
        )
    }

    pub fn report_issue(
        &self,
        covenant_id: u64,
        claim_bps: u64,
        reason: String,
        evidence_uri: String,
    ) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Covenant,
            ICovenant::reportIssueCall {
                covenantId: U256::from(covenant_id),
                claimBps: U256::from(claim_bps),
                reason,
                evidenceUri: evidence_uri,
            },
        )
    }

    pub fn accept_issue(&self, covenant_id: u64) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Covenant,
            ICovenant::acceptIssueCall {
                covenantId: U256::from(covenant_id),
            },
        )
    }

    pub fn dispute_issue(
        &self,
        covenant_id: u64,
        reason: String,
        evidence_uri: String,
    ) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Covenant,
            ICovenant::disputeIssueCall {
                covenantId: U256::from(covenant_id),
                reason,
                evidenceUri: evidence_uri,
            },
        )
    }

    pub fn resolve_dispute(
        &self,
        covenant_id: u64,
        worker_payout_bps: u64,
        integrity_points: U256,
        slashing_penalty: U256,
    ) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Covenant,
            ICovenant::resolveDisputeCall {
                covenantId: U256::from(covenant_id),
                workerPayoutBps: U256::from(worker_payout_bps),
                integrityPoints: integrity_points,
                slashingPenalty: slashing_penalty,
            },
        )
    }

    pub fn finalize_resolution(&self, covenant_id: u64) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::Covenant,
            ICovenant::finalizeResolutionCall {
                covenantId: U256::from(covenant_id),
            },
        )
    }

    /// Id assigned by `createCovenant`, read back from the escrow's own logs.
    pub fn created_covenant_id(&self, receipt: &TxReceipt) -> Option<u64> {
        let covenant = self.addresses.covenant?;
        receipt
            .logs
            .iter()
            .filter(|log| log.address == covenant)
            .find_map(|log| {
                ICovenant::CovenantCreated::decode_raw_log(log.topics.iter().copied(), &log.data)
                    .ok()
            })
            .map(|event| event.covenantId.saturating_to::<u64>())
    }

    // template library

    pub async fn templates(&self) -> Result<Vec<TemplateView>, GatewayError> {
        let total = self
            .read(
                ContractKind::CovenantLibrary,
                ICovenantLibrary::nextTemplateIdCall {},
            )
            .await?
            .saturating_to::<u64>()
            .min(MAX_TEMPLATES_LISTED);
        let mut views = Vec::with_capacity(total as usize);
        for id in 0..total {
            let raw = self
                .read(
                    ContractKind::CovenantLibrary,
                    ICovenantLibrary::templatesCall {
                        templateId: U256::from(id),
                    },
                )
                .await?;
            views.push(TemplateView {
                id,
                creator: raw.creator,
                royalty_bps: raw.royaltyBps,
                metadata_uri: raw.metadataUri,
                active: raw.active,
            });
        }
        Ok(views)
    }

    pub fn register_template(
        &self,
        royalty_bps: u64,
        metadata_uri: String,
    ) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::CovenantLibrary,
            ICovenantLibrary::registerTemplateCall {
                royaltyBps: U256::from(royalty_bps),
                metadataUri: metadata_uri,
            },
        )
    }

    pub fn set_template_active(
        &self,
        template_id: u64,
        active: bool,
    ) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::CovenantLibrary,
            ICovenantLibrary::setActiveCall {
                templateId: U256::from(template_id),
                active,
            },
        )
    }

    pub fn record_template_use(
        &self,
        template_id: u64,
        covenant_id: u64,
        amount: U256,
    ) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::CovenantLibrary,
            ICovenantLibrary::recordUseCall {
                templateId: U256::from(template_id),
                covenantId: U256::from(covenant_id),
                amount,
            },
        )
    }

    // resource registry

    pub async fn resource(&self, name: &str) -> Result<ResourceView, GatewayError> {
        let id = resource_id(name);
        let record = self
            .read(
                ContractKind::ResourceRegistry,
                IResourceRegistry::resourcesCall { resourceId: id },
            )
            .await?;
        let pending = self
            .read(
                ContractKind::ResourceRegistry,
                IResourceRegistry::pendingTaxCall { resourceId: id },
            )
            .await?;
        Ok(ResourceView {
            owner: record.owner,
            valuation: record.valuation,
            tax_rate_bps: record.taxRateBps,
            last_tax_timestamp: record.lastTaxTimestamp,
            exists: record.exists,
            due: pending.due,
            elapsed: pending.elapsed,
        })
    }

    pub fn register_resource(
        &self,
        name: &str,
        valuation: U256,
        tax_rate_bps: u64,
    ) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::ResourceRegistry,
            IResourceRegistry::registerResourceCall {
                resourceId: resource_id(name),
                valuation,
                taxRateBps: U256::from(tax_rate_bps),
            },
        )
    }

    pub fn update_valuation(&self, name: &str, valuation: U256) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::ResourceRegistry,
            IResourceRegistry::updateValuationCall {
                resourceId: resource_id(name),
                valuation,
            },
        )
    }

    pub fn pay_tax(&self, name: &str) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::ResourceRegistry,
            IResourceRegistry::payTaxCall {
                resourceId: resource_id(name),
            },
        )
    }

    pub fn buy_resource(&self, name: &str, max_price: U256) -> Result<TxRequest, GatewayError> {
        self.write(
            ContractKind::ResourceRegistry,
            IResourceRegistry::buyResourceCall {
                resourceId: resource_id(name),
                maxPrice: max_price,
            },
        )
    }
}

fn write_at<C: SolCall>(to: Address, call: C) -> TxRequest {
    TxRequest::new(function_name::<C>(), to, call.abi_encode())
}

/// `createCovenant(address,uint256,...)` -> `createCovenant`
fn function_name<C: SolCall>() -> &'static str {
    let signature = C::SIGNATURE;
    signature
        .split_once('(')
        .map(|(name, _)| name)
        .unwrap_or(signature)
}
