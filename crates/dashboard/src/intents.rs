//! User intents as they arrive from the page, and the transaction plans they
//! turn into. Everything here is checked before the chain is touched.

use fairsoil_gateway::{ContractGateway, GatewayError, TxRequest};
use fairsoil_orchestrator::ActionPlan;
use fairsoil_types::{Address, PaymentToken, U256};
use serde::{Deserialize, Serialize};

use crate::config::{WorldIdConfig, ZkNfcConfig};
use crate::validation::{
    ValidationError, check_balance, parse_address, parse_amount, parse_categories,
    parse_category_id, parse_confidence, parse_covenant_id, parse_day_index, parse_day_range,
    parse_integrity_points, parse_percent_bps, parse_price, parse_resource_name,
    parse_royalty_bps, parse_tax_rate_bps, parse_template_id,
};
use crate::verifier::VerifierKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovenantPreset {
    #[default]
    General,
    Micro,
    Delivery,
    Audit,
    Urgent,
    Education,
}

/// Values a preset supplies for fields the user left blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetDefaults {
    pub reward: &'static str,
    pub integrity_points: &'static str,
    pub payment: PaymentToken,
    pub tags: Option<&'static str>,
}

impl CovenantPreset {
    pub fn defaults(self) -> Option<PresetDefaults> {
        let (reward, integrity_points, payment, tags) = match self {
            Self::General => return None,
            Self::Micro => ("50", "10", PaymentToken::TokenB, None),
            Self::Delivery => ("200", "40", PaymentToken::TokenB, None),
            Self::Audit => ("300", "80", PaymentToken::TokenB, None),
            Self::Urgent => ("400", "120", PaymentToken::TokenA, None),
            Self::Education => (
                "500",
                "150",
                PaymentToken::TokenB,
                Some("education, upskill"),
            ),
        };
        Some(PresetDefaults {
            reward,
            integrity_points,
            payment,
            tags,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserIntent {
    ClaimUbi,
    AccrueUbi,
    ClaimUnclaimed {
        #[serde(default)]
        from_day: String,
        #[serde(default)]
        to_day: String,
    },
    ReportTaskCompleted {
        #[serde(default)]
        worker: String,
        #[serde(default)]
        reward: String,
        #[serde(default)]
        integrity_points: String,
    },
    SetAppiOracle {
        #[serde(default)]
        oracle: String,
    },
    SetAppiCategories {
        #[serde(default)]
        categories: String,
    },
    SubmitAppiPrice {
        #[serde(default)]
        category: String,
        #[serde(default)]
        price: String,
    },
    ApplyAppi {
        #[serde(default)]
        day: String,
    },
    SetAppiConfidence {
        #[serde(default)]
        confidence_bps: String,
        #[serde(default)]
        max_reports: String,
    },
    SetPrimary,
    VerifyWorldId,
    VerifyZkNfc,
    CreateCovenant {
        #[serde(default)]
        preset: CovenantPreset,
        #[serde(default)]
        worker: String,
        #[serde(default)]
        reward: String,
        #[serde(default)]
        integrity_points: String,
        #[serde(default)]
        payment_token: Option<PaymentToken>,
        #[serde(default)]
        tags: String,
        #[serde(default)]
        template_id: Option<u64>,
    },
    SubmitWork {
        covenant_id: u64,
    },
    ApproveWork {
        covenant_id: u64,
    },
    RejectWork {
        covenant_id: u64,
    },
    CancelCovenant {
        covenant_id: u64,
    },
    ReportIssue {
        covenant_id: u64,
        #[serde(default)]
        claim_percent: String,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        evidence_uri: String,
    },
    AcceptIssue {
        covenant_id: u64,
    },
    DisputeIssue {
        covenant_id: u64,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        evidence_uri: String,
    },
    ResolveDispute {
        covenant_id: u64,
        #[serde(default)]
        payout_percent: String,
        #[serde(default)]
        integrity_points: String,
        #[serde(default)]
        slashing_penalty: String,
    },
    FinalizeResolution {
        covenant_id: u64,
    },
    RegisterTemplate {
        #[serde(default)]
        royalty_bps: String,
        #[serde(default)]
        metadata_uri: String,
    },
    SetTemplateActive {
        template_id: u64,
        active: bool,
    },
    RecordTemplateUse {
        #[serde(default)]
        template_id: String,
        #[serde(default)]
        covenant_id: String,
        #[serde(default)]
        amount: String,
    },
    RegisterResource {
        #[serde(default)]
        name: String,
        #[serde(default)]
        valuation: String,
        #[serde(default)]
        tax_rate_bps: String,
    },
    UpdateValuation {
        #[serde(default)]
        name: String,
        #[serde(default)]
        valuation: String,
    },
    PayTax {
        #[serde(default)]
        name: String,
    },
    BuyResource {
        #[serde(default)]
        name: String,
        #[serde(default)]
        max_price: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// What the runtime knows when an intent arrives.
#[derive(Clone, Copy)]
pub struct IntentContext<'a> {
    pub gateway: &'a ContractGateway,
    pub account: Option<Address>,
    pub appi_oracle: Option<Address>,
    pub current_day: Option<u64>,
    pub token_a_balance: Option<U256>,
    pub token_b_unlocked: Option<U256>,
    pub world_id: &'a WorldIdConfig,
    pub zk_nfc: &'a ZkNfcConfig,
}

#[derive(Debug)]
pub struct PreparedPlan {
    pub plan: ActionPlan,
    /// Tags to stage before the plan runs, promoted once the covenant id is known.
    pub tags: Option<String>,
}

impl PreparedPlan {
    fn new(plan: ActionPlan) -> Self {
        Self { plan, tags: None }
    }
}

#[derive(Debug)]
pub enum PreparedIntent {
    Transactions(PreparedPlan),
    /// Ask the verifier first; on success run `then`.
    Verify {
        kind: VerifierKind,
        then: PreparedPlan,
    },
}

impl UserIntent {
    pub fn prepare(&self, ctx: &IntentContext<'_>) -> Result<PreparedIntent, IntentError> {
        let account = ctx.account.ok_or(ValidationError::MissingAccount)?;
        let gateway = ctx.gateway;
        let single = |name: &str,
                      request: TxRequest,
                      message: &str|
         -> Result<PreparedIntent, IntentError> {
            Ok(PreparedIntent::Transactions(PreparedPlan::new(
                ActionPlan::single(name, request).with_success_message(message),
            )))
        };

        match self {
            Self::ClaimUbi => single(
                "claimUBI",
                gateway.claim_ubi()?,
                "Transaction successful!",
            ),
            Self::AccrueUbi => single("accrueUBI", gateway.accrue_ubi()?, "Accrued bonus."),
            Self::ClaimUnclaimed { from_day, to_day } => {
                let (from_day, to_day) = parse_day_range(from_day, to_day)?;
                single(
                    "claimUnclaimed",
                    gateway.claim_unclaimed(from_day, to_day)?,
                    "Saved bonus claimed.",
                )
            }
            Self::ReportTaskCompleted {
                worker,
                reward,
                integrity_points,
            } => {
                let worker = parse_address(worker, "worker")?;
                let reward = parse_amount(reward, "reward")?;
                let points = parse_integrity_points(integrity_points)?;
                single(
                    "reportTaskCompleted",
                    gateway.report_task_completed(worker, reward, points)?,
                    "Transaction successful!",
                )
            }
            Self::SetAppiOracle { oracle } => {
                let oracle = parse_address(oracle, "APPI oracle")?;
                single(
                    "setAPPIOracle",
                    gateway.set_appi_oracle(oracle)?,
                    "APPI oracle updated.",
                )
            }
            Self::SetAppiCategories { categories } => {
                let oracle = require_oracle(ctx)?;
                let categories = parse_categories(categories)?;
                single(
                    "setAPPIcategories",
                    gateway.set_appi_categories(oracle, &categories)?,
                    "APPI categories updated.",
                )
            }
            Self::SubmitAppiPrice { category, price } => {
                let oracle = require_oracle(ctx)?;
                let category = parse_category_id(category)?;
                let price = parse_price(price)?;
                single(
                    "submitAPPI",
                    gateway.submit_appi_price(oracle, category, price)?,
                    "APPI price submitted.",
                )
            }
            Self::ApplyAppi { day } => {
                let day = parse_day_index(day, ctx.current_day)?;
                single("applyAPPI", gateway.apply_appi(day)?, "APPI applied.")
            }
            Self::SetAppiConfidence {
                confidence_bps,
                max_reports,
            } => {
                let oracle = require_oracle(ctx)?;
                let (bps, max_reports) = parse_confidence(confidence_bps, max_reports)?;
                single(
                    "setAPPIConfidence",
                    gateway.set_appi_confidence(oracle, bps, max_reports)?,
                    "APPI confidence updated.",
                )
            }
            Self::SetPrimary => Ok(PreparedIntent::Transactions(set_primary_plan(
                gateway,
                account,
                "Primary verification updated.",
            )?)),
            Self::VerifyWorldId => {
                let configured = |value: &Option<String>| {
                    value.as_deref().is_some_and(|value| !value.trim().is_empty())
                };
                if !configured(&ctx.world_id.app_id) || !configured(&ctx.world_id.action_id) {
                    return Err(ValidationError::WorldIdConfigMissing.into());
                }
                verify_then_set_primary(
                    gateway,
                    account,
                    VerifierKind::WorldId,
                    ctx.world_id.mock,
                )
            }
            Self::VerifyZkNfc => {
                if !ctx.zk_nfc.mock && ctx.zk_nfc.verifier_url.is_none() {
                    return Err(ValidationError::ZkNfcUrlMissing.into());
                }
                verify_then_set_primary(gateway, account, VerifierKind::ZkNfc, ctx.zk_nfc.mock)
            }
            Self::CreateCovenant {
                preset,
                worker,
                reward,
                integrity_points,
                payment_token,
                tags,
                template_id,
            } => {
                let defaults = preset.defaults();
                let reward = fill(reward, defaults.map(|d| d.reward));
                let integrity_points = fill(integrity_points, defaults.map(|d| d.integrity_points));
                let tags = fill(tags, defaults.and_then(|d| d.tags));
                let payment = payment_token
                    .or(defaults.map(|d| d.payment))
                    .unwrap_or(PaymentToken::TokenB);

                let worker = parse_address(worker, "worker")?;
                let reward = parse_amount(&reward, "reward")?;
                let points = parse_integrity_points(&integrity_points)?;
                let available = match payment {
                    PaymentToken::TokenA => ctx.token_a_balance,
                    PaymentToken::TokenB => ctx.token_b_unlocked,
                };
                check_balance(reward, available)?;

                let mut plan = ActionPlan::new("createCovenant")
                    .then(gateway.approve_escrow(payment, reward)?)
                    .then(gateway.create_covenant(worker, reward, points, payment)?);
                let template = template_id.filter(|id| *id > 0);
                if let Some(template) = template
                    && gateway.addresses().covenant_library.is_some()
                {
                    let library = gateway.clone();
                    plan = plan.then_derived("recordUse", move |receipts| {
                        let covenant_id = receipts
                            .iter()
                            .find_map(|receipt| library.created_covenant_id(receipt))?;
                        library
                            .record_template_use(template, covenant_id, reward)
                            .ok()
                    });
                }
                let tags = tags.trim();
                Ok(PreparedIntent::Transactions(PreparedPlan {
                    plan,
                    tags: (!tags.is_empty()).then(|| tags.to_string()),
                }))
            }
            Self::SubmitWork { covenant_id } => single(
                &format!("submit-{covenant_id}"),
                gateway.submit_work(*covenant_id)?,
                "Transaction successful!",
            ),
            Self::ApproveWork { covenant_id } => single(
                &format!("approve-{covenant_id}"),
                gateway.approve_work(*covenant_id)?,
                "Transaction successful!",
            ),
            Self::RejectWork { covenant_id } => single(
                &format!("reject-{covenant_id}"),
                gateway.reject_work(*covenant_id)?,
                "Transaction successful!",
            ),
            Self::CancelCovenant { covenant_id } => single(
                &format!("cancel-{covenant_id}"),
                gateway.cancel_covenant(*covenant_id)?,
                "Transaction successful!",
            ),
            Self::ReportIssue {
                covenant_id,
                claim_percent,
                reason,
                evidence_uri,
            } => {
                let claim_bps = parse_percent_bps(claim_percent, "the claim")?;
                single(
                    &format!("report-issue-{covenant_id}"),
                    gateway.report_issue(
                        *covenant_id,
                        claim_bps,
                        reason.clone(),
                        evidence_uri.trim().to_string(),
                    )?,
                    "Transaction successful!",
                )
            }
            Self::AcceptIssue { covenant_id } => single(
                &format!("accept-issue-{covenant_id}"),
                gateway.accept_issue(*covenant_id)?,
                "Transaction successful!",
            ),
            Self::DisputeIssue {
                covenant_id,
                reason,
                evidence_uri,
            } => single(
                &format!("dispute-{covenant_id}"),
                gateway.dispute_issue(
                    *covenant_id,
                    reason.clone(),
                    evidence_uri.trim().to_string(),
                )?,
                "Transaction successful!",
            ),
            Self::ResolveDispute {
                covenant_id,
                payout_percent,
                integrity_points,
                slashing_penalty,
            } => {
                let payout_bps = parse_percent_bps(payout_percent, "the worker payout")?;
                let points = parse_integrity_points(integrity_points)?;
                let slashing = parse_amount(slashing_penalty, "slashing penalty")?;
                single(
                    &format!("resolve-{covenant_id}"),
                    gateway.resolve_dispute(*covenant_id, payout_bps, points, slashing)?,
                    "Transaction successful!",
                )
            }
            Self::FinalizeResolution { covenant_id } => single(
                &format!("finalize-{covenant_id}"),
                gateway.finalize_resolution(*covenant_id)?,
                "Transaction successful!",
            ),
            Self::RegisterTemplate {
                royalty_bps,
                metadata_uri,
            } => {
                let bps = parse_royalty_bps(royalty_bps)?;
                single(
                    "registerTemplate",
                    gateway.register_template(bps, metadata_uri.trim().to_string())?,
                    "Template registered.",
                )
            }
            Self::SetTemplateActive {
                template_id,
                active,
            } => single(
                "toggleTemplate",
                gateway.set_template_active(*template_id, *active)?,
                "Template status updated.",
            ),
            Self::RecordTemplateUse {
                template_id,
                covenant_id,
                amount,
            } => {
                let template_id = parse_template_id(template_id)?;
                let covenant_id = parse_covenant_id(covenant_id)?;
                let amount = parse_amount(amount, "amount")?;
                single(
                    "recordTemplateUse",
                    gateway.record_template_use(template_id, covenant_id, amount)?,
                    "Template usage recorded.",
                )
            }
            Self::RegisterResource {
                name,
                valuation,
                tax_rate_bps,
            } => {
                let name = parse_resource_name(name)?;
                let valuation = parse_amount(valuation, "valuation")?;
                let rate = parse_tax_rate_bps(tax_rate_bps)?;
                single(
                    "registerResource",
                    gateway.register_resource(name, valuation, rate)?,
                    "Resource registered.",
                )
            }
            Self::UpdateValuation { name, valuation } => {
                let name = parse_resource_name(name)?;
                let valuation = parse_amount(valuation, "valuation")?;
                single(
                    "updateValuation",
                    gateway.update_valuation(name, valuation)?,
                    "Valuation updated.",
                )
            }
            Self::PayTax { name } => {
                let name = parse_resource_name(name)?;
                single("payTax", gateway.pay_tax(name)?, "Tax paid.")
            }
            Self::BuyResource { name, max_price } => {
                let name = parse_resource_name(name)?;
                let max_price = parse_amount(max_price, "max price")?;
                single(
                    "buyResource",
                    gateway.buy_resource(name, max_price)?,
                    "Resource purchased.",
                )
            }
        }
    }
}

fn require_oracle(ctx: &IntentContext<'_>) -> Result<Address, ValidationError> {
    ctx.appi_oracle
        .filter(|oracle| !oracle.is_zero())
        .ok_or(ValidationError::OracleNotSet)
}

fn fill(value: &str, default: Option<&str>) -> String {
    match default {
        Some(default) if value.trim().is_empty() => default.to_string(),
        _ => value.to_string(),
    }
}

fn set_primary_plan(
    gateway: &ContractGateway,
    account: Address,
    message: &str,
) -> Result<PreparedPlan, IntentError> {
    let request = gateway.set_primary_address(account)?;
    Ok(PreparedPlan::new(
        ActionPlan::single("setPrimary", request).with_success_message(message),
    ))
}

/// Mock verifiers skip the HTTP round trip.
fn verify_then_set_primary(
    gateway: &ContractGateway,
    account: Address,
    kind: VerifierKind,
    mock: bool,
) -> Result<PreparedIntent, IntentError> {
    if mock {
        return Ok(PreparedIntent::Transactions(set_primary_plan(
            gateway,
            account,
            "Primary verification updated.",
        )?));
    }
    Ok(PreparedIntent::Verify {
        kind,
        then: set_primary_plan(gateway, account, kind.accepted_message())?,
    })
}
