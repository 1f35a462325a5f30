use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;

use fairsoil_gateway::{ChainClient, ContractGateway, GatewayError, HttpChainClient};
use fairsoil_orchestrator::{
    PlanProgress, PostActionRefresh, RefreshFuture, TxOrchestrator, TxSnapshot,
    USER_REJECTED_MESSAGE,
};
use fairsoil_trail::{
    AuditCategory, InMemoryTagStore, JsonFileTagStore, LogCursor, TagKey, TagStore, TrailError,
    TrailLoader, TrailQuery, TrailStore, audit_category, export_csv, filter_trail,
};
use fairsoil_types::{
    Address, B256, CovenantView, PaymentToken, ResourceView, TemplateView, TokenUnit, TrailItem,
    dispute_stage, dispute_status_label, format_integrity, format_relative_time, format_token,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::banner::{Banner, BannerKind, BannerSlot, missing_addresses_warning};
use crate::config::{DashboardConfig, WorldIdConfig, ZkNfcConfig};
use crate::intents::{IntentContext, PreparedIntent, PreparedPlan, UserIntent};
use crate::snapshot::{AppiStatsView, DashboardSnapshot, load_appi_stats};
use crate::validation::{
    ValidationError, parse_categories, parse_day_index, parse_resource_name,
};
use crate::verifier::{VerifierClient, VerifierKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("runtime setup failed: {0}")]
    Setup(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Trail(#[from] TrailError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub snapshot: DashboardSnapshot,
    pub display: BTreeMap<&'static str, String>,
    pub tx: TxSnapshot,
    pub banner: Option<Banner>,
    pub warning: Option<String>,
    pub trail_len: usize,
    pub world_id_mock: bool,
    pub zk_nfc_mock: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrailEntryView {
    #[serde(flatten)]
    pub item: TrailItem,
    pub relative_time: String,
    pub category: AuditCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CovenantRow {
    #[serde(flatten)]
    pub covenant: CovenantView,
    pub status_label: &'static str,
    pub dispute_status: &'static str,
    pub dispute_stage: [bool; 4],
    pub reward_display: String,
    pub integrity_display: String,
    /// Token A the reward would crystallize into. Token B rewards only.
    pub crystallized_display: Option<String>,
    pub tags: Option<String>,
    pub involves_account: bool,
    pub adjudication_url: Option<String>,
}

/// Result of one submitted intent, as returned to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub ok: bool,
    pub action: Option<String>,
    pub message: String,
    pub progress: Option<PlanProgress>,
    pub transactions: Vec<B256>,
    pub covenant_id: Option<u64>,
}

/// State shared with the orchestrator's post-action refresh.
struct SharedState {
    gateway: ContractGateway,
    account: Option<Address>,
    loader: TrailLoader,
    unclaimed_lookback_days: u64,
    trail: Mutex<TrailStore>,
    cursor: tokio::sync::Mutex<LogCursor>,
    snapshot: RwLock<DashboardSnapshot>,
    generation: AtomicU64,
}

impl SharedState {
    fn trail(&self) -> MutexGuard<'_, TrailStore> {
        self.trail
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Concurrent refreshes may finish out of order; the latest one started wins.
    async fn refresh(&self) -> Result<(), GatewayError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut loaded =
            DashboardSnapshot::load(&self.gateway, self.account, self.unclaimed_lookback_days)
                .await?;
        loaded.generation = generation;
        let mut current = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if current.generation < generation {
            *current = loaded;
        } else {
            debug!(generation, "stale snapshot discarded");
        }
        Ok(())
    }

    async fn reload(&self) -> Result<usize, TrailError> {
        let ticket = self.trail().begin_backfill();
        let historical = match self.loader.load_historical().await {
            Ok(historical) => historical,
            Err(error) => {
                self.trail().abort_backfill(ticket);
                return Err(error);
            }
        };
        let count = historical.items.len();
        let applied = self.trail().replace_historical(ticket, historical.items);
        if !applied {
            debug!(head = historical.head, "superseded trail backfill dropped");
            return Ok(0);
        }
        let mut cursor = self.cursor.lock().await;
        if cursor
            .next_block()
            .is_none_or(|next| next <= historical.head)
        {
            cursor.anchor(historical.head);
        }
        Ok(count)
    }
}

impl PostActionRefresh for SharedState {
    fn refresh_snapshot(&self) -> RefreshFuture<'_> {
        Box::pin(async move { self.refresh().await.map_err(|error| error.to_string()) })
    }

    fn reload_trail(&self) -> RefreshFuture<'_> {
        Box::pin(async move {
            self.reload()
                .await
                .map(|_| ())
                .map_err(|error| error.to_string())
        })
    }
}

pub struct DashboardRuntime {
    shared: Arc<SharedState>,
    orchestrator: TxOrchestrator,
    verifier: VerifierClient,
    world_id: WorldIdConfig,
    zk_nfc: ZkNfcConfig,
    external_adjudication_url: Option<String>,
    warning: Option<String>,
    banner: Mutex<BannerSlot>,
    tags: Mutex<Box<dyn TagStore>>,
}

impl DashboardRuntime {
    /// Connects to the configured node and opens the tag store.
    pub fn new(config: &DashboardConfig) -> Result<Self, RuntimeError> {
        let chain = HttpChainClient::new(&config.rpc_url, config.rpc_timeout(), config.retry())?;
        let tags: Box<dyn TagStore> = match config.tags_path.as_ref() {
            Some(path) => Box::new(JsonFileTagStore::open(path)?),
            None => Box::new(InMemoryTagStore::default()),
        };
        Self::with_chain(config, Arc::new(chain), tags)
    }

    pub fn with_chain(
        config: &DashboardConfig,
        chain: Arc<dyn ChainClient>,
        tags: Box<dyn TagStore>,
    ) -> Result<Self, RuntimeError> {
        let gateway = ContractGateway::new(Arc::clone(&chain), config.addresses.clone());
        let loader = TrailLoader::new(Arc::clone(&chain), config.addresses.trail_sources())
            .with_from_block(config.trail_from_block)
            .with_max_log_span(config.max_log_span);
        let shared = Arc::new(SharedState {
            gateway,
            account: config.account,
            loader,
            unclaimed_lookback_days: config.unclaimed_lookback_days,
            trail: Mutex::new(TrailStore::new(config.trail_capacity)),
            cursor: tokio::sync::Mutex::new(LogCursor::new(config.max_log_span)),
            snapshot: RwLock::new(DashboardSnapshot {
                account: config.account,
                ..DashboardSnapshot::default()
            }),
            generation: AtomicU64::new(0),
        });
        let orchestrator = TxOrchestrator::new(chain, config.orchestrator())
            .with_refresh(Arc::clone(&shared) as Arc<dyn PostActionRefresh>);
        let verifier = VerifierClient::new(
            config.world_id.verify_url.clone(),
            config.zk_nfc.verifier_url.clone(),
            config.rpc_timeout(),
        )
        .map_err(RuntimeError::Setup)?;
        let warning = missing_addresses_warning(&config.addresses.missing_required());
        if let Some(warning) = warning.as_deref() {
            warn!(warning, "dashboard starting with incomplete contract configuration");
        }
        Ok(Self {
            shared,
            orchestrator,
            verifier,
            world_id: config.world_id.clone(),
            zk_nfc: config.zk_nfc.clone(),
            external_adjudication_url: config.external_adjudication_url.clone(),
            warning,
            banner: Mutex::new(BannerSlot::default()),
            tags: Mutex::new(tags),
        })
    }

    pub async fn refresh_snapshot(&self) -> Result<(), GatewayError> {
        self.shared.refresh().await
    }

    /// Full historical backfill. Returns how many items the backfill produced.
    pub async fn reload_trail(&self) -> Result<usize, TrailError> {
        self.shared.reload().await
    }

    /// One live polling round. Returns how many new items were merged.
    pub async fn poll_trail(&self) -> Result<usize, TrailError> {
        let items = {
            let mut cursor = self.shared.cursor.lock().await;
            self.shared.loader.poll_live(&mut cursor).await?
        };
        if items.is_empty() {
            return Ok(0);
        }
        let added = self.shared.trail().append_live(items);
        if added > 0 {
            debug!(added, "live trail items merged");
        }
        Ok(added)
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.shared.snapshot()
    }

    pub fn status(&self, now: Instant) -> StatusView {
        let snapshot = self.shared.snapshot();
        StatusView {
            display: snapshot.display(),
            snapshot,
            tx: self.orchestrator.tracker().snapshot(),
            banner: self.banner().visible(now),
            warning: self.warning.clone(),
            trail_len: self.shared.trail().len(),
            world_id_mock: self.world_id.mock,
            zk_nfc_mock: self.zk_nfc.mock,
        }
    }

    pub fn dismiss_banner(&self) {
        self.banner().dismiss();
    }

    pub fn trail(&self, query: &TrailQuery, now: u64) -> Vec<TrailEntryView> {
        let trail = self.shared.trail();
        let tags = self.tags();
        filter_trail(trail.items(), query, |id| tags.tags_for(id))
            .into_iter()
            .map(|item| TrailEntryView {
                item: item.clone(),
                relative_time: format_relative_time(item.timestamp, now),
                category: audit_category(&item.title),
                tags: item.covenant_id.and_then(|id| tags.tags_for(id)),
            })
            .collect()
    }

    pub fn trail_csv(&self, query: &TrailQuery) -> String {
        let trail = self.shared.trail();
        let tags = self.tags();
        export_csv(filter_trail(trail.items(), query, |id| tags.tags_for(id)))
    }

    /// Newest first.
    pub async fn covenants(&self) -> Result<Vec<CovenantRow>, GatewayError> {
        let covenants = self.shared.gateway.covenants().await?;
        let snapshot = self.shared.snapshot();
        let tags = self.tags();
        Ok(covenants
            .into_iter()
            .rev()
            .map(|covenant| {
                let unit = covenant.payment_token.unit();
                let crystallized_display = (covenant.payment_token == PaymentToken::TokenB)
                    .then(|| snapshot.crystallized_estimate(covenant.token_b_reward))
                    .flatten()
                    .map(|estimate| format_token(estimate, TokenUnit::SoilA));
                CovenantRow {
                    status_label: covenant.status.label(),
                    dispute_status: dispute_status_label(covenant.status),
                    dispute_stage: dispute_stage(covenant.status),
                    reward_display: format_token(covenant.token_b_reward, unit),
                    integrity_display: format_integrity(covenant.integrity_points),
                    crystallized_display,
                    tags: tags.tags_for(covenant.id),
                    involves_account: snapshot
                        .account
                        .is_some_and(|account| covenant.involves(&account)),
                    adjudication_url: covenant
                        .status
                        .in_dispute_flow()
                        .then(|| self.external_adjudication_url.clone())
                        .flatten(),
                    covenant,
                }
            })
            .collect())
    }

    pub async fn templates(&self) -> Result<Vec<TemplateView>, GatewayError> {
        self.shared.gateway.templates().await
    }

    pub async fn resource(&self, name: &str) -> Result<ResourceView, RuntimeError> {
        let name = parse_resource_name(name)?;
        Ok(self.shared.gateway.resource(name).await?)
    }

    /// Report statistics for the current oracle. A blank day means today.
    pub async fn appi_stats(&self, day: &str, categories: &str) -> Result<AppiStatsView, RuntimeError> {
        let snapshot = self.shared.snapshot();
        let oracle = snapshot
            .appi_oracle
            .filter(|oracle| !oracle.is_zero())
            .ok_or(ValidationError::OracleNotSet)?;
        let day = parse_day_index(day, snapshot.current_day)?;
        let categories = parse_categories(categories)?;
        Ok(load_appi_stats(&self.shared.gateway, oracle, day, &categories).await?)
    }

    /// Blank input clears the covenant's tags. Returns the stored value.
    pub fn set_tags(&self, covenant_id: u64, tags: &str) -> Result<Option<String>, TrailError> {
        let mut store = self.tags();
        let key = TagKey::Covenant(covenant_id);
        let trimmed = tags.trim();
        if trimmed.is_empty() {
            store.remove(key)?;
            return Ok(None);
        }
        store.set(key, trimmed.to_string())?;
        Ok(Some(trimmed.to_string()))
    }

    /// Validates, verifies when needed, then runs the resulting plan. The
    /// outcome is also left on the banner.
    pub async fn submit(&self, intent: UserIntent) -> ActionOutcome {
        let prepared = {
            let snapshot = self.shared.snapshot();
            let ctx = IntentContext {
                gateway: &self.shared.gateway,
                account: self.shared.account,
                appi_oracle: snapshot.appi_oracle.filter(|oracle| !oracle.is_zero()),
                current_day: snapshot.current_day,
                token_a_balance: snapshot.token_a_balance,
                token_b_unlocked: snapshot.token_b_unlocked,
                world_id: &self.world_id,
                zk_nfc: &self.zk_nfc,
            };
            intent.prepare(&ctx)
        };
        let plan = match prepared {
            Ok(PreparedIntent::Transactions(plan)) => plan,
            Ok(PreparedIntent::Verify { kind, then }) => {
                if let Err(message) = self.run_verifier(kind).await {
                    return self.reject(Some(kind.action_name().to_string()), message);
                }
                then
            }
            Err(error) => {
                debug!(%error, "intent rejected before submission");
                return self.reject(None, error.to_string());
            }
        };
        self.run_plan(plan).await
    }

    async fn run_verifier(&self, kind: VerifierKind) -> Result<(), String> {
        let _active = self
            .orchestrator
            .tracker()
            .begin(kind.action_name())
            .map_err(|error| error.to_string())?;
        let account = self
            .shared
            .account
            .ok_or_else(|| ValidationError::MissingAccount.to_string())?;
        let result = match kind {
            VerifierKind::WorldId => {
                let app_id = self.world_id.app_id.as_deref().unwrap_or_default();
                let action_id = self.world_id.action_id.as_deref().unwrap_or_default();
                self.verifier
                    .verify_world_id(account, app_id, action_id)
                    .await
            }
            VerifierKind::ZkNfc => self.verifier.verify_zk_nfc(account).await,
        };
        result.map_err(|error| {
            warn!(action = kind.action_name(), %error, "verification failed");
            error.to_string()
        })
    }

    async fn run_plan(&self, prepared: PreparedPlan) -> ActionOutcome {
        let PreparedPlan { plan, tags } = prepared;
        let staged = match tags {
            Some(tags) => {
                let staged = self.tags().stage_pending(&tags);
                staged.unwrap_or_else(|error| {
                    warn!(%error, "failed to stage covenant tags");
                    None
                })
            }
            None => None,
        };

        let report = self.orchestrator.run(plan).await;
        let covenant_id = report
            .receipts
            .iter()
            .find_map(|receipt| self.shared.gateway.created_covenant_id(receipt));
        if let Some(pending) = staged {
            self.settle_staged_tags(pending, covenant_id);
        }

        let kind = match &report.outcome {
            Ok(_) => BannerKind::Success,
            Err(failure) if failure.message == USER_REJECTED_MESSAGE => BannerKind::Notice,
            Err(_) => BannerKind::Error,
        };
        self.banner().show(kind, report.message(), Instant::now());
        info!(
            action = %report.action,
            ok = report.succeeded(),
            transactions = report.receipts.len(),
            "action finished"
        );
        ActionOutcome {
            ok: report.succeeded(),
            message: report.message().to_string(),
            transactions: report
                .receipts
                .iter()
                .map(|receipt| receipt.transaction_hash)
                .collect(),
            action: Some(report.action),
            progress: Some(report.progress),
            covenant_id,
        }
    }

    fn settle_staged_tags(&self, pending: TagKey, covenant_id: Option<u64>) {
        let mut store = self.tags();
        let settled = match covenant_id {
            Some(id) => store.promote(pending, id).map(|_| ()),
            None => store.remove(pending).map(|_| ()),
        };
        if let Err(error) = settled {
            warn!(%error, ?covenant_id, "failed to settle staged covenant tags");
        }
    }

    fn reject(&self, action: Option<String>, message: String) -> ActionOutcome {
        self.banner()
            .show(BannerKind::Error, message.clone(), Instant::now());
        ActionOutcome {
            ok: false,
            action,
            message,
            progress: None,
            transactions: Vec::new(),
            covenant_id: None,
        }
    }

    fn banner(&self) -> MutexGuard<'_, BannerSlot> {
        self.banner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn tags(&self) -> MutexGuard<'_, Box<dyn TagStore>> {
        self.tags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicBool;

    use alloy_sol_types::SolEvent;
    use fairsoil_gateway::abi::ICovenant;
    use fairsoil_gateway::{ChainFuture, LogFilter, RawLog, TxReceipt, TxRequest};
    use fairsoil_trail::AuditFilter;
    use fairsoil_types::{Bytes, U256};

    use super::*;
    use crate::config::parse_dashboard_config_from;

    const COVENANT: u8 = 0xc0;

    /// Answers every read with a revert and confirms every write with a
    /// receipt carrying a `CovenantCreated` log for `created_id`.
    struct FakeChain {
        head: u64,
        created_id: u64,
        trail_logs: Vec<RawLog>,
        fail_logs: AtomicBool,
        sent: StdMutex<Vec<TxRequest>>,
    }

    impl FakeChain {
        fn new(created_id: u64) -> Self {
            Self {
                head: 10,
                created_id,
                trail_logs: Vec::new(),
                fail_logs: AtomicBool::new(false),
                sent: StdMutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<&'static str> {
            self.sent
                .lock()
                .expect("sent lock")
                .iter()
                .map(|request| request.function)
                .collect()
        }
    }

    fn created_log(id: u64, block_number: u64) -> RawLog {
        let event = ICovenant::CovenantCreated {
            covenantId: U256::from(id),
            creator: Address::with_last_byte(0x01),
            worker: Address::with_last_byte(0x02),
            tokenBReward: U256::from(100_u64),
            integrityPoints: U256::from(10_u64),
        };
        let data = event.encode_log_data();
        RawLog {
            address: Address::with_last_byte(COVENANT),
            topics: data.topics().to_vec(),
            data: data.data.clone(),
            block_number,
            transaction_hash: Some(B256::with_last_byte(id as u8)),
            log_index: Some(0),
        }
    }

    impl ChainClient for FakeChain {
        fn chain_id(&self) -> ChainFuture<'_, u64> {
            Box::pin(async { Ok(31_337) })
        }
        fn block_number(&self) -> ChainFuture<'_, u64> {
            Box::pin(async move { Ok(self.head) })
        }
        fn block_timestamp(&self, block_number: u64) -> ChainFuture<'_, u64> {
            Box::pin(async move { Ok(1_700_000_000 + block_number) })
        }
        fn get_logs(&self, filter: LogFilter) -> ChainFuture<'_, Vec<RawLog>> {
            Box::pin(async move {
                if self.fail_logs.load(Ordering::SeqCst) {
                    return Err(GatewayError::Transport {
                        method: "eth_getLogs".to_string(),
                        message: "connection reset".to_string(),
                    });
                }
                Ok(self
                    .trail_logs
                    .iter()
                    .filter(|log| (filter.from_block..=filter.to_block).contains(&log.block_number))
                    .cloned()
                    .collect())
            })
        }
        fn call(&self, _to: Address, _data: Bytes) -> ChainFuture<'_, Bytes> {
            Box::pin(async {
                Err(GatewayError::Rpc {
                    method: "eth_call".to_string(),
                    code: 3,
                    message: "execution reverted".to_string(),
                })
            })
        }
        fn send_transaction(&self, request: TxRequest) -> ChainFuture<'_, B256> {
            Box::pin(async move {
                let mut sent = self.sent.lock().expect("sent lock");
                sent.push(request);
                Ok(B256::with_last_byte(sent.len() as u8))
            })
        }
        fn transaction_receipt(&self, hash: B256) -> ChainFuture<'_, Option<TxReceipt>> {
            Box::pin(async move {
                Ok(Some(TxReceipt {
                    transaction_hash: hash,
                    block_number: self.head,
                    success: true,
                    logs: vec![created_log(self.created_id, self.head)],
                }))
            })
        }
    }

    fn config(with_account: bool) -> DashboardConfig {
        let mut env = vec![
            ("FAIRSOIL_TOKENA_ADDRESS", format!("{}", Address::with_last_byte(0xa1))),
            ("FAIRSOIL_TOKENB_ADDRESS", format!("{}", Address::with_last_byte(0xb1))),
            ("FAIRSOIL_TREASURY_ADDRESS", format!("{}", Address::with_last_byte(0x7e))),
            ("FAIRSOIL_COVENANT_ADDRESS", format!("{}", Address::with_last_byte(COVENANT))),
            ("FAIRSOIL_REFRESH_GRACE_MS", "0".to_string()),
        ];
        if with_account {
            env.push(("FAIRSOIL_ACCOUNT", format!("{}", Address::with_last_byte(0x01))));
        }
        let lookup = move |name: &str| {
            env.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone())
        };
        parse_dashboard_config_from(Vec::<String>::new(), &lookup).expect("test config")
    }

    fn runtime(chain: Arc<FakeChain>, with_account: bool) -> DashboardRuntime {
        DashboardRuntime::with_chain(
            &config(with_account),
            chain,
            Box::new(InMemoryTagStore::default()),
        )
        .expect("runtime")
    }

    fn create_covenant(tags: &str) -> UserIntent {
        UserIntent::CreateCovenant {
            preset: Default::default(),
            worker: format!("{}", Address::with_last_byte(0x02)),
            reward: "100".to_string(),
            integrity_points: "10".to_string(),
            payment_token: None,
            tags: tags.to_string(),
            template_id: None,
        }
    }

    #[tokio::test]
    async fn created_covenant_receives_staged_tags() {
        let chain = Arc::new(FakeChain::new(7));
        let runtime = runtime(Arc::clone(&chain), true);

        let outcome = runtime.submit(create_covenant("garden, weekly")).await;

        assert!(outcome.ok, "{}", outcome.message);
        assert_eq!(outcome.covenant_id, Some(7));
        assert_eq!(outcome.progress, Some(PlanProgress::Complete));
        assert_eq!(chain.sent(), vec!["approve", "createCovenant"]);
        let stored = runtime.tags().list();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.get(&TagKey::Covenant(7)).map(String::as_str), Some("garden, weekly"));
        let banner = runtime.status(Instant::now()).banner.expect("banner");
        assert_eq!(banner.kind, BannerKind::Success);
        assert_eq!(runtime.status(Instant::now()).tx, TxSnapshot::default());
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_chain() {
        let chain = Arc::new(FakeChain::new(1));
        let runtime = runtime(Arc::clone(&chain), true);

        let outcome = runtime
            .submit(UserIntent::ClaimUnclaimed {
                from_day: "9".to_string(),
                to_day: "3".to_string(),
            })
            .await;

        assert!(!outcome.ok);
        assert_eq!(outcome.message, "Invalid day range for saved bonuses.");
        assert!(chain.sent().is_empty());
        let banner = runtime.status(Instant::now()).banner.expect("banner");
        assert_eq!(banner.kind, BannerKind::Error);
        runtime.dismiss_banner();
        assert_eq!(runtime.status(Instant::now()).banner, None);
    }

    #[tokio::test]
    async fn actions_need_a_configured_account() {
        let chain = Arc::new(FakeChain::new(1));
        let runtime = runtime(Arc::clone(&chain), false);
        let outcome = runtime.submit(UserIntent::ClaimUbi).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.message, ValidationError::MissingAccount.to_string());
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn trail_search_matches_covenant_tags() {
        let mut chain = FakeChain::new(1);
        chain.trail_logs = vec![created_log(3, 4), created_log(4, 6)];
        let runtime = runtime(Arc::new(chain), true);

        assert_eq!(runtime.reload_trail().await.expect("backfill"), 2);
        runtime.set_tags(3, " orchard ").expect("tags");

        let all = runtime.trail(&TrailQuery::default(), 1_700_000_100);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].item.covenant_id, Some(4));
        assert_eq!(all[0].category, AuditCategory::Covenant);
        assert_eq!(all[0].relative_time, "1m ago");

        let tagged = runtime.trail(&TrailQuery::new(AuditFilter::All, "ORCHARD"), 1_700_000_100);
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].tags.as_deref(), Some("orchard"));
        let csv = runtime.trail_csv(&TrailQuery::new(AuditFilter::All, "orchard"));
        assert_eq!(csv.lines().count(), 2);

        assert_eq!(runtime.set_tags(3, "  ").expect("clear"), None);
        assert!(runtime
            .trail(&TrailQuery::new(AuditFilter::All, "orchard"), 1_700_000_100)
            .is_empty());
    }

    #[tokio::test]
    async fn live_polling_resumes_after_backfill_head() {
        let mut chain = FakeChain::new(1);
        chain.trail_logs = vec![created_log(3, 4)];
        let runtime = runtime(Arc::new(chain), true);

        runtime.reload_trail().await.expect("backfill");
        assert_eq!(runtime.poll_trail().await.expect("poll"), 0);
        assert_eq!(runtime.status(Instant::now()).trail_len, 1);
    }

    #[tokio::test]
    async fn failed_backfill_releases_the_trail_store() {
        let mut chain = FakeChain::new(1);
        chain.trail_logs = vec![created_log(3, 4)];
        let chain = Arc::new(chain);
        let runtime = runtime(Arc::clone(&chain), true);
        runtime.reload_trail().await.expect("first backfill");

        chain.fail_logs.store(true, Ordering::SeqCst);
        assert!(runtime.reload_trail().await.is_err());
        assert!(!runtime.shared.trail().backfill_in_flight());
        assert_eq!(runtime.status(Instant::now()).trail_len, 1);

        chain.fail_logs.store(false, Ordering::SeqCst);
        assert_eq!(runtime.reload_trail().await.expect("retry"), 1);
        assert!(!runtime.shared.trail().backfill_in_flight());
    }

    #[tokio::test]
    async fn unreadable_contracts_leave_snapshot_fields_empty() {
        let runtime = runtime(Arc::new(FakeChain::new(1)), true);
        runtime.refresh_snapshot().await.expect("head is readable");
        let snapshot = runtime.snapshot();
        assert_eq!(snapshot.block_number, Some(10));
        assert_eq!(snapshot.chain_id, Some(31_337));
        assert_eq!(snapshot.current_day, Some(fairsoil_types::day_index(1_700_000_010)));
        assert_eq!(snapshot.token_a_balance, None);
        assert!(snapshot.unclaimed.is_empty());
        assert_eq!(snapshot.generation, 1);
        assert_eq!(runtime.status(Instant::now()).display["token_a_balance"], "--");
    }

    #[tokio::test]
    async fn appi_stats_require_an_oracle() {
        let runtime = runtime(Arc::new(FakeChain::new(1)), true);
        let error = runtime.appi_stats("", "1,2").await.expect_err("no oracle");
        assert_eq!(error, RuntimeError::Validation(ValidationError::OracleNotSet));
    }
}
