use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use fairsoil_gateway::{ChainClient, GatewayError, TxReceipt, TxRequest};
use fairsoil_types::{Address, B256};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::plan::{ActionPlan, PlanProgress};
use crate::status::{ActiveAction, TxTracker};
use crate::{TxError, classify_tx_error};

pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RECEIPT_POLL_MS: u64 = 1_000;
pub const DEFAULT_REFRESH_GRACE_MS: u64 = 500;

pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>>;

/// Re-reads on-chain state after an action so the view reflects it.
pub trait PostActionRefresh: Send + Sync {
    fn refresh_snapshot(&self) -> RefreshFuture<'_>;
    fn reload_trail(&self) -> RefreshFuture<'_>;
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub account: Option<Address>,
    pub confirmation_timeout: Duration,
    pub receipt_poll_interval: Duration,
    pub refresh_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            account: None,
            confirmation_timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            receipt_poll_interval: Duration::from_millis(DEFAULT_RECEIPT_POLL_MS),
            refresh_grace: Duration::from_millis(DEFAULT_REFRESH_GRACE_MS),
        }
    }
}

/// What happened to one user action. Failures are already classified into
/// the message the user sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub action: String,
    pub progress: PlanProgress,
    pub receipts: Vec<TxReceipt>,
    pub outcome: Result<String, ActionFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    pub error: TxError,
    pub message: String,
}

impl ActionReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn message(&self) -> &str {
        match &self.outcome {
            Ok(message) => message,
            Err(failure) => &failure.message,
        }
    }
}

pub struct TxOrchestrator {
    chain: Arc<dyn ChainClient>,
    tracker: TxTracker,
    config: OrchestratorConfig,
    refresh: Option<Arc<dyn PostActionRefresh>>,
}

impl TxOrchestrator {
    pub fn new(chain: Arc<dyn ChainClient>, config: OrchestratorConfig) -> Self {
        Self {
            chain,
            tracker: TxTracker::new(),
            config,
            refresh: None,
        }
    }

    pub fn with_refresh(mut self, refresh: Arc<dyn PostActionRefresh>) -> Self {
        self.refresh = Some(refresh);
        self
    }

    pub fn tracker(&self) -> &TxTracker {
        &self.tracker
    }

    pub fn account(&self) -> Option<Address> {
        self.config.account
    }

    /// Runs every step in order: submit, then wait for a successful receipt.
    /// The tracker is back to idle when this returns, whatever the outcome.
    pub async fn run(&self, plan: ActionPlan) -> ActionReport {
        let action = plan.name.clone();
        let active = match self.tracker.begin(&action) {
            Ok(active) => active,
            Err(error) => {
                return ActionReport {
                    action,
                    progress: PlanProgress::NotStarted,
                    receipts: Vec::new(),
                    outcome: Err(failure(error)),
                };
            }
        };

        let total = plan.steps.len();
        let mut receipts = Vec::with_capacity(total);
        let mut progress = PlanProgress::NotStarted;
        for (index, step) in plan.steps.iter().enumerate() {
            let Some(request) = step.resolve(&receipts) else {
                debug!(action, step = step.label(), "plan step skipped");
                progress = PlanProgress::StepDone(index);
                continue;
            };
            match self.execute_step(&active, index, total, request).await {
                Ok(receipt) => {
                    receipts.push(receipt);
                    progress = PlanProgress::StepDone(index);
                }
                Err(error) => {
                    let completed = progress.landed_steps(total);
                    warn!(action, step = index, completed, %error, "action failed");
                    if completed > 0 {
                        self.refresh_after_action(&action).await;
                    }
                    return ActionReport {
                        action,
                        progress: PlanProgress::PartialFailure {
                            at_step: index,
                            completed,
                        },
                        receipts,
                        outcome: Err(failure(error)),
                    };
                }
            }
        }

        info!(action, transactions = receipts.len(), "action confirmed");
        self.refresh_after_action(&action).await;
        drop(active);
        ActionReport {
            action,
            progress: PlanProgress::Complete,
            receipts,
            outcome: Ok(plan.success_message),
        }
    }

    async fn execute_step(
        &self,
        active: &ActiveAction,
        index: usize,
        total: usize,
        mut request: TxRequest,
    ) -> Result<TxReceipt, TxError> {
        active.signing(index, total);
        if request.from.is_none() {
            request.from = self.config.account;
        }
        let function = request.function;
        let hash = self
            .chain
            .send_transaction(request)
            .await
            .map_err(TxError::Submit)?;
        debug!(function, %hash, "transaction submitted");
        active.confirming();
        let receipt = self.wait_for_receipt(hash).await?;
        if !receipt.success {
            return Err(TxError::Reverted { hash });
        }
        Ok(receipt)
    }

    /// Polls for the receipt until the confirmation timeout. Lookup errors are
    /// retried on the next poll; the transaction may still land.
    pub async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceipt, TxError> {
        let deadline = Instant::now() + self.config.confirmation_timeout;
        let mut last_error: Option<GatewayError> = None;
        loop {
            match self.chain.transaction_receipt(hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(error) => {
                    warn!(%hash, %error, "receipt lookup failed");
                    last_error = Some(error);
                }
            }
            if Instant::now() + self.config.receipt_poll_interval > deadline {
                return Err(TxError::ConfirmationTimeout {
                    hash,
                    waited_secs: self.config.confirmation_timeout.as_secs(),
                    last_error: last_error.map(|error| error.to_string()),
                });
            }
            sleep(self.config.receipt_poll_interval).await;
        }
    }

    async fn refresh_after_action(&self, action: &str) {
        let Some(refresh) = self.refresh.as_ref() else {
            return;
        };
        if let Err(error) = refresh.refresh_snapshot().await {
            warn!(action, %error, "snapshot refresh after action failed");
        }
        if !self.config.refresh_grace.is_zero() {
            sleep(self.config.refresh_grace).await;
        }
        if let Err(error) = refresh.reload_trail().await {
            warn!(action, %error, "trail reload after action failed");
        }
    }
}

fn failure(error: TxError) -> ActionFailure {
    let message = classify_tx_error(&error.to_string());
    ActionFailure { error, message }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use fairsoil_gateway::{ChainFuture, LogFilter, RawLog};
    use fairsoil_types::Bytes;

    use super::*;
    use crate::TxStatus;

    #[derive(Default)]
    struct ScriptedChain {
        send_results: Mutex<VecDeque<Result<B256, GatewayError>>>,
        receipts: Mutex<VecDeque<Result<Option<TxReceipt>, GatewayError>>>,
        sent: Mutex<Vec<TxRequest>>,
        observed_status: Mutex<Vec<TxStatus>>,
        tracker: Mutex<Option<TxTracker>>,
    }

    impl ScriptedChain {
        fn with_sends(sends: Vec<Result<B256, GatewayError>>) -> Self {
            Self {
                send_results: Mutex::new(sends.into()),
                ..Self::default()
            }
        }

        fn queue_receipt(&self, receipt: Result<Option<TxReceipt>, GatewayError>) {
            self.receipts.lock().expect("receipts lock").push_back(receipt);
        }

        fn observe(&self, tracker: &TxTracker) {
            *self.tracker.lock().expect("tracker lock") = Some(tracker.clone());
        }
    }

    impl ChainClient for ScriptedChain {
        fn chain_id(&self) -> ChainFuture<'_, u64> {
            Box::pin(async { Ok(31_337) })
        }

        fn block_number(&self) -> ChainFuture<'_, u64> {
            Box::pin(async { Ok(1) })
        }

        fn block_timestamp(&self, _block_number: u64) -> ChainFuture<'_, u64> {
            Box::pin(async { Ok(0) })
        }

        fn get_logs(&self, _filter: LogFilter) -> ChainFuture<'_, Vec<RawLog>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn call(&self, _to: Address, _data: Bytes) -> ChainFuture<'_, Bytes> {
            Box::pin(async { Ok(Bytes::new()) })
        }

        fn send_transaction(&self, request: TxRequest) -> ChainFuture<'_, B256> {
            Box::pin(async move {
                if let Some(tracker) = self.tracker.lock().expect("tracker lock").as_ref() {
                    self.observed_status
                        .lock()
                        .expect("status lock")
                        .push(tracker.snapshot().status);
                }
                self.sent.lock().expect("sent lock").push(request);
                self.send_results
                    .lock()
                    .expect("send lock")
                    .pop_front()
                    .unwrap_or(Ok(B256::repeat_byte(0x01)))
            })
        }

        fn transaction_receipt(&self, hash: B256) -> ChainFuture<'_, Option<TxReceipt>> {
            Box::pin(async move {
                self.receipts
                    .lock()
                    .expect("receipts lock")
                    .pop_front()
                    .unwrap_or_else(|| Ok(Some(mined(hash, true))))
            })
        }
    }

    #[derive(Default)]
    struct CountingRefresh {
        snapshots: AtomicUsize,
        trails: AtomicUsize,
    }

    impl PostActionRefresh for CountingRefresh {
        fn refresh_snapshot(&self) -> RefreshFuture<'_> {
            Box::pin(async move {
                self.snapshots.fetch_add(1, Ordering::SeqCst);
                Err("node offline".to_string())
            })
        }

        fn reload_trail(&self) -> RefreshFuture<'_> {
            Box::pin(async move {
                self.trails.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    fn mined(hash: B256, success: bool) -> TxReceipt {
        TxReceipt {
            transaction_hash: hash,
            block_number: 7,
            success,
            logs: Vec::new(),
        }
    }

    fn request(function: &'static str) -> TxRequest {
        TxRequest::new(function, Address::repeat_byte(0x0c), Vec::<u8>::new())
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            account: Some(Address::repeat_byte(0xaa)),
            confirmation_timeout: Duration::from_millis(60),
            receipt_poll_interval: Duration::from_millis(5),
            refresh_grace: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn failed_submission_returns_to_idle_with_message() {
        let chain = Arc::new(ScriptedChain::with_sends(vec![Err(GatewayError::Rpc {
            method: "eth_sendTransaction".to_string(),
            code: -32000,
            message: "insufficient funds".to_string(),
        })]));
        let orchestrator = TxOrchestrator::new(chain.clone(), fast_config());
        chain.observe(orchestrator.tracker());

        let report = orchestrator.run(ActionPlan::single("claimUBI", request("claimUBI"))).await;

        assert_eq!(
            *chain.observed_status.lock().expect("status lock"),
            vec![TxStatus::Signing]
        );
        let snapshot = orchestrator.tracker().snapshot();
        assert_eq!(snapshot.status, TxStatus::Idle);
        assert_eq!(snapshot.action, None);
        assert!(!report.succeeded());
        assert!(report.message().starts_with("Transaction failed: "));
        assert!(report.message().contains("insufficient funds"));
        assert_eq!(
            report.progress,
            PlanProgress::PartialFailure {
                at_step: 0,
                completed: 0
            }
        );
    }

    #[tokio::test]
    async fn user_rejection_is_reported_plainly() {
        let chain = Arc::new(ScriptedChain::with_sends(vec![Err(GatewayError::Rpc {
            method: "eth_sendTransaction".to_string(),
            code: 4001,
            message: "User rejected the request.".to_string(),
        })]));
        let orchestrator = TxOrchestrator::new(chain, fast_config());
        let report = orchestrator.run(ActionPlan::single("claimUBI", request("claimUBI"))).await;
        assert_eq!(report.message(), "Transaction rejected by user.");
    }

    #[tokio::test]
    async fn success_fills_sender_and_refreshes_despite_refresh_errors() {
        let chain = Arc::new(ScriptedChain::default());
        let refresh = Arc::new(CountingRefresh::default());
        let orchestrator =
            TxOrchestrator::new(chain.clone(), fast_config()).with_refresh(refresh.clone());

        let plan = ActionPlan::single("accrueUBI", request("accrueUBI"))
            .with_success_message("Accrued bonus.");
        let report = orchestrator.run(plan).await;

        assert!(report.succeeded());
        assert_eq!(report.message(), "Accrued bonus.");
        assert_eq!(report.progress, PlanProgress::Complete);
        assert_eq!(refresh.snapshots.load(Ordering::SeqCst), 1);
        assert_eq!(refresh.trails.load(Ordering::SeqCst), 1);
        let sent = chain.sent.lock().expect("sent lock");
        assert_eq!(sent[0].from, Some(Address::repeat_byte(0xaa)));
        assert!(!orchestrator.tracker().snapshot().is_busy());
    }

    #[tokio::test]
    async fn later_step_failure_reports_landed_steps() {
        let chain = Arc::new(ScriptedChain::default());
        chain.queue_receipt(Ok(Some(mined(B256::repeat_byte(0x01), true))));
        chain.queue_receipt(Ok(Some(mined(B256::repeat_byte(0x01), false))));
        let orchestrator = TxOrchestrator::new(chain, fast_config());

        let plan = ActionPlan::new("createCovenant")
            .then(request("approve"))
            .then(request("createCovenant"));
        let report = orchestrator.run(plan).await;

        assert_eq!(
            report.progress,
            PlanProgress::PartialFailure {
                at_step: 1,
                completed: 1
            }
        );
        assert_eq!(report.receipts.len(), 1);
        assert!(matches!(
            report.outcome,
            Err(ActionFailure {
                error: TxError::Reverted { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn derived_steps_see_earlier_receipts_and_may_skip() {
        let chain = Arc::new(ScriptedChain::default());
        let orchestrator = TxOrchestrator::new(chain.clone(), fast_config());
        let plan = ActionPlan::new("createCovenant")
            .then(request("createCovenant"))
            .then_derived("recordUse", |receipts| {
                (receipts.len() == 1).then(|| TxRequest::new("recordUse", Address::ZERO, vec![1_u8]))
            })
            .then_derived("never", |_| None);
        let report = orchestrator.run(plan).await;

        assert!(report.succeeded());
        let sent = chain.sent.lock().expect("sent lock");
        let functions: Vec<&str> = sent.iter().map(|request| request.function).collect();
        assert_eq!(functions, vec!["createCovenant", "recordUse"]);
    }

    #[tokio::test]
    async fn unmined_transaction_times_out() {
        let chain = Arc::new(ScriptedChain::default());
        for _ in 0..64 {
            chain.queue_receipt(Ok(None));
        }
        let orchestrator = TxOrchestrator::new(chain, fast_config());
        let report = orchestrator.run(ActionPlan::single("payTax", request("payTax"))).await;
        assert!(matches!(
            report.outcome,
            Err(ActionFailure {
                error: TxError::ConfirmationTimeout { .. },
                ..
            })
        ));
        assert!(report.message().starts_with("Transaction failed: "));
        assert!(!orchestrator.tracker().snapshot().is_busy());
    }
}
