use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use alloy_sol_types::SolEvent;
use fairsoil_dashboard::{
    BannerKind, DashboardConfig, DashboardRuntime, UserIntent, parse_dashboard_config_from,
};
use fairsoil_gateway::abi::ICovenant;
use fairsoil_gateway::{
    ChainClient, ChainFuture, GatewayError, LogFilter, RawLog, TxReceipt, TxRequest,
};
use fairsoil_orchestrator::PlanProgress;
use fairsoil_trail::{InMemoryTagStore, JsonFileTagStore, TagKey, TagStore};
use fairsoil_types::{Address, B256, Bytes, U256};
use serde::Deserialize;

const COVENANT: Address = Address::new([0xc0; 20]);

#[derive(Debug, Deserialize)]
struct SessionFixture {
    created_covenant_id: u64,
    cases: Vec<ActionCase>,
}

#[derive(Debug, Deserialize)]
struct ActionCase {
    name: String,
    intent: serde_json::Value,
    ok: bool,
    message: String,
    sent: Vec<String>,
    #[serde(default)]
    covenant_id: Option<u64>,
}

fn load_fixture(name: &str) -> SessionFixture {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("actions")
        .join(name);
    let raw = fs::read_to_string(&path).unwrap_or_else(|error| {
        panic!("failed to read action fixture {}: {error}", path.display());
    });
    serde_json::from_str(&raw).unwrap_or_else(|error| {
        panic!("failed to decode action fixture {}: {error}", path.display());
    })
}

/// Node that accepts every write and mines it in the next receipt lookup.
/// Reads revert, as they would against an empty dev chain.
struct DevChain {
    created_covenant_id: u64,
    revert_writes: AtomicBool,
    sent: Mutex<Vec<TxRequest>>,
}

impl DevChain {
    fn new(created_covenant_id: u64) -> Self {
        Self {
            created_covenant_id,
            revert_writes: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock().expect("sent lock"))
            .into_iter()
            .map(|request| request.function.to_string())
            .collect()
    }

    fn created_log(&self) -> RawLog {
        let event = ICovenant::CovenantCreated {
            covenantId: U256::from(self.created_covenant_id),
            creator: Address::with_last_byte(0x01),
            worker: Address::with_last_byte(0x02),
            tokenBReward: U256::from(50_u64),
            integrityPoints: U256::from(10_u64),
        };
        let data = event.encode_log_data();
        RawLog {
            address: COVENANT,
            topics: data.topics().to_vec(),
            data: data.data.clone(),
            block_number: 20,
            transaction_hash: None,
            log_index: Some(0),
        }
    }
}

impl ChainClient for DevChain {
    fn chain_id(&self) -> ChainFuture<'_, u64> {
        Box::pin(async { Ok(31_337) })
    }

    fn block_number(&self) -> ChainFuture<'_, u64> {
        Box::pin(async { Ok(20) })
    }

    fn block_timestamp(&self, block_number: u64) -> ChainFuture<'_, u64> {
        Box::pin(async move { Ok(1_700_000_000 + block_number * 12) })
    }

    fn get_logs(&self, _filter: LogFilter) -> ChainFuture<'_, Vec<RawLog>> {
        Box::pin(async { Ok(Vec::new()) })
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
            // the second write of a plan is the agreement creation
            let logs = if hash == B256::with_last_byte(2) {
                vec![self.created_log()]
            } else {
                Vec::new()
            };
            Ok(Some(TxReceipt {
                transaction_hash: hash,
                block_number: 20,
                success: !self.revert_writes.load(Ordering::SeqCst),
                logs,
            }))
        })
    }
}

fn dev_config() -> DashboardConfig {
    let env = [
        ("FAIRSOIL_ACCOUNT", "0x0000000000000000000000000000000000000001"),
        ("FAIRSOIL_TOKENA_ADDRESS", "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"),
        ("FAIRSOIL_TOKENB_ADDRESS", "0xb1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1"),
        ("FAIRSOIL_TREASURY_ADDRESS", "0x7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e"),
        ("FAIRSOIL_COVENANT_ADDRESS", "0xc0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0"),
        ("FAIRSOIL_REFRESH_GRACE_MS", "0"),
    ];
    let lookup = |name: &str| {
        env.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    };
    parse_dashboard_config_from(Vec::<String>::new(), &lookup).expect("dev config")
}

#[tokio::test]
async fn session_of_user_actions_matches_fixture() {
    let fixture = load_fixture("session.json");
    let chain = Arc::new(DevChain::new(fixture.created_covenant_id));
    let runtime = DashboardRuntime::with_chain(
        &dev_config(),
        Arc::clone(&chain) as Arc<dyn ChainClient>,
        Box::new(InMemoryTagStore::default()),
    )
    .expect("runtime");

    for case in fixture.cases {
        let intent: UserIntent = serde_json::from_value(case.intent.clone())
            .unwrap_or_else(|error| panic!("{}: bad intent: {error}", case.name));
        let outcome = runtime.submit(intent).await;

        assert_eq!(outcome.ok, case.ok, "{}: {}", case.name, outcome.message);
        assert_eq!(outcome.message, case.message, "{}", case.name);
        assert_eq!(chain.take_sent(), case.sent, "{}", case.name);
        assert_eq!(outcome.transactions.len(), case.sent.len(), "{}", case.name);
        if case.covenant_id.is_some() {
            assert_eq!(outcome.covenant_id, case.covenant_id, "{}", case.name);
        }

        let banner = runtime
            .status(Instant::now())
            .banner
            .unwrap_or_else(|| panic!("{}: no banner", case.name));
        let expected_kind = if case.ok {
            BannerKind::Success
        } else {
            BannerKind::Error
        };
        assert_eq!(banner.kind, expected_kind, "{}", case.name);
        assert_eq!(banner.message, case.message, "{}", case.name);
    }
}

#[tokio::test]
async fn staged_tags_are_persisted_under_the_created_covenant() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("tags.json");
    let chain = Arc::new(DevChain::new(4));
    let runtime = DashboardRuntime::with_chain(
        &dev_config(),
        Arc::clone(&chain) as Arc<dyn ChainClient>,
        Box::new(JsonFileTagStore::open(&path).expect("tag store")),
    )
    .expect("runtime");

    let outcome = runtime
        .submit(UserIntent::CreateCovenant {
            preset: Default::default(),
            worker: "0x0000000000000000000000000000000000000002".to_string(),
            reward: "12.5".to_string(),
            integrity_points: "3".to_string(),
            payment_token: None,
            tags: "compost".to_string(),
            template_id: None,
        })
        .await;
    assert!(outcome.ok, "{}", outcome.message);
    assert_eq!(outcome.covenant_id, Some(4));

    let reopened = JsonFileTagStore::open(&path).expect("reopen");
    let stored = reopened.list();
    assert_eq!(stored.len(), 1, "pending entry must be gone: {stored:?}");
    assert_eq!(reopened.get(TagKey::Covenant(4)).as_deref(), Some("compost"));
}

#[tokio::test]
async fn reverted_write_is_reported_as_failure() {
    let chain = Arc::new(DevChain::new(1));
    chain.revert_writes.store(true, Ordering::SeqCst);
    let runtime = DashboardRuntime::with_chain(
        &dev_config(),
        Arc::clone(&chain) as Arc<dyn ChainClient>,
        Box::new(InMemoryTagStore::default()),
    )
    .expect("runtime");

    let outcome = runtime
        .submit(UserIntent::ApproveWork { covenant_id: 3 })
        .await;

    assert!(!outcome.ok);
    assert!(outcome.message.starts_with("Transaction failed: "), "{}", outcome.message);
    assert!(outcome.message.ends_with("reverted"), "{}", outcome.message);
    assert_eq!(
        outcome.progress,
        Some(PlanProgress::PartialFailure {
            at_step: 0,
            completed: 0
        })
    );
    assert!(outcome.transactions.is_empty());
    assert_eq!(chain.take_sent(), vec!["approveWork".to_string()]);
}
