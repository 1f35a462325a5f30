use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fairsoil_gateway::{
    ContractAddresses, DEFAULT_RPC_MAX_RETRIES, DEFAULT_RPC_RETRY_BACKOFF_MS,
    DEFAULT_RPC_TIMEOUT_SECS, RpcRetryConfig,
};
use fairsoil_orchestrator::{
    DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_RECEIPT_POLL_MS, DEFAULT_REFRESH_GRACE_MS,
    OrchestratorConfig,
};
use fairsoil_trail::{DEFAULT_MAX_LOG_SPAN, DEFAULT_TRAIL_CAPACITY};
use fairsoil_types::Address;

use crate::logging::LogFormat;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";
pub const DEFAULT_POLL_MS: u64 = 4_000;
pub const DEFAULT_SNAPSHOT_REFRESH_MS: u64 = 15_000;
pub const DEFAULT_UNCLAIMED_LOOKBACK_DAYS: u64 = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldIdConfig {
    pub app_id: Option<String>,
    pub action_id: Option<String>,
    pub verify_url: Option<String>,
    pub mock: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZkNfcConfig {
    pub verifier_url: Option<String>,
    pub mock: bool,
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub rpc_url: String,
    pub bind: String,
    pub account: Option<Address>,
    pub addresses: ContractAddresses,
    pub world_id: WorldIdConfig,
    pub zk_nfc: ZkNfcConfig,
    pub external_adjudication_url: Option<String>,
    pub poll_ms: u64,
    pub snapshot_refresh_ms: u64,
    pub trail_from_block: u64,
    pub trail_capacity: usize,
    pub max_log_span: u64,
    pub unclaimed_lookback_days: u64,
    pub rpc_timeout_secs: u64,
    pub rpc_max_retries: u32,
    pub rpc_retry_backoff_ms: u64,
    pub confirmation_timeout_secs: u64,
    pub refresh_grace_ms: u64,
    pub tags_path: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl DashboardConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn retry(&self) -> RpcRetryConfig {
        RpcRetryConfig {
            max_retries: self.rpc_max_retries,
            base_backoff: Duration::from_millis(self.rpc_retry_backoff_ms),
        }
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            account: self.account,
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
            receipt_poll_interval: Duration::from_millis(DEFAULT_RECEIPT_POLL_MS),
            refresh_grace: Duration::from_millis(self.refresh_grace_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn snapshot_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_refresh_ms)
    }
}

/// One setting reachable as `--flag <value>` or through an environment variable.
struct Setting {
    flag: &'static str,
    env: &'static str,
}

const RPC_URL: Setting = Setting { flag: "--rpc-url", env: "FAIRSOIL_RPC_URL" };
const BIND: Setting = Setting { flag: "--bind", env: "FAIRSOIL_BIND" };
const ACCOUNT: Setting = Setting { flag: "--account", env: "FAIRSOIL_ACCOUNT" };
const TOKEN_A: Setting = Setting { flag: "--token-a", env: "FAIRSOIL_TOKENA_ADDRESS" };
const TOKEN_B: Setting = Setting { flag: "--token-b", env: "FAIRSOIL_TOKENB_ADDRESS" };
const TREASURY: Setting = Setting { flag: "--treasury", env: "FAIRSOIL_TREASURY_ADDRESS" };
const COVENANT: Setting = Setting { flag: "--covenant", env: "FAIRSOIL_COVENANT_ADDRESS" };
const RESOURCE_REGISTRY: Setting = Setting {
    flag: "--resource-registry",
    env: "FAIRSOIL_RESOURCE_REGISTRY_ADDRESS",
};
const COVENANT_LIBRARY: Setting = Setting {
    flag: "--covenant-library",
    env: "FAIRSOIL_COVENANT_LIBRARY_ADDRESS",
};
const WORLDID_APP_ID: Setting = Setting { flag: "--worldid-app-id", env: "FAIRSOIL_WORLDID_APP_ID" };
const WORLDID_ACTION_ID: Setting = Setting {
    flag: "--worldid-action-id",
    env: "FAIRSOIL_WORLDID_ACTION_ID",
};
const WORLDID_VERIFY_URL: Setting = Setting {
    flag: "--worldid-verify-url",
    env: "FAIRSOIL_WORLDID_VERIFY_URL",
};
const WORLDID_MOCK: Setting = Setting { flag: "--worldid-mock", env: "FAIRSOIL_WORLDID_MOCK" };
const ZKNFC_URL: Setting = Setting {
    flag: "--zknfc-verifier-url",
    env: "FAIRSOIL_ZKNFC_VERIFIER_URL",
};
const ZKNFC_MOCK: Setting = Setting { flag: "--zknfc-mock", env: "FAIRSOIL_ZKNFC_MOCK" };
const ADJUDICATION_URL: Setting = Setting {
    flag: "--external-adjudication-url",
    env: "FAIRSOIL_EXTERNAL_ADJUDICATION_URL",
};
const POLL_MS: Setting = Setting { flag: "--poll-ms", env: "FAIRSOIL_POLL_MS" };
const SNAPSHOT_REFRESH_MS: Setting = Setting {
    flag: "--snapshot-refresh-ms",
    env: "FAIRSOIL_SNAPSHOT_REFRESH_MS",
};
const TRAIL_FROM_BLOCK: Setting = Setting {
    flag: "--trail-from-block",
    env: "FAIRSOIL_TRAIL_FROM_BLOCK",
};
const TRAIL_CAPACITY: Setting = Setting {
    flag: "--trail-capacity",
    env: "FAIRSOIL_TRAIL_CAPACITY",
};
const MAX_LOG_SPAN: Setting = Setting { flag: "--max-log-span", env: "FAIRSOIL_MAX_LOG_SPAN" };
const UNCLAIMED_LOOKBACK: Setting = Setting {
    flag: "--unclaimed-lookback-days",
    env: "FAIRSOIL_UNCLAIMED_LOOKBACK_DAYS",
};
const RPC_TIMEOUT: Setting = Setting {
    flag: "--rpc-timeout-secs",
    env: "FAIRSOIL_RPC_TIMEOUT_SECS",
};
const RPC_MAX_RETRIES: Setting = Setting {
    flag: "--rpc-max-retries",
    env: "FAIRSOIL_RPC_MAX_RETRIES",
};
const RPC_BACKOFF: Setting = Setting {
    flag: "--rpc-retry-backoff-ms",
    env: "FAIRSOIL_RPC_RETRY_BACKOFF_MS",
};
const CONFIRMATION_TIMEOUT: Setting = Setting {
    flag: "--confirmation-timeout-secs",
    env: "FAIRSOIL_CONFIRMATION_TIMEOUT_SECS",
};
const REFRESH_GRACE: Setting = Setting {
    flag: "--refresh-grace-ms",
    env: "FAIRSOIL_REFRESH_GRACE_MS",
};
const TAGS_PATH: Setting = Setting { flag: "--tags-path", env: "FAIRSOIL_TAGS_PATH" };
const LOG_FORMAT: Setting = Setting { flag: "--log-format", env: "FAIRSOIL_LOG_FORMAT" };

const VALUE_SETTINGS: [&Setting; 27] = [
    &RPC_URL,
    &BIND,
    &ACCOUNT,
    &TOKEN_A,
    &TOKEN_B,
    &TREASURY,
    &COVENANT,
    &RESOURCE_REGISTRY,
    &COVENANT_LIBRARY,
    &WORLDID_APP_ID,
    &WORLDID_ACTION_ID,
    &WORLDID_VERIFY_URL,
    &ZKNFC_URL,
    &ADJUDICATION_URL,
    &POLL_MS,
    &SNAPSHOT_REFRESH_MS,
    &TRAIL_FROM_BLOCK,
    &TRAIL_CAPACITY,
    &MAX_LOG_SPAN,
    &UNCLAIMED_LOOKBACK,
    &RPC_TIMEOUT,
    &RPC_MAX_RETRIES,
    &RPC_BACKOFF,
    &CONFIRMATION_TIMEOUT,
    &REFRESH_GRACE,
    &TAGS_PATH,
    &LOG_FORMAT,
];

/// Boolean switches: the bare flag means `true`.
const SWITCH_SETTINGS: [&Setting; 2] = [&WORLDID_MOCK, &ZKNFC_MOCK];

/// Resolved sources for one parse: CLI values first, then the environment.
struct Sources<'a> {
    cli: Vec<(&'static str, String)>,
    env: &'a dyn Fn(&str) -> Option<String>,
}

impl Sources<'_> {
    fn raw(&self, setting: &Setting) -> Option<(String, &'static str)> {
        if let Some((_, value)) = self.cli.iter().rev().find(|(flag, _)| *flag == setting.flag) {
            return Some((value.clone(), setting.flag));
        }
        (self.env)(setting.env)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| (value, setting.env))
    }

    fn string(&self, setting: &Setting) -> Option<String> {
        self.raw(setting).map(|(value, _)| value)
    }

    fn positive_u64(&self, setting: &Setting, default: u64) -> Result<u64, String> {
        match self.raw(setting) {
            Some((raw, field)) => parse_positive_u64(&raw, field),
            None => Ok(default),
        }
    }

    fn non_negative_u64(&self, setting: &Setting, default: u64) -> Result<u64, String> {
        match self.raw(setting) {
            Some((raw, field)) => raw
                .parse::<u64>()
                .map_err(|error| format!("invalid {field} value `{raw}`: {error}")),
            None => Ok(default),
        }
    }

    fn non_negative_u32(&self, setting: &Setting, default: u32) -> Result<u32, String> {
        match self.raw(setting) {
            Some((raw, field)) => parse_non_negative_u32(&raw, field),
            None => Ok(default),
        }
    }

    fn bool(&self, setting: &Setting) -> Result<bool, String> {
        match self.raw(setting) {
            Some((raw, field)) => parse_bool(&raw, field),
            None => Ok(false),
        }
    }

    fn address(&self, setting: &Setting) -> Result<Option<Address>, String> {
        match self.raw(setting) {
            Some((raw, field)) => Address::from_str(&raw)
                .map(Some)
                .map_err(|error| format!("invalid {field} value `{raw}`: {error}")),
            None => Ok(None),
        }
    }
}

/// Reads the process arguments and environment.
pub fn parse_dashboard_config() -> Result<DashboardConfig, String> {
    let env = |name: &str| std::env::var(name).ok();
    parse_dashboard_config_from(std::env::args().skip(1), &env)
}

/// CLI flags override environment variables, which override defaults.
/// `--help` is reported as an `Err` carrying the usage text.
pub fn parse_dashboard_config_from<I>(
    args: I,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<DashboardConfig, String>
where
    I: IntoIterator<Item = String>,
{
    let mut cli = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(help_text());
        }
        if let Some(setting) = SWITCH_SETTINGS.iter().find(|setting| setting.flag == arg) {
            cli.push((setting.flag, "true".to_string()));
            continue;
        }
        let Some(setting) = VALUE_SETTINGS.iter().find(|setting| setting.flag == arg) else {
            return Err(format!("unknown flag `{arg}`\n\n{}", help_text()));
        };
        let value = args
            .next()
            .ok_or_else(|| format!("{} requires a value", setting.flag))?;
        cli.push((setting.flag, value));
    }
    let sources = Sources { cli, env };

    let rpc_url = sources
        .string(&RPC_URL)
        .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
    reqwest::Url::parse(&rpc_url)
        .map_err(|error| format!("invalid RPC URL `{}`: {error}", redact_rpc_url(&rpc_url)))?;

    let addresses = ContractAddresses {
        token_a: sources.address(&TOKEN_A)?,
        token_b: sources.address(&TOKEN_B)?,
        treasury: sources.address(&TREASURY)?,
        covenant: sources.address(&COVENANT)?,
        resource_registry: sources.address(&RESOURCE_REGISTRY)?,
        covenant_library: sources.address(&COVENANT_LIBRARY)?,
    };

    let trail_capacity = sources.positive_u64(&TRAIL_CAPACITY, DEFAULT_TRAIL_CAPACITY as u64)?;
    let trail_capacity = usize::try_from(trail_capacity)
        .map_err(|_| format!("trail capacity {trail_capacity} does not fit in memory"))?;

    let log_format = match sources.raw(&LOG_FORMAT) {
        Some((raw, field)) => raw
            .parse::<LogFormat>()
            .map_err(|error| format!("invalid {field} value `{raw}`: {error}"))?,
        None => LogFormat::default(),
    };

    Ok(DashboardConfig {
        rpc_url,
        bind: sources
            .string(&BIND)
            .unwrap_or_else(|| DEFAULT_BIND.to_string()),
        account: sources.address(&ACCOUNT)?,
        addresses,
        world_id: WorldIdConfig {
            app_id: sources.string(&WORLDID_APP_ID),
            action_id: sources.string(&WORLDID_ACTION_ID),
            verify_url: sources.string(&WORLDID_VERIFY_URL),
            mock: sources.bool(&WORLDID_MOCK)?,
        },
        zk_nfc: ZkNfcConfig {
            verifier_url: sources.string(&ZKNFC_URL),
            mock: sources.bool(&ZKNFC_MOCK)?,
        },
        external_adjudication_url: sources.string(&ADJUDICATION_URL),
        poll_ms: sources.positive_u64(&POLL_MS, DEFAULT_POLL_MS)?,
        snapshot_refresh_ms: sources
            .positive_u64(&SNAPSHOT_REFRESH_MS, DEFAULT_SNAPSHOT_REFRESH_MS)?,
        trail_from_block: sources.non_negative_u64(&TRAIL_FROM_BLOCK, 0)?,
        trail_capacity,
        max_log_span: sources.positive_u64(&MAX_LOG_SPAN, DEFAULT_MAX_LOG_SPAN)?,
        unclaimed_lookback_days: sources
            .positive_u64(&UNCLAIMED_LOOKBACK, DEFAULT_UNCLAIMED_LOOKBACK_DAYS)?,
        rpc_timeout_secs: sources.positive_u64(&RPC_TIMEOUT, DEFAULT_RPC_TIMEOUT_SECS)?,
        rpc_max_retries: sources.non_negative_u32(&RPC_MAX_RETRIES, DEFAULT_RPC_MAX_RETRIES)?,
        rpc_retry_backoff_ms: sources.positive_u64(&RPC_BACKOFF, DEFAULT_RPC_RETRY_BACKOFF_MS)?,
        confirmation_timeout_secs: sources
            .positive_u64(&CONFIRMATION_TIMEOUT, DEFAULT_CONFIRMATION_TIMEOUT_SECS)?,
        refresh_grace_ms: sources.non_negative_u64(&REFRESH_GRACE, DEFAULT_REFRESH_GRACE_MS)?,
        tags_path: sources.string(&TAGS_PATH).map(PathBuf::from),
        log_format,
    })
}

fn parse_positive_u64(raw: &str, field: &str) -> Result<u64, String> {
    let parsed = raw
        .parse::<u64>()
        .map_err(|error| format!("invalid {field} value `{raw}`: {error}"))?;
    if parsed == 0 {
        return Err(format!("invalid {field} value `{raw}`: must be > 0"));
    }
    Ok(parsed)
}

fn parse_non_negative_u32(raw: &str, field: &str) -> Result<u32, String> {
    raw.parse::<u32>()
        .map_err(|error| format!("invalid {field} value `{raw}`: {error}"))
}

fn parse_bool(raw: &str, field: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!(
            "invalid {field} value `{raw}`: expected one of true/false/1/0/yes/no/on/off"
        )),
    }
}

/// Scheme, host and port only. Paths and query strings often carry API keys.
pub fn redact_rpc_url(raw: &str) -> String {
    match reqwest::Url::parse(raw) {
        Ok(url) => {
            let host = url.host_str().unwrap_or("unknown-host");
            let port = url
                .port()
                .map(|value| format!(":{value}"))
                .unwrap_or_default();
            format!("{}://{}{port}", url.scheme(), host)
        }
        Err(_) => "<invalid-rpc-url>".to_string(),
    }
}

pub fn help_text() -> String {
    format!(
        "usage: fairsoil-dashboard [options]\n\
options:\n\
  --rpc-url <url>                    EVM JSON-RPC endpoint (default: {DEFAULT_RPC_URL})\n\
  --bind <addr>                      Dashboard bind address (default: {DEFAULT_BIND})\n\
  --account <address>                Account used for reads and node-signed writes\n\
  --token-a <address>                Token A contract\n\
  --token-b <address>                Token B contract\n\
  --treasury <address>               Treasury contract\n\
  --covenant <address>               Covenant escrow contract\n\
  --resource-registry <address>      Resource registry contract\n\
  --covenant-library <address>       Covenant template library contract\n\
  --worldid-app-id <id>              World ID app id\n\
  --worldid-action-id <id>           World ID action id\n\
  --worldid-verify-url <url>         World ID verifier endpoint\n\
  --worldid-mock                     Skip the World ID verifier call\n\
  --zknfc-verifier-url <url>         ZK-NFC verifier endpoint\n\
  --zknfc-mock                       Skip the ZK-NFC verifier call\n\
  --external-adjudication-url <url>  Link shown next to disputes\n\
  --poll-ms <ms>                     Live trail poll interval (default: {DEFAULT_POLL_MS})\n\
  --snapshot-refresh-ms <ms>         Snapshot refresh interval (default: {DEFAULT_SNAPSHOT_REFRESH_MS})\n\
  --trail-from-block <n>             First block scanned by the trail backfill (default: 0)\n\
  --trail-capacity <n>               Trail entries kept (default: {DEFAULT_TRAIL_CAPACITY})\n\
  --max-log-span <blocks>            Blocks per eth_getLogs request (default: {DEFAULT_MAX_LOG_SPAN})\n\
  --unclaimed-lookback-days <n>      Days of unclaimed bonus shown (default: {DEFAULT_UNCLAIMED_LOOKBACK_DAYS})\n\
  --rpc-timeout-secs <secs>          RPC request timeout (default: {DEFAULT_RPC_TIMEOUT_SECS})\n\
  --rpc-max-retries <n>              Retries for idempotent reads (default: {DEFAULT_RPC_MAX_RETRIES})\n\
  --rpc-retry-backoff-ms <ms>        Retry backoff base (default: {DEFAULT_RPC_RETRY_BACKOFF_MS})\n\
  --confirmation-timeout-secs <secs> Receipt wait per transaction (default: {DEFAULT_CONFIRMATION_TIMEOUT_SECS})\n\
  --refresh-grace-ms <ms>            Pause before the post-action trail reload (default: {DEFAULT_REFRESH_GRACE_MS})\n\
  --tags-path <path>                 JSON file for covenant tags (default: in memory)\n\
  --log-format <text|json>           Log output format (default: text)\n\
environment:\n\
  FAIRSOIL_RPC_URL, FAIRSOIL_BIND, FAIRSOIL_ACCOUNT\n\
  FAIRSOIL_TOKENA_ADDRESS, FAIRSOIL_TOKENB_ADDRESS, FAIRSOIL_TREASURY_ADDRESS\n\
  FAIRSOIL_COVENANT_ADDRESS, FAIRSOIL_RESOURCE_REGISTRY_ADDRESS, FAIRSOIL_COVENANT_LIBRARY_ADDRESS\n\
  FAIRSOIL_WORLDID_APP_ID, FAIRSOIL_WORLDID_ACTION_ID, FAIRSOIL_WORLDID_VERIFY_URL, FAIRSOIL_WORLDID_MOCK\n\
  FAIRSOIL_ZKNFC_VERIFIER_URL, FAIRSOIL_ZKNFC_MOCK, FAIRSOIL_EXTERNAL_ADJUDICATION_URL\n\
  FAIRSOIL_POLL_MS, FAIRSOIL_SNAPSHOT_REFRESH_MS, FAIRSOIL_TRAIL_FROM_BLOCK, FAIRSOIL_TRAIL_CAPACITY\n\
  FAIRSOIL_MAX_LOG_SPAN, FAIRSOIL_UNCLAIMED_LOOKBACK_DAYS\n\
  FAIRSOIL_RPC_TIMEOUT_SECS, FAIRSOIL_RPC_MAX_RETRIES, FAIRSOIL_RPC_RETRY_BACKOFF_MS\n\
  FAIRSOIL_CONFIRMATION_TIMEOUT_SECS, FAIRSOIL_REFRESH_GRACE_MS, FAIRSOIL_TAGS_PATH\n\
  FAIRSOIL_LOG_FORMAT                Log output format (text/json)\n\
  RUST_LOG                           Log filter (default: fairsoil=info)"
    )
}
