#![forbid(unsafe_code)]

//! The FairSoil dashboard service: configuration, the runtime that keeps the
//! on-chain snapshot and activity trail current, and the user actions the
//! page submits.

pub mod banner;
pub mod config;
pub mod intents;
pub mod logging;
pub mod runtime;
pub mod snapshot;
pub mod validation;
pub mod verifier;

pub use banner::{Banner, BannerKind, SUCCESS_BANNER_TTL};
pub use config::{
    DashboardConfig, WorldIdConfig, ZkNfcConfig, help_text, parse_dashboard_config,
    parse_dashboard_config_from, redact_rpc_url,
};
pub use intents::{CovenantPreset, IntentError, UserIntent};
pub use logging::{LogFormat, init_logging};
pub use runtime::{
    ActionOutcome, CovenantRow, DashboardRuntime, RuntimeError, StatusView, TrailEntryView,
};
pub use snapshot::{AppiStatsView, DashboardSnapshot};
pub use validation::ValidationError;
pub use verifier::{VerifierError, VerifyResponse, world_id_proxy};
