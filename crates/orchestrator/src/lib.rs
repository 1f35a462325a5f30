#![forbid(unsafe_code)]

//! Runs user actions as ordered transaction plans and reports the outcome in
//! terms the user can read.

use fairsoil_gateway::GatewayError;
use fairsoil_types::B256;

mod plan;
mod runner;
mod status;

pub use plan::{ActionPlan, DEFAULT_SUCCESS_MESSAGE, PlanProgress, PlanStep};
pub use runner::{
    ActionFailure, ActionReport, DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_RECEIPT_POLL_MS,
    DEFAULT_REFRESH_GRACE_MS, OrchestratorConfig, PostActionRefresh, RefreshFuture,
    TxOrchestrator,
};
pub use status::{ActiveAction, TxSnapshot, TxStatus, TxTracker};

pub const USER_REJECTED_MESSAGE: &str = "Transaction rejected by user.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
    #[error("another action is in progress: {0}")]
    Busy(String),
    #[error(transparent)]
    Submit(GatewayError),
    #[error("transaction {hash} reverted")]
    Reverted { hash: B256 },
    #[error("transaction {hash} was not confirmed within {waited_secs}s")]
    ConfirmationTimeout {
        hash: B256,
        waited_secs: u64,
        last_error: Option<String>,
    },
}

/// Maps a raw failure message to the line shown to the user.
pub fn classify_tx_error(message: &str) -> String {
    let lower = message.to_lowercase();
    if ["user rejected", "user denied", "rejected the request"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        return USER_REJECTED_MESSAGE.to_string();
    }
    format!("Transaction failed: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_phrases_map_to_benign_message() {
        assert_eq!(
            classify_tx_error("MetaMask Tx Signature: User rejected the request."),
            "Transaction rejected by user."
        );
        assert_eq!(
            classify_tx_error("USER DENIED transaction signature"),
            "Transaction rejected by user."
        );
        assert_eq!(
            classify_tx_error("execution reverted: not creator"),
            "Transaction failed: execution reverted: not creator"
        );
    }

    #[test]
    fn submit_errors_classify_through_their_display() {
        let error = TxError::Submit(GatewayError::Rpc {
            method: "eth_sendTransaction".to_string(),
            code: 4001,
            message: "User rejected the request.".to_string(),
        });
        assert_eq!(classify_tx_error(&error.to_string()), USER_REJECTED_MESSAGE);
    }
}
