use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::format::TokenUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovenantStatus {
    Open,
    Submitted,
    Approved,
    Rejected,
    Cancelled,
    IssueReported,
    Disputed,
    Proposed,
    Resolved,
    Unknown(u8),
}

impl CovenantStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Open,
            1 => Self::Submitted,
            2 => Self::Approved,
            3 => Self::Rejected,
            4 => Self::Cancelled,
            5 => Self::IssueReported,
            6 => Self::Disputed,
            7 => Self::Proposed,
            8 => Self::Resolved,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Submitted => 1,
            Self::Approved => 2,
            Self::Rejected => 3,
            Self::Cancelled => 4,
            Self::IssueReported => 5,
            Self::Disputed => 6,
            Self::Proposed => 7,
            Self::Resolved => 8,
            Self::Unknown(code) => code,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Submitted => "Submitted",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Cancelled => "Cancelled",
            Self::IssueReported => "Support requested",
            Self::Disputed => "Disputed",
            Self::Proposed => "Support proposed",
            Self::Resolved => "Support resolved",
            Self::Unknown(_) => "Unknown",
        }
    }

    pub fn in_dispute_flow(self) -> bool {
        matches!(
            self,
            Self::IssueReported | Self::Disputed | Self::Proposed | Self::Resolved
        )
    }
}

pub const DISPUTE_STEPS: [&str; 4] = ["Requested", "Disputed", "Proposed", "Resolved"];

/// Which of the four dispute steps have been reached.
pub fn dispute_stage(status: CovenantStatus) -> [bool; 4] {
    let code = status.code();
    [
        code >= 5,
        code >= 6,
        code >= 7,
        status == CovenantStatus::Resolved,
    ]
}

pub fn dispute_status_label(status: CovenantStatus) -> &'static str {
    match status.code() {
        8 => "Resolved",
        code if code >= 7 => "Proposal submitted",
        code if code >= 6 => "Awaiting resolver decision",
        _ => "Support requested",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentToken {
    TokenB,
    TokenA,
}

impl PaymentToken {
    pub fn from_code(code: u8) -> Self {
        if code == 1 { Self::TokenA } else { Self::TokenB }
    }

    pub fn unit(self) -> TokenUnit {
        match self {
            Self::TokenA => TokenUnit::SoilA,
            Self::TokenB => TokenUnit::SoilB,
        }
    }
}

/// Snapshot of one escrow record as returned by `covenants(id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovenantView {
    pub id: u64,
    pub creator: Address,
    pub worker: Address,
    pub token_b_reward: U256,
    pub integrity_points: U256,
    pub issue_claim_bps: U256,
    pub escrow_start: U256,
    pub milestone_progress: U256,
    pub proposed_worker_payout_bps: U256,
    pub proposed_integrity_points: U256,
    pub proposed_slashing_penalty: U256,
    pub payment_token: PaymentToken,
    pub status: CovenantStatus,
}

impl CovenantView {
    pub fn involves(&self, account: &Address) -> bool {
        self.creator == *account || self.worker == *account
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip_through_labels() {
        assert_eq!(CovenantStatus::from_code(0).label(), "Open");
        assert_eq!(CovenantStatus::from_code(5).label(), "Support requested");
        assert_eq!(CovenantStatus::from_code(8).label(), "Support resolved");
        assert_eq!(CovenantStatus::from_code(42), CovenantStatus::Unknown(42));
        assert_eq!(CovenantStatus::Unknown(42).code(), 42);
    }

    #[test]
    fn dispute_stage_progresses_monotonically() {
        assert_eq!(
            dispute_stage(CovenantStatus::Submitted),
            [false, false, false, false]
        );
        assert_eq!(
            dispute_stage(CovenantStatus::IssueReported),
            [true, false, false, false]
        );
        assert_eq!(
            dispute_stage(CovenantStatus::Proposed),
            [true, true, true, false]
        );
        assert_eq!(
            dispute_stage(CovenantStatus::Resolved),
            [true, true, true, true]
        );
        assert_eq!(
            dispute_status_label(CovenantStatus::Disputed),
            "Awaiting resolver decision"
        );
    }

    #[test]
    fn payment_token_defaults_to_token_b() {
        assert_eq!(PaymentToken::from_code(0), PaymentToken::TokenB);
        assert_eq!(PaymentToken::from_code(1).unit(), TokenUnit::SoilA);
        assert_eq!(PaymentToken::from_code(9), PaymentToken::TokenB);
    }
}
