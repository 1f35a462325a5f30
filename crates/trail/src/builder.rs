use fairsoil_types::{
    DecodedLog, TokenUnit, TrailItem, U256, evidence_link, format_bps_percent, format_integrity,
    format_reason, format_token, safe_address,
};

/// Every event kind the trail knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrailEvent {
    CovenantCreated,
    CovenantSubmitted,
    CovenantApproved,
    CovenantRejected,
    CovenantCancelled,
    IssueReported,
    IssueAccepted,
    IssueDisputed,
    DisputeResolverSet,
    ResolutionProposed,
    MaliceSlashed,
    DisputeResolved,
    TaskCompleted,
    UbiClaimed,
    CovenantSet,
    TreasuryIn,
    TreasuryOutA,
    TreasuryOutB,
    ReserveSnapshot,
    LiabilityChanged,
    Unrecognized,
}

impl TrailEvent {
    pub fn from_event_name(name: Option<&str>) -> Self {
        match name {
            Some("CovenantCreated") => Self::CovenantCreated,
            Some("CovenantSubmitted") => Self::CovenantSubmitted,
            Some("CovenantApproved") => Self::CovenantApproved,
            Some("CovenantRejected") => Self::CovenantRejected,
            Some("CovenantCancelled") => Self::CovenantCancelled,
            Some("IssueReported") => Self::IssueReported,
            Some("IssueAccepted") => Self::IssueAccepted,
            Some("IssueDisputed") => Self::IssueDisputed,
            Some("DisputeResolverSet") => Self::DisputeResolverSet,
            Some("ResolutionProposed") => Self::ResolutionProposed,
            Some("MaliceSlashed") => Self::MaliceSlashed,
            Some("DisputeResolved") => Self::DisputeResolved,
            Some("TaskCompleted") => Self::TaskCompleted,
            Some("UBIClaimed") => Self::UbiClaimed,
            Some("CovenantSet") => Self::CovenantSet,
            Some("TreasuryIn") => Self::TreasuryIn,
            Some("TreasuryOutA") => Self::TreasuryOutA,
            Some("TreasuryOutB") => Self::TreasuryOutB,
            Some("ReserveSnapshot") => Self::ReserveSnapshot,
            Some("LiabilityChanged") => Self::LiabilityChanged,
            _ => Self::Unrecognized,
        }
    }

    /// Whether the event carries a `covenantId` argument.
    pub fn is_covenant_scoped(self) -> bool {
        matches!(
            self,
            Self::CovenantCreated
                | Self::CovenantSubmitted
                | Self::CovenantApproved
                | Self::CovenantRejected
                | Self::CovenantCancelled
                | Self::IssueReported
                | Self::IssueAccepted
                | Self::IssueDisputed
                | Self::ResolutionProposed
                | Self::MaliceSlashed
                | Self::DisputeResolved
        )
    }
}

/// Renders one decoded log as a trail entry. Logs of unknown kind yield `None`.
///
/// Missing arguments render as zero or `Unknown`; the builder never fails on a
/// recognized kind. `timestamp` is the block time of the log.
pub fn build_trail_item(log: &DecodedLog, timestamp: u64) -> Option<TrailItem> {
    let kind = TrailEvent::from_event_name(log.event_name.as_deref());
    let covenant_id = log.uint("covenantId").saturating_to::<u64>();
    let address = |name: &str| safe_address(log.address_arg(name).as_ref());
    let token_a = |name: &str| format_token(log.uint(name), TokenUnit::SoilA);
    let token_b = |name: &str| format_token(log.uint(name), TokenUnit::SoilB);

    let mut links = Vec::new();
    let (title, body) = match kind {
        TrailEvent::Unrecognized => return None,
        TrailEvent::CovenantCreated => {
            let mut body = format!("Creator {} · Worker {}", address("creator"), address("worker"));
            let reward = log.uint("tokenBReward");
            let points = log.uint("integrityPoints");
            if reward > U256::ZERO {
                body.push_str(" · ");
                body.push_str(&format_token(reward, TokenUnit::SoilB));
            }
            if points > U256::ZERO {
                body.push_str(" · ");
                body.push_str(&format_integrity(points));
            }
            (format!("Work agreement #{covenant_id} created"), body)
        }
        TrailEvent::CovenantSubmitted => (
            format!("Work agreement #{covenant_id} submitted"),
            format!("Submitted by {}", address("worker")),
        ),
        TrailEvent::CovenantApproved => (
            format!("Work agreement #{covenant_id} approved"),
            format!("Approved by {} · Reward released", address("creator")),
        ),
        TrailEvent::CovenantRejected => (
            format!("Work agreement #{covenant_id} rejected"),
            format!("Rejected by {}", address("creator")),
        ),
        TrailEvent::CovenantCancelled => (
            format!("Work agreement #{covenant_id} cancelled"),
            format!("Cancelled by {}", address("creator")),
        ),
        TrailEvent::IssueReported => {
            links.extend(evidence_link(log.text("evidenceUri").as_deref()));
            (
                format!("Support requested for agreement #{covenant_id}"),
                format!(
                    "Reported by {} · Claim {}% · {}",
                    address("worker"),
                    format_bps_percent(log.uint("claimBps")),
                    stated_reason(log.text("reason").as_deref())
                ),
            )
        }
        TrailEvent::IssueAccepted => (
            format!("Support accepted on agreement #{covenant_id}"),
            format!(
                "Accepted by {} · Claim {}%",
                address("creator"),
                format_bps_percent(log.uint("claimBps"))
            ),
        ),
        TrailEvent::IssueDisputed => {
            links.extend(evidence_link(log.text("evidenceUri").as_deref()));
            (
                format!("Support disputed on agreement #{covenant_id}"),
                format!(
                    "Disputed by {} · {}",
                    address("creator"),
                    stated_reason(log.text("reason").as_deref())
                ),
            )
        }
        TrailEvent::DisputeResolverSet => (
            "Support resolver updated".to_string(),
            format!("Resolver {}", address("resolver")),
        ),
        TrailEvent::ResolutionProposed => (
            format!("Support proposal for agreement #{covenant_id}"),
            payout_body(log),
        ),
        TrailEvent::MaliceSlashed => (
            format!("Integrity penalty on agreement #{covenant_id}"),
            format!(
                "Creator {} · Worker {} · Penalty {}",
                address("creator"),
                address("worker"),
                token_b("penalty")
            ),
        ),
        TrailEvent::DisputeResolved => (
            format!("Support resolved: agreement #{covenant_id}"),
            payout_body(log),
        ),
        TrailEvent::TaskCompleted => {
            let mut body = format!("Worker {}", address("worker"));
            let reward = log.uint("tokenBReward");
            let points = log.uint("integrityPoints");
            if reward > U256::ZERO {
                body.push_str(" · +");
                body.push_str(&format_token(reward, TokenUnit::SoilB));
            }
            if points > U256::ZERO {
                body.push_str(" · ");
                body.push_str(&format_integrity(points));
            }
            ("Task completed".to_string(), body)
        }
        TrailEvent::UbiClaimed => (
            "Bonus claimed".to_string(),
            format!("User {} · +{}", address("user"), token_a("amount")),
        ),
        TrailEvent::CovenantSet => (
            "Agreement contract linked to treasury".to_string(),
            format!("Contract {}", address("covenant")),
        ),
        TrailEvent::TreasuryIn => (
            "Treasury inflow".to_string(),
            format!(
                "From {} · +{} · {}",
                address("from"),
                token_a("amount"),
                format_reason(log.text("reason").as_deref(), "IN")
            ),
        ),
        TrailEvent::TreasuryOutA => (
            "Treasury outflow (A)".to_string(),
            format!(
                "To {} · -{} · {}",
                address("to"),
                token_a("amount"),
                format_reason(log.text("reason").as_deref(), "OUT_A")
            ),
        ),
        TrailEvent::TreasuryOutB => (
            "Treasury outflow (B)".to_string(),
            format!(
                "To {} · -{} · {}",
                address("to"),
                token_b("amount"),
                format_reason(log.text("reason").as_deref(), "OUT_B")
            ),
        ),
        TrailEvent::ReserveSnapshot => (
            "Treasury reserve snapshot".to_string(),
            format!("A {} · B {}", token_a("reservesA"), token_b("reservesB")),
        ),
        TrailEvent::LiabilityChanged => (
            "Liability updated".to_string(),
            format!(
                "ΔA {} · ΔB {} · {}",
                log.int("deltaA"),
                log.int("deltaB"),
                format_reason(log.text("reason").as_deref(), "LIAB")
            ),
        ),
    };

    Some(TrailItem {
        id: log.id(),
        timestamp,
        title,
        body: Some(body),
        links,
        block_number: log.block_number,
        covenant_id: kind.is_covenant_scoped().then_some(covenant_id),
    })
}

fn stated_reason(reason: Option<&str>) -> String {
    match reason.map(str::trim) {
        Some(reason) if !reason.is_empty() => format!("Reason: {reason}"),
        _ => "Reason not provided".to_string(),
    }
}

fn payout_body(log: &DecodedLog) -> String {
    format!(
        "{}% payout to worker · +{} points",
        format_bps_percent(log.uint("workerPayoutBps")),
        log.uint("integrityPoints")
    )
}
