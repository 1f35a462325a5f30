//! Interfaces of the externally deployed FairSoil contracts.

use alloy_sol_types::sol;

sol! {
    interface ITokenA {
        function balanceOf(address account) external view returns (uint256);
        function owner() external view returns (address);
        function isPrimaryAddress(address account) external view returns (bool);
        function setPrimaryAddress(address account, bool isPrimary) external;
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface ITokenB {
        function balanceOf(address account) external view returns (uint256);
        function lockedBalance(address account) external view returns (uint256);
        function unlockedBalanceOf(address account) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface ITreasury {
        event UBIClaimed(address indexed user, uint256 amount);
        event TaskCompleted(address indexed worker, uint256 tokenBReward, uint256 integrityPoints);
        event CovenantSet(address indexed covenant);
        event TreasuryIn(address indexed from, uint256 amount, bytes32 reason);
        event TreasuryOutA(address indexed to, uint256 amount, bytes32 reason);
        event TreasuryOutB(address indexed to, uint256 amount, bytes32 reason);
        event ReserveSnapshot(uint256 reservesA, uint256 reservesB);
        event LiabilityChanged(int256 deltaA, int256 deltaB, bytes32 reason);

        function owner() external view returns (address);
        function integrityScore(address account) external view returns (uint256);
        function isEligibleForGovernance(address account) external view returns (bool);
        function crystallizationRateBps() external view returns (uint256);
        function crystallizationFeeBps() external view returns (uint256);
        function appiOracle() external view returns (address);
        function lastAPPI() external view returns (uint256);
        function dailyUBIAmount() external view returns (uint256);
        function treasuryInTotal() external view returns (uint256);
        function treasuryOutATotal() external view returns (uint256);
        function treasuryOutBTotal() external view returns (uint256);
        function lastReservesA() external view returns (uint256);
        function lastReservesB() external view returns (uint256);
        function liabilitiesA() external view returns (uint256);
        function liabilitiesB() external view returns (uint256);
        function unclaimed(address account, uint256 day) external view returns (uint256);

        function claimUBI() external;
        function accrueUBI() external;
        function claimUnclaimed(uint256 fromDay, uint256 toDay) external;
        function reportTaskCompleted(address worker, uint256 tokenBReward, uint256 integrityPoints) external;
        function setAPPIOracle(address oracle) external;
        function applyAPPI(uint256 day) external;
    }

    interface ICovenant {
        event CovenantCreated(uint256 indexed covenantId, address indexed creator, address indexed worker, uint256 tokenBReward, uint256 integrityPoints);
        event CovenantSubmitted(uint256 indexed covenantId, address indexed worker);
        event CovenantApproved(uint256 indexed covenantId, address indexed creator);
        event CovenantRejected(uint256 indexed covenantId, address indexed creator);
        event CovenantCancelled(uint256 indexed covenantId, address indexed creator);
        event IssueReported(uint256 indexed covenantId, address indexed worker, uint256 claimBps, string reason, string evidenceUri);
        event IssueAccepted(uint256 indexed covenantId, address indexed creator, uint256 claimBps);
        event IssueDisputed(uint256 indexed covenantId, address indexed creator, string reason, string evidenceUri);
        event DisputeResolverSet(address indexed resolver);
        event ResolutionProposed(uint256 indexed covenantId, uint256 workerPayoutBps, uint256 integrityPoints, uint256 slashingPenalty);
        event MaliceSlashed(uint256 indexed covenantId, address indexed creator, address indexed worker, uint256 penalty);
        event DisputeResolved(uint256 indexed covenantId, uint256 workerPayoutBps, uint256 integrityPoints, uint256 slashingPenalty);

        function nextId() external view returns (uint256);
        function covenants(uint256 id) external view returns (
            address creator,
            address worker,
            uint256 tokenBReward,
            uint256 integrityPoints,
            uint256 issueClaimBps,
            uint256 escrowStart,
            uint256 milestoneProgress,
            uint256 proposedWorkerPayoutBps,
            uint256 proposedIntegrityPoints,
            uint256 proposedSlashingPenalty,
            uint8 paymentToken,
            uint8 status
        );
        function disputeResolver() external view returns (address);

        function createCovenant(address worker, uint256 tokenBReward, uint256 integrityPoints, bool payInTokenA) external returns (uint256 covenantId);
        function submitWork(uint256 covenantId) external;
        function approveWork(uint256 covenantId) external;
        function rejectWork(uint256 covenantId) external;
        function cancel(uint256 covenantId) external;
        function reportIssue(uint256 covenantId, uint256 claimBps, string reason, string evidenceUri) external;
        function acceptIssue(uint256 covenantId) external;
        function disputeIssue(uint256 covenantId, string reason, string evidenceUri) external;
        function resolveDispute(uint256 covenantId, uint256 workerPayoutBps, uint256 integrityPoints, uint256 slashingPenalty) external;
        function finalizeResolution(uint256 covenantId) external;
    }

    interface IAppiOracle {
        struct Report {
            address reporter;
            uint256 price;
        }

        function confidenceBps() external view returns (uint256);
        function maxReportsPerCategory() external view returns (uint256);
        function dailyIndex(uint256 day) external view returns (uint256);
        function getReports(uint256 day, uint256 category) external view returns (Report[] memory);

        function setCategories(uint256[] calldata categories) external;
        function submitPrice(uint256 category, uint256 price) external;
        function setConfidence(uint256 confidenceBps, uint256 maxReports) external;
    }

    interface IResourceRegistry {
        function resources(bytes32 resourceId) external view returns (
            address owner,
            uint256 valuation,
            uint256 taxRateBps,
            uint256 lastTaxTimestamp,
            bool exists
        );
        function pendingTax(bytes32 resourceId) external view returns (uint256 due, uint256 elapsed);

        function registerResource(bytes32 resourceId, uint256 valuation, uint256 taxRateBps) external;
        function updateValuation(bytes32 resourceId, uint256 valuation) external;
        function payTax(bytes32 resourceId) external;
        function buyResource(bytes32 resourceId, uint256 maxPrice) external;
    }

    interface ICovenantLibrary {
        function nextTemplateId() external view returns (uint256);
        function templates(uint256 templateId) external view returns (
            address creator,
            uint256 royaltyBps,
            string metadataUri,
            bool active
        );

        function registerTemplate(uint256 royaltyBps, string metadataUri) external returns (uint256 templateId);
        function setActive(uint256 templateId, bool active) external;
        function recordUse(uint256 templateId, uint256 covenantId, uint256 amount) external;
    }
}
