//! Final classification: merges the stage outputs into one verdict with a
//! fixed menu of permitted resolution actions.

use serde::{Deserialize, Serialize};

use super::anomaly::AnomalyScreen;
use super::config::PipelineConfig;
use super::policy_gate::{HardFlagEvidence, PolicyDecision, PolicyOutcome};
use super::request_eval::RequestScore;
use super::risk_profile::ProfileScore;

/// The six mutually exclusive terminal classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    VendorAnomaly,
    AutoApproved,
    AutoFlaggedL2,
    LowRisk,
    MediumRisk,
    HighRisk,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::VendorAnomaly => "vendor_anomaly",
            Classification::AutoApproved => "auto_approved",
            Classification::AutoFlaggedL2 => "auto_flagged_l2",
            Classification::LowRisk => "low_risk",
            Classification::MediumRisk => "medium_risk",
            Classification::HighRisk => "high_risk",
        }
    }

    /// Fixed, enumerable action menu per classification.
    pub fn allowed_actions(&self) -> &'static [ResolutionAction] {
        match self {
            Classification::VendorAnomaly => &[
                ResolutionAction::ProcessRefundVendorIssue,
                ResolutionAction::FlagForSupplierReport,
            ],
            Classification::AutoApproved => &[ResolutionAction::ConfirmToCustomer],
            Classification::AutoFlaggedL2 => &[ResolutionAction::EscalateToL2],
            Classification::LowRisk | Classification::MediumRisk => &[
                ResolutionAction::ApproveFullRefund,
                ResolutionAction::ApprovePartialRefund,
                ResolutionAction::OfferCoupon,
                ResolutionAction::RequestMoreInfo,
                ResolutionAction::EscalateToL2,
            ],
            Classification::HighRisk => &[
                ResolutionAction::EscalateToL2,
                ResolutionAction::OverrideApprove,
            ],
        }
    }
}

/// Resolution actions an agent (or floor manager) may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    ProcessRefundVendorIssue,
    FlagForSupplierReport,
    ConfirmToCustomer,
    EscalateToL2,
    ApproveFullRefund,
    ApprovePartialRefund,
    OfferCoupon,
    RequestMoreInfo,
    OverrideApprove,
}

/// The terminal output of one assessment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub classification: Classification,
    pub recommended_action: String,
    pub resolution_options: Vec<ResolutionAction>,
    pub evidence: EvidenceSummary,
}

/// Layered evidence assembled from whichever stages actually ran. Consumed
/// read-only by audit UI and the narration collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub anomaly: AnomalyScreen,
    pub policy: PolicyDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestScore>,
}

/// Produce the final verdict. Decision order encodes precedence: anomaly,
/// then the policy gate branches, then the score bands.
pub fn classify(
    anomaly: AnomalyScreen,
    policy: PolicyDecision,
    profile: Option<ProfileScore>,
    request: Option<RequestScore>,
    config: &PipelineConfig,
) -> Verdict {
    if let Some(details) = &anomaly.anomaly {
        let recommended = format!(
            "Route to vendor investigation. {} refund requests for \"{}\" on {}. Process \
             customer refund per standard procedure.",
            details.refund_count_for_date, details.experience_name, details.date
        );
        return build(
            Classification::VendorAnomaly,
            recommended,
            anomaly,
            policy,
            profile,
            request,
        );
    }

    match &policy.outcome {
        PolicyOutcome::AutoApprove(approval) => {
            let recommended = format!(
                "Refund processed at {:.0}% (${:.2}). Confirm to customer.",
                approval.refund_rate * 100.0,
                approval.refund_amount
            );
            build(
                Classification::AutoApproved,
                recommended,
                anomaly,
                policy,
                profile,
                request,
            )
        }
        PolicyOutcome::HardFlag(evidence) => {
            let evidence_label = match evidence {
                HardFlagEvidence::CheckinContradiction { .. } => "Check-in contradiction",
                HardFlagEvidence::StandingFraudFlag { .. } => "Standing fraud flag",
            };
            let recommended =
                format!("Escalated to floor manager. {evidence_label} evidence attached.");
            build(
                Classification::AutoFlaggedL2,
                recommended,
                anomaly,
                policy,
                profile,
                request,
            )
        }
        PolicyOutcome::PassToScoring => {
            let final_score = request.as_ref().map(|r| r.final_score).unwrap_or(0);
            let (classification, recommended) = if final_score < config.low_risk_ceiling {
                (
                    Classification::LowRisk,
                    "Low risk. Approve refund. Confirm to customer.".to_string(),
                )
            } else if final_score >= config.high_risk_floor {
                (
                    Classification::HighRisk,
                    "High risk. Escalation to L2 recommended.".to_string(),
                )
            } else {
                (
                    Classification::MediumRisk,
                    "Review recommended. See evidence card for details.".to_string(),
                )
            };
            build(classification, recommended, anomaly, policy, profile, request)
        }
    }
}

fn build(
    classification: Classification,
    recommended_action: String,
    anomaly: AnomalyScreen,
    policy: PolicyDecision,
    profile: Option<ProfileScore>,
    request: Option<RequestScore>,
) -> Verdict {
    Verdict {
        resolution_options: classification.allowed_actions().to_vec(),
        classification,
        recommended_action,
        evidence: EvidenceSummary {
            anomaly,
            policy,
            profile,
            request,
        },
    }
}
