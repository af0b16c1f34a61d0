//! Stage 1: deterministic policy gate.
//!
//! Ordered guard clauses, first match wins. Auto-approve runs before both
//! hard-flag checks: a policy-compliant request must never be blocked by a
//! standing risk flag.

use serde::{Deserialize, Serialize};

use super::anomaly::Enrichment;
use super::domain::{
    BookingRecord, CustomerId, CustomerProfile, RefundReason, RefundabilityClass, RiskBucket,
};

/// Stage 1 output: which rule fired and the evidence for that branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub outcome: PolicyOutcome,
    pub rationale: String,
}

impl PolicyDecision {
    pub fn resolved(&self) -> bool {
        !matches!(self.outcome, PolicyOutcome::PassToScoring)
    }
}

/// Outcome of the gate. Exactly one evidence payload per branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PolicyOutcome {
    AutoApprove(AutoApproval),
    HardFlag(HardFlagEvidence),
    PassToScoring,
}

/// Refund details for a policy-compliant request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoApproval {
    pub refund_amount: f64,
    pub refund_rate: f64,
    pub experience_value: f64,
    pub policy_basis: String,
}

/// Evidence attached to a forced escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "evidence_type", rename_all = "snake_case")]
pub enum HardFlagEvidence {
    /// Check-in was confirmed but the customer claims a no-show.
    CheckinContradiction {
        experience_name: String,
        scheduled_for: chrono::NaiveDateTime,
        claimed_reason: RefundReason,
    },
    /// Sticky confirmed-fraud marker from a prior manual review.
    StandingFraudFlag {
        customer_id: CustomerId,
        customer_name: String,
        risk_bucket: Option<RiskBucket>,
        risk_score: Option<u8>,
    },
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Apply the gate rules in order. Later rules are not evaluated once an
/// earlier one fires.
pub fn evaluate(
    booking: &BookingRecord,
    enrichment: &Enrichment,
    profile: Option<&CustomerProfile>,
) -> PolicyDecision {
    let refundable = matches!(
        booking.refundability,
        RefundabilityClass::Cancelable | RefundabilityClass::PartiallyRefundable
    );
    if refundable && booking.cancellation_window_applicable {
        let rate = booking.refund_policy_rate.unwrap_or(1.0);
        let amount = round_cents(booking.experience_value * rate);
        let basis = format!(
            "{}, within cancellation window",
            booking.refundability.label()
        );
        return PolicyDecision {
            rationale: format!(
                "Policy-compliant {} product within cancellation window. Refund at {:.0}%.",
                booking.refundability.label(),
                rate * 100.0
            ),
            outcome: PolicyOutcome::AutoApprove(AutoApproval {
                refund_amount: amount,
                refund_rate: rate,
                experience_value: booking.experience_value,
                policy_basis: basis,
            }),
        };
    }

    if enrichment.checkin_confirmed == Some(true)
        && booking.refund_reason == Some(RefundReason::NoShow)
    {
        return PolicyDecision {
            rationale: "Check-in confirmed but customer claims no-show. Evidence contradicts \
                        the claim."
                .to_string(),
            outcome: PolicyOutcome::HardFlag(HardFlagEvidence::CheckinContradiction {
                experience_name: booking.experience_name.clone(),
                scheduled_for: booking.scheduled_for,
                claimed_reason: RefundReason::NoShow,
            }),
        };
    }

    if let Some(profile) = profile {
        if profile.confirmed_fraud_flag {
            return PolicyDecision {
                rationale: "Customer has a confirmed fraud flag from prior manual review."
                    .to_string(),
                outcome: PolicyOutcome::HardFlag(HardFlagEvidence::StandingFraudFlag {
                    customer_id: profile.customer_id.clone(),
                    customer_name: profile.customer_name.clone(),
                    risk_bucket: profile.risk_bucket,
                    risk_score: profile.risk_score,
                }),
            };
        }
    }

    PolicyDecision {
        outcome: PolicyOutcome::PassToScoring,
        rationale: "Request does not meet auto-approve or hard-flag criteria. Passing to risk \
                    scoring."
            .to_string(),
    }
}
