use super::common::*;

use crate::assessment::domain::{RefundReason, RefundabilityClass, RiskBucket};
use crate::assessment::policy_gate::{self, HardFlagEvidence, PolicyOutcome};

#[test]
fn cancelable_within_window_auto_approves_full_refund() {
    let mut booking = booking("bk-1", "cust-1");
    booking.refundability = RefundabilityClass::Cancelable;
    booking.cancellation_window_applicable = true;
    booking.experience_value = 123.456;
    booking.refund_policy_rate = Some(1.0);

    let decision = policy_gate::evaluate(&booking, &enrichment_for(&booking), Some(&profile("cust-1")));

    assert!(decision.resolved());
    match decision.outcome {
        PolicyOutcome::AutoApprove(approval) => {
            assert_eq!(approval.refund_amount, 123.46);
            assert_eq!(approval.refund_rate, 1.0);
            assert_eq!(approval.experience_value, 123.456);
            assert!(approval.policy_basis.contains("cancelable"));
        }
        other => panic!("expected auto-approval, got {other:?}"),
    }
}

#[test]
fn partial_refund_uses_policy_rate_and_rounds_to_cents() {
    let mut booking = booking("bk-1", "cust-1");
    booking.refundability = RefundabilityClass::PartiallyRefundable;
    booking.cancellation_window_applicable = true;
    booking.experience_value = 88.125;
    booking.refund_policy_rate = Some(0.5);

    let decision = policy_gate::evaluate(&booking, &enrichment_for(&booking), None);

    match decision.outcome {
        PolicyOutcome::AutoApprove(approval) => {
            assert_eq!(approval.refund_amount, 44.06);
            assert_eq!(approval.refund_rate, 0.5);
        }
        other => panic!("expected auto-approval, got {other:?}"),
    }
}

#[test]
fn missing_policy_rate_defaults_to_full_refund() {
    let mut booking = booking("bk-1", "cust-1");
    booking.refundability = RefundabilityClass::Cancelable;
    booking.cancellation_window_applicable = true;
    booking.refund_policy_rate = None;

    let decision = policy_gate::evaluate(&booking, &enrichment_for(&booking), None);

    match decision.outcome {
        PolicyOutcome::AutoApprove(approval) => {
            assert_eq!(approval.refund_rate, 1.0);
            assert_eq!(approval.refund_amount, 120.0);
        }
        other => panic!("expected auto-approval, got {other:?}"),
    }
}

#[test]
fn auto_approve_wins_even_with_standing_fraud_flag() {
    let mut booking = booking("bk-1", "cust-1");
    booking.refundability = RefundabilityClass::Cancelable;
    booking.cancellation_window_applicable = true;
    let mut profile = profile("cust-1");
    profile.confirmed_fraud_flag = true;

    let decision = policy_gate::evaluate(&booking, &enrichment_for(&booking), Some(&profile));

    assert!(matches!(decision.outcome, PolicyOutcome::AutoApprove(_)));
}

#[test]
fn checkin_contradiction_hard_flags_no_show_claims() {
    let mut booking = booking("bk-1", "cust-1");
    booking.checkin_confirmed = Some(true);
    booking.refund_reason = Some(RefundReason::NoShow);

    let decision = policy_gate::evaluate(&booking, &enrichment_for(&booking), Some(&profile("cust-1")));

    assert!(decision.resolved());
    match decision.outcome {
        PolicyOutcome::HardFlag(HardFlagEvidence::CheckinContradiction {
            experience_name,
            scheduled_for,
            claimed_reason,
        }) => {
            assert_eq!(experience_name, booking.experience_name);
            assert_eq!(scheduled_for, booking.scheduled_for);
            assert_eq!(claimed_reason, RefundReason::NoShow);
        }
        other => panic!("expected a check-in contradiction, got {other:?}"),
    }
}

#[test]
fn checkin_with_other_reason_is_not_contradicted() {
    let mut booking = booking("bk-1", "cust-1");
    booking.checkin_confirmed = Some(true);
    booking.refund_reason = Some(RefundReason::PartialService);

    let decision = policy_gate::evaluate(&booking, &enrichment_for(&booking), None);

    assert!(matches!(decision.outcome, PolicyOutcome::PassToScoring));
}

#[test]
fn standing_fraud_flag_hard_flags_with_profile_evidence() {
    let booking = booking("bk-1", "cust-1");
    let mut profile = profile("cust-1");
    profile.confirmed_fraud_flag = true;
    profile.risk_bucket = Some(RiskBucket::High);
    profile.risk_score = Some(82);

    let decision = policy_gate::evaluate(&booking, &enrichment_for(&booking), Some(&profile));

    match decision.outcome {
        PolicyOutcome::HardFlag(HardFlagEvidence::StandingFraudFlag {
            customer_id,
            risk_bucket,
            risk_score,
            ..
        }) => {
            assert_eq!(customer_id, profile.customer_id);
            assert_eq!(risk_bucket, Some(RiskBucket::High));
            assert_eq!(risk_score, Some(82));
        }
        other => panic!("expected a standing fraud flag, got {other:?}"),
    }
}

#[test]
fn contradiction_outranks_the_fraud_flag() {
    let mut booking = booking("bk-1", "cust-1");
    booking.checkin_confirmed = Some(true);
    booking.refund_reason = Some(RefundReason::NoShow);
    let mut profile = profile("cust-1");
    profile.confirmed_fraud_flag = true;

    let decision = policy_gate::evaluate(&booking, &enrichment_for(&booking), Some(&profile));

    assert!(matches!(
        decision.outcome,
        PolicyOutcome::HardFlag(HardFlagEvidence::CheckinContradiction { .. })
    ));
}

#[test]
fn unremarkable_request_passes_to_scoring() {
    let booking = booking("bk-1", "cust-1");

    let decision = policy_gate::evaluate(&booking, &enrichment_for(&booking), None);

    assert!(!decision.resolved());
    assert!(matches!(decision.outcome, PolicyOutcome::PassToScoring));
    assert!(decision.rationale.contains("risk"));
}
