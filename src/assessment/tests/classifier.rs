use super::common::*;

use crate::assessment::anomaly;
use crate::assessment::classifier::{self, Classification, ResolutionAction};
use crate::assessment::domain::{BookingId, RefundabilityClass};
use crate::assessment::policy_gate;
use crate::assessment::request_eval::RequestScore;

fn anomaly_cluster() -> Vec<BookingId> {
    ["bk-1", "bk-9", "bk-17"]
        .iter()
        .map(|id| BookingId(id.to_string()))
        .collect()
}

fn request_score(final_score: u8) -> RequestScore {
    RequestScore {
        final_score,
        base_score: Some(final_score),
        first_time: false,
        flags: Vec::new(),
        mitigating_factors: Vec::new(),
        modifiers: Vec::new(),
    }
}

#[test]
fn anomaly_outranks_even_an_auto_approval() {
    let mut booking = booking("bk-1", "cust-1");
    booking.refundability = RefundabilityClass::Cancelable;
    booking.cancellation_window_applicable = true;
    let screen = anomaly::screen(&booking, &anomaly_cluster(), &config());
    let policy = policy_gate::evaluate(&booking, &screen.enrichment, None);

    let verdict = classifier::classify(screen, policy, None, None, &config());

    assert_eq!(verdict.classification, Classification::VendorAnomaly);
    assert!(verdict.recommended_action.contains("Sunset Kayak Tour"));
    assert!(verdict.recommended_action.contains("3 refund requests"));
    assert_eq!(
        verdict.resolution_options,
        vec![
            ResolutionAction::ProcessRefundVendorIssue,
            ResolutionAction::FlagForSupplierReport,
        ]
    );
}

#[test]
fn auto_approval_reports_the_refund_amount() {
    let mut booking = booking("bk-1", "cust-1");
    booking.refundability = RefundabilityClass::Cancelable;
    booking.cancellation_window_applicable = true;
    booking.refund_policy_rate = Some(1.0);
    let screen = anomaly::screen(&booking, &[], &config());
    let policy = policy_gate::evaluate(&booking, &screen.enrichment, None);

    let verdict = classifier::classify(screen, policy, None, None, &config());

    assert_eq!(verdict.classification, Classification::AutoApproved);
    assert!(verdict.recommended_action.contains("100%"));
    assert!(verdict.recommended_action.contains("$120.00"));
    assert_eq!(
        verdict.resolution_options,
        vec![ResolutionAction::ConfirmToCustomer]
    );
}

#[test]
fn hard_flag_escalates_with_a_single_resolution_option() {
    let booking = booking("bk-1", "cust-1");
    let mut profile = profile("cust-1");
    profile.confirmed_fraud_flag = true;
    let screen = anomaly::screen(&booking, &[], &config());
    let policy = policy_gate::evaluate(&booking, &screen.enrichment, Some(&profile));

    let verdict = classifier::classify(screen, policy, None, None, &config());

    assert_eq!(verdict.classification, Classification::AutoFlaggedL2);
    assert!(verdict.recommended_action.contains("Standing fraud flag"));
    assert_eq!(verdict.resolution_options, vec![ResolutionAction::EscalateToL2]);
}

#[test]
fn score_bands_split_at_the_configured_boundaries() {
    let cases = [
        (0u8, Classification::LowRisk),
        (29, Classification::LowRisk),
        (30, Classification::MediumRisk),
        (59, Classification::MediumRisk),
        (60, Classification::HighRisk),
        (100, Classification::HighRisk),
    ];
    let booking = booking("bk-1", "cust-1");

    for (score, expected) in cases {
        let screen = anomaly::screen(&booking, &[], &config());
        let policy = policy_gate::evaluate(&booking, &screen.enrichment, None);
        let verdict = classifier::classify(
            screen,
            policy,
            None,
            Some(request_score(score)),
            &config(),
        );
        assert_eq!(verdict.classification, expected, "score={score}");
    }
}

#[test]
fn scored_bands_carry_the_full_resolution_menu() {
    let booking = booking("bk-1", "cust-1");
    let screen = anomaly::screen(&booking, &[], &config());
    let policy = policy_gate::evaluate(&booking, &screen.enrichment, None);

    let verdict = classifier::classify(
        screen,
        policy,
        None,
        Some(request_score(45)),
        &config(),
    );

    assert_eq!(
        verdict.resolution_options,
        vec![
            ResolutionAction::ApproveFullRefund,
            ResolutionAction::ApprovePartialRefund,
            ResolutionAction::OfferCoupon,
            ResolutionAction::RequestMoreInfo,
            ResolutionAction::EscalateToL2,
        ]
    );

    let high = classifier::classify(
        anomaly::screen(&booking, &[], &config()),
        policy_gate::evaluate(&booking, &enrichment_for(&booking), None),
        None,
        Some(request_score(75)),
        &config(),
    );
    assert_eq!(
        high.resolution_options,
        vec![ResolutionAction::EscalateToL2, ResolutionAction::OverrideApprove]
    );
}

#[test]
fn missing_request_score_classifies_as_low_risk() {
    let booking = booking("bk-1", "cust-1");
    let screen = anomaly::screen(&booking, &[], &config());
    let policy = policy_gate::evaluate(&booking, &screen.enrichment, None);

    let verdict = classifier::classify(screen, policy, None, None, &config());

    assert_eq!(verdict.classification, Classification::LowRisk);
    assert!(verdict.evidence.request.is_none());
}
