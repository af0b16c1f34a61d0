//! Stage 3: request-level evaluation.
//!
//! Applies sequential modifiers to the Stage 2 baseline (or the first-time
//! default), recording each one — applied or not, and why — for audit.

use serde::{Deserialize, Serialize};

use super::anomaly::Enrichment;
use super::config::PipelineConfig;
use super::domain::{
    BookingRecord, ConfirmationTurnaround, RefundReason, RefundabilityClass, SupplierChannel,
};

/// Stage 3 output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestScore {
    /// Running score clamped to [0,100] and rounded to the nearest integer.
    pub final_score: u8,
    /// Baseline the modifier chain started from; None for first-time
    /// customers (the configured default was used instead).
    pub base_score: Option<u8>,
    pub first_time: bool,
    pub flags: Vec<RequestFlag>,
    pub mitigating_factors: Vec<String>,
    pub modifiers: Vec<ModifierTrace>,
}

/// Request-specific conditions the modifier chain observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestFlag {
    NonCancelableProduct,
    PostExperienceClaim,
    HighValueExperience,
    ConfirmationNeverSent,
    CheckinContradictsNoShow,
}

/// Audit record for one modifier in the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierTrace {
    pub modifier: String,
    pub applied: bool,
    pub effect: Option<String>,
    pub reason: String,
}

impl ModifierTrace {
    fn applied(modifier: impl Into<String>, effect: String, reason: impl Into<String>) -> Self {
        Self {
            modifier: modifier.into(),
            applied: true,
            effect: Some(effect),
            reason: reason.into(),
        }
    }

    fn skipped(modifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            modifier: modifier.into(),
            applied: false,
            effect: None,
            reason: reason.into(),
        }
    }
}

/// Evaluate the current request against the baseline score.
pub fn evaluate(
    booking: &BookingRecord,
    enrichment: &Enrichment,
    baseline: Option<u8>,
    config: &PipelineConfig,
) -> RequestScore {
    let first_time = baseline.is_none();
    let mut score = match baseline {
        Some(base) => f64::from(base),
        None => config.first_time_base_score,
    };

    let mut flags = Vec::new();
    let mut mitigating = Vec::new();
    let mut modifiers = Vec::new();

    if first_time {
        mitigating.push(format!(
            "First-time customer — limited data, base score of {:.0} applied",
            config.first_time_base_score
        ));
    }

    // 1. Non-cancelable product amplifier.
    let amplifier_label = format!(
        "Non-cancelable amplifier ({}x)",
        config.non_cancelable_amplifier
    );
    if booking.refundability == RefundabilityClass::NonCancelable {
        flags.push(RequestFlag::NonCancelableProduct);
        let before = score;
        score *= config.non_cancelable_amplifier;
        modifiers.push(ModifierTrace::applied(
            amplifier_label,
            format!(
                "Score {before:.0} × {} = {score:.0}",
                config.non_cancelable_amplifier
            ),
            "Product is non-cancelable",
        ));
    } else {
        modifiers.push(ModifierTrace::skipped(
            amplifier_label,
            format!("Product is {}", booking.refundability.label()),
        ));
    }

    // 2. Post-experience timing modifier.
    let timing_label = format!(
        "Post-experience modifier ({}x)",
        config.post_experience_modifier
    );
    if booking.post_experience_claim() {
        flags.push(RequestFlag::PostExperienceClaim);
        let before = score;
        score *= config.post_experience_modifier;
        modifiers.push(ModifierTrace::applied(
            timing_label,
            format!(
                "Score {before:.0} × {} = {score:.0}",
                config.post_experience_modifier
            ),
            "Refund requested after experience date",
        ));
    } else {
        modifiers.push(ModifierTrace::skipped(
            timing_label,
            "Refund requested before experience date",
        ));
    }

    // 3. High-value item bonus.
    let value_label = format!("High-value experience (+{:.0})", config.high_value_bonus);
    match booking.experience_value_percentile {
        Some(percentile) if percentile > config.high_value_percentile => {
            flags.push(RequestFlag::HighValueExperience);
            score += config.high_value_bonus;
            modifiers.push(ModifierTrace::applied(
                value_label,
                format!("+{:.0} points", config.high_value_bonus),
                format!("{percentile}th percentile"),
            ));
        }
        Some(percentile) => {
            modifiers.push(ModifierTrace::skipped(
                value_label,
                format!("{percentile}th percentile"),
            ));
        }
        None => {
            modifiers.push(ModifierTrace::skipped(value_label, "Unknown percentile"));
        }
    }

    // 4/5. Confirmation delivery evidence for this booking. Absence of
    // delivery is mitigating, not incriminating — the customer cannot act on
    // what they never received.
    if !enrichment.confirmation_sent {
        flags.push(RequestFlag::ConfirmationNeverSent);
        mitigating.push("Confirmation was never delivered".to_string());
        score -= config.confirmation_never_sent_relief;
        modifiers.push(ModifierTrace::applied(
            format!(
                "Confirmation never sent (-{:.0})",
                config.confirmation_never_sent_relief
            ),
            format!("-{:.0} points", config.confirmation_never_sent_relief),
            "Confirmation was never delivered to customer",
        ));
    } else if enrichment.confirmation_opened == Some(false) {
        score += config.unopened_confirmation_bonus;
        modifiers.push(ModifierTrace::applied(
            format!(
                "Confirmation sent but not opened (+{:.0})",
                config.unopened_confirmation_bonus
            ),
            format!("+{:.0} points", config.unopened_confirmation_bonus),
            "Confirmation was sent but not opened",
        ));
    } else {
        modifiers.push(ModifierTrace::skipped(
            "Confirmation engagement",
            "Confirmation was delivered and opened",
        ));
    }

    // 6. Check-in contradiction. Redundant safety net — the policy gate
    // should already have caught this combination.
    if enrichment.checkin_confirmed == Some(true)
        && booking.refund_reason == Some(RefundReason::NoShow)
    {
        flags.push(RequestFlag::CheckinContradictsNoShow);
        score += config.checkin_contradiction_penalty;
        modifiers.push(ModifierTrace::applied(
            format!(
                "Check-in contradicts no-show (+{:.0})",
                config.checkin_contradiction_penalty
            ),
            format!("+{:.0} points", config.checkin_contradiction_penalty),
            "Check-in confirmed but customer claims no-show",
        ));
    }

    // 7. Supplier channel relief. Last-minute marketplaces have a
    // structurally higher rate of legitimate service failures.
    let supplier_label = format!(
        "Last-minute marketplace supplier (-{:.0})",
        config.marketplace_relief
    );
    if enrichment.supplier_channel == SupplierChannel::LastMinuteMarketplace {
        mitigating.push(
            "Booking from last-minute marketplace supplier (higher likelihood of legitimate issues)"
                .to_string(),
        );
        score -= config.marketplace_relief;
        modifiers.push(ModifierTrace::applied(
            supplier_label,
            format!("-{:.0} points", config.marketplace_relief),
            "Higher likelihood of legitimate issues",
        ));
    } else {
        modifiers.push(ModifierTrace::skipped(
            supplier_label,
            format!("Supplier is {}", enrichment.supplier_channel.label()),
        ));
    }

    if matches!(
        enrichment.supplier_channel,
        SupplierChannel::Aggregator | SupplierChannel::LastMinuteMarketplace
    ) && (!enrichment.confirmation_sent
        || enrichment.confirmation_tat_promised == ConfirmationTurnaround::Variable)
    {
        mitigating.push("Booking from unreliable supplier with variable confirmation".to_string());
    }

    RequestScore {
        final_score: score.round().clamp(0.0, 100.0) as u8,
        base_score: baseline,
        first_time,
        flags,
        mitigating_factors: mitigating,
        modifiers,
    }
}
