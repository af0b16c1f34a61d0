//! Stage 2: behavioral risk scorer.
//!
//! Six independently weighted, recency-decayed signals over the customer's
//! full booking history, summed and clamped to [0,100]. The score is advisory
//! input to Stage 3, not itself the final verdict.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::config::PipelineConfig;
use super::domain::{BookingRecord, CustomerProfile, RefundReason};

// Interior tier values of the scoring algorithm. These are fixed constants;
// only the per-signal maximums are configurable.
const NO_SHOW_SINGLE_CLEAN: i16 = 8;
const NO_SHOW_SINGLE_CONTRADICTED: i16 = 18;
const NO_SHOW_MIXED: i16 = 15;
const EMAIL_LOW_ENGAGEMENT: i16 = 8;
const EMAIL_MODERATE_ENGAGEMENT: i16 = 3;
const TIMING_MIXED: i16 = 8;
const VALUE_MODERATE: i16 = 4;
const TENURE_REDUCER: i16 = -5;
const FREQUENCY_INTERPOLATION_SPAN: f64 = 25.0;
const VALUE_HIGH_PERCENTILE: f64 = 85.0;
const VALUE_MODERATE_PERCENTILE: f64 = 60.0;
const NEW_ACCOUNT_MONTHS: f64 = 6.0;
const TENURED_ACCOUNT_MONTHS: f64 = 24.0;
const NEW_ACCOUNT_RATE: f64 = 0.30;
const TENURED_ACCOUNT_RATE: f64 = 0.15;
const DAYS_PER_MONTH: f64 = 30.44;

/// Stage 2 output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProfileScore {
    /// Customer history too thin to score; Stage 3 falls back to the
    /// first-time default.
    InsufficientData { baseline: Option<LifetimeBaseline> },
    Scored(ScoredProfile),
}

impl ProfileScore {
    pub fn score(&self) -> Option<u8> {
        match self {
            ProfileScore::InsufficientData { .. } => None,
            ProfileScore::Scored(scored) => Some(scored.score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredProfile {
    pub score: u8,
    pub signals: Vec<SignalContribution>,
    pub baseline: LifetimeBaseline,
    pub recency: RecencySummary,
}

/// One signal's contribution, carried forward so downstream narrators can
/// explain the verdict without recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalContribution {
    pub signal: Signal,
    pub raw_value: String,
    pub weight: u8,
    pub score: i16,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    RefundFrequency,
    NoShowHistory,
    EmailEngagement,
    RefundTiming,
    ExperienceValue,
    Tenure,
}

impl Signal {
    pub fn label(&self) -> &'static str {
        match self {
            Signal::RefundFrequency => "Refund Frequency",
            Signal::NoShowHistory => "No-Show + Refund Claims",
            Signal::EmailEngagement => "Email Engagement",
            Signal::RefundTiming => "Refund Timing",
            Signal::ExperienceValue => "Experience Value",
            Signal::Tenure => "Tenure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeBaseline {
    pub total_bookings: usize,
    pub total_refunds: usize,
    pub refund_rate: f64,
    pub no_show_claims: u32,
    pub contradicted_claims: u32,
}

/// Refund requests bucketed by age relative to the assessment time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecencySummary {
    pub full_weight_window: usize,
    pub decay_window: usize,
    pub beyond_decay: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecencyBucket {
    Recent,
    Mid,
    Old,
}

fn bucket_for(timestamp: Option<NaiveDateTime>, now: NaiveDateTime, config: &PipelineConfig) -> RecencyBucket {
    let days = match timestamp {
        Some(ts) => (now - ts).num_days(),
        // No timestamp: treat as ancient so it only gets the floor weight.
        None => return RecencyBucket::Old,
    };
    if days <= config.recency_full_weight_days {
        RecencyBucket::Recent
    } else if days <= config.recency_decay_days {
        RecencyBucket::Mid
    } else {
        RecencyBucket::Old
    }
}

fn bucket_counts<'a, I>(timestamps: I, now: NaiveDateTime, config: &PipelineConfig) -> (usize, usize, usize)
where
    I: Iterator<Item = Option<NaiveDateTime>>,
{
    let mut counts = (0, 0, 0);
    for ts in timestamps {
        match bucket_for(ts, now, config) {
            RecencyBucket::Recent => counts.0 += 1,
            RecencyBucket::Mid => counts.1 += 1,
            RecencyBucket::Old => counts.2 += 1,
        }
    }
    counts
}

fn weighted_count(counts: (usize, usize, usize), config: &PipelineConfig) -> f64 {
    counts.0 as f64 + counts.1 as f64 * config.recency_mid_weight
        + counts.2 as f64 * config.recency_min_weight
}

/// Score one customer's history. Callers with fewer than two bookings and no
/// prior refund receive an insufficient-data result with no score.
pub fn score_history(
    history: &[BookingRecord],
    profile: &CustomerProfile,
    now: NaiveDateTime,
    config: &PipelineConfig,
) -> ProfileScore {
    if history.is_empty() {
        return ProfileScore::InsufficientData { baseline: None };
    }

    let total_bookings = history.len();
    let refunds: Vec<&BookingRecord> = history
        .iter()
        .filter(|b| b.refund_requested_at.is_some())
        .collect();
    let total_refunds = refunds.len();
    let refund_rate = total_refunds as f64 / total_bookings as f64;

    let baseline = LifetimeBaseline {
        total_bookings,
        total_refunds,
        refund_rate,
        no_show_claims: profile.total_no_show_refund_claims,
        contradicted_claims: profile.no_show_claims_contradicted,
    };

    if total_bookings <= 1 && total_refunds == 0 {
        return ProfileScore::InsufficientData {
            baseline: Some(baseline),
        };
    }

    let refund_buckets = bucket_counts(refunds.iter().map(|b| b.refund_requested_at), now, config);
    let booking_buckets = bucket_counts(history.iter().map(|b| Some(b.scheduled_for)), now, config);

    let recency = RecencySummary {
        full_weight_window: refund_buckets.0,
        decay_window: refund_buckets.1,
        beyond_decay: refund_buckets.2,
    };

    let mut signals = Vec::with_capacity(6);

    // Signal 1: refund frequency, recency-weighted.
    //
    // The denominator is the recency-weighted booking count, not the lifetime
    // total; with sparse histories this can diverge from the lifetime rate
    // and that divergence is intentional.
    let weighted_refunds = weighted_count(refund_buckets, config);
    let weighted_bookings = weighted_count(booking_buckets, config);
    let weighted_rate = if weighted_bookings > 0.0 {
        weighted_refunds / weighted_bookings
    } else {
        refund_rate
    };

    let frequency_weight = config.weights.refund_frequency;
    let frequency_score = if weighted_rate > config.refund_rate_high_risk {
        i16::from(frequency_weight)
    } else if weighted_rate > config.refund_rate_low_risk {
        let proportion = (weighted_rate - config.refund_rate_low_risk)
            / (config.refund_rate_high_risk - config.refund_rate_low_risk);
        (proportion * FREQUENCY_INTERPOLATION_SPAN).round() as i16
    } else {
        0
    };
    signals.push(SignalContribution {
        signal: Signal::RefundFrequency,
        raw_value: format!(
            "{:.1}% ({}/{})",
            refund_rate * 100.0,
            total_refunds,
            total_bookings
        ),
        weight: frequency_weight,
        score: frequency_score,
        explanation: format!(
            "Refund rate {:.1}% overall, {:.1}% recency-weighted. {}",
            refund_rate * 100.0,
            weighted_rate * 100.0,
            if weighted_rate > config.refund_rate_high_risk {
                format!("Exceeds {:.0}% threshold.", config.refund_rate_high_risk * 100.0)
            } else if weighted_rate < config.refund_rate_low_risk {
                format!("Below {:.0}% — risk-reducing.", config.refund_rate_low_risk * 100.0)
            } else {
                "Moderate range.".to_string()
            }
        ),
    });

    // Signal 2: no-show claim history, tiered by count and contradictions.
    let no_show = profile.total_no_show_refund_claims;
    let contradicted = profile.no_show_claims_contradicted;
    let no_show_weight = config.weights.no_show_history;
    let no_show_score = match (no_show, contradicted) {
        (0, _) => 0,
        (1, 0) => NO_SHOW_SINGLE_CLEAN,
        (1, _) => NO_SHOW_SINGLE_CONTRADICTED,
        (_, c) if c > 0 => i16::from(no_show_weight),
        _ => NO_SHOW_MIXED,
    };
    signals.push(SignalContribution {
        signal: Signal::NoShowHistory,
        raw_value: format!("{no_show} claims, {contradicted} contradicted"),
        weight: no_show_weight,
        score: no_show_score,
        explanation: if contradicted > 0 {
            format!("{no_show} no-show refund claims, {contradicted} contradicted by check-in evidence.")
        } else {
            format!("{no_show} no-show refund claims.")
        },
    });

    // Signal 3: confirmation e-mail engagement across past bookings.
    let with_delivery: Vec<&BookingRecord> = history
        .iter()
        .filter(|b| b.confirmation_opened.is_some())
        .collect();
    let open_rate = if with_delivery.is_empty() {
        // No delivery data at all: neutral.
        0.5
    } else {
        let opened = with_delivery
            .iter()
            .filter(|b| b.confirmation_opened == Some(true))
            .count();
        opened as f64 / with_delivery.len() as f64
    };
    let email_weight = config.weights.email_engagement;
    let email_score = if open_rate == 0.0 {
        i16::from(email_weight)
    } else if open_rate < 0.5 {
        EMAIL_LOW_ENGAGEMENT
    } else if open_rate < 0.8 {
        EMAIL_MODERATE_ENGAGEMENT
    } else {
        0
    };
    signals.push(SignalContribution {
        signal: Signal::EmailEngagement,
        raw_value: format!("{:.0}% confirmations opened", open_rate * 100.0),
        weight: email_weight,
        score: email_score,
        explanation: format!(
            "{:.0}% of confirmation emails opened. {}",
            open_rate * 100.0,
            if open_rate == 0.0 {
                "Never engaged — suspicious."
            } else if open_rate >= 0.8 {
                "High engagement — risk-reducing."
            } else {
                "Moderate engagement."
            }
        ),
    });

    // Signal 4: refund timing relative to the scheduled date.
    let mut post_experience = 0usize;
    let mut pre_experience = 0usize;
    for booking in &refunds {
        if let Some(requested) = booking.refund_requested_at {
            if requested > booking.scheduled_for {
                post_experience += 1;
            } else {
                pre_experience += 1;
            }
        }
    }
    let timed = post_experience + pre_experience;
    let post_ratio = if timed > 0 {
        post_experience as f64 / timed as f64
    } else {
        0.0
    };
    let timing_weight = config.weights.refund_timing;
    let timing_score = if post_ratio > 0.7 {
        i16::from(timing_weight)
    } else if post_ratio > 0.3 {
        TIMING_MIXED
    } else {
        0
    };
    signals.push(SignalContribution {
        signal: Signal::RefundTiming,
        raw_value: format!("{post_experience} post-exp, {pre_experience} pre-exp"),
        weight: timing_weight,
        score: timing_score,
        explanation: format!(
            "{:.0}% of refunds are post-experience claims. {}",
            post_ratio * 100.0,
            if post_ratio > 0.7 {
                "Primarily post-experience — suspicious."
            } else if post_ratio <= 0.3 {
                "Primarily pre-experience — lower risk."
            } else {
                "Mixed timing pattern."
            }
        ),
    });

    // Signal 5: average value percentile of refunded items.
    let refunded_percentiles: Vec<f64> = refunds
        .iter()
        .filter_map(|b| b.experience_value_percentile)
        .map(f64::from)
        .collect();
    let avg_percentile = if refunded_percentiles.is_empty() {
        50.0
    } else {
        refunded_percentiles.iter().sum::<f64>() / refunded_percentiles.len() as f64
    };
    let value_weight = config.weights.experience_value;
    let value_score = if avg_percentile > VALUE_HIGH_PERCENTILE {
        i16::from(value_weight)
    } else if avg_percentile > VALUE_MODERATE_PERCENTILE {
        VALUE_MODERATE
    } else {
        0
    };
    signals.push(SignalContribution {
        signal: Signal::ExperienceValue,
        raw_value: format!("Avg {avg_percentile:.0}th percentile"),
        weight: value_weight,
        score: value_score,
        explanation: format!(
            "Average refunded experience at {avg_percentile:.0}th percentile. {}",
            if avg_percentile > VALUE_HIGH_PERCENTILE {
                "High-value targeting."
            } else if avg_percentile <= VALUE_MODERATE_PERCENTILE {
                "Normal range."
            } else {
                "Moderate value range."
            }
        ),
    });

    // Signal 6: account tenure. The only signal that can subtract.
    let account_age_months = (now - profile.account_created_at).num_days() as f64 / DAYS_PER_MONTH;
    let tenure_weight = config.weights.tenure;
    let tenure_score = if account_age_months < NEW_ACCOUNT_MONTHS && refund_rate > NEW_ACCOUNT_RATE
    {
        i16::from(tenure_weight)
    } else if account_age_months > TENURED_ACCOUNT_MONTHS && refund_rate < TENURED_ACCOUNT_RATE {
        TENURE_REDUCER
    } else {
        0
    };
    signals.push(SignalContribution {
        signal: Signal::Tenure,
        raw_value: format!("{account_age_months:.0} months, {total_bookings} bookings"),
        weight: tenure_weight,
        score: tenure_score,
        explanation: format!(
            "Account age {account_age_months:.0} months. {}",
            if tenure_score > 0 {
                "New account with high refund rate — suspicious."
            } else if tenure_score < 0 {
                "Long tenure with low refund rate — risk reducer."
            } else {
                "Neutral tenure profile."
            }
        ),
    });

    let raw: i16 = signals.iter().map(|s| s.score).sum();
    let score = raw.clamp(0, 100) as u8;

    ProfileScore::Scored(ScoredProfile {
        score,
        signals,
        baseline,
        recency,
    })
}
