use serde::{Deserialize, Serialize};

/// Maximum contribution of each behavioral signal, in score points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub refund_frequency: u8,
    pub no_show_history: u8,
    pub email_engagement: u8,
    pub refund_timing: u8,
    pub experience_value: u8,
    pub tenure: u8,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            refund_frequency: 30,
            no_show_history: 25,
            email_engagement: 15,
            refund_timing: 15,
            experience_value: 8,
            tenure: 7,
        }
    }
}

/// Every threshold and weight the pipeline consults. Loaded once at startup,
/// validated, and passed immutably into each stage call so concurrent
/// assessments with different snapshots stay isolated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Distinct same-experience same-date refund requests that constitute a
    /// vendor-side anomaly.
    pub anomaly_min_count: usize,
    pub weights: SignalWeights,
    /// Recency-weighted refund rate above which the frequency signal maxes out.
    pub refund_rate_high_risk: f64,
    /// Recency-weighted refund rate below which the frequency signal is zero.
    pub refund_rate_low_risk: f64,
    /// Events this recent count at full weight.
    pub recency_full_weight_days: i64,
    /// Events between the full-weight boundary and this age count at the mid
    /// weight; anything older gets the floor weight.
    pub recency_decay_days: i64,
    pub recency_mid_weight: f64,
    pub recency_min_weight: f64,
    pub non_cancelable_amplifier: f64,
    pub post_experience_modifier: f64,
    /// Catalog value percentile above which the flat high-value bonus applies.
    pub high_value_percentile: u8,
    pub high_value_bonus: f64,
    pub confirmation_never_sent_relief: f64,
    pub unopened_confirmation_bonus: f64,
    pub checkin_contradiction_penalty: f64,
    pub marketplace_relief: f64,
    /// Starting score for customers with no usable history.
    pub first_time_base_score: f64,
    /// Final scores strictly below this classify as low risk.
    pub low_risk_ceiling: u8,
    /// Final scores at or above this classify as high risk.
    pub high_risk_floor: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            anomaly_min_count: 3,
            weights: SignalWeights::default(),
            refund_rate_high_risk: 0.40,
            refund_rate_low_risk: 0.10,
            recency_full_weight_days: 90,
            recency_decay_days: 180,
            recency_mid_weight: 0.6,
            recency_min_weight: 0.3,
            non_cancelable_amplifier: 1.3,
            post_experience_modifier: 1.2,
            high_value_percentile: 85,
            high_value_bonus: 5.0,
            confirmation_never_sent_relief: 15.0,
            unopened_confirmation_bonus: 3.0,
            checkin_contradiction_penalty: 25.0,
            marketplace_relief: 5.0,
            first_time_base_score: 15.0,
            low_risk_ceiling: 30,
            high_risk_floor: 60,
        }
    }
}

impl PipelineConfig {
    /// Reject configurations the pipeline cannot score sensibly with.
    /// Called once at startup; a failure here must never reach a request.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.anomaly_min_count < 2 {
            return Err(ConfigurationError::AnomalyMinCount(self.anomaly_min_count));
        }
        if !(0.0..=1.0).contains(&self.refund_rate_low_risk)
            || !(0.0..=1.0).contains(&self.refund_rate_high_risk)
            || self.refund_rate_low_risk >= self.refund_rate_high_risk
        {
            return Err(ConfigurationError::RefundRateBand {
                low: self.refund_rate_low_risk,
                high: self.refund_rate_high_risk,
            });
        }
        if self.recency_full_weight_days <= 0
            || self.recency_decay_days <= self.recency_full_weight_days
        {
            return Err(ConfigurationError::RecencyBuckets {
                full: self.recency_full_weight_days,
                decay: self.recency_decay_days,
            });
        }
        for (name, weight) in [
            ("recency_mid_weight", self.recency_mid_weight),
            ("recency_min_weight", self.recency_min_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigurationError::DecayWeight { name, value: weight });
            }
        }
        if self.recency_min_weight > self.recency_mid_weight {
            return Err(ConfigurationError::DecayWeight {
                name: "recency_min_weight",
                value: self.recency_min_weight,
            });
        }
        for (name, value) in [
            ("non_cancelable_amplifier", self.non_cancelable_amplifier),
            ("post_experience_modifier", self.post_experience_modifier),
        ] {
            if value < 1.0 || !value.is_finite() {
                return Err(ConfigurationError::Amplifier { name, value });
            }
        }
        if self.high_value_percentile > 100 {
            return Err(ConfigurationError::Percentile(self.high_value_percentile));
        }
        let total_weight = u32::from(self.weights.refund_frequency)
            + u32::from(self.weights.no_show_history)
            + u32::from(self.weights.email_engagement)
            + u32::from(self.weights.refund_timing)
            + u32::from(self.weights.experience_value)
            + u32::from(self.weights.tenure);
        if total_weight == 0 || total_weight > 100 {
            return Err(ConfigurationError::SignalWeightSum(total_weight));
        }
        if self.low_risk_ceiling >= self.high_risk_floor || self.high_risk_floor > 100 {
            return Err(ConfigurationError::RiskBands {
                low_ceiling: self.low_risk_ceiling,
                high_floor: self.high_risk_floor,
            });
        }
        if !(0.0..=100.0).contains(&self.first_time_base_score) {
            return Err(ConfigurationError::FirstTimeBase(self.first_time_base_score));
        }
        Ok(())
    }
}

/// A required threshold or weight is missing or out of range. Fatal at
/// startup, never raised mid-request.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("anomaly_min_count must be at least 2, got {0}")]
    AnomalyMinCount(usize),
    #[error("refund rate band invalid: low {low} must be below high {high}, both within [0,1]")]
    RefundRateBand { low: f64, high: f64 },
    #[error("recency buckets invalid: full-weight {full} days must be positive and below decay {decay} days")]
    RecencyBuckets { full: i64, decay: i64 },
    #[error("{name} must be within [0,1] and not above the mid weight, got {value}")]
    DecayWeight { name: &'static str, value: f64 },
    #[error("{name} must be a finite multiplier of at least 1.0, got {value}")]
    Amplifier { name: &'static str, value: f64 },
    #[error("high_value_percentile must be at most 100, got {0}")]
    Percentile(u8),
    #[error("signal weights must sum to a value in [1,100], got {0}")]
    SignalWeightSum(u32),
    #[error("risk bands invalid: low ceiling {low_ceiling} must be below high floor {high_floor} (max 100)")]
    RiskBands { low_ceiling: u8, high_floor: u8 },
    #[error("first_time_base_score must be within [0,100], got {0}")]
    FirstTimeBase(f64),
}
