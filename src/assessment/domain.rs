use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for customers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

/// Identifier wrapper for individual bookings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(pub String);

/// Identifier wrapper for sellable experiences (catalog items).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperienceId(pub String);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ExperienceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Reason a customer gives when filing a refund claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    NoShow,
    Cancellation,
    PartialService,
    TechnicalIssue,
    Other,
}

impl RefundReason {
    pub fn label(&self) -> &'static str {
        match self {
            RefundReason::NoShow => "no_show",
            RefundReason::Cancellation => "cancellation",
            RefundReason::PartialService => "partial_service",
            RefundReason::TechnicalIssue => "technical_issue",
            RefundReason::Other => "other",
        }
    }
}

impl FromStr for RefundReason {
    type Err = UnknownReason;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "no_show" => Ok(RefundReason::NoShow),
            "cancellation" => Ok(RefundReason::Cancellation),
            "partial_service" => Ok(RefundReason::PartialService),
            "technical_issue" => Ok(RefundReason::TechnicalIssue),
            "other" => Ok(RefundReason::Other),
            _ => Err(UnknownReason(raw.to_string())),
        }
    }
}

/// Raised when a claimed reason is outside the supported enumeration.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown refund reason '{0}'")]
pub struct UnknownReason(pub String);

/// Refundability class attached to a product at purchase time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundabilityClass {
    Cancelable,
    PartiallyRefundable,
    NonCancelable,
}

impl RefundabilityClass {
    pub fn label(&self) -> &'static str {
        match self {
            RefundabilityClass::Cancelable => "cancelable",
            RefundabilityClass::PartiallyRefundable => "partially_refundable",
            RefundabilityClass::NonCancelable => "non_cancelable",
        }
    }
}

/// Sourcing channel the experience was purchased through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierChannel {
    DirectContract,
    Aggregator,
    LastMinuteMarketplace,
}

impl SupplierChannel {
    pub fn label(&self) -> &'static str {
        match self {
            SupplierChannel::DirectContract => "direct_contract",
            SupplierChannel::Aggregator => "aggregator",
            SupplierChannel::LastMinuteMarketplace => "last_minute_marketplace",
        }
    }

    /// Inventory model implied by the channel.
    pub fn inventory(&self) -> InventoryKind {
        match self {
            SupplierChannel::DirectContract => InventoryKind::Fixed,
            SupplierChannel::Aggregator => InventoryKind::Dynamic,
            SupplierChannel::LastMinuteMarketplace => InventoryKind::Variable,
        }
    }
}

/// How the supplier sources the inventory backing a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryKind {
    Fixed,
    Dynamic,
    Variable,
}

/// Confirmation turnaround the supplier promises at purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationTurnaround {
    Immediate,
    #[serde(rename = "2hr")]
    TwoHour,
    Variable,
}

/// One purchased item instance with its refund lifecycle fields.
///
/// Immutable once created except for the refund-related fields and the agent
/// annotation, which are appended when a claim is filed or resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub booking_id: BookingId,
    pub customer_id: CustomerId,
    pub experience_id: ExperienceId,
    pub experience_name: String,
    pub experience_category: String,
    pub experience_value: f64,
    /// Value percentile of the item within the catalog, 0-100.
    pub experience_value_percentile: Option<u8>,
    pub supplier_channel: SupplierChannel,
    pub confirmation_tat_promised: ConfirmationTurnaround,
    pub confirmation_sent_at: Option<NaiveDateTime>,
    pub confirmation_opened: Option<bool>,
    pub reminder_opened: Option<bool>,
    pub checkin_confirmed: Option<bool>,
    /// Scheduled date and start time of the experience.
    pub scheduled_for: NaiveDateTime,
    pub booking_created_at: NaiveDateTime,
    pub refund_requested_at: Option<NaiveDateTime>,
    pub refund_reason: Option<RefundReason>,
    pub cancellation_window_applicable: bool,
    pub refundability: RefundabilityClass,
    pub refund_policy_rate: Option<f64>,
    pub agent_annotation: Option<String>,
}

impl BookingRecord {
    pub fn scheduled_date(&self) -> NaiveDate {
        self.scheduled_for.date()
    }

    /// Whether the refund was filed after the scheduled experience date.
    pub fn post_experience_claim(&self) -> bool {
        match self.refund_requested_at {
            Some(requested) => requested > self.scheduled_for,
            None => false,
        }
    }
}

/// Coarse per-customer risk bucket maintained by prior reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBucket {
    Low,
    Watch,
    High,
}

impl RiskBucket {
    pub fn label(&self) -> &'static str {
        match self {
            RiskBucket::Low => "low",
            RiskBucket::Watch => "watch",
            RiskBucket::High => "high",
        }
    }
}

/// Aggregate view of one customer's booking and refund behavior.
///
/// The surrounding system recomputes these aggregates before handing the
/// profile to the pipeline; the pipeline treats it as a point-in-time
/// snapshot. Invariants: `total_refunds <= total_bookings` and
/// `no_show_claims_contradicted <= total_no_show_refund_claims`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub account_created_at: NaiveDateTime,
    pub total_bookings: u32,
    pub total_refunds: u32,
    pub refund_rate: f64,
    pub total_no_show_refund_claims: u32,
    pub no_show_claims_contradicted: u32,
    pub risk_bucket: Option<RiskBucket>,
    pub risk_score: Option<u8>,
    /// Sticky marker set only by prior manual review, never by scoring.
    pub confirmed_fraud_flag: bool,
    pub last_profile_computed_at: Option<NaiveDateTime>,
}
