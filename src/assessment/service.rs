use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::anomaly;
use super::classifier::{self, Classification, EvidenceSummary, ResolutionAction};
use super::config::PipelineConfig;
use super::domain::{BookingId, BookingRecord, CustomerId, RefundReason};
use super::policy_gate;
use super::repository::{AssessmentRepository, RepositoryError};
use super::request_eval;
use super::risk_profile::{self, ProfileScore};

/// Wire-level assessment request: an agent submits identifiers and the
/// customer's claimed reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub customer_id: String,
    pub booking_id: String,
    pub refund_reason: String,
}

/// Wire-level order validation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderValidationRequest {
    pub customer_id: String,
    pub booking_id: String,
}

/// Compact booking summary returned by order validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub booking_id: BookingId,
    pub experience_name: String,
    pub scheduled_for: NaiveDateTime,
    pub experience_value: f64,
    pub refund_requested: bool,
}

/// Terminal response of one assessment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentOutcome {
    pub classification: Classification,
    /// Final risk score; present only for the scored bands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<u8>,
    pub recommended_action: String,
    pub resolution_options: Vec<ResolutionAction>,
    /// Plain-language digest of the strongest factors, for agent tooling.
    pub key_factors: Vec<String>,
    pub mitigating_factors: Vec<String>,
    pub evidence: EvidenceSummary,
}

/// Error taxonomy for the assessment entry point. Failures abort the whole
/// run; a silently-downgraded verdict is worse than a visible failure.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("booking '{0}' not found")]
    BookingNotFound(BookingId),
    #[error("customer '{0}' not found")]
    CustomerNotFound(CustomerId),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    DataAccess(#[from] RepositoryError),
}

/// Orchestrates the four-stage pipeline over a repository snapshot.
///
/// Each assessment is a pure, synchronous computation over data fetched for
/// that request; the service holds no mutable state and performs no writes.
pub struct AssessmentService<R> {
    repository: Arc<R>,
    config: PipelineConfig,
}

impl<R> AssessmentService<R>
where
    R: AssessmentRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: PipelineConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Confirm a booking exists and belongs to the claimed customer.
    pub fn validate_order(
        &self,
        request: &OrderValidationRequest,
    ) -> Result<OrderSummary, AssessmentError> {
        let (customer_id, booking_id) =
            parse_identifiers(&request.customer_id, &request.booking_id)?;
        let booking = self.fetch_booking(&customer_id, &booking_id)?;
        Ok(OrderSummary {
            booking_id: booking.booking_id.clone(),
            experience_name: booking.experience_name.clone(),
            scheduled_for: booking.scheduled_for,
            experience_value: booking.experience_value,
            refund_requested: booking.refund_requested_at.is_some(),
        })
    }

    /// Run the full pipeline for one request.
    ///
    /// `now` is the externally supplied time reference: re-running with the
    /// same snapshot and the same `now` yields an identical verdict.
    pub fn assess(
        &self,
        request: &AssessmentRequest,
        now: NaiveDateTime,
    ) -> Result<AssessmentOutcome, AssessmentError> {
        let (customer_id, booking_id) =
            parse_identifiers(&request.customer_id, &request.booking_id)?;
        let claimed_reason: RefundReason = request
            .refund_reason
            .parse()
            .map_err(|err: super::domain::UnknownReason| {
                AssessmentError::InvalidInput(err.to_string())
            })?;

        let mut booking = self.fetch_booking(&customer_id, &booking_id)?;
        // The reason claimed at assessment time overrides the stored value.
        booking.refund_reason = Some(claimed_reason);

        let profile = self
            .repository
            .customer_profile(&customer_id)?
            .ok_or_else(|| AssessmentError::CustomerNotFound(customer_id.clone()))?;

        let cluster = self
            .repository
            .refund_requests_for_experience_date(&booking.experience_id, booking.scheduled_date())?;
        let screen = anomaly::screen(&booking, &cluster, &self.config);

        let policy = policy_gate::evaluate(&booking, &screen.enrichment, Some(&profile));

        let (profile_score, request_score) = if screen.is_anomaly() || policy.resolved() {
            (None, None)
        } else {
            let history = self.repository.booking_history(&customer_id)?;
            let scored = risk_profile::score_history(&history, &profile, now, &self.config);
            let request_score =
                request_eval::evaluate(&booking, &screen.enrichment, scored.score(), &self.config);
            (Some(scored), Some(request_score))
        };

        let verdict = classifier::classify(
            screen,
            policy,
            profile_score,
            request_score,
            &self.config,
        );

        let risk_score = match verdict.classification {
            Classification::LowRisk | Classification::MediumRisk | Classification::HighRisk => {
                verdict.evidence.request.as_ref().map(|r| r.final_score)
            }
            _ => None,
        };

        info!(
            booking = %booking_id,
            customer = %customer_id,
            classification = verdict.classification.label(),
            score = risk_score,
            "assessment complete"
        );

        Ok(AssessmentOutcome {
            classification: verdict.classification,
            risk_score,
            recommended_action: verdict.recommended_action,
            resolution_options: verdict.resolution_options,
            key_factors: key_factors(&verdict.evidence),
            mitigating_factors: verdict
                .evidence
                .request
                .as_ref()
                .map(|r| r.mitigating_factors.clone())
                .unwrap_or_default(),
            evidence: verdict.evidence,
        })
    }

    fn fetch_booking(
        &self,
        customer_id: &CustomerId,
        booking_id: &BookingId,
    ) -> Result<BookingRecord, AssessmentError> {
        let booking = self
            .repository
            .booking(booking_id)?
            .ok_or_else(|| AssessmentError::BookingNotFound(booking_id.clone()))?;
        if &booking.customer_id != customer_id {
            return Err(AssessmentError::InvalidInput(format!(
                "booking '{booking_id}' does not belong to customer '{customer_id}'"
            )));
        }
        Ok(booking)
    }
}

fn parse_identifiers(
    customer_id: &str,
    booking_id: &str,
) -> Result<(CustomerId, BookingId), AssessmentError> {
    let customer_id = customer_id.trim();
    let booking_id = booking_id.trim();
    if customer_id.is_empty() {
        return Err(AssessmentError::InvalidInput(
            "customer_id must not be blank".to_string(),
        ));
    }
    if booking_id.is_empty() {
        return Err(AssessmentError::InvalidInput(
            "booking_id must not be blank".to_string(),
        ));
    }
    Ok((
        CustomerId(customer_id.to_string()),
        BookingId(booking_id.to_string()),
    ))
}

/// Flatten the strongest Stage 2/3 factors into agent-readable lines.
fn key_factors(evidence: &EvidenceSummary) -> Vec<String> {
    let mut factors = Vec::new();
    if let Some(ProfileScore::Scored(scored)) = &evidence.profile {
        let baseline = &scored.baseline;
        factors.push(format!(
            "Refund rate of {:.0}% across {} bookings",
            baseline.refund_rate * 100.0,
            baseline.total_bookings
        ));
        if baseline.no_show_claims > 0 {
            if baseline.contradicted_claims > 0 {
                factors.push(format!(
                    "{} prior no-show claims ({} contradicted by check-in evidence)",
                    baseline.no_show_claims, baseline.contradicted_claims
                ));
            } else {
                factors.push(format!(
                    "{} prior no-show claims (not contradicted by check-in evidence)",
                    baseline.no_show_claims
                ));
            }
        }
    }
    if let Some(request) = &evidence.request {
        factors.extend(request.flags.iter().map(|flag| flag_line(*flag)));
    }
    factors
}

fn flag_line(flag: super::request_eval::RequestFlag) -> String {
    use super::request_eval::RequestFlag;
    match flag {
        RequestFlag::NonCancelableProduct => "non cancelable product",
        RequestFlag::PostExperienceClaim => "post experience claim",
        RequestFlag::HighValueExperience => "high value experience",
        RequestFlag::ConfirmationNeverSent => "confirmation never sent",
        RequestFlag::CheckinContradictsNoShow => "check-in contradicts no-show",
    }
    .to_string()
}
