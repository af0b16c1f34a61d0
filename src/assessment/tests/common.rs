use std::collections::HashMap;
use std::sync::Arc;

use axum::response::Response;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::assessment::anomaly::{self, Enrichment};
use crate::assessment::domain::{
    BookingId, BookingRecord, ConfirmationTurnaround, CustomerId, CustomerProfile, ExperienceId,
    RefundabilityClass, RiskBucket, SupplierChannel,
};
use crate::assessment::repository::{AssessmentRepository, RepositoryError};
use crate::assessment::{AssessmentService, PipelineConfig};

/// Fixed reference time so every scoring test is reproducible.
pub(super) fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 2, 26)
        .expect("valid date")
        .and_hms_opt(12, 0, 0)
        .expect("valid time")
}

pub(super) fn days_ago(days: i64) -> NaiveDateTime {
    now() - Duration::days(days)
}

pub(super) fn config() -> PipelineConfig {
    PipelineConfig::default()
}

/// Neutral booking: mid-catalog direct-contract item, confirmation delivered
/// and opened, no refund filed yet. Tests override the fields they exercise.
pub(super) fn booking(id: &str, customer: &str) -> BookingRecord {
    BookingRecord {
        booking_id: BookingId(id.to_string()),
        customer_id: CustomerId(customer.to_string()),
        experience_id: ExperienceId("exp-01".to_string()),
        experience_name: "Sunset Kayak Tour".to_string(),
        experience_category: "outdoor".to_string(),
        experience_value: 120.0,
        experience_value_percentile: Some(50),
        supplier_channel: SupplierChannel::DirectContract,
        confirmation_tat_promised: ConfirmationTurnaround::Immediate,
        confirmation_sent_at: Some(days_ago(10)),
        confirmation_opened: Some(true),
        reminder_opened: Some(true),
        checkin_confirmed: None,
        scheduled_for: days_ago(2),
        booking_created_at: days_ago(10),
        refund_requested_at: None,
        refund_reason: None,
        cancellation_window_applicable: false,
        refundability: RefundabilityClass::NonCancelable,
        refund_policy_rate: Some(0.0),
        agent_annotation: None,
    }
}

/// Established customer with unremarkable aggregates.
pub(super) fn profile(id: &str) -> CustomerProfile {
    CustomerProfile {
        customer_id: CustomerId(id.to_string()),
        customer_name: "Dana Reyes".to_string(),
        account_created_at: days_ago(730),
        total_bookings: 5,
        total_refunds: 1,
        refund_rate: 0.2,
        total_no_show_refund_claims: 0,
        no_show_claims_contradicted: 0,
        risk_bucket: Some(RiskBucket::Low),
        risk_score: Some(12),
        confirmed_fraud_flag: false,
        last_profile_computed_at: Some(days_ago(1)),
    }
}

pub(super) fn enrichment_for(booking: &BookingRecord) -> Enrichment {
    anomaly::screen(booking, &[], &config()).enrichment
}

/// In-memory repository backing service- and router-level tests.
#[derive(Default)]
pub(super) struct MemoryRepository {
    bookings: HashMap<BookingId, BookingRecord>,
    customers: HashMap<CustomerId, CustomerProfile>,
}

impl MemoryRepository {
    pub(super) fn with_booking(mut self, booking: BookingRecord) -> Self {
        self.bookings.insert(booking.booking_id.clone(), booking);
        self
    }

    pub(super) fn with_profile(mut self, profile: CustomerProfile) -> Self {
        self.customers.insert(profile.customer_id.clone(), profile);
        self
    }
}

impl AssessmentRepository for MemoryRepository {
    fn booking(&self, id: &BookingId) -> Result<Option<BookingRecord>, RepositoryError> {
        Ok(self.bookings.get(id).cloned())
    }

    fn refund_requests_for_experience_date(
        &self,
        experience_id: &ExperienceId,
        date: NaiveDate,
    ) -> Result<Vec<BookingId>, RepositoryError> {
        let mut ids: Vec<BookingId> = self
            .bookings
            .values()
            .filter(|b| {
                b.experience_id == *experience_id
                    && b.scheduled_for.date() == date
                    && b.refund_requested_at.is_some()
            })
            .map(|b| b.booking_id.clone())
            .collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ids)
    }

    fn customer_profile(
        &self,
        id: &CustomerId,
    ) -> Result<Option<CustomerProfile>, RepositoryError> {
        Ok(self.customers.get(id).cloned())
    }

    fn booking_history(&self, id: &CustomerId) -> Result<Vec<BookingRecord>, RepositoryError> {
        let mut history: Vec<BookingRecord> = self
            .bookings
            .values()
            .filter(|b| b.customer_id == *id)
            .cloned()
            .collect();
        history.sort_by_key(|b| b.scheduled_for);
        Ok(history)
    }
}

/// Repository that fails every read.
pub(super) struct UnavailableRepository;

impl AssessmentRepository for UnavailableRepository {
    fn booking(&self, _id: &BookingId) -> Result<Option<BookingRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable(
            "backing store offline".to_string(),
        ))
    }

    fn refund_requests_for_experience_date(
        &self,
        _experience_id: &ExperienceId,
        _date: NaiveDate,
    ) -> Result<Vec<BookingId>, RepositoryError> {
        Err(RepositoryError::Unavailable(
            "backing store offline".to_string(),
        ))
    }

    fn customer_profile(
        &self,
        _id: &CustomerId,
    ) -> Result<Option<CustomerProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable(
            "backing store offline".to_string(),
        ))
    }

    fn booking_history(&self, _id: &CustomerId) -> Result<Vec<BookingRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable(
            "backing store offline".to_string(),
        ))
    }
}

pub(super) fn service(repository: MemoryRepository) -> AssessmentService<MemoryRepository> {
    AssessmentService::new(Arc::new(repository), config())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
