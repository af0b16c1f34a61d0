use chrono::NaiveDate;

use super::domain::{BookingId, BookingRecord, CustomerId, CustomerProfile, ExperienceId};

/// Storage abstraction consumed by the pipeline.
///
/// Every read is a point-in-time snapshot; the pipeline never assumes a row
/// stays valid after the call returns and never writes. A failed read aborts
/// the whole assessment — retry policy, if any, belongs to the caller.
pub trait AssessmentRepository: Send + Sync {
    fn booking(&self, id: &BookingId) -> Result<Option<BookingRecord>, RepositoryError>;

    /// Bookings with a filed refund request against the given experience on
    /// the given calendar date (time of day ignored).
    fn refund_requests_for_experience_date(
        &self,
        experience_id: &ExperienceId,
        date: NaiveDate,
    ) -> Result<Vec<BookingId>, RepositoryError>;

    fn customer_profile(&self, id: &CustomerId)
        -> Result<Option<CustomerProfile>, RepositoryError>;

    /// Full booking history for one customer, ordered by scheduled date.
    fn booking_history(&self, id: &CustomerId) -> Result<Vec<BookingRecord>, RepositoryError>;
}

/// Error enumeration for storage-collaborator failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage returned a malformed row: {0}")]
    MalformedRow(String),
}
