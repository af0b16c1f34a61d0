//! CSV-backed storage collaborator.
//!
//! Hydrates an in-memory snapshot from booking and customer CSV exports and
//! serves the read-only [`AssessmentRepository`] contract. A SQL-backed
//! implementation can replace this behind the same trait without touching
//! the pipeline.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

use crate::assessment::{
    AssessmentRepository, BookingId, BookingRecord, ConfirmationTurnaround, CustomerId,
    CustomerProfile, ExperienceId, RefundReason, RefundabilityClass, RepositoryError, RiskBucket,
    SupplierChannel,
};

/// In-memory repository loaded from CSV exports.
pub struct CsvStore {
    bookings: HashMap<BookingId, BookingRecord>,
    customers: HashMap<CustomerId, CustomerProfile>,
    by_customer: HashMap<CustomerId, Vec<BookingId>>,
}

/// Error raised while hydrating the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row} in {file}: {problem}")]
    Row {
        file: &'static str,
        row: usize,
        problem: String,
    },
}

impl CsvStore {
    /// Load `bookings.csv` and `customers.csv` from a data directory.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let bookings_path = data_dir.join("bookings.csv");
        let customers_path = data_dir.join("customers.csv");
        let bookings = File::open(&bookings_path).map_err(|source| StoreError::Io {
            path: bookings_path.display().to_string(),
            source,
        })?;
        let customers = File::open(&customers_path).map_err(|source| StoreError::Io {
            path: customers_path.display().to_string(),
            source,
        })?;
        Self::from_readers(bookings, customers)
    }

    /// Build the store from raw CSV readers (used by tests and fixtures).
    pub fn from_readers<B: Read, C: Read>(bookings: B, customers: C) -> Result<Self, StoreError> {
        let mut store = Self {
            bookings: HashMap::new(),
            customers: HashMap::new(),
            by_customer: HashMap::new(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(customers);
        for (index, row) in reader.deserialize::<CustomerRow>().enumerate() {
            let profile = row?.into_profile().map_err(|problem| StoreError::Row {
                file: "customers.csv",
                row: index + 2,
                problem,
            })?;
            if store.customers.contains_key(&profile.customer_id) {
                return Err(StoreError::Row {
                    file: "customers.csv",
                    row: index + 2,
                    problem: format!("duplicate customer_id '{}'", profile.customer_id),
                });
            }
            store.customers.insert(profile.customer_id.clone(), profile);
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bookings);
        for (index, row) in reader.deserialize::<BookingRow>().enumerate() {
            let record = row?.into_record().map_err(|problem| StoreError::Row {
                file: "bookings.csv",
                row: index + 2,
                problem,
            })?;
            // Ids are primary keys in the exporting system; a repeat would
            // silently shadow another customer's record.
            if store.bookings.contains_key(&record.booking_id) {
                return Err(StoreError::Row {
                    file: "bookings.csv",
                    row: index + 2,
                    problem: format!("duplicate booking_id '{}'", record.booking_id),
                });
            }
            store
                .by_customer
                .entry(record.customer_id.clone())
                .or_default()
                .push(record.booking_id.clone());
            store.bookings.insert(record.booking_id.clone(), record);
        }

        // History reads are ordered by scheduled date.
        for ids in store.by_customer.values_mut() {
            ids.sort_by_key(|id| store.bookings[id].scheduled_for);
        }

        Ok(store)
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }
}

impl AssessmentRepository for CsvStore {
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
        let ids = match self.by_customer.get(id) {
            Some(ids) => ids,
            None => return Ok(Vec::new()),
        };
        Ok(ids.iter().map(|bid| self.bookings[bid].clone()).collect())
    }
}

#[derive(Debug, Deserialize)]
struct CustomerRow {
    customer_id: String,
    customer_name: String,
    account_created_at: String,
    total_bookings: u32,
    total_refunds: u32,
    refund_rate: f64,
    total_no_show_refund_claims: u32,
    no_show_claims_contradicted: u32,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    risk_bucket: Option<String>,
    #[serde(default)]
    risk_score: Option<u8>,
    #[serde(default)]
    confirmed_fraud_flag: u8,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    last_profile_computed_at: Option<String>,
}

impl CustomerRow {
    fn into_profile(self) -> Result<CustomerProfile, String> {
        if self.total_refunds > self.total_bookings {
            return Err(format!(
                "total_refunds {} exceeds total_bookings {}",
                self.total_refunds, self.total_bookings
            ));
        }
        if self.no_show_claims_contradicted > self.total_no_show_refund_claims {
            return Err(format!(
                "contradicted claims {} exceed no-show claims {}",
                self.no_show_claims_contradicted, self.total_no_show_refund_claims
            ));
        }
        Ok(CustomerProfile {
            customer_id: CustomerId(self.customer_id),
            customer_name: self.customer_name,
            account_created_at: parse_datetime(&self.account_created_at)
                .ok_or_else(|| format!("bad account_created_at '{}'", self.account_created_at))?,
            total_bookings: self.total_bookings,
            total_refunds: self.total_refunds,
            refund_rate: self.refund_rate,
            total_no_show_refund_claims: self.total_no_show_refund_claims,
            no_show_claims_contradicted: self.no_show_claims_contradicted,
            risk_bucket: self
                .risk_bucket
                .as_deref()
                .map(parse_risk_bucket)
                .transpose()?,
            risk_score: self.risk_score,
            confirmed_fraud_flag: self.confirmed_fraud_flag != 0,
            last_profile_computed_at: self
                .last_profile_computed_at
                .as_deref()
                .map(|raw| {
                    parse_datetime(raw)
                        .ok_or_else(|| format!("bad last_profile_computed_at '{raw}'"))
                })
                .transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BookingRow {
    booking_id: String,
    customer_id: String,
    experience_id: String,
    experience_name: String,
    experience_category: String,
    experience_value: f64,
    #[serde(default)]
    experience_value_percentile: Option<u8>,
    supplier_channel: String,
    confirmation_tat_promised: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    confirmation_sent_at: Option<String>,
    #[serde(default)]
    confirmation_opened: Option<u8>,
    #[serde(default)]
    reminder_opened: Option<u8>,
    #[serde(default)]
    checkin_confirmed: Option<u8>,
    scheduled_for: String,
    booking_created_at: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    refund_requested_at: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    refund_reason: Option<String>,
    cancellation_window_applicable: u8,
    refundability: String,
    #[serde(default)]
    refund_policy_rate: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    agent_annotation: Option<String>,
}

impl BookingRow {
    fn into_record(self) -> Result<BookingRecord, String> {
        Ok(BookingRecord {
            booking_id: BookingId(self.booking_id),
            customer_id: CustomerId(self.customer_id),
            experience_id: ExperienceId(self.experience_id),
            experience_name: self.experience_name,
            experience_category: self.experience_category,
            experience_value: self.experience_value,
            experience_value_percentile: self.experience_value_percentile,
            supplier_channel: parse_supplier(&self.supplier_channel)?,
            confirmation_tat_promised: parse_turnaround(&self.confirmation_tat_promised)?,
            confirmation_sent_at: self
                .confirmation_sent_at
                .as_deref()
                .map(|raw| {
                    parse_datetime(raw).ok_or_else(|| format!("bad confirmation_sent_at '{raw}'"))
                })
                .transpose()?,
            confirmation_opened: self.confirmation_opened.map(|v| v != 0),
            reminder_opened: self.reminder_opened.map(|v| v != 0),
            checkin_confirmed: self.checkin_confirmed.map(|v| v != 0),
            scheduled_for: parse_datetime(&self.scheduled_for)
                .ok_or_else(|| format!("bad scheduled_for '{}'", self.scheduled_for))?,
            booking_created_at: parse_datetime(&self.booking_created_at)
                .ok_or_else(|| format!("bad booking_created_at '{}'", self.booking_created_at))?,
            refund_requested_at: self
                .refund_requested_at
                .as_deref()
                .map(|raw| {
                    parse_datetime(raw).ok_or_else(|| format!("bad refund_requested_at '{raw}'"))
                })
                .transpose()?,
            refund_reason: self
                .refund_reason
                .as_deref()
                .map(|raw| {
                    raw.parse::<RefundReason>()
                        .map_err(|err| err.to_string())
                })
                .transpose()?,
            cancellation_window_applicable: self.cancellation_window_applicable != 0,
            refundability: parse_refundability(&self.refundability)?,
            refund_policy_rate: self.refund_policy_rate,
            agent_annotation: self.agent_annotation,
        })
    }
}

fn parse_supplier(raw: &str) -> Result<SupplierChannel, String> {
    match raw {
        "direct_contract" => Ok(SupplierChannel::DirectContract),
        "aggregator" => Ok(SupplierChannel::Aggregator),
        "last_minute_marketplace" => Ok(SupplierChannel::LastMinuteMarketplace),
        other => Err(format!("unknown supplier channel '{other}'")),
    }
}

fn parse_turnaround(raw: &str) -> Result<ConfirmationTurnaround, String> {
    match raw {
        "immediate" => Ok(ConfirmationTurnaround::Immediate),
        "2hr" => Ok(ConfirmationTurnaround::TwoHour),
        "variable" => Ok(ConfirmationTurnaround::Variable),
        other => Err(format!("unknown confirmation turnaround '{other}'")),
    }
}

fn parse_refundability(raw: &str) -> Result<RefundabilityClass, String> {
    match raw {
        "cancelable" => Ok(RefundabilityClass::Cancelable),
        "partially_refundable" => Ok(RefundabilityClass::PartiallyRefundable),
        "non_cancelable" => Ok(RefundabilityClass::NonCancelable),
        other => Err(format!("unknown refundability class '{other}'")),
    }
}

fn parse_risk_bucket(raw: &str) -> Result<RiskBucket, String> {
    match raw {
        "low" => Ok(RiskBucket::Low),
        "watch" => Ok(RiskBucket::Watch),
        "high" => Ok(RiskBucket::High),
        other => Err(format!("unknown risk bucket '{other}'")),
    }
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOMERS: &str = "\
customer_id,customer_name,account_created_at,total_bookings,total_refunds,refund_rate,total_no_show_refund_claims,no_show_claims_contradicted,risk_bucket,risk_score,confirmed_fraud_flag,last_profile_computed_at
cust-001,Dana Reyes,2023-01-15 09:30:00,8,1,0.125,0,0,low,12,0,2026-02-01 00:00:00
cust-002,Kiran Patel,2025-11-02 14:00:00,3,2,0.6667,1,1,high,71,0,
";

    const BOOKINGS: &str = "\
booking_id,customer_id,experience_id,experience_name,experience_category,experience_value,experience_value_percentile,supplier_channel,confirmation_tat_promised,confirmation_sent_at,confirmation_opened,reminder_opened,checkin_confirmed,scheduled_for,booking_created_at,refund_requested_at,refund_reason,cancellation_window_applicable,refundability,refund_policy_rate,agent_annotation
bk-100,cust-001,exp-01,Sunset Kayak Tour,outdoor,120.0,55,direct_contract,immediate,2026-02-10 08:00:00,1,1,1,2026-02-20 17:00:00,2026-02-09 19:20:00,,,1,cancelable,1.0,
bk-101,cust-002,exp-02,Wine Cellar Tasting,culinary,240.0,88,aggregator,2hr,,,,,2026-02-18 19:00:00,2026-02-15 10:00:00,2026-02-21 09:00:00,no_show,0,non_cancelable,0.0,called twice
";

    #[test]
    fn loads_customers_and_bookings() {
        let store =
            CsvStore::from_readers(BOOKINGS.as_bytes(), CUSTOMERS.as_bytes()).expect("loads");
        assert_eq!(store.customer_count(), 2);
        assert_eq!(store.booking_count(), 2);

        let booking = store
            .booking(&BookingId("bk-101".to_string()))
            .expect("read ok")
            .expect("present");
        assert_eq!(booking.refund_reason, Some(RefundReason::NoShow));
        assert_eq!(booking.refundability, RefundabilityClass::NonCancelable);
        assert!(booking.confirmation_sent_at.is_none());
        assert_eq!(booking.agent_annotation.as_deref(), Some("called twice"));
    }

    #[test]
    fn cluster_query_matches_experience_and_date_only() {
        let bookings = format!(
            "{BOOKINGS}bk-102,cust-001,exp-02,Wine Cellar Tasting,culinary,240.0,88,aggregator,2hr,,,,,2026-02-18 11:00:00,2026-02-15 10:00:00,2026-02-19 09:00:00,technical_issue,0,non_cancelable,0.0,\n"
        );
        let store =
            CsvStore::from_readers(bookings.as_bytes(), CUSTOMERS.as_bytes()).expect("loads");
        let cluster = store
            .refund_requests_for_experience_date(
                &ExperienceId("exp-02".to_string()),
                NaiveDate::from_ymd_opt(2026, 2, 18).expect("valid date"),
            )
            .expect("read ok");
        // Same experience, same calendar date, different times of day.
        assert_eq!(cluster.len(), 2);
    }

    #[test]
    fn rejects_profile_breaking_invariants() {
        let customers = "\
customer_id,customer_name,account_created_at,total_bookings,total_refunds,refund_rate,total_no_show_refund_claims,no_show_claims_contradicted,risk_bucket,risk_score,confirmed_fraud_flag,last_profile_computed_at
cust-bad,Bad Row,2023-01-15 09:30:00,2,5,1.0,0,0,low,,0,
";
        let result = CsvStore::from_readers(BOOKINGS.as_bytes(), customers.as_bytes());
        assert!(matches!(result, Err(StoreError::Row { .. })));
    }

    #[test]
    fn rejects_duplicate_booking_ids() {
        let bookings = format!(
            "{BOOKINGS}bk-100,cust-002,exp-02,Wine Cellar Tasting,culinary,240.0,88,aggregator,2hr,,,,,2026-02-18 19:00:00,2026-02-15 10:00:00,,,0,non_cancelable,0.0,\n"
        );
        let err = CsvStore::from_readers(bookings.as_bytes(), CUSTOMERS.as_bytes())
            .err()
            .expect("duplicate id rejected");
        match err {
            StoreError::Row { file, problem, .. } => {
                assert_eq!(file, "bookings.csv");
                assert!(problem.contains("duplicate booking_id 'bk-100'"));
            }
            other => panic!("expected a row error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_customer_ids() {
        let customers = format!(
            "{CUSTOMERS}cust-001,Dana Reyes,2023-01-15 09:30:00,8,1,0.125,0,0,low,12,0,\n"
        );
        let err = CsvStore::from_readers(BOOKINGS.as_bytes(), customers.as_bytes())
            .err()
            .expect("duplicate id rejected");
        match err {
            StoreError::Row { file, problem, .. } => {
                assert_eq!(file, "customers.csv");
                assert!(problem.contains("duplicate customer_id 'cust-001'"));
            }
            other => panic!("expected a row error, got {other:?}"),
        }
    }

    #[test]
    fn history_is_ordered_by_scheduled_date() {
        let bookings = "\
booking_id,customer_id,experience_id,experience_name,experience_category,experience_value,experience_value_percentile,supplier_channel,confirmation_tat_promised,confirmation_sent_at,confirmation_opened,reminder_opened,checkin_confirmed,scheduled_for,booking_created_at,refund_requested_at,refund_reason,cancellation_window_applicable,refundability,refund_policy_rate,agent_annotation
bk-2,cust-001,exp-01,Sunset Kayak Tour,outdoor,120.0,55,direct_contract,immediate,,,,,2026-03-01 09:00:00,2026-02-01 09:00:00,,,1,cancelable,1.0,
bk-1,cust-001,exp-01,Sunset Kayak Tour,outdoor,120.0,55,direct_contract,immediate,,,,,2026-01-05 09:00:00,2025-12-20 09:00:00,,,1,cancelable,1.0,
";
        let store =
            CsvStore::from_readers(bookings.as_bytes(), CUSTOMERS.as_bytes()).expect("loads");
        let history = store
            .booking_history(&CustomerId("cust-001".to_string()))
            .expect("read ok");
        assert_eq!(history[0].booking_id.0, "bk-1");
        assert_eq!(history[1].booking_id.0, "bk-2");
    }
}
