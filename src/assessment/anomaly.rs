//! Stage 0: experience-level anomaly screen and request enrichment.
//!
//! Abnormal clustering of refund claims against one experience on one date
//! implies a vendor-side failure, not customer fraud; every affected request
//! routes to the same investigation path instead of individual scoring.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::config::PipelineConfig;
use super::domain::{
    BookingId, BookingRecord, ConfirmationTurnaround, ExperienceId, InventoryKind,
    SupplierChannel,
};

/// Stage 0 output: the anomaly verdict plus the enrichment record every later
/// stage consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScreen {
    pub anomaly: Option<AnomalyDetails>,
    pub enrichment: Enrichment,
}

impl AnomalyScreen {
    pub fn is_anomaly(&self) -> bool {
        self.anomaly.is_some()
    }
}

/// Evidence payload when the same-experience same-date refund volume crosses
/// the configured minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetails {
    pub experience_id: ExperienceId,
    pub experience_name: String,
    pub date: NaiveDate,
    pub refund_count_for_date: usize,
    pub threshold: usize,
    pub supplier_channel: SupplierChannel,
    pub affected_bookings: Vec<BookingId>,
}

/// Supplier and delivery context summarized once and carried through the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub supplier_channel: SupplierChannel,
    pub inventory: InventoryKind,
    pub confirmation_tat_promised: ConfirmationTurnaround,
    pub confirmation_sent: bool,
    pub confirmation_opened: Option<bool>,
    pub reminder_opened: Option<bool>,
    pub checkin_confirmed: Option<bool>,
}

/// Screen one booking against the same-experience same-date refund cluster.
///
/// Pure function of the record and the repository's cluster query result;
/// the caller performs the read.
pub fn screen(
    booking: &BookingRecord,
    refund_cluster: &[BookingId],
    config: &PipelineConfig,
) -> AnomalyScreen {
    let refund_count = refund_cluster.len();

    let anomaly = if refund_count >= config.anomaly_min_count {
        Some(AnomalyDetails {
            experience_id: booking.experience_id.clone(),
            experience_name: booking.experience_name.clone(),
            date: booking.scheduled_date(),
            refund_count_for_date: refund_count,
            threshold: config.anomaly_min_count,
            supplier_channel: booking.supplier_channel,
            affected_bookings: refund_cluster.to_vec(),
        })
    } else {
        None
    };

    AnomalyScreen {
        anomaly,
        enrichment: Enrichment {
            supplier_channel: booking.supplier_channel,
            inventory: booking.supplier_channel.inventory(),
            confirmation_tat_promised: booking.confirmation_tat_promised,
            confirmation_sent: booking.confirmation_sent_at.is_some(),
            confirmation_opened: booking.confirmation_opened,
            reminder_opened: booking.reminder_opened,
            checkin_confirmed: booking.checkin_confirmed,
        },
    }
}
