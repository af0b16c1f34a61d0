//! Refund request assessment pipeline.
//!
//! Four stages feed one classifier: the anomaly screen always runs; an
//! anomaly verdict is final. Otherwise the policy gate runs; an auto-approve
//! or hard flag skips scoring. Only requests that survive both are scored by
//! the behavioral profiler and the request evaluator.

pub mod anomaly;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod policy_gate;
pub mod repository;
pub mod request_eval;
pub mod risk_profile;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use anomaly::{AnomalyDetails, AnomalyScreen, Enrichment};
pub use classifier::{Classification, EvidenceSummary, ResolutionAction, Verdict};
pub use config::{ConfigurationError, PipelineConfig, SignalWeights};
pub use domain::{
    BookingId, BookingRecord, ConfirmationTurnaround, CustomerId, CustomerProfile, ExperienceId,
    InventoryKind, RefundReason, RefundabilityClass, RiskBucket, SupplierChannel,
};
pub use policy_gate::{AutoApproval, HardFlagEvidence, PolicyDecision, PolicyOutcome};
pub use repository::{AssessmentRepository, RepositoryError};
pub use request_eval::{ModifierTrace, RequestFlag, RequestScore};
pub use risk_profile::{LifetimeBaseline, ProfileScore, RecencySummary, ScoredProfile, Signal};
pub use router::assessment_router;
pub use service::{
    AssessmentError, AssessmentOutcome, AssessmentRequest, AssessmentService, OrderSummary,
    OrderValidationRequest,
};
