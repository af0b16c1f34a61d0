//! Refund assessment service: a four-stage decision pipeline that scores
//! refund requests against business policy and customer behavior, plus the
//! HTTP/CLI surfaces that expose it to customer-service tooling.

pub mod assessment;
pub mod config;
pub mod error;
pub mod storage;
pub mod telemetry;
