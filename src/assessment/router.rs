use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::Local;
use serde_json::json;

use super::repository::AssessmentRepository;
use super::service::{
    AssessmentError, AssessmentRequest, AssessmentService, OrderValidationRequest,
};

/// Router builder exposing the assessment entry points.
pub fn assessment_router<R>(service: Arc<AssessmentService<R>>) -> Router
where
    R: AssessmentRepository + 'static,
{
    Router::new()
        .route("/api/v1/refunds/assessments", post(assess_handler::<R>))
        .route("/api/v1/refunds/validation", post(validate_handler::<R>))
        .with_state(service)
}

pub(crate) async fn assess_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    axum::Json(request): axum::Json<AssessmentRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    let now = Local::now().naive_local();
    match service.assess(&request, now) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn validate_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    axum::Json(request): axum::Json<OrderValidationRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    match service.validate_order(&request) {
        Ok(summary) => (
            StatusCode::OK,
            axum::Json(json!({ "valid": true, "booking_summary": summary })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: AssessmentError) -> Response {
    let status = match &error {
        AssessmentError::BookingNotFound(_) | AssessmentError::CustomerNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        AssessmentError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AssessmentError::DataAccess(_) => StatusCode::BAD_GATEWAY,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
