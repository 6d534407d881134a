//! Built-in endpoints: `/queue`, `/jobs/:number`, `/manifest.json`, `/metrics`.

use std::sync::Arc;

use aim_02_dispatcher::{JobDispatcher, JobOutcome, TicketNumber, TicketView};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::domain::cost::{cost_only_requested, cost_preview, CostEstimate};
use crate::domain::error::ApiError;
use crate::domain::manifest::QUEUE_CURRENCY;
use crate::middleware::CallerIdentity;

/// State shared by the built-in handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub dispatcher: Arc<dyn JobDispatcher>,
    /// Currency quoted in cost previews
    pub currency: String,
    pub manifest: Arc<Value>,
}

/// `GET /queue`
pub async fn queue(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    if cost_only_requested(&headers) {
        return cost_preview(CostEstimate::free(state.currency.as_str())).into_response();
    }

    let status = state.dispatcher.status();
    (
        [("cost_used", "0"), ("currency", QUEUE_CURRENCY)],
        Json(status),
    )
        .into_response()
}

/// `GET /jobs/:number`
pub async fn get_job(
    State(state): State<GatewayState>,
    Path(number): Path<String>,
    caller: CallerIdentity,
) -> Result<Json<TicketView>, ApiError> {
    let number = parse_ticket(&number)?;
    let view = state.dispatcher.fetch(number, caller.address())?;
    Ok(Json(view))
}

/// `DELETE /jobs/:number`
pub async fn clear_job(
    State(state): State<GatewayState>,
    Path(number): Path<String>,
    caller: CallerIdentity,
) -> Result<StatusCode, ApiError> {
    let number = parse_ticket(&number)?;
    state.dispatcher.clear(number, caller.address())?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /manifest.json`
pub async fn manifest(State(state): State<GatewayState>) -> Json<Value> {
    Json(state.manifest.as_ref().clone())
}

/// `GET /metrics` (Prometheus text format)
pub async fn metrics() -> Response {
    match aim_telemetry::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => ApiError::internal(e.to_string()).into_response(),
    }
}

/// Fallback for unknown paths.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("no endpoint at {}", uri.path()))
}

/// Response for a finished job: 200 with its value, or 500 with the failure.
pub fn outcome_response(outcome: JobOutcome) -> Response {
    match outcome {
        JobOutcome::Succeeded(value) => Json(value).into_response(),
        JobOutcome::Failed(failure) => ApiError::job_failed(format!(
            "job {}: {}",
            failure.kind.as_str(),
            failure.message
        ))
        .into_response(),
    }
}

fn parse_ticket(raw: &str) -> Result<TicketNumber, ApiError> {
    raw.parse::<u64>()
        .ok()
        .filter(|n| *n >= TicketNumber::FIRST.value())
        .map(TicketNumber)
        .ok_or_else(|| ApiError::bad_request(format!("invalid ticket number: {raw:?}")))
}
