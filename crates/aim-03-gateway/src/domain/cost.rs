//! Cost-preview convention.
//!
//! A caller sending `cost_only` (or `cost-only`) asks what a call would cost
//! instead of running it. Handlers answer with a [`CostEstimate`] and perform
//! no work.

use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::manifest::PriceRange;

/// Header names that request a cost preview.
pub const COST_ONLY_HEADERS: [&str; 2] = ["cost_only", "cost-only"];

/// Whether the request only wants a price.
pub fn cost_only_requested(headers: &HeaderMap) -> bool {
    COST_ONLY_HEADERS
        .iter()
        .any(|name| headers.contains_key(*name))
}

/// Price quoted in answer to a cost preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub min: f64,
    pub max: f64,
    pub estimated_cost: f64,
    pub currency: String,
}

impl CostEstimate {
    /// A zero-cost estimate.
    pub fn free(currency: impl Into<String>) -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            estimated_cost: 0.0,
            currency: currency.into(),
        }
    }

    /// Estimate quoting a manifest price range.
    pub fn from_range(range: &PriceRange, currency: impl Into<String>) -> Self {
        Self {
            min: range.min,
            max: range.max,
            estimated_cost: range.estimated_cost,
            currency: currency.into(),
        }
    }
}

/// Body of a cost-preview response. Counts the preview.
pub fn cost_preview(estimate: CostEstimate) -> Json<CostEstimate> {
    aim_telemetry::COST_PREVIEWS.inc();
    Json(estimate)
}
