//! Merge rules for the per-period `additional_metrics` blob and the fixed
//! numeric metric columns.
//!
//! The blob is a name → `{value, comments}` map. Every write path decodes
//! it with [`decode_metrics`], edits the map, and re-encodes it with
//! [`encode_metrics`], which stores an empty map as `NULL`.

use crate::coerce::{coerce_numeric, decode_or_default, NumericValue};
use crate::errors::AppResult;
use crate::models::{AdditionalMetrics, DynamicMetric};

/// A fixed metric column and its free-text comment column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMetricColumn {
    pub value: &'static str,
    pub comments: &'static str,
}

const fn column(value: &'static str, comments: &'static str) -> FixedMetricColumn {
    FixedMetricColumn { value, comments }
}

pub const FIXED_METRIC_COLUMNS: [FixedMetricColumn; 13] = [
    column("customer_experience_score", "customer_experience_comments"),
    column("time_saved_hours", "time_saved_comments"),
    column("cost_saved_rands", "cost_saved_comments"),
    column("revenue_increase_rands", "revenue_increase_comments"),
    column("processed_units", "processed_units_comments"),
    column("model_accuracy", "model_accuracy_comments"),
    column("user_adoption_rate", "user_adoption_comments"),
    column("error_rate", "error_rate_comments"),
    column("response_time_ms", "response_time_comments"),
    column("data_quality_score", "data_quality_comments"),
    column("user_satisfaction_score", "user_satisfaction_comments"),
    column("business_impact_score", "business_impact_comments"),
    column("innovation_score", "innovation_comments"),
];

/// Coerced value and comment for one fixed metric column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FixedReading {
    pub value: Option<NumericValue>,
    pub comments: Option<String>,
}

/// Picks the fixed metric columns out of a submission, in
/// [`FIXED_METRIC_COLUMNS`] order. Each value is coerced independently.
pub fn fixed_readings(fields: &serde_json::Map<String, serde_json::Value>) -> Vec<FixedReading> {
    FIXED_METRIC_COLUMNS
        .iter()
        .map(|column| FixedReading {
            value: coerce_numeric(fields.get(column.value)),
            comments: fields
                .get(column.comments)
                .and_then(|comment| comment.as_str())
                .map(ToString::to_string),
        })
        .collect()
}

pub fn decode_metrics(raw: Option<&str>) -> AdditionalMetrics {
    decode_or_default(raw)
}

pub fn encode_metrics(metrics: &AdditionalMetrics) -> AppResult<Option<String>> {
    if metrics.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(metrics)?))
}

/// Trims metric names and drops blank ones, so stored keys match the names
/// single-metric edits address.
pub fn normalize_names(incoming: &AdditionalMetrics) -> AdditionalMetrics {
    incoming
        .iter()
        .filter_map(|(name, metric)| {
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), metric.clone()))
        })
        .collect()
}

/// Existing ∪ incoming; an incoming entry replaces the existing entry of the
/// same name wholesale, names absent from `incoming` are kept.
pub fn merge(existing: Option<&str>, incoming: &AdditionalMetrics) -> AppResult<Option<String>> {
    let mut merged = decode_metrics(existing);
    merged.extend(
        incoming
            .iter()
            .map(|(name, metric)| (name.clone(), metric.clone())),
    );
    encode_metrics(&merged)
}

pub fn upsert_metric(existing: Option<&str>, name: &str, metric: DynamicMetric) -> AppResult<Option<String>> {
    let mut metrics = decode_metrics(existing);
    metrics.insert(name.to_string(), metric);
    encode_metrics(&metrics)
}

/// Removing an absent name is a no-op.
pub fn remove_metric(existing: Option<&str>, name: &str) -> AppResult<Option<String>> {
    let mut metrics = decode_metrics(existing);
    metrics.remove(name);
    encode_metrics(&metrics)
}
