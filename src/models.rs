use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Identity stamped into the audit columns of every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Actor {
    pub name: String,
    pub email: String,
}

impl Default for Actor {
    fn default() -> Self {
        Self {
            name: "Tester".to_string(),
            email: "test@tester.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Low" => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "High" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

// ─── Initiatives ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Initiative {
    pub id: i64,
    pub use_case_name: Option<String>,
    pub description: Option<String>,
    pub benefit: Option<String>,
    pub strategic_objective: Option<String>,
    pub status: Option<String>,
    pub percentage_complete: Option<i64>,
    pub process_owner: Option<String>,
    pub business_owner: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub expected_completion_date: Option<NaiveDate>,
    pub actual_completion_date: Option<NaiveDate>,
    pub priority: Option<String>,
    pub risk_level: Option<String>,
    pub technology_stack: Option<String>,
    pub team_size: Option<i64>,
    pub budget_allocated: Option<f64>,
    pub budget_spent: Option<f64>,
    pub health_status: Option<String>,
    pub initiative_type: Option<String>,
    pub is_featured: bool,
    pub featured_month: Option<String>,
    pub is_pinned: bool,
    pub pinned_at: Option<DateTime<Utc>>,
    pub departments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub created_by_name: Option<String>,
    pub created_by_email: Option<String>,
    pub modified_at: DateTime<Utc>,
    pub modified_by_name: Option<String>,
    pub modified_by_email: Option<String>,
}

/// Raw create/update body. Numeric and date fields arrive loosely typed and
/// are coerced on write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InitiativePayload {
    pub use_case_name: Option<String>,
    pub description: Option<String>,
    pub benefit: Option<String>,
    pub strategic_objective: Option<String>,
    pub status: Option<String>,
    pub percentage_complete: Option<serde_json::Value>,
    pub process_owner: Option<String>,
    pub business_owner: Option<String>,
    pub start_date: Option<String>,
    pub expected_completion_date: Option<String>,
    pub actual_completion_date: Option<String>,
    pub priority: Option<String>,
    pub risk_level: Option<String>,
    pub technology_stack: Option<String>,
    pub team_size: Option<serde_json::Value>,
    pub budget_allocated: Option<serde_json::Value>,
    pub budget_spent: Option<serde_json::Value>,
    pub health_status: Option<String>,
    pub initiative_type: Option<String>,
    pub is_featured: Option<bool>,
    pub featured_month: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub departments: Vec<String>,
}

/// Initiative fields after coercion, ready to bind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitiativeRecord {
    pub use_case_name: Option<String>,
    pub description: Option<String>,
    pub benefit: Option<String>,
    pub strategic_objective: Option<String>,
    pub status: Option<String>,
    pub percentage_complete: Option<i64>,
    pub process_owner: Option<String>,
    pub business_owner: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub expected_completion_date: Option<NaiveDate>,
    pub actual_completion_date: Option<NaiveDate>,
    pub priority: Option<String>,
    pub risk_level: Option<String>,
    pub technology_stack: Option<String>,
    pub team_size: Option<i64>,
    pub budget_allocated: Option<f64>,
    pub budget_spent: Option<f64>,
    pub health_status: Option<String>,
    pub initiative_type: Option<String>,
    pub is_featured: bool,
    pub featured_month: Option<String>,
    pub departments: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InitiativeFilters {
    pub status: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiativeSummary {
    pub id: i64,
    pub use_case_name: Option<String>,
    pub description: Option<String>,
    pub percentage_complete: Option<i64>,
    pub health_status: Option<String>,
    pub status: Option<String>,
    pub initiative_type: Option<String>,
    pub pinned_at: Option<DateTime<Utc>>,
    pub departments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OwnerKind {
    ProcessOwners,
    BusinessOwners,
}

impl OwnerKind {
    pub fn column(self) -> &'static str {
        match self {
            Self::ProcessOwners => "process_owner",
            Self::BusinessOwners => "business_owner",
        }
    }
}

// ─── Monthly metrics ────────────────────────────────────────────────────────

/// One user-defined metric inside a period's `additional_metrics` blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicMetric {
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: String,
}

pub type AdditionalMetrics = BTreeMap<String, DynamicMetric>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyMetric {
    pub id: i64,
    pub initiative_id: i64,
    pub metric_period: String,
    #[serde(flatten)]
    pub fixed: serde_json::Map<String, serde_json::Value>,
    pub additional_metrics: AdditionalMetrics,
    pub created_at: DateTime<Utc>,
    pub created_by_name: Option<String>,
    pub created_by_email: Option<String>,
    pub modified_at: DateTime<Utc>,
    pub modified_by_name: Option<String>,
    pub modified_by_email: Option<String>,
}

/// Metric submission. Fixed metric values and comments are picked out of
/// `fields` by column name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveMetricsPayload {
    pub metric_period: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_metrics: AdditionalMetrics,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

// ─── Dashboard ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentCount {
    pub department: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenefitCount {
    pub benefit: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_initiatives: i64,
    pub ideation_count: i64,
    pub in_progress_count: i64,
    pub completed_count: i64,
    pub avg_completion: Option<f64>,
    pub new_initiatives_count: i64,
    pub in_progress_initiatives: Vec<InitiativeSummary>,
    pub by_department: Vec<DepartmentCount>,
    pub by_benefit: Vec<BenefitCount>,
    pub pinned_initiatives: Vec<InitiativeSummary>,
}

/// Query-string form of the dashboard filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardFilterQuery {
    pub initiative_ids: Option<String>,
    pub initiative_type: Option<String>,
}

/// One `(period, initiative, blob)` row feeding the trend aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodMetricRow {
    pub metric_period: String,
    pub initiative_id: i64,
    pub initiative_type: Option<String>,
    pub additional_metrics: Option<String>,
}

/// One initiative's metrics row joined with the initiative fields the
/// drill-downs display.
#[derive(Debug, Clone, PartialEq)]
pub struct InitiativeMetricRow {
    pub initiative_id: i64,
    pub use_case_name: Option<String>,
    pub status: Option<String>,
    pub health_status: Option<String>,
    pub percentage_complete: Option<i64>,
    pub initiative_type: Option<String>,
    pub departments: Vec<String>,
    pub metric_period: String,
    pub additional_metrics: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricAggregate {
    pub total: f64,
    pub avg: f64,
    pub count: u64,
}

/// Serialized flat: `<metric>_total`, `<metric>_avg`, `<metric>_count` keys
/// sit beside `metric_period` and `active_initiatives`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub metric_period: String,
    pub active_initiatives: usize,
    pub metrics: BTreeMap<String, MetricAggregate>,
}

impl Serialize for TrendPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.metrics.len() * 3))?;
        map.serialize_entry("metric_period", &self.metric_period)?;
        map.serialize_entry("active_initiatives", &self.active_initiatives)?;
        for (name, aggregate) in &self.metrics {
            map.serialize_entry(&format!("{}_total", name), &aggregate.total)?;
            map.serialize_entry(&format!("{}_avg", name), &aggregate.avg)?;
            map.serialize_entry(&format!("{}_count", name), &aggregate.count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodInitiative {
    pub id: i64,
    pub use_case_name: Option<String>,
    pub status: Option<String>,
    pub health_status: Option<String>,
    pub percentage_complete: Option<i64>,
    pub departments: Vec<String>,
    pub metrics: AdditionalMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodDrilldown {
    pub period: String,
    pub initiatives: Vec<PeriodInitiative>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricInitiative {
    pub id: i64,
    pub use_case_name: Option<String>,
    pub departments: Vec<String>,
    pub value: serde_json::Value,
    pub comments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDrilldown {
    pub metric_name: String,
    pub by_period: BTreeMap<String, Vec<MetricInitiative>>,
}

// ─── Field options / custom metrics ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: i64,
    pub field_name: String,
    pub option_value: String,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub modified_at: DateTime<Utc>,
    pub modified_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFieldOptionPayload {
    pub field_name: String,
    pub option_value: String,
    #[serde(default)]
    pub display_order: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateFieldOptionPayload {
    pub field_name: Option<String>,
    pub option_value: String,
    pub old_value: Option<String>,
    pub display_order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameResponse {
    pub message: String,
    pub propagated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomMetric {
    pub id: i64,
    pub metric_name: String,
    pub metric_description: Option<String>,
    pub metric_type: Option<String>,
    pub unit_of_measure: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub modified_at: DateTime<Utc>,
    pub modified_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomMetricPayload {
    pub metric_name: String,
    #[serde(default)]
    pub metric_description: Option<String>,
    #[serde(default)]
    pub metric_type: Option<String>,
    #[serde(default)]
    pub unit_of_measure: Option<String>,
}

// ─── Risks / progress updates ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risk {
    pub id: i64,
    pub initiative_id: i64,
    pub risk_title: Option<String>,
    pub risk_detail: Option<String>,
    pub frequency: Option<String>,
    pub severity: Option<String>,
    pub risk_mitigation: Option<String>,
    pub controls: Option<String>,
    pub overall_risk: RiskLevel,
    pub created_at: DateTime<Utc>,
    pub created_by_name: Option<String>,
    pub created_by_email: Option<String>,
    pub modified_at: DateTime<Utc>,
    pub modified_by_name: Option<String>,
    pub modified_by_email: Option<String>,
}

/// Any client-sent `overall_risk` is dropped on deserialize; it is always
/// derived from frequency and severity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPayload {
    pub risk_title: Option<String>,
    pub risk_detail: Option<String>,
    pub frequency: Option<String>,
    pub severity: Option<String>,
    pub risk_mitigation: Option<String>,
    pub controls: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub id: i64,
    pub initiative_id: i64,
    pub update_type: String,
    pub update_title: String,
    pub update_details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by_name: Option<String>,
    pub created_by_email: Option<String>,
    pub modified_at: DateTime<Utc>,
    pub modified_by_name: Option<String>,
    pub modified_by_email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressUpdatePayload {
    pub update_type: Option<String>,
    pub update_title: Option<String>,
    pub update_details: Option<String>,
}

// ─── Advisory ───────────────────────────────────────────────────────────────

/// Questionnaire answers keyed by question id.
pub type Answers = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryResponse {
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quadrant: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiConversation {
    pub id: i64,
    pub responses: Answers,
    pub recommendation: String,
    pub created_at: DateTime<Utc>,
    pub created_by_name: Option<String>,
    pub created_by_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityConversation {
    pub id: i64,
    pub initiative_name: Option<String>,
    pub responses: Answers,
    pub complexity_score: f64,
    pub value_score: f64,
    pub quadrant: String,
    pub llm_recommendation: String,
    pub created_at: DateTime<Utc>,
    pub created_by_name: Option<String>,
    pub created_by_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixPoint {
    pub id: i64,
    pub initiative_name: Option<String>,
    pub complexity_score: f64,
    pub value_score: f64,
    pub quadrant: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
