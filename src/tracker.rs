use crate::advisory::{prompts, GenerationRequest, TextGenerator};
use crate::coerce::{clean_text, coerce_date, coerce_month, coerce_numeric, coerce_percentage};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::metrics::{self, fixed_readings, normalize_names, DrilldownFilter};
use crate::models::{
    Actor, AdvisoryResponse, Answers, ComplexityConversation, CreateCustomMetricPayload, CreateFieldOptionPayload,
    CreatedResponse, CustomMetric, DashboardFilterQuery, DashboardStats, DynamicMetric, FieldOption, HealthResponse,
    Initiative, InitiativeFilters, InitiativePayload, InitiativeRecord, MatrixPoint, MessageResponse, MetricDrilldown,
    MonthlyMetric, OwnerKind, PeriodDrilldown, ProgressUpdate, ProgressUpdatePayload, RenameResponse, Risk,
    RiskPayload, RoiConversation, SaveMetricsPayload, TrendPoint, UpdateFieldOptionPayload,
};
use crate::redaction::Redactor;
use crate::risk;
use crate::scoring;
use chrono::Utc;
use std::sync::Arc;

const DEFAULT_STATUS: &str = "Ideation";
const DEFAULT_HEALTH: &str = "Green";
const DEFAULT_INITIATIVE_TYPE: &str = "Internal AI";
const ADVISORY_FAILURE: &str = "Failed to generate recommendation. Please try again later.";
const ADVISORY_SUCCESS: &str = "success";

/// Operation layer between the HTTP surface and the store.
pub struct TrackerCore {
    db: Database,
    generator: Arc<dyn TextGenerator>,
    redactor: Redactor,
}

impl TrackerCore {
    pub fn new(db: Database, generator: Arc<dyn TextGenerator>) -> Self {
        tracing::info!(
            database = %db.path().display(),
            generator = generator.name(),
            "tracker core ready"
        );
        Self {
            db,
            generator,
            redactor: Redactor,
        }
    }

    pub fn health(&self) -> AppResult<HealthResponse> {
        self.db.ping()?;
        Ok(HealthResponse {
            status: "healthy".to_string(),
            database: "connected".to_string(),
        })
    }

    // ─── Initiatives ────────────────────────────────────────────────────────

    pub fn list_initiatives(&self, filters: &InitiativeFilters) -> AppResult<Vec<Initiative>> {
        let filters = InitiativeFilters {
            status: clean_text(filters.status.as_deref()),
            department: clean_text(filters.department.as_deref()),
        };
        self.db.list_initiatives(&filters)
    }

    pub fn get_initiative(&self, id: i64) -> AppResult<Initiative> {
        self.db
            .get_initiative(id)?
            .ok_or_else(|| initiative_not_found(id))
    }

    pub fn create_initiative(&self, actor: &Actor, payload: &InitiativePayload) -> AppResult<CreatedResponse> {
        let mut record = initiative_record(payload);
        record.status.get_or_insert_with(|| DEFAULT_STATUS.to_string());
        record.percentage_complete.get_or_insert(0);
        record.health_status.get_or_insert_with(|| DEFAULT_HEALTH.to_string());
        record
            .initiative_type
            .get_or_insert_with(|| DEFAULT_INITIATIVE_TYPE.to_string());

        let id = self.db.insert_initiative(actor, &record)?;
        tracing::info!(initiative_id = id, actor = %actor.email, "initiative created");
        Ok(CreatedResponse {
            id,
            message: "Initiative created successfully".to_string(),
        })
    }

    /// Full replace: fields missing from the payload are cleared.
    pub fn update_initiative(&self, actor: &Actor, id: i64, payload: &InitiativePayload) -> AppResult<MessageResponse> {
        let record = initiative_record(payload);
        if !self.db.update_initiative(actor, id, &record)? {
            return Err(initiative_not_found(id));
        }
        tracing::info!(initiative_id = id, actor = %actor.email, "initiative updated");
        Ok(MessageResponse::new("Initiative updated successfully"))
    }

    pub fn delete_initiative(&self, id: i64) -> AppResult<MessageResponse> {
        if !self.db.delete_initiative(id)? {
            return Err(initiative_not_found(id));
        }
        tracing::info!(initiative_id = id, "initiative deleted");
        Ok(MessageResponse::new("Initiative deleted successfully"))
    }

    pub fn pin_initiative(&self, id: i64) -> AppResult<MessageResponse> {
        self.set_pinned(id, true)?;
        Ok(MessageResponse::new("Initiative pinned successfully"))
    }

    pub fn unpin_initiative(&self, id: i64) -> AppResult<MessageResponse> {
        self.set_pinned(id, false)?;
        Ok(MessageResponse::new("Initiative unpinned successfully"))
    }

    fn set_pinned(&self, id: i64, pinned: bool) -> AppResult<()> {
        if !self.db.set_pinned(id, pinned)? {
            return Err(initiative_not_found(id));
        }
        tracing::debug!(initiative_id = id, pinned, "pin state changed");
        Ok(())
    }

    pub fn featured_solutions(&self, month: Option<&str>) -> AppResult<Vec<Initiative>> {
        let month = match clean_text(month) {
            Some(raw) => Some(
                coerce_month(Some(&raw)).ok_or_else(|| AppError::Invalid(format!("invalid month: {}", raw)))?,
            ),
            None => None,
        };
        self.db.featured_initiatives(month.as_deref())
    }

    pub fn owner_suggestions(&self, kind: OwnerKind) -> AppResult<Vec<String>> {
        self.db.owner_suggestions(kind)
    }

    // ─── Monthly metrics ────────────────────────────────────────────────────

    pub fn list_metrics(&self, initiative_id: i64) -> AppResult<Vec<MonthlyMetric>> {
        self.db.list_metrics(initiative_id)
    }

    pub fn get_metric(&self, initiative_id: i64, period: &str) -> AppResult<MonthlyMetric> {
        let period = metric_period(period)?;
        self.db
            .get_metric(initiative_id, &period)?
            .ok_or_else(|| period_not_found(initiative_id, &period))
    }

    pub fn save_metrics(
        &self,
        actor: &Actor,
        initiative_id: i64,
        payload: &SaveMetricsPayload,
    ) -> AppResult<CreatedResponse> {
        let period = metric_period(&payload.metric_period)?;
        let readings = fixed_readings(&payload.fields);
        let incoming = normalize_names(&payload.additional_metrics);
        let saved = self
            .db
            .save_metrics(actor, initiative_id, &period, &readings, &incoming)?;

        tracing::info!(
            initiative_id,
            period = %period,
            dynamic_metrics = incoming.len(),
            created = saved.created,
            "monthly metrics saved"
        );
        Ok(CreatedResponse {
            id: saved.id,
            message: "Metrics saved successfully".to_string(),
        })
    }

    pub fn update_dynamic_metric(
        &self,
        actor: &Actor,
        initiative_id: i64,
        period: &str,
        name: &str,
        metric: DynamicMetric,
    ) -> AppResult<MessageResponse> {
        let period = metric_period(period)?;
        let name = metric_name(name)?;
        if !self
            .db
            .upsert_dynamic_metric(actor, initiative_id, &period, &name, metric)?
        {
            return Err(period_not_found(initiative_id, &period));
        }
        tracing::info!(initiative_id, period = %period, metric = %name, "dynamic metric updated");
        Ok(MessageResponse::new("Metric updated successfully"))
    }

    pub fn delete_dynamic_metric(
        &self,
        actor: &Actor,
        initiative_id: i64,
        period: &str,
        name: &str,
    ) -> AppResult<MessageResponse> {
        let period = metric_period(period)?;
        let name = metric_name(name)?;
        if !self
            .db
            .remove_dynamic_metric(actor, initiative_id, &period, &name)?
        {
            return Err(period_not_found(initiative_id, &period));
        }
        tracing::info!(initiative_id, period = %period, metric = %name, "dynamic metric removed");
        Ok(MessageResponse::new("Metric deleted successfully"))
    }

    pub fn delete_period(&self, initiative_id: i64, period: &str) -> AppResult<MessageResponse> {
        let period = metric_period(period)?;
        if !self.db.delete_period(initiative_id, &period)? {
            return Err(period_not_found(initiative_id, &period));
        }
        tracing::info!(initiative_id, period = %period, "metric period deleted");
        Ok(MessageResponse::new("Metrics deleted successfully"))
    }

    // ─── Dashboard ──────────────────────────────────────────────────────────

    pub fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        self.db.dashboard_stats(Utc::now())
    }

    pub fn monthly_trends(&self, query: &DashboardFilterQuery) -> AppResult<Vec<TrendPoint>> {
        let filter = DrilldownFilter::from_query(query);
        let rows = self.db.period_metric_rows()?;
        let trends = metrics::monthly_trends(&rows, &filter);
        tracing::debug!(
            rows = rows.len(),
            periods = trends.len(),
            filtered = !filter.is_unrestricted(),
            "monthly trends aggregated"
        );
        Ok(trends)
    }

    pub fn period_drilldown(&self, period: &str, query: &DashboardFilterQuery) -> AppResult<PeriodDrilldown> {
        let period = metric_period(period)?;
        let filter = DrilldownFilter::from_query(query);
        let rows = self.db.initiative_metric_rows(Some(&period))?;
        Ok(metrics::period_drilldown(&period, &rows, &filter))
    }

    pub fn metric_drilldown(&self, name: &str, query: &DashboardFilterQuery) -> AppResult<MetricDrilldown> {
        let name = metric_name(name)?;
        let filter = DrilldownFilter::from_query(query);
        let rows = self.db.initiative_metric_rows(None)?;
        Ok(metrics::metric_drilldown(&name, &rows, &filter))
    }

    // ─── Field options / custom metrics ─────────────────────────────────────

    pub fn list_field_options(&self, field_name: Option<&str>) -> AppResult<Vec<FieldOption>> {
        self.db
            .list_field_options(clean_text(field_name).as_deref())
    }

    pub fn create_field_option(&self, actor: &Actor, payload: &CreateFieldOptionPayload) -> AppResult<CreatedResponse> {
        let field_name = required(Some(&payload.field_name), "field_name")?;
        let option_value = required(Some(&payload.option_value), "option_value")?;
        let id = self.db.insert_field_option(
            actor,
            &field_name,
            &option_value,
            payload.display_order.unwrap_or(0),
        )?;
        tracing::info!(option_id = id, field = %field_name, "field option created");
        Ok(CreatedResponse {
            id,
            message: "Field option created successfully".to_string(),
        })
    }

    /// Renames the option and rewrites the rows still carrying the old value.
    pub fn update_field_option(
        &self,
        actor: &Actor,
        id: i64,
        payload: &UpdateFieldOptionPayload,
    ) -> AppResult<RenameResponse> {
        let stored = self
            .db
            .get_field_option(id)?
            .ok_or_else(|| option_not_found(id))?;
        let new_value = required(Some(&payload.option_value), "option_value")?;
        let field_name = clean_text(payload.field_name.as_deref()).unwrap_or(stored.field_name);
        let old_value = clean_text(payload.old_value.as_deref()).unwrap_or(stored.option_value);

        let propagated = self
            .db
            .rename_field_option(
                actor,
                id,
                &field_name,
                &old_value,
                &new_value,
                payload.display_order.unwrap_or(0),
            )?
            .ok_or_else(|| option_not_found(id))?;

        tracing::info!(
            option_id = id,
            field = %field_name,
            from = %old_value,
            to = %new_value,
            propagated,
            "field option renamed"
        );
        Ok(RenameResponse {
            message: "Field option updated successfully".to_string(),
            propagated,
        })
    }

    pub fn delete_field_option(&self, actor: &Actor, id: i64) -> AppResult<MessageResponse> {
        if !self.db.deactivate_field_option(actor, id)? {
            return Err(option_not_found(id));
        }
        tracing::info!(option_id = id, "field option deactivated");
        Ok(MessageResponse::new("Field option deleted successfully"))
    }

    pub fn list_custom_metrics(&self) -> AppResult<Vec<CustomMetric>> {
        self.db.list_custom_metrics()
    }

    pub fn create_custom_metric(&self, actor: &Actor, payload: &CreateCustomMetricPayload) -> AppResult<CreatedResponse> {
        let metric_name = required(Some(&payload.metric_name), "metric_name")?;
        let id = self.db.insert_custom_metric(
            actor,
            &metric_name,
            clean_text(payload.metric_description.as_deref()).as_deref(),
            clean_text(payload.metric_type.as_deref()).as_deref(),
            clean_text(payload.unit_of_measure.as_deref()).as_deref(),
        )?;
        tracing::info!(custom_metric_id = id, metric = %metric_name, "custom metric created");
        Ok(CreatedResponse {
            id,
            message: "Custom metric created successfully".to_string(),
        })
    }

    // ─── Risks ──────────────────────────────────────────────────────────────

    pub fn list_risks(&self, initiative_id: i64) -> AppResult<Vec<Risk>> {
        self.db.list_risks(initiative_id)
    }

    pub fn create_risk(&self, actor: &Actor, initiative_id: i64, payload: &RiskPayload) -> AppResult<CreatedResponse> {
        let payload = clean_risk(payload);
        let overall = risk::classify(payload.frequency.as_deref(), payload.severity.as_deref());
        let id = self.db.insert_risk(actor, initiative_id, &payload, overall)?;
        tracing::info!(initiative_id, risk_id = id, overall_risk = overall.as_str(), "risk created");
        Ok(CreatedResponse {
            id,
            message: "Risk created successfully".to_string(),
        })
    }

    pub fn update_risk(&self, actor: &Actor, id: i64, payload: &RiskPayload) -> AppResult<MessageResponse> {
        let payload = clean_risk(payload);
        let overall = risk::classify(payload.frequency.as_deref(), payload.severity.as_deref());
        if !self.db.update_risk(actor, id, &payload, overall)? {
            return Err(AppError::NotFound(format!("risk {} not found", id)));
        }
        tracing::info!(risk_id = id, overall_risk = overall.as_str(), "risk updated");
        Ok(MessageResponse::new("Risk updated successfully"))
    }

    pub fn delete_risk(&self, id: i64) -> AppResult<MessageResponse> {
        if !self.db.delete_risk(id)? {
            return Err(AppError::NotFound(format!("risk {} not found", id)));
        }
        Ok(MessageResponse::new("Risk deleted successfully"))
    }

    // ─── Progress updates ───────────────────────────────────────────────────

    pub fn list_progress_updates(&self, initiative_id: i64) -> AppResult<Vec<ProgressUpdate>> {
        self.db.list_progress_updates(initiative_id)
    }

    pub fn create_progress_update(
        &self,
        actor: &Actor,
        initiative_id: i64,
        payload: &ProgressUpdatePayload,
    ) -> AppResult<CreatedResponse> {
        let update_type = required(payload.update_type.as_ref(), "update_type")?;
        let update_title = required(payload.update_title.as_ref(), "update_title")?;
        let details = clean_text(payload.update_details.as_deref());
        let id = self
            .db
            .insert_progress_update(actor, initiative_id, &update_type, &update_title, details.as_deref())?;
        tracing::info!(initiative_id, progress_update_id = id, "progress update created");
        Ok(CreatedResponse {
            id,
            message: "Progress update created successfully".to_string(),
        })
    }

    pub fn update_progress_update(
        &self,
        actor: &Actor,
        id: i64,
        payload: &ProgressUpdatePayload,
    ) -> AppResult<MessageResponse> {
        let update_type = required(payload.update_type.as_ref(), "update_type")?;
        let update_title = required(payload.update_title.as_ref(), "update_title")?;
        let details = clean_text(payload.update_details.as_deref());
        if !self
            .db
            .update_progress_update(actor, id, &update_type, &update_title, details.as_deref())?
        {
            return Err(AppError::NotFound(format!("progress update {} not found", id)));
        }
        Ok(MessageResponse::new("Progress update updated successfully"))
    }

    pub fn delete_progress_update(&self, id: i64) -> AppResult<MessageResponse> {
        if !self.db.delete_progress_update(id)? {
            return Err(AppError::NotFound(format!("progress update {} not found", id)));
        }
        Ok(MessageResponse::new("Progress update deleted successfully"))
    }

    // ─── Advisory ───────────────────────────────────────────────────────────

    pub async fn roi_assistant(&self, actor: &Actor, answers: &Answers) -> AppResult<AdvisoryResponse> {
        let recommendation = self.generate(&prompts::roi_request(answers)).await?;

        let (actor_owned, answers_owned, text) = (actor.clone(), answers.clone(), recommendation.clone());
        self.log_conversation("roi", move |db| {
            db.insert_roi_conversation(&actor_owned, &answers_owned, &text)
        })
        .await;

        Ok(AdvisoryResponse {
            recommendation,
            complexity_score: None,
            value_score: None,
            quadrant: None,
            status: ADVISORY_SUCCESS.to_string(),
        })
    }

    pub async fn complexity_analyzer(&self, actor: &Actor, answers: &Answers) -> AppResult<AdvisoryResponse> {
        let card = scoring::score(answers);
        tracing::info!(
            complexity = card.complexity,
            value = card.value,
            quadrant = %card.quadrant,
            "complexity questionnaire scored"
        );
        let recommendation = self
            .generate(&prompts::complexity_request(answers, &card))
            .await?;

        let initiative_name = clean_text(answers.get("initiative_name").map(String::as_str));
        let (actor_owned, answers_owned, logged_card, text) =
            (actor.clone(), answers.clone(), card.clone(), recommendation.clone());
        self.log_conversation("complexity", move |db| {
            db.insert_complexity_conversation(
                &actor_owned,
                initiative_name.as_deref(),
                &answers_owned,
                &logged_card,
                &text,
            )
        })
        .await;

        Ok(AdvisoryResponse {
            recommendation,
            complexity_score: Some(card.complexity),
            value_score: Some(card.value),
            quadrant: Some(card.quadrant),
            status: ADVISORY_SUCCESS.to_string(),
        })
    }

    /// Best-effort conversation log, written off the async workers.
    async fn log_conversation<F>(&self, kind: &'static str, write: F)
    where
        F: FnOnce(&Database) -> AppResult<i64> + Send + 'static,
    {
        let db = self.db.clone();
        match tokio::task::spawn_blocking(move || write(&db)).await {
            Ok(Ok(id)) => tracing::debug!(conversation = kind, id, "conversation logged"),
            Ok(Err(error)) => tracing::warn!(conversation = kind, error = %error, "failed to log conversation"),
            Err(error) => tracing::warn!(conversation = kind, error = %error, "conversation log task failed"),
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> AppResult<String> {
        match self.generator.generate(request).await {
            Ok(text) => Ok(text),
            Err(error) => {
                let redacted = self.redactor.redact(&error.to_string());
                tracing::error!(
                    generator = self.generator.name(),
                    redactions = redacted.redaction_count,
                    error = %redacted.content,
                    "text generation failed"
                );
                Err(AppError::Generation(ADVISORY_FAILURE.to_string()))
            }
        }
    }

    pub fn list_roi_conversations(&self) -> AppResult<Vec<RoiConversation>> {
        self.db.list_roi_conversations()
    }

    pub fn list_complexity_conversations(&self) -> AppResult<Vec<ComplexityConversation>> {
        self.db.list_complexity_conversations()
    }

    pub fn get_complexity_conversation(&self, id: i64) -> AppResult<ComplexityConversation> {
        self.db
            .get_complexity_conversation(id)?
            .ok_or_else(|| AppError::NotFound(format!("complexity conversation {} not found", id)))
    }

    pub fn complexity_matrix(&self) -> AppResult<Vec<MatrixPoint>> {
        self.db.complexity_matrix()
    }
}

/// Coerces a loosely typed payload. Blank strings and unparsable numbers or
/// dates become `None`.
fn initiative_record(payload: &InitiativePayload) -> InitiativeRecord {
    InitiativeRecord {
        use_case_name: clean_text(payload.use_case_name.as_deref()),
        description: clean_text(payload.description.as_deref()),
        benefit: clean_text(payload.benefit.as_deref()),
        strategic_objective: clean_text(payload.strategic_objective.as_deref()),
        status: clean_text(payload.status.as_deref()),
        percentage_complete: coerce_percentage(payload.percentage_complete.as_ref()),
        process_owner: clean_text(payload.process_owner.as_deref()),
        business_owner: clean_text(payload.business_owner.as_deref()),
        start_date: coerce_date(payload.start_date.as_deref()),
        expected_completion_date: coerce_date(payload.expected_completion_date.as_deref()),
        actual_completion_date: coerce_date(payload.actual_completion_date.as_deref()),
        priority: clean_text(payload.priority.as_deref()),
        risk_level: clean_text(payload.risk_level.as_deref()),
        technology_stack: clean_text(payload.technology_stack.as_deref()),
        team_size: coerce_numeric(payload.team_size.as_ref()).map(|size| size.as_i64()),
        budget_allocated: coerce_numeric(payload.budget_allocated.as_ref()).map(|budget| budget.as_f64()),
        budget_spent: coerce_numeric(payload.budget_spent.as_ref()).map(|budget| budget.as_f64()),
        health_status: clean_text(payload.health_status.as_deref()),
        initiative_type: clean_text(payload.initiative_type.as_deref()),
        is_featured: payload.is_featured.unwrap_or(false),
        featured_month: coerce_month(payload.featured_month.as_deref()),
        departments: payload
            .departments
            .iter()
            .filter_map(|department| clean_text(Some(department)))
            .collect(),
    }
}

fn clean_risk(payload: &RiskPayload) -> RiskPayload {
    RiskPayload {
        risk_title: clean_text(payload.risk_title.as_deref()),
        risk_detail: clean_text(payload.risk_detail.as_deref()),
        frequency: clean_text(payload.frequency.as_deref()),
        severity: clean_text(payload.severity.as_deref()),
        risk_mitigation: Some(clean_text(payload.risk_mitigation.as_deref()).unwrap_or_default()),
        controls: Some(clean_text(payload.controls.as_deref()).unwrap_or_default()),
    }
}

fn metric_period(raw: &str) -> AppResult<String> {
    coerce_month(Some(raw)).ok_or_else(|| AppError::Invalid(format!("invalid metric period: {:?}", raw)))
}

fn metric_name(raw: &str) -> AppResult<String> {
    clean_text(Some(raw)).ok_or_else(|| AppError::Invalid("metric name is required".to_string()))
}

fn required(value: Option<&String>, field: &str) -> AppResult<String> {
    clean_text(value.map(String::as_str)).ok_or_else(|| AppError::Invalid(format!("{} is required", field)))
}

fn initiative_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("initiative {} not found", id))
}

fn option_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("field option {} not found", id))
}

fn period_not_found(initiative_id: i64, period: &str) -> AppError {
    AppError::NotFound(format!(
        "no metrics for initiative {} in period {}",
        initiative_id, period
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::testing::StubGenerator;
    use crate::models::RiskLevel;
    use serde_json::json;

    fn core_with(generator: Arc<dyn TextGenerator>) -> (tempfile::TempDir, TrackerCore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("tracker.sqlite")).expect("db");
        (dir, TrackerCore::new(db, generator))
    }

    fn core() -> (tempfile::TempDir, TrackerCore) {
        core_with(Arc::new(StubGenerator::replying("Track hours saved monthly.")))
    }

    fn payload(value: serde_json::Value) -> InitiativePayload {
        serde_json::from_value(value).expect("payload")
    }

    fn answers(pairs: &[(&str, &str)]) -> Answers {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn create_applies_defaults_and_coerces_fields() {
        let (_dir, core) = core();
        let actor = Actor::default();
        let created = core
            .create_initiative(
                &actor,
                &payload(json!({
                    "use_case_name": "  Claims triage  ",
                    "percentage_complete": "140",
                    "start_date": "2024-03-05T00:00:00Z",
                    "expected_completion_date": "undefined",
                    "team_size": "4",
                    "budget_allocated": 1500.5,
                    "departments": ["Claims", ""],
                    "featured_month": "2024-03-17"
                })),
            )
            .expect("create");

        let initiative = core.get_initiative(created.id).expect("get");
        assert_eq!(initiative.use_case_name.as_deref(), Some("Claims triage"));
        assert_eq!(initiative.status.as_deref(), Some("Ideation"));
        assert_eq!(initiative.health_status.as_deref(), Some("Green"));
        assert_eq!(initiative.initiative_type.as_deref(), Some("Internal AI"));
        assert_eq!(initiative.percentage_complete, Some(100));
        assert_eq!(initiative.start_date.map(|date| date.to_string()).as_deref(), Some("2024-03-05"));
        assert_eq!(initiative.expected_completion_date, None);
        assert_eq!(initiative.team_size, Some(4));
        assert_eq!(initiative.budget_allocated, Some(1500.5));
        assert_eq!(initiative.departments, vec!["Claims"]);
        assert_eq!(initiative.featured_month.as_deref(), Some("2024-03"));
    }

    #[test]
    fn update_is_a_full_replace() {
        let (_dir, core) = core();
        let actor = Actor::default();
        let created = core
            .create_initiative(&actor, &payload(json!({"use_case_name": "A", "benefit": "Cost"})))
            .expect("create");

        core.update_initiative(
            &actor,
            created.id,
            &payload(json!({"use_case_name": "B", "benefit": "   ", "status": "Live (Complete)"})),
        )
        .expect("update");

        let initiative = core.get_initiative(created.id).expect("get");
        assert_eq!(initiative.use_case_name.as_deref(), Some("B"));
        assert_eq!(initiative.benefit, None);
        assert_eq!(initiative.health_status, None);
        assert!(initiative.departments.is_empty());

        let missing = core
            .update_initiative(&actor, created.id + 1, &payload(json!({})))
            .expect_err("missing");
        assert!(missing.is_not_found());
    }

    #[test]
    fn metric_edits_normalize_period_and_report_missing_rows() {
        let (_dir, core) = core();
        let actor = Actor::default();
        let id = core
            .create_initiative(&actor, &payload(json!({"use_case_name": "A"})))
            .expect("create")
            .id;
        let submission: SaveMetricsPayload = serde_json::from_value(json!({
            "metric_period": "2024-05-01",
            "time_saved_hours": "7",
            "additional_metrics": {"hours": {"value": 7, "comments": "pilot"}}
        }))
        .expect("submission");
        core.save_metrics(&actor, id, &submission).expect("save");

        let metric = core.get_metric(id, "2024-05").expect("get");
        assert_eq!(metric.metric_period, "2024-05");
        assert_eq!(metric.additional_metrics["hours"].comments, "pilot");

        let missing = core
            .update_dynamic_metric(
                &actor,
                id,
                "2024-06",
                "hours",
                DynamicMetric {
                    value: json!(1),
                    comments: String::new(),
                },
            )
            .expect_err("no such period");
        assert!(missing.is_not_found());
        assert!(core.delete_dynamic_metric(&actor, id, "2024-06", "hours").expect_err("missing").is_not_found());

        let invalid = core.get_metric(id, "May 2024").expect_err("invalid");
        assert!(matches!(invalid, AppError::Invalid(_)));
    }

    #[test]
    fn padded_metric_names_stay_editable() {
        let (_dir, core) = core();
        let actor = Actor::default();
        let id = core
            .create_initiative(&actor, &payload(json!({"use_case_name": "A"})))
            .expect("create")
            .id;
        let submission: SaveMetricsPayload = serde_json::from_value(json!({
            "metric_period": "2024-05",
            "additional_metrics": {"hours ": {"value": 7, "comments": ""}}
        }))
        .expect("submission");
        core.save_metrics(&actor, id, &submission).expect("save");
        assert!(core.get_metric(id, "2024-05").expect("get").additional_metrics.contains_key("hours"));

        core.delete_dynamic_metric(&actor, id, "2024-05", " hours")
            .expect("delete");
        assert!(core.get_metric(id, "2024-05").expect("get").additional_metrics.is_empty());
    }

    #[test]
    fn trends_respect_filters() {
        let (_dir, core) = core();
        let actor = Actor::default();
        let internal = core
            .create_initiative(&actor, &payload(json!({"use_case_name": "A"})))
            .expect("a")
            .id;
        let vendor = core
            .create_initiative(
                &actor,
                &payload(json!({"use_case_name": "B", "initiative_type": "Vendor"})),
            )
            .expect("b")
            .id;
        for (id, value) in [(internal, 10), (vendor, 20)] {
            let submission: SaveMetricsPayload = serde_json::from_value(json!({
                "metric_period": "2024-01",
                "additional_metrics": {"a": {"value": value, "comments": ""}}
            }))
            .expect("submission");
            core.save_metrics(&actor, id, &submission).expect("save");
        }

        let all = core.monthly_trends(&DashboardFilterQuery::default()).expect("trends");
        assert_eq!(all[0].active_initiatives, 2);
        assert_eq!(all[0].metrics["a"].total, 30.0);

        let vendor_only = core
            .monthly_trends(&DashboardFilterQuery {
                initiative_ids: None,
                initiative_type: Some("Vendor".to_string()),
            })
            .expect("trends");
        assert_eq!(vendor_only[0].active_initiatives, 1);
        assert_eq!(vendor_only[0].metrics["a"].total, 20.0);

        let drilldown = core
            .period_drilldown("2024-01", &DashboardFilterQuery {
                initiative_ids: Some(format!("{}, junk", internal)),
                initiative_type: None,
            })
            .expect("drilldown");
        assert_eq!(drilldown.initiatives.len(), 1);
        assert_eq!(drilldown.initiatives[0].id, internal);

        let by_metric = core
            .metric_drilldown("a", &DashboardFilterQuery::default())
            .expect("metric drilldown");
        assert_eq!(by_metric.by_period["2024-01"].len(), 2);
    }

    #[test]
    fn risk_level_is_always_derived() {
        let (_dir, core) = core();
        let actor = Actor::default();
        let id = core
            .create_initiative(&actor, &payload(json!({"use_case_name": "A"})))
            .expect("create")
            .id;
        let body: RiskPayload = serde_json::from_value(json!({
            "risk_title": "Model drift",
            "frequency": " High ",
            "severity": "Medium",
            "overall_risk": "Low"
        }))
        .expect("risk payload");

        let created = core.create_risk(&actor, id, &body).expect("risk");
        let risks = core.list_risks(id).expect("risks");
        assert_eq!(risks[0].id, created.id);
        assert_eq!(risks[0].overall_risk, RiskLevel::High);
        assert_eq!(risks[0].controls.as_deref(), Some(""));

        let downgraded = RiskPayload {
            frequency: Some("Low".to_string()),
            ..body
        };
        core.update_risk(&actor, created.id, &downgraded).expect("update");
        assert_eq!(core.list_risks(id).expect("risks")[0].overall_risk, RiskLevel::Low);
        assert!(core.delete_risk(created.id + 10).expect_err("missing").is_not_found());
    }

    #[test]
    fn field_option_rename_defaults_to_stored_values() {
        let (_dir, core) = core();
        let actor = Actor::default();
        let id = core
            .create_initiative(&actor, &payload(json!({"use_case_name": "A", "priority": "P1"})))
            .expect("create")
            .id;
        let option = core
            .create_field_option(
                &actor,
                &CreateFieldOptionPayload {
                    field_name: "priority".to_string(),
                    option_value: "P1".to_string(),
                    display_order: Some(1),
                },
            )
            .expect("option");

        let renamed = core
            .update_field_option(
                &actor,
                option.id,
                &UpdateFieldOptionPayload {
                    option_value: "Critical".to_string(),
                    ..UpdateFieldOptionPayload::default()
                },
            )
            .expect("rename");
        assert_eq!(renamed.propagated, 1);
        assert_eq!(
            core.get_initiative(id).expect("get").priority.as_deref(),
            Some("Critical")
        );

        let blank = core.create_field_option(
            &actor,
            &CreateFieldOptionPayload {
                field_name: " ".to_string(),
                option_value: "x".to_string(),
                display_order: None,
            },
        );
        assert!(matches!(blank, Err(AppError::Invalid(_))));
    }

    #[test]
    fn progress_updates_require_type_and_title() {
        let (_dir, core) = core();
        let actor = Actor::default();
        let id = core
            .create_initiative(&actor, &payload(json!({"use_case_name": "A"})))
            .expect("create")
            .id;

        let missing_title = core.create_progress_update(
            &actor,
            id,
            &ProgressUpdatePayload {
                update_type: Some("Milestone".to_string()),
                ..ProgressUpdatePayload::default()
            },
        );
        assert!(matches!(missing_title, Err(AppError::Invalid(_))));

        let created = core
            .create_progress_update(
                &actor,
                id,
                &ProgressUpdatePayload {
                    update_type: Some("Milestone".to_string()),
                    update_title: Some("Pilot live".to_string()),
                    update_details: Some("  ".to_string()),
                },
            )
            .expect("create");
        let updates = core.list_progress_updates(id).expect("list");
        assert_eq!(updates[0].id, created.id);
        assert_eq!(updates[0].update_details, None);
    }

    #[tokio::test]
    async fn complexity_analysis_scores_and_logs_conversation() {
        let stub = Arc::new(StubGenerator::replying("Start with a narrow pilot."));
        let (_dir, core) = core_with(stub.clone());
        let actor = Actor::default();

        let response = core
            .complexity_analyzer(&actor, &answers(&[("initiative_name", " Claims triage ")]))
            .await
            .expect("analysis");
        assert_eq!(response.recommendation, "Start with a narrow pilot.");
        assert_eq!(response.complexity_score, Some(50.0));
        assert_eq!(response.quadrant.as_deref(), Some("Evaluate Further"));
        assert_eq!(response.status, "success");

        let requests = stub.requests.lock().expect("requests");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, 2500);
        assert!(requests[0].prompt.starts_with("Initiative: Claims triage"));
        drop(requests);

        let logged = core.list_complexity_conversations().expect("list");
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].initiative_name.as_deref(), Some("Claims triage"));
        let fetched = core.get_complexity_conversation(logged[0].id).expect("get");
        assert_eq!(fetched.quadrant, "Evaluate Further");
        assert_eq!(core.complexity_matrix().expect("matrix").len(), 1);
    }

    #[tokio::test]
    async fn generator_failure_is_generic_and_not_logged() {
        let (_dir, core) = core_with(Arc::new(StubGenerator::failing()));
        let error = core
            .roi_assistant(&Actor::default(), &answers(&[("value_type", "Cost savings")]))
            .await
            .expect_err("should fail");

        match error {
            AppError::Generation(message) => {
                assert_eq!(message, ADVISORY_FAILURE);
                assert!(!message.contains("sk-test"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(core.list_roi_conversations().expect("list").is_empty());
    }

    #[tokio::test]
    async fn roi_assistant_returns_text_without_scores() {
        let (_dir, core) = core();
        let response = core
            .roi_assistant(&Actor::default(), &answers(&[("scale", "Department")]))
            .await
            .expect("roi");
        assert_eq!(response.recommendation, "Track hours saved monthly.");
        assert!(response.complexity_score.is_none());
        let logged = core.list_roi_conversations().expect("list");
        assert_eq!(logged[0].responses["scale"], "Department");
    }
}
