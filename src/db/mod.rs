use crate::coerce::{decode_or_default, NumericValue};
use crate::errors::{AppError, AppResult};
use crate::metrics::merge::{self, FixedReading, FIXED_METRIC_COLUMNS};
use crate::models::{
    Actor, AdditionalMetrics, Answers, BenefitCount, ComplexityConversation, CustomMetric, DashboardStats,
    DepartmentCount, DynamicMetric, FieldOption, Initiative, InitiativeFilters, InitiativeMetricRow,
    InitiativeRecord, InitiativeSummary, MatrixPoint, MonthlyMetric, OwnerKind, PeriodMetricRow, ProgressUpdate,
    Risk, RiskLevel, RiskPayload, RoiConversation,
};
use crate::options::{needs_propagation, PropagationTarget};
use crate::scoring::ScoreCard;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const SCHEMA_SQL: &str = include_str!("schema.sql");

const INITIATIVE_COLUMNS: &str = "id, use_case_name, description, benefit, strategic_objective, status,
    percentage_complete, process_owner, business_owner, start_date, expected_completion_date,
    actual_completion_date, priority, risk_level, technology_stack, team_size, budget_allocated,
    budget_spent, health_status, initiative_type, is_featured, featured_month, is_pinned, pinned_at,
    created_at, created_by_name, created_by_email, modified_at, modified_by_name, modified_by_email";

const SUMMARY_COLUMNS: &str =
    "id, use_case_name, description, percentage_complete, health_status, status, initiative_type, pinned_at";

const RISK_COLUMNS: &str = "id, initiative_id, risk_title, risk_detail, frequency, severity, risk_mitigation,
    controls, overall_risk, created_at, created_by_name, created_by_email, modified_at, modified_by_name,
    modified_by_email";

const PROGRESS_COLUMNS: &str = "id, initiative_id, update_type, update_title, update_details, created_at,
    created_by_name, created_by_email, modified_at, modified_by_name, modified_by_email";

const COMPLEXITY_COLUMNS: &str = "id, initiative_name, responses_json, complexity_score, value_score, quadrant,
    llm_recommendation, created_at, created_by_name, created_by_email";

/// First column of the fixed metric pairs in [`METRIC_SELECT_SQL`] rows.
const FIXED_OFFSET: usize = 3;

static FIXED_COLUMN_LIST: Lazy<String> = Lazy::new(|| {
    FIXED_METRIC_COLUMNS
        .iter()
        .map(|column| format!("{}, {}", column.value, column.comments))
        .collect::<Vec<_>>()
        .join(", ")
});

static METRIC_SELECT_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT id, initiative_id, metric_period, {}, additional_metrics, created_at, created_by_name,
         created_by_email, modified_at, modified_by_name, modified_by_email FROM monthly_metrics",
        FIXED_COLUMN_LIST.as_str()
    )
});

static METRIC_INSERT_SQL: Lazy<String> = Lazy::new(|| {
    let placeholders = vec!["?"; 2 + FIXED_METRIC_COLUMNS.len() * 2 + 7].join(", ");
    format!(
        "INSERT INTO monthly_metrics (initiative_id, metric_period, {}, additional_metrics, created_at,
         created_by_name, created_by_email, modified_at, modified_by_name, modified_by_email)
         VALUES ({})",
        FIXED_COLUMN_LIST.as_str(),
        placeholders
    )
});

static METRIC_UPDATE_SQL: Lazy<String> = Lazy::new(|| {
    let assignments = FIXED_METRIC_COLUMNS
        .iter()
        .map(|column| format!("{} = ?, {} = ?", column.value, column.comments))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE monthly_metrics SET {}, additional_metrics = ?, modified_at = ?, modified_by_name = ?,
         modified_by_email = ? WHERE id = ?",
        assignments
    )
});

/// Result of an insert-or-merge metrics submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedMetrics {
    pub id: i64,
    pub created: bool,
}

/// SQLite-backed store. Holds only the file path; every call opens its own
/// connection and drops it before returning.
#[derive(Debug, Clone)]
pub struct Database {
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let db = Self {
            db_path: path.to_path_buf(),
        };
        let conn = db.connect()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> AppResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    pub fn ping(&self) -> AppResult<()> {
        let conn = self.connect()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // ─── Initiatives ────────────────────────────────────────────────────────

    pub fn list_initiatives(&self, filters: &InitiativeFilters) -> AppResult<Vec<Initiative>> {
        let conn = self.connect()?;
        let status = filters.status.as_deref().filter(|value| !value.is_empty());
        let department = filters.department.as_deref().filter(|value| !value.is_empty());

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM initiatives
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 IS NULL OR id IN (SELECT initiative_id FROM initiative_departments WHERE department = ?2))
             ORDER BY modified_at DESC, id DESC",
            INITIATIVE_COLUMNS
        ))?;
        let mut initiatives = stmt
            .query_map(params![status, department], parse_initiative_row)?
            .collect::<Result<Vec<_>, _>>()?;

        attach_departments(&conn, &mut initiatives)?;
        Ok(initiatives)
    }

    pub fn get_initiative(&self, id: i64) -> AppResult<Option<Initiative>> {
        let conn = self.connect()?;
        let initiative = conn
            .query_row(
                &format!("SELECT {} FROM initiatives WHERE id = ?1", INITIATIVE_COLUMNS),
                [id],
                parse_initiative_row,
            )
            .optional()?;

        match initiative {
            Some(mut initiative) => {
                initiative.departments = departments_of(&conn, id)?;
                Ok(Some(initiative))
            }
            None => Ok(None),
        }
    }

    pub fn insert_initiative(&self, actor: &Actor, record: &InitiativeRecord) -> AppResult<i64> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO initiatives (
               use_case_name, description, benefit, strategic_objective, status, percentage_complete,
               process_owner, business_owner, start_date, expected_completion_date, actual_completion_date,
               priority, risk_level, technology_stack, team_size, budget_allocated, budget_spent,
               health_status, initiative_type, is_featured, featured_month,
               created_at, created_by_name, created_by_email, modified_at, modified_by_name, modified_by_email
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19,
                       ?20, ?21, ?22, ?23, ?24, ?22, ?23, ?24)",
            params![
                record.use_case_name,
                record.description,
                record.benefit,
                record.strategic_objective,
                record.status,
                record.percentage_complete,
                record.process_owner,
                record.business_owner,
                record.start_date,
                record.expected_completion_date,
                record.actual_completion_date,
                record.priority,
                record.risk_level,
                record.technology_stack,
                record.team_size,
                record.budget_allocated,
                record.budget_spent,
                record.health_status,
                record.initiative_type,
                record.is_featured,
                record.featured_month,
                now,
                actor.name,
                actor.email,
            ],
        )?;
        let id = tx.last_insert_rowid();
        replace_departments(&tx, id, &record.departments)?;
        tx.commit()?;
        Ok(id)
    }

    /// Full replace of the initiative fields and its department tags.
    /// Returns `false` when no initiative has this id.
    pub fn update_initiative(&self, actor: &Actor, id: i64, record: &InitiativeRecord) -> AppResult<bool> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE initiatives SET
               use_case_name = ?1, description = ?2, benefit = ?3, strategic_objective = ?4, status = ?5,
               percentage_complete = ?6, process_owner = ?7, business_owner = ?8, start_date = ?9,
               expected_completion_date = ?10, actual_completion_date = ?11, priority = ?12, risk_level = ?13,
               technology_stack = ?14, team_size = ?15, budget_allocated = ?16, budget_spent = ?17,
               health_status = ?18, initiative_type = ?19, is_featured = ?20, featured_month = ?21,
               modified_at = ?22, modified_by_name = ?23, modified_by_email = ?24
             WHERE id = ?25",
            params![
                record.use_case_name,
                record.description,
                record.benefit,
                record.strategic_objective,
                record.status,
                record.percentage_complete,
                record.process_owner,
                record.business_owner,
                record.start_date,
                record.expected_completion_date,
                record.actual_completion_date,
                record.priority,
                record.risk_level,
                record.technology_stack,
                record.team_size,
                record.budget_allocated,
                record.budget_spent,
                record.health_status,
                record.initiative_type,
                record.is_featured,
                record.featured_month,
                now,
                actor.name,
                actor.email,
                id,
            ],
        )?;
        if changed == 0 {
            return Ok(false);
        }
        replace_departments(&tx, id, &record.departments)?;
        tx.commit()?;
        Ok(true)
    }

    /// Hard delete; dependents go with it through `ON DELETE CASCADE`.
    pub fn delete_initiative(&self, id: i64) -> AppResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute("DELETE FROM initiatives WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    pub fn set_pinned(&self, id: i64, pinned: bool) -> AppResult<bool> {
        let conn = self.connect()?;
        let pinned_at = pinned.then(|| Utc::now().to_rfc3339());
        let changed = conn.execute(
            "UPDATE initiatives SET is_pinned = ?1, pinned_at = ?2 WHERE id = ?3",
            params![pinned, pinned_at, id],
        )?;
        Ok(changed > 0)
    }

    pub fn featured_initiatives(&self, month: Option<&str>) -> AppResult<Vec<Initiative>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM initiatives
             WHERE is_featured = 1 AND (?1 IS NULL OR featured_month = ?1)
             ORDER BY featured_month DESC, modified_at DESC",
            INITIATIVE_COLUMNS
        ))?;
        let mut initiatives = stmt
            .query_map([month], parse_initiative_row)?
            .collect::<Result<Vec<_>, _>>()?;

        attach_departments(&conn, &mut initiatives)?;
        Ok(initiatives)
    }

    pub fn owner_suggestions(&self, kind: OwnerKind) -> AppResult<Vec<String>> {
        let conn = self.connect()?;
        let column = kind.column();
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT {column} FROM initiatives WHERE {column} IS NOT NULL ORDER BY {column}"
        ))?;
        let owners = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(owners)
    }

    // ─── Monthly metrics ────────────────────────────────────────────────────

    pub fn list_metrics(&self, initiative_id: i64) -> AppResult<Vec<MonthlyMetric>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE initiative_id = ?1 ORDER BY metric_period DESC",
            METRIC_SELECT_SQL.as_str()
        ))?;
        let metrics = stmt
            .query_map([initiative_id], parse_metric_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(metrics)
    }

    pub fn get_metric(&self, initiative_id: i64, period: &str) -> AppResult<Option<MonthlyMetric>> {
        let conn = self.connect()?;
        conn.query_row(
            &format!(
                "{} WHERE initiative_id = ?1 AND metric_period = ?2",
                METRIC_SELECT_SQL.as_str()
            ),
            params![initiative_id, period],
            parse_metric_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Inserts the period row on first submission; afterwards replaces the
    /// fixed columns and merges `incoming` into the stored blob.
    pub fn save_metrics(
        &self,
        actor: &Actor,
        initiative_id: i64,
        period: &str,
        readings: &[FixedReading],
        incoming: &AdditionalMetrics,
    ) -> AppResult<SavedMetrics> {
        if readings.len() != FIXED_METRIC_COLUMNS.len() {
            return Err(AppError::Invalid(format!(
                "expected {} fixed metric readings, got {}",
                FIXED_METRIC_COLUMNS.len(),
                readings.len()
            )));
        }

        let now = Utc::now().to_rfc3339();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_initiative(&tx, initiative_id)?;

        let existing = find_period_row(&tx, initiative_id, period)?;
        let saved = match existing {
            Some((id, stored)) => {
                let merged = merge::merge(stored.as_deref(), incoming)?;
                let mut values = fixed_params(readings);
                values.push(&merged);
                values.push(&now);
                values.push(&actor.name);
                values.push(&actor.email);
                values.push(&id);
                tx.execute(METRIC_UPDATE_SQL.as_str(), values.as_slice())?;
                SavedMetrics { id, created: false }
            }
            None => {
                let encoded = merge::encode_metrics(incoming)?;
                let mut values: Vec<&dyn ToSql> = vec![&initiative_id, &period];
                values.extend(fixed_params(readings));
                values.push(&encoded);
                values.push(&now);
                values.push(&actor.name);
                values.push(&actor.email);
                values.push(&now);
                values.push(&actor.name);
                values.push(&actor.email);
                tx.execute(METRIC_INSERT_SQL.as_str(), values.as_slice())?;
                SavedMetrics {
                    id: tx.last_insert_rowid(),
                    created: true,
                }
            }
        };

        tx.commit()?;
        Ok(saved)
    }

    /// Sets one dynamic metric. Returns `false` when the period row is absent.
    pub fn upsert_dynamic_metric(
        &self,
        actor: &Actor,
        initiative_id: i64,
        period: &str,
        name: &str,
        metric: DynamicMetric,
    ) -> AppResult<bool> {
        self.rewrite_dynamic_metrics(actor, initiative_id, period, |stored| {
            merge::upsert_metric(stored, name, metric)
        })
    }

    /// Drops one dynamic metric. Returns `false` when the period row is absent.
    pub fn remove_dynamic_metric(&self, actor: &Actor, initiative_id: i64, period: &str, name: &str) -> AppResult<bool> {
        self.rewrite_dynamic_metrics(actor, initiative_id, period, |stored| {
            merge::remove_metric(stored, name)
        })
    }

    fn rewrite_dynamic_metrics<F>(&self, actor: &Actor, initiative_id: i64, period: &str, edit: F) -> AppResult<bool>
    where
        F: FnOnce(Option<&str>) -> AppResult<Option<String>>,
    {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some((id, stored)) = find_period_row(&tx, initiative_id, period)? else {
            return Ok(false);
        };

        let updated = edit(stored.as_deref())?;
        tx.execute(
            "UPDATE monthly_metrics SET additional_metrics = ?1, modified_at = ?2, modified_by_name = ?3,
             modified_by_email = ?4 WHERE id = ?5",
            params![updated, now, actor.name, actor.email, id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    pub fn delete_period(&self, initiative_id: i64, period: &str) -> AppResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "DELETE FROM monthly_metrics WHERE initiative_id = ?1 AND metric_period = ?2",
            params![initiative_id, period],
        )?;
        Ok(changed > 0)
    }

    // ─── Dashboard ──────────────────────────────────────────────────────────

    pub fn dashboard_stats(&self, now: DateTime<Utc>) -> AppResult<DashboardStats> {
        let conn = self.connect()?;
        let current_month = now.format("%Y-%m").to_string();

        let (total_initiatives, ideation_count, in_progress_count, completed_count, avg_completion, new_initiatives_count) =
            conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN status = 'Ideation' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status = 'In Progress' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status = 'Live (Complete)' THEN 1 ELSE 0 END), 0),
                        AVG(percentage_complete),
                        COALESCE(SUM(CASE WHEN substr(created_at, 1, 7) = ?1 THEN 1 ELSE 0 END), 0)
                 FROM initiatives",
                [current_month.as_str()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )?;

        let in_progress_initiatives = query_summaries(
            &conn,
            "WHERE status = 'In Progress' ORDER BY modified_at DESC LIMIT 10",
        )?;
        let pinned_initiatives = query_summaries(&conn, "WHERE is_pinned = 1 ORDER BY pinned_at DESC")?;

        let mut stmt = conn.prepare(
            "SELECT d.department, COUNT(*) AS count
             FROM initiative_departments d
             JOIN initiatives i ON i.id = d.initiative_id
             GROUP BY d.department
             ORDER BY count DESC, d.department",
        )?;
        let by_department = stmt
            .query_map([], |row| {
                Ok(DepartmentCount {
                    department: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT benefit, COUNT(*) AS count FROM initiatives
             WHERE benefit IS NOT NULL
             GROUP BY benefit
             ORDER BY count DESC, benefit",
        )?;
        let by_benefit = stmt
            .query_map([], |row| {
                Ok(BenefitCount {
                    benefit: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DashboardStats {
            total_initiatives,
            ideation_count,
            in_progress_count,
            completed_count,
            avg_completion,
            new_initiatives_count,
            in_progress_initiatives,
            by_department,
            by_benefit,
            pinned_initiatives,
        })
    }

    /// `(period, initiative, blob)` rows for the trend aggregation.
    pub fn period_metric_rows(&self) -> AppResult<Vec<PeriodMetricRow>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT mm.metric_period, mm.initiative_id, i.initiative_type, mm.additional_metrics
             FROM monthly_metrics mm
             JOIN initiatives i ON i.id = mm.initiative_id
             ORDER BY mm.metric_period, mm.initiative_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PeriodMetricRow {
                    metric_period: row.get(0)?,
                    initiative_id: row.get(1)?,
                    initiative_type: row.get(2)?,
                    additional_metrics: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Metrics rows joined with initiative fields, optionally for one period.
    pub fn initiative_metric_rows(&self, period: Option<&str>) -> AppResult<Vec<InitiativeMetricRow>> {
        let conn = self.connect()?;
        let departments = all_departments(&conn)?;
        let mut stmt = conn.prepare(
            "SELECT i.id, i.use_case_name, i.status, i.health_status, i.percentage_complete,
                    i.initiative_type, mm.metric_period, mm.additional_metrics
             FROM monthly_metrics mm
             JOIN initiatives i ON i.id = mm.initiative_id
             WHERE ?1 IS NULL OR mm.metric_period = ?1
             ORDER BY mm.metric_period, i.use_case_name",
        )?;
        let rows = stmt
            .query_map([period], |row| {
                let initiative_id: i64 = row.get(0)?;
                Ok(InitiativeMetricRow {
                    initiative_id,
                    use_case_name: row.get(1)?,
                    status: row.get(2)?,
                    health_status: row.get(3)?,
                    percentage_complete: row.get(4)?,
                    initiative_type: row.get(5)?,
                    departments: departments.get(&initiative_id).cloned().unwrap_or_default(),
                    metric_period: row.get(6)?,
                    additional_metrics: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ─── Field options / custom metrics ─────────────────────────────────────

    pub fn list_field_options(&self, field_name: Option<&str>) -> AppResult<Vec<FieldOption>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, field_name, option_value, display_order, is_active, created_at, created_by,
                    modified_at, modified_by
             FROM field_options
             WHERE is_active = 1 AND (?1 IS NULL OR field_name = ?1)
             ORDER BY field_name, display_order, option_value",
        )?;
        let options = stmt
            .query_map([field_name], parse_field_option_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(options)
    }

    pub fn get_field_option(&self, id: i64) -> AppResult<Option<FieldOption>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT id, field_name, option_value, display_order, is_active, created_at, created_by,
                    modified_at, modified_by
             FROM field_options WHERE id = ?1",
            [id],
            parse_field_option_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn insert_field_option(
        &self,
        actor: &Actor,
        field_name: &str,
        option_value: &str,
        display_order: i64,
    ) -> AppResult<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO field_options (field_name, option_value, display_order, is_active, created_at,
               created_by, modified_at, modified_by)
             VALUES (?1, ?2, ?3, 1, ?4, ?5, ?4, ?5)",
            params![field_name, option_value, display_order, now, actor.email],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Rewrites the option row, then every initiative or department row still
    /// holding `old_value` for a propagated field. Returns the number of
    /// propagated rows, or `None` when the option does not exist.
    pub fn rename_field_option(
        &self,
        actor: &Actor,
        id: i64,
        field_name: &str,
        old_value: &str,
        new_value: &str,
        display_order: i64,
    ) -> AppResult<Option<usize>> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE field_options SET option_value = ?1, display_order = ?2, modified_at = ?3, modified_by = ?4
             WHERE id = ?5",
            params![new_value, display_order, now, actor.email, id],
        )?;
        if changed == 0 {
            return Ok(None);
        }

        let propagated = match PropagationTarget::for_field(field_name) {
            Some(target) if needs_propagation(old_value, new_value) => {
                propagate_rename(&tx, target, old_value, new_value)?
            }
            _ => 0,
        };
        tx.commit()?;
        Ok(Some(propagated))
    }

    /// Soft delete.
    pub fn deactivate_field_option(&self, actor: &Actor, id: i64) -> AppResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE field_options SET is_active = 0, modified_at = ?1, modified_by = ?2 WHERE id = ?3",
            params![Utc::now().to_rfc3339(), actor.email, id],
        )?;
        Ok(changed > 0)
    }

    pub fn list_custom_metrics(&self) -> AppResult<Vec<CustomMetric>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, metric_name, metric_description, metric_type, unit_of_measure, is_active,
                    created_at, created_by, modified_at, modified_by
             FROM custom_metrics WHERE is_active = 1 ORDER BY metric_name",
        )?;
        let metrics = stmt
            .query_map([], |row| {
                Ok(CustomMetric {
                    id: row.get(0)?,
                    metric_name: row.get(1)?,
                    metric_description: row.get(2)?,
                    metric_type: row.get(3)?,
                    unit_of_measure: row.get(4)?,
                    is_active: row.get::<_, i64>(5)? != 0,
                    created_at: parse_time(&row.get::<_, String>(6)?)?,
                    created_by: row.get(7)?,
                    modified_at: parse_time(&row.get::<_, String>(8)?)?,
                    modified_by: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(metrics)
    }

    pub fn insert_custom_metric(
        &self,
        actor: &Actor,
        metric_name: &str,
        metric_description: Option<&str>,
        metric_type: Option<&str>,
        unit_of_measure: Option<&str>,
    ) -> AppResult<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO custom_metrics (metric_name, metric_description, metric_type, unit_of_measure,
               is_active, created_at, created_by, modified_at, modified_by)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?5, ?6)",
            params![metric_name, metric_description, metric_type, unit_of_measure, now, actor.email],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // ─── Risks ──────────────────────────────────────────────────────────────

    pub fn list_risks(&self, initiative_id: i64) -> AppResult<Vec<Risk>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM risks WHERE initiative_id = ?1 ORDER BY created_at DESC, id DESC",
            RISK_COLUMNS
        ))?;
        let risks = stmt
            .query_map([initiative_id], parse_risk_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(risks)
    }

    pub fn get_risk(&self, id: i64) -> AppResult<Option<Risk>> {
        let conn = self.connect()?;
        conn.query_row(
            &format!("SELECT {} FROM risks WHERE id = ?1", RISK_COLUMNS),
            [id],
            parse_risk_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn insert_risk(
        &self,
        actor: &Actor,
        initiative_id: i64,
        payload: &RiskPayload,
        overall_risk: RiskLevel,
    ) -> AppResult<i64> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_initiative(&tx, initiative_id)?;
        tx.execute(
            "INSERT INTO risks (initiative_id, risk_title, risk_detail, frequency, severity, risk_mitigation,
               controls, overall_risk, created_at, created_by_name, created_by_email, modified_at,
               modified_by_name, modified_by_email)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?9, ?10, ?11)",
            params![
                initiative_id,
                payload.risk_title,
                payload.risk_detail,
                payload.frequency,
                payload.severity,
                payload.risk_mitigation,
                payload.controls,
                overall_risk.as_str(),
                now,
                actor.name,
                actor.email,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    pub fn update_risk(&self, actor: &Actor, id: i64, payload: &RiskPayload, overall_risk: RiskLevel) -> AppResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE risks SET risk_title = ?1, risk_detail = ?2, frequency = ?3, severity = ?4,
               risk_mitigation = ?5, controls = ?6, overall_risk = ?7, modified_at = ?8,
               modified_by_name = ?9, modified_by_email = ?10
             WHERE id = ?11",
            params![
                payload.risk_title,
                payload.risk_detail,
                payload.frequency,
                payload.severity,
                payload.risk_mitigation,
                payload.controls,
                overall_risk.as_str(),
                Utc::now().to_rfc3339(),
                actor.name,
                actor.email,
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_risk(&self, id: i64) -> AppResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute("DELETE FROM risks WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    // ─── Progress updates ───────────────────────────────────────────────────

    pub fn list_progress_updates(&self, initiative_id: i64) -> AppResult<Vec<ProgressUpdate>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM progress_updates WHERE initiative_id = ?1 ORDER BY created_at DESC, id DESC",
            PROGRESS_COLUMNS
        ))?;
        let updates = stmt
            .query_map([initiative_id], parse_progress_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(updates)
    }

    pub fn insert_progress_update(
        &self,
        actor: &Actor,
        initiative_id: i64,
        update_type: &str,
        update_title: &str,
        update_details: Option<&str>,
    ) -> AppResult<i64> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_initiative(&tx, initiative_id)?;
        tx.execute(
            "INSERT INTO progress_updates (initiative_id, update_type, update_title, update_details,
               created_at, created_by_name, created_by_email, modified_at, modified_by_name, modified_by_email)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?5, ?6, ?7)",
            params![
                initiative_id,
                update_type,
                update_title,
                update_details,
                now,
                actor.name,
                actor.email,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    pub fn update_progress_update(
        &self,
        actor: &Actor,
        id: i64,
        update_type: &str,
        update_title: &str,
        update_details: Option<&str>,
    ) -> AppResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE progress_updates SET update_type = ?1, update_title = ?2, update_details = ?3,
               modified_at = ?4, modified_by_name = ?5, modified_by_email = ?6
             WHERE id = ?7",
            params![
                update_type,
                update_title,
                update_details,
                Utc::now().to_rfc3339(),
                actor.name,
                actor.email,
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_progress_update(&self, id: i64) -> AppResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute("DELETE FROM progress_updates WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    // ─── Advisory conversations ─────────────────────────────────────────────

    pub fn insert_roi_conversation(&self, actor: &Actor, answers: &Answers, recommendation: &str) -> AppResult<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO roi_conversations (responses_json, recommendation, created_at, created_by_name,
               created_by_email)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                serde_json::to_string(answers)?,
                recommendation,
                Utc::now().to_rfc3339(),
                actor.name,
                actor.email,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_roi_conversations(&self) -> AppResult<Vec<RoiConversation>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, responses_json, recommendation, created_at, created_by_name, created_by_email
             FROM roi_conversations ORDER BY created_at DESC, id DESC",
        )?;
        let conversations = stmt
            .query_map([], |row| {
                Ok(RoiConversation {
                    id: row.get(0)?,
                    responses: decode_or_default(row.get::<_, Option<String>>(1)?.as_deref()),
                    recommendation: row.get(2)?,
                    created_at: parse_time(&row.get::<_, String>(3)?)?,
                    created_by_name: row.get(4)?,
                    created_by_email: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(conversations)
    }

    pub fn insert_complexity_conversation(
        &self,
        actor: &Actor,
        initiative_name: Option<&str>,
        answers: &Answers,
        card: &ScoreCard,
        recommendation: &str,
    ) -> AppResult<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO complexity_conversations (initiative_name, responses_json, complexity_score,
               value_score, quadrant, llm_recommendation, created_at, created_by_name, created_by_email)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                initiative_name,
                serde_json::to_string(answers)?,
                card.complexity,
                card.value,
                card.quadrant,
                recommendation,
                Utc::now().to_rfc3339(),
                actor.name,
                actor.email,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_complexity_conversations(&self) -> AppResult<Vec<ComplexityConversation>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM complexity_conversations ORDER BY created_at DESC, id DESC",
            COMPLEXITY_COLUMNS
        ))?;
        let conversations = stmt
            .query_map([], parse_complexity_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(conversations)
    }

    pub fn get_complexity_conversation(&self, id: i64) -> AppResult<Option<ComplexityConversation>> {
        let conn = self.connect()?;
        conn.query_row(
            &format!("SELECT {} FROM complexity_conversations WHERE id = ?1", COMPLEXITY_COLUMNS),
            [id],
            parse_complexity_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn complexity_matrix(&self) -> AppResult<Vec<MatrixPoint>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, initiative_name, complexity_score, value_score, quadrant
             FROM complexity_conversations ORDER BY created_at DESC, id DESC",
        )?;
        let points = stmt
            .query_map([], |row| {
                Ok(MatrixPoint {
                    id: row.get(0)?,
                    initiative_name: row.get(1)?,
                    complexity_score: row.get(2)?,
                    value_score: row.get(3)?,
                    quadrant: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(points)
    }
}

fn ensure_initiative(conn: &Connection, initiative_id: i64) -> AppResult<()> {
    let exists = conn
        .query_row("SELECT 1 FROM initiatives WHERE id = ?1", [initiative_id], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("initiative {} not found", initiative_id)))
    }
}

fn find_period_row(conn: &Connection, initiative_id: i64, period: &str) -> AppResult<Option<(i64, Option<String>)>> {
    conn.query_row(
        "SELECT id, additional_metrics FROM monthly_metrics WHERE initiative_id = ?1 AND metric_period = ?2",
        params![initiative_id, period],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
    .map_err(AppError::from)
}

fn fixed_params(readings: &[FixedReading]) -> Vec<&dyn ToSql> {
    readings
        .iter()
        .flat_map(|reading| [&reading.value as &dyn ToSql, &reading.comments as &dyn ToSql])
        .collect()
}

fn propagate_rename(
    tx: &Transaction<'_>,
    target: PropagationTarget,
    old_value: &str,
    new_value: &str,
) -> AppResult<usize> {
    let changed = match target {
        PropagationTarget::InitiativeColumn(column) => tx.execute(
            &format!("UPDATE initiatives SET {column} = ?1 WHERE {column} = ?2"),
            params![new_value, old_value],
        )?,
        PropagationTarget::DepartmentTag => tx.execute(
            "UPDATE initiative_departments SET department = ?1 WHERE department = ?2",
            params![new_value, old_value],
        )?,
    };
    Ok(changed)
}

fn replace_departments(tx: &Transaction<'_>, initiative_id: i64, departments: &[String]) -> AppResult<()> {
    tx.execute(
        "DELETE FROM initiative_departments WHERE initiative_id = ?1",
        [initiative_id],
    )?;
    for department in departments.iter().map(|value| value.trim()).filter(|value| !value.is_empty()) {
        tx.execute(
            "INSERT INTO initiative_departments (initiative_id, department) VALUES (?1, ?2)",
            params![initiative_id, department],
        )?;
    }
    Ok(())
}

fn departments_of(conn: &Connection, initiative_id: i64) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT department FROM initiative_departments WHERE initiative_id = ?1 ORDER BY id")?;
    let departments = stmt
        .query_map([initiative_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(departments)
}

fn all_departments(conn: &Connection) -> AppResult<BTreeMap<i64, Vec<String>>> {
    let mut stmt = conn.prepare("SELECT initiative_id, department FROM initiative_departments ORDER BY id")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

    let mut departments: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for row in rows {
        let (initiative_id, department) = row?;
        departments.entry(initiative_id).or_default().push(department);
    }
    Ok(departments)
}

fn attach_departments(conn: &Connection, initiatives: &mut [Initiative]) -> AppResult<()> {
    let mut departments = all_departments(conn)?;
    for initiative in initiatives.iter_mut() {
        initiative.departments = departments.remove(&initiative.id).unwrap_or_default();
    }
    Ok(())
}

fn query_summaries(conn: &Connection, tail: &str) -> AppResult<Vec<InitiativeSummary>> {
    let departments = all_departments(conn)?;
    let mut stmt = conn.prepare(&format!("SELECT {} FROM initiatives {}", SUMMARY_COLUMNS, tail))?;
    let summaries = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            Ok(InitiativeSummary {
                id,
                use_case_name: row.get(1)?,
                description: row.get(2)?,
                percentage_complete: row.get(3)?,
                health_status: row.get(4)?,
                status: row.get(5)?,
                initiative_type: row.get(6)?,
                pinned_at: parse_optional_time(row.get(7)?)?,
                departments: departments.get(&id).cloned().unwrap_or_default(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(summaries)
}

fn parse_initiative_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Initiative> {
    Ok(Initiative {
        id: row.get(0)?,
        use_case_name: row.get(1)?,
        description: row.get(2)?,
        benefit: row.get(3)?,
        strategic_objective: row.get(4)?,
        status: row.get(5)?,
        percentage_complete: row.get(6)?,
        process_owner: row.get(7)?,
        business_owner: row.get(8)?,
        start_date: row.get(9)?,
        expected_completion_date: row.get(10)?,
        actual_completion_date: row.get(11)?,
        priority: row.get(12)?,
        risk_level: row.get(13)?,
        technology_stack: row.get(14)?,
        team_size: row.get(15)?,
        budget_allocated: row.get(16)?,
        budget_spent: row.get(17)?,
        health_status: row.get(18)?,
        initiative_type: row.get(19)?,
        is_featured: row.get::<_, i64>(20)? != 0,
        featured_month: row.get(21)?,
        is_pinned: row.get::<_, i64>(22)? != 0,
        pinned_at: parse_optional_time(row.get(23)?)?,
        departments: Vec::new(),
        created_at: parse_time(&row.get::<_, String>(24)?)?,
        created_by_name: row.get(25)?,
        created_by_email: row.get(26)?,
        modified_at: parse_time(&row.get::<_, String>(27)?)?,
        modified_by_name: row.get(28)?,
        modified_by_email: row.get(29)?,
    })
}

fn parse_metric_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MonthlyMetric> {
    let mut fixed = serde_json::Map::new();
    for (index, column) in FIXED_METRIC_COLUMNS.iter().enumerate() {
        let value = row
            .get::<_, Option<NumericValue>>(FIXED_OFFSET + index * 2)?
            .map(NumericValue::to_json)
            .unwrap_or(serde_json::Value::Null);
        let comments = row
            .get::<_, Option<String>>(FIXED_OFFSET + index * 2 + 1)?
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null);
        fixed.insert(column.value.to_string(), value);
        fixed.insert(column.comments.to_string(), comments);
    }

    let tail = FIXED_OFFSET + FIXED_METRIC_COLUMNS.len() * 2;
    let additional_raw: Option<String> = row.get(tail)?;
    Ok(MonthlyMetric {
        id: row.get(0)?,
        initiative_id: row.get(1)?,
        metric_period: row.get(2)?,
        fixed,
        additional_metrics: merge::decode_metrics(additional_raw.as_deref()),
        created_at: parse_time(&row.get::<_, String>(tail + 1)?)?,
        created_by_name: row.get(tail + 2)?,
        created_by_email: row.get(tail + 3)?,
        modified_at: parse_time(&row.get::<_, String>(tail + 4)?)?,
        modified_by_name: row.get(tail + 5)?,
        modified_by_email: row.get(tail + 6)?,
    })
}

fn parse_field_option_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FieldOption> {
    Ok(FieldOption {
        id: row.get(0)?,
        field_name: row.get(1)?,
        option_value: row.get(2)?,
        display_order: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        created_at: parse_time(&row.get::<_, String>(5)?)?,
        created_by: row.get(6)?,
        modified_at: parse_time(&row.get::<_, String>(7)?)?,
        modified_by: row.get(8)?,
    })
}

fn parse_risk_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Risk> {
    let overall_raw: String = row.get(8)?;
    Ok(Risk {
        id: row.get(0)?,
        initiative_id: row.get(1)?,
        risk_title: row.get(2)?,
        risk_detail: row.get(3)?,
        frequency: row.get(4)?,
        severity: row.get(5)?,
        risk_mitigation: row.get(6)?,
        controls: row.get(7)?,
        overall_risk: RiskLevel::parse(&overall_raw).unwrap_or(RiskLevel::Low),
        created_at: parse_time(&row.get::<_, String>(9)?)?,
        created_by_name: row.get(10)?,
        created_by_email: row.get(11)?,
        modified_at: parse_time(&row.get::<_, String>(12)?)?,
        modified_by_name: row.get(13)?,
        modified_by_email: row.get(14)?,
    })
}

fn parse_progress_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProgressUpdate> {
    Ok(ProgressUpdate {
        id: row.get(0)?,
        initiative_id: row.get(1)?,
        update_type: row.get(2)?,
        update_title: row.get(3)?,
        update_details: row.get(4)?,
        created_at: parse_time(&row.get::<_, String>(5)?)?,
        created_by_name: row.get(6)?,
        created_by_email: row.get(7)?,
        modified_at: parse_time(&row.get::<_, String>(8)?)?,
        modified_by_name: row.get(9)?,
        modified_by_email: row.get(10)?,
    })
}

fn parse_complexity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ComplexityConversation> {
    Ok(ComplexityConversation {
        id: row.get(0)?,
        initiative_name: row.get(1)?,
        responses: decode_or_default(row.get::<_, Option<String>>(2)?.as_deref()),
        complexity_score: row.get(3)?,
        value_score: row.get(4)?,
        quadrant: row.get(5)?,
        llm_recommendation: row.get(6)?,
        created_at: parse_time(&row.get::<_, String>(7)?)?,
        created_by_name: row.get(8)?,
        created_by_email: row.get(9)?,
    })
}

fn parse_optional_time(raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|raw| parse_time(&raw)).transpose()
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::{Database, SavedMetrics};
    use crate::errors::AppError;
    use crate::metrics::merge::fixed_readings;
    use crate::models::{
        Actor, AdditionalMetrics, DynamicMetric, InitiativeFilters, InitiativeRecord, OwnerKind, RiskLevel,
        RiskPayload,
    };
    use serde_json::json;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("data").join("tracker.sqlite")).expect("db");
        (dir, db)
    }

    fn record(name: &str, status: &str) -> InitiativeRecord {
        InitiativeRecord {
            use_case_name: Some(name.to_string()),
            status: Some(status.to_string()),
            percentage_complete: Some(10),
            initiative_type: Some("Internal AI".to_string()),
            departments: vec!["Finance".to_string(), " ".to_string(), "Claims".to_string()],
            ..InitiativeRecord::default()
        }
    }

    fn blob(entries: &[(&str, serde_json::Value)]) -> AdditionalMetrics {
        entries
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    DynamicMetric {
                        value: value.clone(),
                        comments: String::new(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn creates_and_reads_initiative_with_departments() {
        let (_dir, db) = open();
        let actor = Actor::default();
        let id = db.insert_initiative(&actor, &record("Claims bot", "Ideation")).expect("insert");

        let initiative = db.get_initiative(id).expect("get").expect("exists");
        assert_eq!(initiative.use_case_name.as_deref(), Some("Claims bot"));
        assert_eq!(initiative.departments, vec!["Finance", "Claims"]);
        assert_eq!(initiative.created_by_email.as_deref(), Some("test@tester.com"));

        let filtered = db
            .list_initiatives(&InitiativeFilters {
                status: None,
                department: Some("Claims".to_string()),
            })
            .expect("list");
        assert_eq!(filtered.len(), 1);
        assert!(db.get_initiative(id + 100).expect("get").is_none());
    }

    #[test]
    fn update_and_delete_report_missing_rows() {
        let (_dir, db) = open();
        let actor = Actor::default();
        assert!(!db.update_initiative(&actor, 42, &record("x", "Ideation")).expect("update"));
        assert!(!db.delete_initiative(42).expect("delete"));
        assert!(!db.set_pinned(42, true).expect("pin"));
    }

    #[test]
    fn second_submission_merges_dynamic_metrics() {
        let (_dir, db) = open();
        let actor = Actor::default();
        let id = db.insert_initiative(&actor, &record("Bot", "In Progress")).expect("insert");
        let fields = json!({"time_saved_hours": "12", "time_saved_comments": "estimate"});
        let readings = fixed_readings(fields.as_object().expect("object"));

        let first = db
            .save_metrics(&actor, id, "2024-01", &readings, &blob(&[("a", json!(1)), ("b", json!(2))]))
            .expect("first save");
        assert!(first.created);

        let second = db
            .save_metrics(&actor, id, "2024-01", &readings, &blob(&[("a", json!(5))]))
            .expect("second save");
        assert_eq!(
            second,
            SavedMetrics {
                id: first.id,
                created: false
            }
        );

        let metric = db.get_metric(id, "2024-01").expect("get").expect("exists");
        assert_eq!(metric.additional_metrics.len(), 2);
        assert_eq!(metric.additional_metrics["a"].value, json!(5));
        assert_eq!(metric.additional_metrics["b"].value, json!(2));
        assert_eq!(metric.fixed["time_saved_hours"], json!(12));
        assert_eq!(metric.fixed["time_saved_comments"], "estimate");
        assert_eq!(metric.fixed["innovation_score"], serde_json::Value::Null);
        assert_eq!(db.list_metrics(id).expect("list").len(), 1);
    }

    #[test]
    fn concurrent_submissions_to_one_period_all_land() {
        let (_dir, db) = open();
        let actor = Actor::default();
        let id = db.insert_initiative(&actor, &record("Bot", "In Progress")).expect("insert");
        let readings = fixed_readings(&serde_json::Map::new());
        db.save_metrics(&actor, id, "2024-01", &readings, &blob(&[("seed", json!(0))]))
            .expect("seed save");

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let db = db.clone();
                let readings = readings.clone();
                std::thread::spawn(move || {
                    let key = format!("m{i}");
                    db.save_metrics(&Actor::default(), id, "2024-01", &readings, &blob(&[(key.as_str(), json!(i))]))
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread").expect("concurrent save");
        }

        let metric = db.get_metric(id, "2024-01").expect("get").expect("exists");
        assert_eq!(metric.additional_metrics.len(), 17);
        for i in 0..16 {
            assert_eq!(metric.additional_metrics[&format!("m{i}")].value, json!(i));
        }
    }

    #[test]
    fn empty_blob_is_stored_as_null() {
        let (_dir, db) = open();
        let actor = Actor::default();
        let id = db.insert_initiative(&actor, &record("Bot", "In Progress")).expect("insert");
        let readings = fixed_readings(&serde_json::Map::new());
        db.save_metrics(&actor, id, "2024-02", &readings, &AdditionalMetrics::new())
            .expect("save");

        let rows = db.period_metric_rows().expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].additional_metrics, None);

        assert!(db
            .upsert_dynamic_metric(&actor, id, "2024-02", "hours", DynamicMetric {
                value: json!(3),
                comments: "c".to_string(),
            })
            .expect("upsert"));
        assert!(db.remove_dynamic_metric(&actor, id, "2024-02", "hours").expect("remove"));
        let rows = db.period_metric_rows().expect("rows");
        assert_eq!(rows[0].additional_metrics, None);
    }

    #[test]
    fn single_metric_edits_need_the_period_row() {
        let (_dir, db) = open();
        let actor = Actor::default();
        let id = db.insert_initiative(&actor, &record("Bot", "In Progress")).expect("insert");
        let metric = DynamicMetric {
            value: json!(1),
            comments: String::new(),
        };
        assert!(!db.upsert_dynamic_metric(&actor, id, "2030-01", "x", metric).expect("upsert"));
        assert!(!db.remove_dynamic_metric(&actor, id, "2030-01", "x").expect("remove"));
        assert!(!db.delete_period(id, "2030-01").expect("delete"));
    }

    #[test]
    fn metrics_for_missing_initiative_are_not_found() {
        let (_dir, db) = open();
        let readings = fixed_readings(&serde_json::Map::new());
        let error = db
            .save_metrics(&Actor::default(), 99, "2024-01", &readings, &AdditionalMetrics::new())
            .expect_err("should fail");
        assert!(error.is_not_found());

        let error = db
            .save_metrics(&Actor::default(), 99, "2024-01", &[], &AdditionalMetrics::new())
            .expect_err("short readings");
        assert!(matches!(error, AppError::Invalid(_)));
    }

    #[test]
    fn renaming_status_option_propagates_to_initiatives() {
        let (_dir, db) = open();
        let actor = Actor::default();
        let draft_a = db.insert_initiative(&actor, &record("A", "Draft")).expect("a");
        let draft_b = db.insert_initiative(&actor, &record("B", "Draft")).expect("b");
        let other = db.insert_initiative(&actor, &record("C", "Draft ")).expect("c");
        let option = db.insert_field_option(&actor, "status", "Draft", 1).expect("option");

        let propagated = db
            .rename_field_option(&actor, option, "status", "Draft", "Ideation", 1)
            .expect("rename")
            .expect("option exists");
        assert_eq!(propagated, 2);

        for id in [draft_a, draft_b] {
            let initiative = db.get_initiative(id).expect("get").expect("exists");
            assert_eq!(initiative.status.as_deref(), Some("Ideation"));
        }
        let untouched = db.get_initiative(other).expect("get").expect("exists");
        assert_eq!(untouched.status.as_deref(), Some("Draft "));

        let options = db.list_field_options(Some("status")).expect("options");
        assert_eq!(options[0].option_value, "Ideation");
    }

    #[test]
    fn renaming_department_option_rewrites_tags() {
        let (_dir, db) = open();
        let actor = Actor::default();
        let id = db.insert_initiative(&actor, &record("A", "Ideation")).expect("a");
        let option = db.insert_field_option(&actor, "department", "Finance", 0).expect("option");

        let propagated = db
            .rename_field_option(&actor, option, "department", "Finance", "Group Finance", 0)
            .expect("rename")
            .expect("option exists");
        assert_eq!(propagated, 1);
        let initiative = db.get_initiative(id).expect("get").expect("exists");
        assert_eq!(initiative.departments, vec!["Group Finance", "Claims"]);
    }

    #[test]
    fn renaming_unmapped_field_touches_only_the_option() {
        let (_dir, db) = open();
        let actor = Actor::default();
        let id = db.insert_initiative(&actor, &record("A", "Ideation")).expect("a");
        let option = db.insert_field_option(&actor, "metric_type", "Ideation", 0).expect("option");

        let propagated = db
            .rename_field_option(&actor, option, "metric_type", "Ideation", "Count", 0)
            .expect("rename")
            .expect("option exists");
        assert_eq!(propagated, 0);
        let initiative = db.get_initiative(id).expect("get").expect("exists");
        assert_eq!(initiative.status.as_deref(), Some("Ideation"));

        assert!(db
            .rename_field_option(&actor, 999, "status", "a", "b", 0)
            .expect("rename")
            .is_none());
    }

    #[test]
    fn soft_deleted_options_are_hidden() {
        let (_dir, db) = open();
        let actor = Actor::default();
        let option = db.insert_field_option(&actor, "priority", "High", 0).expect("option");
        assert!(db.deactivate_field_option(&actor, option).expect("deactivate"));
        assert!(db.list_field_options(None).expect("list").is_empty());
        let stored = db.get_field_option(option).expect("get").expect("row kept");
        assert!(!stored.is_active);
    }

    #[test]
    fn risks_store_derived_level_and_cascade() {
        let (_dir, db) = open();
        let actor = Actor::default();
        let id = db.insert_initiative(&actor, &record("A", "Ideation")).expect("a");
        let payload = RiskPayload {
            risk_title: Some("Vendor lock-in".to_string()),
            frequency: Some("High".to_string()),
            severity: Some("Medium".to_string()),
            ..RiskPayload::default()
        };
        let risk_id = db.insert_risk(&actor, id, &payload, RiskLevel::High).expect("risk");
        assert_eq!(
            db.get_risk(risk_id).expect("get").expect("exists").overall_risk,
            RiskLevel::High
        );

        db.insert_progress_update(&actor, id, "Milestone", "Pilot live", None)
            .expect("progress");
        assert!(db.delete_initiative(id).expect("delete"));
        assert!(db.get_risk(risk_id).expect("get").is_none());
        assert!(db.list_progress_updates(id).expect("list").is_empty());

        let error = db
            .insert_risk(&actor, id, &payload, RiskLevel::High)
            .expect_err("initiative gone");
        assert!(matches!(error, AppError::NotFound(_)));
    }

    #[test]
    fn dashboard_counts_and_owner_suggestions() {
        let (_dir, db) = open();
        let actor = Actor::default();
        let mut first = record("A", "In Progress");
        first.process_owner = Some("Thandi".to_string());
        first.benefit = Some("Cost".to_string());
        let mut second = record("B", "Ideation");
        second.process_owner = Some("Anele".to_string());
        second.percentage_complete = Some(30);
        let a = db.insert_initiative(&actor, &first).expect("a");
        db.insert_initiative(&actor, &second).expect("b");
        db.set_pinned(a, true).expect("pin");

        let stats = db.dashboard_stats(chrono::Utc::now()).expect("stats");
        assert_eq!(stats.total_initiatives, 2);
        assert_eq!(stats.ideation_count, 1);
        assert_eq!(stats.in_progress_count, 1);
        assert_eq!(stats.completed_count, 0);
        assert_eq!(stats.avg_completion, Some(20.0));
        assert_eq!(stats.new_initiatives_count, 2);
        assert_eq!(stats.in_progress_initiatives.len(), 1);
        assert_eq!(stats.pinned_initiatives[0].id, a);
        assert_eq!(stats.by_department[0].count, 2);
        assert_eq!(stats.by_benefit.len(), 1);

        let owners = db.owner_suggestions(OwnerKind::ProcessOwners).expect("owners");
        assert_eq!(owners, vec!["Anele", "Thandi"]);
        assert!(db.owner_suggestions(OwnerKind::BusinessOwners).expect("owners").is_empty());
    }
}
