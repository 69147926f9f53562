use crate::errors::{AppError, AppResult};
use crate::models::{
    Actor, AdvisoryResponse, Answers, ComplexityConversation, CreateCustomMetricPayload, CreateFieldOptionPayload,
    CreatedResponse, CustomMetric, DashboardFilterQuery, DashboardStats, DynamicMetric, FieldOption, HealthResponse,
    Initiative, InitiativeFilters, InitiativePayload, MatrixPoint, MessageResponse, MetricDrilldown, MonthlyMetric,
    OwnerKind, PeriodDrilldown, ProgressUpdate, ProgressUpdatePayload, RenameResponse, Risk, RiskPayload,
    RoiConversation, SaveMetricsPayload, TrendPoint, UpdateFieldOptionPayload,
};
use crate::tracker::TrackerCore;
use axum::body::Body;
use axum::extract::{FromRequest, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

const USER_NAME_HEADER: &str = "x-user-name";
const USER_EMAIL_HEADER: &str = "x-user-email";
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    tracker: Arc<TrackerCore>,
    default_actor: Arc<Actor>,
}

impl AppState {
    pub fn new(tracker: Arc<TrackerCore>, default_actor: Actor) -> Self {
        Self {
            tracker,
            default_actor: Arc::new(default_actor),
        }
    }

    /// Caller identity from the user headers, each falling back to the
    /// configured default.
    fn actor(&self, headers: &HeaderMap) -> Actor {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
        };
        Actor {
            name: header(USER_NAME_HEADER).unwrap_or_else(|| self.default_actor.name.clone()),
            email: header(USER_EMAIL_HEADER).unwrap_or_else(|| self.default_actor.email.clone()),
        }
    }

    /// Runs a store-bound operation off the async workers.
    async fn blocking<T, F>(&self, operation: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&TrackerCore) -> AppResult<T> + Send + 'static,
    {
        let tracker = Arc::clone(&self.tracker);
        tokio::task::spawn_blocking(move || operation(&tracker))
            .await
            .map_err(|error| AppError::Internal(format!("store task failed: {}", error)))?
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Invalid(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// JSON body extractor whose rejections answer with the shared error body.
struct ApiJson<T>(T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| ApiJson(value))
            .map_err(|rejection| AppError::Invalid(rejection.body_text()))
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;
type Created<T> = Result<(StatusCode, Json<T>), AppError>;

fn created<T>(value: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(value)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FieldOptionQuery {
    field_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeaturedQuery {
    month: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/dashboard/stats", get(dashboard_stats))
        .route("/api/dashboard/monthly-trends", get(monthly_trends))
        .route("/api/dashboard/period/{period}", get(period_drilldown))
        .route("/api/dashboard/metric/{metric_name}", get(metric_drilldown))
        .route("/api/initiatives", get(list_initiatives).post(create_initiative))
        .route(
            "/api/initiatives/{id}",
            get(get_initiative).put(update_initiative).delete(delete_initiative),
        )
        .route("/api/initiatives/{id}/pin", post(pin_initiative))
        .route("/api/initiatives/{id}/unpin", post(unpin_initiative))
        .route("/api/initiatives/{id}/metrics", get(list_metrics).post(save_metrics))
        .route(
            "/api/initiatives/{id}/metrics/{period}",
            get(get_metric).delete(delete_period),
        )
        .route(
            "/api/initiatives/{id}/metrics/{period}/metric/{metric_name}",
            put(update_dynamic_metric).delete(delete_dynamic_metric),
        )
        .route("/api/initiatives/{id}/risks", get(list_risks).post(create_risk))
        .route("/api/risks/{id}", put(update_risk).delete(delete_risk))
        .route(
            "/api/initiatives/{id}/progress-updates",
            get(list_progress_updates).post(create_progress_update),
        )
        .route(
            "/api/progress-updates/{id}",
            put(update_progress_update).delete(delete_progress_update),
        )
        .route("/api/field-options", get(list_field_options).post(create_field_option))
        .route(
            "/api/field-options/{id}",
            put(update_field_option).delete(delete_field_option),
        )
        .route("/api/custom-metrics", get(list_custom_metrics).post(create_custom_metric))
        .route("/api/featured-solutions", get(featured_solutions))
        .route("/api/suggestions/process-owners", get(process_owner_suggestions))
        .route("/api/suggestions/business-owners", get(business_owner_suggestions))
        .route("/api/roi-assistant", post(roi_assistant))
        .route("/api/complexity-analyzer", post(complexity_analyzer))
        .route("/api/roi-conversations", get(list_roi_conversations))
        .route("/api/complexity-conversations", get(list_complexity_conversations))
        .route("/api/complexity-conversations/{id}", get(get_complexity_conversation))
        .route("/api/complexity-matrix", get(complexity_matrix))
        .layer(middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn request_id(request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        method = %request.method(),
        route = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn health(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    state.blocking(|tracker| tracker.health()).await.map(Json)
}

// ─── Dashboard ──────────────────────────────────────────────────────────────

async fn dashboard_stats(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    state.blocking(|tracker| tracker.dashboard_stats()).await.map(Json)
}

async fn monthly_trends(
    State(state): State<AppState>,
    Query(query): Query<DashboardFilterQuery>,
) -> ApiResult<Vec<TrendPoint>> {
    state
        .blocking(move |tracker| tracker.monthly_trends(&query))
        .await
        .map(Json)
}

async fn period_drilldown(
    State(state): State<AppState>,
    Path(period): Path<String>,
    Query(query): Query<DashboardFilterQuery>,
) -> ApiResult<PeriodDrilldown> {
    state
        .blocking(move |tracker| tracker.period_drilldown(&period, &query))
        .await
        .map(Json)
}

async fn metric_drilldown(
    State(state): State<AppState>,
    Path(metric_name): Path<String>,
    Query(query): Query<DashboardFilterQuery>,
) -> ApiResult<MetricDrilldown> {
    state
        .blocking(move |tracker| tracker.metric_drilldown(&metric_name, &query))
        .await
        .map(Json)
}

// ─── Initiatives ────────────────────────────────────────────────────────────

async fn list_initiatives(
    State(state): State<AppState>,
    Query(filters): Query<InitiativeFilters>,
) -> ApiResult<Vec<Initiative>> {
    state
        .blocking(move |tracker| tracker.list_initiatives(&filters))
        .await
        .map(Json)
}

async fn get_initiative(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Initiative> {
    state.blocking(move |tracker| tracker.get_initiative(id)).await.map(Json)
}

async fn create_initiative(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<InitiativePayload>,
) -> Created<CreatedResponse> {
    let actor = state.actor(&headers);
    created(
        state
            .blocking(move |tracker| tracker.create_initiative(&actor, &payload))
            .await?,
    )
}

async fn update_initiative(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<InitiativePayload>,
) -> ApiResult<MessageResponse> {
    let actor = state.actor(&headers);
    state
        .blocking(move |tracker| tracker.update_initiative(&actor, id, &payload))
        .await
        .map(Json)
}

async fn delete_initiative(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<MessageResponse> {
    state.blocking(move |tracker| tracker.delete_initiative(id)).await.map(Json)
}

async fn pin_initiative(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<MessageResponse> {
    state.blocking(move |tracker| tracker.pin_initiative(id)).await.map(Json)
}

async fn unpin_initiative(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<MessageResponse> {
    state.blocking(move |tracker| tracker.unpin_initiative(id)).await.map(Json)
}

async fn featured_solutions(
    State(state): State<AppState>,
    Query(query): Query<FeaturedQuery>,
) -> ApiResult<Vec<Initiative>> {
    state
        .blocking(move |tracker| tracker.featured_solutions(query.month.as_deref()))
        .await
        .map(Json)
}

async fn process_owner_suggestions(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    state
        .blocking(|tracker| tracker.owner_suggestions(OwnerKind::ProcessOwners))
        .await
        .map(Json)
}

async fn business_owner_suggestions(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    state
        .blocking(|tracker| tracker.owner_suggestions(OwnerKind::BusinessOwners))
        .await
        .map(Json)
}

// ─── Monthly metrics ────────────────────────────────────────────────────────

async fn list_metrics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<MonthlyMetric>> {
    state.blocking(move |tracker| tracker.list_metrics(id)).await.map(Json)
}

async fn get_metric(
    State(state): State<AppState>,
    Path((id, period)): Path<(i64, String)>,
) -> ApiResult<MonthlyMetric> {
    state
        .blocking(move |tracker| tracker.get_metric(id, &period))
        .await
        .map(Json)
}

async fn save_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<SaveMetricsPayload>,
) -> Created<CreatedResponse> {
    let actor = state.actor(&headers);
    created(
        state
            .blocking(move |tracker| tracker.save_metrics(&actor, id, &payload))
            .await?,
    )
}

async fn delete_period(
    State(state): State<AppState>,
    Path((id, period)): Path<(i64, String)>,
) -> ApiResult<MessageResponse> {
    state
        .blocking(move |tracker| tracker.delete_period(id, &period))
        .await
        .map(Json)
}

async fn update_dynamic_metric(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, period, metric_name)): Path<(i64, String, String)>,
    ApiJson(metric): ApiJson<DynamicMetric>,
) -> ApiResult<MessageResponse> {
    let actor = state.actor(&headers);
    state
        .blocking(move |tracker| tracker.update_dynamic_metric(&actor, id, &period, &metric_name, metric))
        .await
        .map(Json)
}

async fn delete_dynamic_metric(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, period, metric_name)): Path<(i64, String, String)>,
) -> ApiResult<MessageResponse> {
    let actor = state.actor(&headers);
    state
        .blocking(move |tracker| tracker.delete_dynamic_metric(&actor, id, &period, &metric_name))
        .await
        .map(Json)
}

// ─── Risks ──────────────────────────────────────────────────────────────────

async fn list_risks(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<Risk>> {
    state.blocking(move |tracker| tracker.list_risks(id)).await.map(Json)
}

async fn create_risk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<RiskPayload>,
) -> Created<CreatedResponse> {
    let actor = state.actor(&headers);
    created(
        state
            .blocking(move |tracker| tracker.create_risk(&actor, id, &payload))
            .await?,
    )
}

async fn update_risk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<RiskPayload>,
) -> ApiResult<MessageResponse> {
    let actor = state.actor(&headers);
    state
        .blocking(move |tracker| tracker.update_risk(&actor, id, &payload))
        .await
        .map(Json)
}

async fn delete_risk(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<MessageResponse> {
    state.blocking(move |tracker| tracker.delete_risk(id)).await.map(Json)
}

// ─── Progress updates ───────────────────────────────────────────────────────

async fn list_progress_updates(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<ProgressUpdate>> {
    state
        .blocking(move |tracker| tracker.list_progress_updates(id))
        .await
        .map(Json)
}

async fn create_progress_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<ProgressUpdatePayload>,
) -> Created<CreatedResponse> {
    let actor = state.actor(&headers);
    created(
        state
            .blocking(move |tracker| tracker.create_progress_update(&actor, id, &payload))
            .await?,
    )
}

async fn update_progress_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<ProgressUpdatePayload>,
) -> ApiResult<MessageResponse> {
    let actor = state.actor(&headers);
    state
        .blocking(move |tracker| tracker.update_progress_update(&actor, id, &payload))
        .await
        .map(Json)
}

async fn delete_progress_update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<MessageResponse> {
    state
        .blocking(move |tracker| tracker.delete_progress_update(id))
        .await
        .map(Json)
}

// ─── Field options / custom metrics ─────────────────────────────────────────

async fn list_field_options(
    State(state): State<AppState>,
    Query(query): Query<FieldOptionQuery>,
) -> ApiResult<Vec<FieldOption>> {
    state
        .blocking(move |tracker| tracker.list_field_options(query.field_name.as_deref()))
        .await
        .map(Json)
}

async fn create_field_option(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<CreateFieldOptionPayload>,
) -> Created<CreatedResponse> {
    let actor = state.actor(&headers);
    created(
        state
            .blocking(move |tracker| tracker.create_field_option(&actor, &payload))
            .await?,
    )
}

async fn update_field_option(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<UpdateFieldOptionPayload>,
) -> ApiResult<RenameResponse> {
    let actor = state.actor(&headers);
    state
        .blocking(move |tracker| tracker.update_field_option(&actor, id, &payload))
        .await
        .map(Json)
}

async fn delete_field_option(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<MessageResponse> {
    let actor = state.actor(&headers);
    state
        .blocking(move |tracker| tracker.delete_field_option(&actor, id))
        .await
        .map(Json)
}

async fn list_custom_metrics(State(state): State<AppState>) -> ApiResult<Vec<CustomMetric>> {
    state.blocking(|tracker| tracker.list_custom_metrics()).await.map(Json)
}

async fn create_custom_metric(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<CreateCustomMetricPayload>,
) -> Created<CreatedResponse> {
    let actor = state.actor(&headers);
    created(
        state
            .blocking(move |tracker| tracker.create_custom_metric(&actor, &payload))
            .await?,
    )
}

// ─── Advisory ───────────────────────────────────────────────────────────────

async fn roi_assistant(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(answers): ApiJson<Answers>,
) -> ApiResult<AdvisoryResponse> {
    let actor = state.actor(&headers);
    state.tracker.roi_assistant(&actor, &answers).await.map(Json)
}

async fn complexity_analyzer(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(answers): ApiJson<Answers>,
) -> ApiResult<AdvisoryResponse> {
    let actor = state.actor(&headers);
    state
        .tracker
        .complexity_analyzer(&actor, &answers)
        .await
        .map(Json)
}

async fn list_roi_conversations(State(state): State<AppState>) -> ApiResult<Vec<RoiConversation>> {
    state.blocking(|tracker| tracker.list_roi_conversations()).await.map(Json)
}

async fn list_complexity_conversations(
    State(state): State<AppState>,
) -> ApiResult<Vec<ComplexityConversation>> {
    state
        .blocking(|tracker| tracker.list_complexity_conversations())
        .await
        .map(Json)
}

async fn get_complexity_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ComplexityConversation> {
    state
        .blocking(move |tracker| tracker.get_complexity_conversation(id))
        .await
        .map(Json)
}

async fn complexity_matrix(State(state): State<AppState>) -> ApiResult<Vec<MatrixPoint>> {
    state.blocking(|tracker| tracker.complexity_matrix()).await.map(Json)
}
