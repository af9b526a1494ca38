use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use healthdump_core::HealthError;
use healthdump_core::input::{DumpPayload, EditPayload};
use healthdump_core::models::{Goals, HealthRecord, parse_date};
use healthdump_core::query::DateQuery;
use healthdump_core::report::DailyReport;
use healthdump_core::service::HealthService;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<HealthService>>,
    goal_window_days: i64,
}

impl AppState {
    fn svc(&self) -> MutexGuard<'_, HealthService> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct HealthDataParams {
    date: Option<String>,
    date_start: Option<String>,
    date_end: Option<String>,
}

#[derive(Deserialize)]
struct GoalsParams {
    last_n_days: Option<i64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct SummaryResponse {
    #[serde(flatten)]
    report: DailyReport,
    text: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    PayloadTooLarge,
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large".to_string(),
            ),
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<HealthError> for ApiError {
    fn from(err: HealthError) -> Self {
        match err {
            HealthError::Validation { .. } => Self::BadRequest(err.to_string()),
            HealthError::NotFound(_) => Self::NotFound(err.to_string()),
            HealthError::Storage { .. } => Self::Internal(err.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge,
            _ => Self::BadRequest(rejection.body_text()),
        }
    }
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn status() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_health_data(
    State(state): State<AppState>,
    Query(params): Query<HealthDataParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let query = DateQuery::from_params(
        params.date.as_deref(),
        params.date_start.as_deref(),
        params.date_end.as_deref(),
    )?;
    let records = state.svc().query(&query)?;
    Ok(Json(json!({ "data": records })))
}

async fn update_health_data(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
    body: Result<Json<EditPayload>, JsonRejection>,
) -> Result<Json<HealthRecord>, ApiError> {
    let date = parse_date(&date_str)?;
    let Json(payload) = body?;
    let update = payload.into_update()?;
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let outcome = state.svc().edit(date, &update)?;
    Ok(Json(outcome.record))
}

async fn post_dump(
    State(state): State<AppState>,
    body: Result<Json<DumpPayload>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(payload) = body?;
    let outcome = state.svc().ingest(payload)?;
    Ok(Json(json!({
        "status": "success",
        "data": outcome.record,
        "row_count": outcome.row_count,
        "write": outcome.status,
    })))
}

async fn get_goals(
    State(state): State<AppState>,
    Query(params): Query<GoalsParams>,
) -> Result<Json<Goals>, ApiError> {
    let days = params.last_n_days.unwrap_or(state.goal_window_days);
    if days <= 0 {
        return Err(ApiError::BadRequest(
            "last_n_days must be positive".to_string(),
        ));
    }
    let goals = state.svc().goals(days)?;
    Ok(Json(goals))
}

async fn get_summary(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let date = parse_date(&date_str)?;
    let report = state.svc().daily_report(date, state.goal_window_days)?;
    let text = report.render();
    Ok(Json(SummaryResponse { report, text }))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/dump", post(post_dump))
        .route("/api/health-data", get(get_health_data))
        .route("/api/health-data/{date}", patch(update_health_data))
        .route("/api/goals", get(get_goals))
        .route("/api/summary/{date}", get(get_summary))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: HealthService,
    bind: &str,
    port: u16,
    goal_window_days: i64,
) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        goal_window_days,
    };
    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        tracing::warn!(
            %bind,
            "listening beyond localhost with no authentication, any device on the network can write records"
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    tracing::info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
