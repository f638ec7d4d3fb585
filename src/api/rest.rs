// =============================================================================
// REST API Endpoints: Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Two families:
//   - one-shot: `GET /dashboard` and `GET /export` build a fresh view or CSV
//     from query parameters and keep nothing;
//   - sessions: `POST /sessions` creates a dashboard, and every input change
//     is posted to `/sessions/:id/events`.
//
// CORS is configured permissively; the API serves any dashboard front end.
// =============================================================================

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::dashboard::{fetch_outcome, load_dashboard, DashboardEvent, RefreshPlan, Session};
use crate::error::{QueryError, SessionStoreError};
use crate::export;
use crate::market_data::PriceSeries;
use crate::runtime_config::{DashboardConfig, DashboardOverrides};
use crate::types::{normalize_ticker, parse_date, parse_features, QueryWindow};
use crate::view::{DashboardView, DataOutcome};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/config", get(default_config))
        // ── One-shot ────────────────────────────────────────────────
        .route("/api/v1/dashboard", get(dashboard))
        .route("/api/v1/export", get(export_csv))
        // ── Sessions ────────────────────────────────────────────────
        .route("/api/v1/sessions", post(create_session))
        .route("/api/v1/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/v1/sessions/:id/events", post(session_event))
        .route("/api/v1/sessions/:id/export", get(session_export))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    SessionNotFound(Uuid),
    Conflict(String),
    Upstream(String),
    Internal(anyhow::Error),
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<SessionStoreError> for ApiError {
    fn from(e: SessionStoreError) -> Self {
        match e {
            SessionStoreError::NotFound(id) => Self::SessionNotFound(id),
            conflict @ SessionStoreError::Conflict { .. } => Self::Conflict(conflict.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::SessionNotFound(id) => (StatusCode::NOT_FOUND, format!("session {id} not found")),
            Self::Conflict(m) => (StatusCode::CONFLICT, m),
            Self::Upstream(m) => (StatusCode::BAD_GATEWAY, m),
            Self::Internal(e) => {
                warn!(error = %e, "internal error while serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// =============================================================================
// Health & config
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    sessions: usize,
    renders: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        sessions: state.session_count(),
        renders: state.render_count(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

async fn default_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.default_dashboard())
}

// =============================================================================
// Query parameters
// =============================================================================

/// Options accepted by the one-shot endpoints. Anything omitted falls back to
/// the service defaults.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    ticker: Option<String>,
    period: Option<String>,
    start: Option<String>,
    end: Option<String>,
    features: Option<String>,
    compare: Option<String>,
}

impl DashboardQuery {
    fn resolve(self, mut config: DashboardConfig) -> Result<DashboardConfig, QueryError> {
        if let Some(ticker) = self.ticker {
            config.ticker = ticker;
        }
        config.ticker = normalize_ticker(&config.ticker);

        match (self.period, self.start, self.end) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(QueryError::ConflictingWindow)
            }
            (Some(period), None, None) => {
                config.window = QueryWindow::Period {
                    timeframe: period.parse()?,
                };
            }
            (None, Some(start), end) => {
                let start = parse_date("start", &start)?;
                let end = end.map(|e| parse_date("end", &e)).transpose()?;
                config.window = QueryWindow::range(start, end)?;
            }
            (None, None, Some(end)) => {
                let end = parse_date("end", &end)?;
                let start = match config.window {
                    QueryWindow::Range { start, .. } => start,
                    QueryWindow::Period { .. } => DashboardConfig::default_start(),
                };
                config.window = QueryWindow::range(start, Some(end))?;
            }
            (None, None, None) => {}
        }

        if let Some(features) = self.features {
            config.features = parse_features(&features)?;
        }
        if let Some(compare) = self.compare {
            config.comparison = compare;
        }
        Ok(config)
    }
}

// =============================================================================
// One-shot endpoints
// =============================================================================

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardView>, ApiError> {
    let config = query.resolve(state.default_dashboard())?;
    let data = load_dashboard(state.source.as_ref(), &config).await;
    Ok(Json(state.render(&config, &data)))
}

async fn export_csv(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Response, ApiError> {
    let config = query.resolve(state.default_dashboard())?;
    let outcome = fetch_outcome(state.source.as_ref(), &config.ticker, &config.window).await;
    csv_response(&state, &config, &outcome)
}

// =============================================================================
// Session endpoints
// =============================================================================

#[derive(Serialize)]
struct SessionResponse {
    id: Uuid,
    revision: u64,
    config: DashboardConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<RefreshPlan>,
    view: DashboardView,
}

fn session_response(state: &AppState, session: &Session, plan: Option<RefreshPlan>) -> SessionResponse {
    SessionResponse {
        id: session.id,
        revision: session.revision,
        config: session.config.clone(),
        plan,
        view: state.render(&session.config, &session.data),
    }
}

/// Body is optional. Fields it names override the service defaults; an empty
/// body starts from the defaults as they are.
async fn create_session(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let overrides = if body.iter().all(u8::is_ascii_whitespace) {
        DashboardOverrides::default()
    } else {
        serde_json::from_slice::<DashboardOverrides>(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid session body: {e}")))?
    };
    let config = overrides.apply_to(state.default_dashboard());
    let mut session = Session::new(config);
    session.load(state.source.as_ref(), RefreshPlan::ALL).await;
    info!(session = %session.id, ticker = %session.config.ticker, "session created");

    let resp = session_response(&state, &session, None);
    state.insert_session(session);
    Ok((StatusCode::CREATED, Json(resp)))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.session(&id).ok_or(ApiError::SessionNotFound(id))?;
    Ok(Json(session_response(&state, &session, None)))
}

async fn session_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    event: Result<Json<DashboardEvent>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Json(event) = event?;
    let mut session = state.session(&id).ok_or(ApiError::SessionNotFound(id))?;
    let plan = session.handle_event(state.source.as_ref(), event).await;

    if let Err(e) = state.store_session(session.clone()) {
        warn!(session = %id, error = %e, "session update refused");
        return Err(e.into());
    }
    Ok(Json(session_response(&state, &session, Some(plan))))
}

async fn session_export(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let session = state.session(&id).ok_or(ApiError::SessionNotFound(id))?;
    csv_response(&state, &session.config, &session.data.primary)
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.remove_session(&id) {
        info!(session = %id, "session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn csv_response(
    state: &AppState,
    config: &DashboardConfig,
    outcome: &DataOutcome,
) -> Result<Response, ApiError> {
    let series: &PriceSeries = match outcome {
        DataOutcome::Loaded(s) => s,
        DataOutcome::Failed(message) => return Err(ApiError::Upstream(message.clone())),
        DataOutcome::NotRequested => {
            return Err(ApiError::Upstream("no data loaded for this dashboard".into()))
        }
    };

    let table = state.engine.augment(series, &config.features);
    let body = export::to_csv(&table)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export::file_name(&config.ticker)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
