//! HTTP API for the Paytrack Engine.
//!
//! This module exposes the ledger as a small REST API using the
//! [`axum`](https://crates.io/crates/axum) framework.  The ledger
//! lives behind a single `RwLock`: every command clones the current
//! ledger under the write lock, runs against the clone, persists it
//! and only then swaps it in, so concurrent requests never see or
//! persist a half-applied operation.

use crate::config::Config;
use crate::error::{ErrorKind, LedgerError};
use crate::ledger::{CascadeSummary, Ledger};
use crate::models::{Employer, EmployerDraft, Payment, WorkEntry, WorkEntryDraft, WorkStatus};
use crate::reports::{
    EmployerBalance, EmployerFilter, PaymentLine, PortfolioStats, Report, ReportMode, WorkLogLine,
};
use crate::store::{JsonDirStore, SlotStore};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Application state shared across requests.
pub struct AppState {
    pub ledger: RwLock<Ledger>,
    pub store: Arc<dyn SlotStore>,
}

impl AppState {
    pub fn new(ledger: Ledger, store: Arc<dyn SlotStore>) -> Self {
        Self {
            ledger: RwLock::new(ledger),
            store,
        }
    }
}

/// A [`LedgerError`] rendered as a JSON error response.
#[derive(Debug)]
pub struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match self.0.kind() {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, "validation"),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ErrorKind::NoOp => (StatusCode::CONFLICT, "no_op"),
            ErrorKind::Format => (StatusCode::BAD_REQUEST, "format"),
            ErrorKind::Storage => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
        };
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        }
        let body = Json(serde_json::json!({"error": self.0.to_string(), "kind": kind}));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Runs `command` against a copy of the ledger and installs the copy
/// once it has been persisted.  The store write runs on the blocking
/// pool; the write lock stays held until it finishes.
async fn mutate<T>(
    state: &AppState,
    command: impl FnOnce(&mut Ledger) -> crate::error::Result<T>,
) -> ApiResult<T> {
    let mut guard = state.ledger.write().await;
    let mut next = guard.clone();
    let out = command(&mut next)?;

    let store = Arc::clone(&state.store);
    let snapshot = next.clone();
    tokio::task::spawn_blocking(move || snapshot.persist(store.as_ref()))
        .await
        .map_err(|err| LedgerError::Io(std::io::Error::other(err)))??;
    *guard = next;
    Ok(out)
}

/// Build the API router around `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/employers", get(list_employers).post(create_employer))
        .route("/api/employers/:id", put(update_employer).delete(delete_employer))
        .route("/api/employers/:id/payments", post(pay_employer))
        .route("/api/work-entries", get(list_work_entries).post(create_work_entry))
        .route(
            "/api/work-entries/:id",
            put(update_work_entry).delete(delete_work_entry),
        )
        .route("/api/work-entries/:id/payments", post(pay_work_entry))
        .route("/api/payments", get(list_payments))
        .route("/api/stats", get(stats))
        .route("/api/reports", get(report))
        .route("/api/export", get(export))
        .route("/api/import", post(import))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_employers(State(state): State<Arc<AppState>>) -> Json<Vec<EmployerBalance>> {
    Json(state.ledger.read().await.ranked_employers())
}

async fn create_employer(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<EmployerDraft>,
) -> ApiResult<(StatusCode, Json<Employer>)> {
    let employer = mutate(&state, |ledger| ledger.add_employer(draft)).await?;
    Ok((StatusCode::CREATED, Json(employer)))
}

async fn update_employer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(draft): Json<EmployerDraft>,
) -> ApiResult<Json<Employer>> {
    let employer = mutate(&state, |ledger| ledger.update_employer(&id, draft)).await?;
    Ok(Json(employer))
}

async fn delete_employer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CascadeSummary>> {
    let summary = mutate(&state, |ledger| ledger.delete_employer(&id)).await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: f64,
    /// Defaults to today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationView {
    pub requested: f64,
    pub applied: f64,
    pub unapplied: f64,
    pub payments: Vec<Payment>,
    pub status_updates: HashMap<String, WorkStatus>,
}

async fn pay_employer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<PaymentRequest>,
) -> ApiResult<(StatusCode, Json<AllocationView>)> {
    let date = request.date.unwrap_or_else(today);
    let allocation =
        mutate(&state, |ledger| ledger.allocate_fifo(&id, request.amount, date)).await?;
    let view = AllocationView {
        requested: allocation.requested,
        applied: allocation.applied(),
        unapplied: allocation.unapplied(),
        payments: allocation.created_payments,
        status_updates: allocation.status_updates,
    };
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_work_entries(State(state): State<Arc<AppState>>) -> Json<Vec<WorkLogLine>> {
    Json(state.ledger.read().await.work_log())
}

async fn create_work_entry(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<WorkEntryDraft>,
) -> ApiResult<(StatusCode, Json<WorkEntry>)> {
    let entry = mutate(&state, |ledger| ledger.add_work_entry(draft)).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_work_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(draft): Json<WorkEntryDraft>,
) -> ApiResult<Json<WorkEntry>> {
    let entry = mutate(&state, |ledger| ledger.update_work_entry(&id, draft)).await?;
    Ok(Json(entry))
}

async fn delete_work_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CascadeSummary>> {
    let summary = mutate(&state, |ledger| ledger.delete_work_entry(&id)).await?;
    Ok(Json(summary))
}

async fn pay_work_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<PaymentRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let date = request.date.unwrap_or_else(today);
    let payment =
        mutate(&state, |ledger| ledger.record_payment(&id, request.amount, date)).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn list_payments(State(state): State<Arc<AppState>>) -> Json<Vec<PaymentLine>> {
    Json(state.ledger.read().await.payment_history())
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<PortfolioStats> {
    Json(state.ledger.read().await.stats(today()))
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// `this_vs_last_month` (default), `month` or `year`.
    pub mode: Option<String>,
    /// The month or year to report on; defaults to today.
    pub date: Option<NaiveDate>,
    /// `all` (default) or an employer id.
    pub employer: Option<String>,
}

async fn report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Report>> {
    let today = today();
    let mode = ReportMode::from_selection(
        query.mode.as_deref().unwrap_or("this_vs_last_month"),
        query.date.unwrap_or(today),
    )?;
    let filter = EmployerFilter::parse(query.employer.as_deref());
    let report = state.ledger.read().await.report(mode, &filter, today)?;
    Ok(Json(report))
}

async fn export(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let document = state.ledger.read().await.export_json()?;
    info!("ledger exported");
    Ok(([(header::CONTENT_TYPE, "application/json")], document))
}

async fn import(State(state): State<Arc<AppState>>, body: String) -> ApiResult<StatusCode> {
    mutate(&state, |ledger| ledger.import_json(&body)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Launch the API server.  Loads the ledger from the configured data
/// directory and serves until the process is interrupted.
pub async fn serve(config: Config) -> Result<()> {
    let store = JsonDirStore::new(&config.data_dir);
    let ledger = Ledger::load(&store)?;
    let state = Arc::new(AppState::new(ledger, Arc::new(store)));
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("paytrack listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
