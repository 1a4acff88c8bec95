//! HTTP surface over the prediction service and model registry.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use iris_core::{clear_ready, is_ready, mark_ready, metrics_handler, ServiceConfig};
use iris_model::{registry_from_config, ModelError, PredictionResult, PredictionService, RawFeatures, RegistryRecord, VersionSummary};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
}

pub enum ApiError {
    Model(ModelError),
    Worker(JoinError),
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self { Self::Model(e) }
}

impl From<JoinError> for ApiError {
    fn from(e: JoinError) -> Self { Self::Worker(e) }
}

pub fn status_for(err: &ModelError) -> StatusCode {
    match err {
        ModelError::InvalidInput { .. } | ModelError::InvalidVersion(_) => StatusCode::BAD_REQUEST,
        ModelError::UnknownVersion(_) | ModelError::ModelNotFound(_) | ModelError::NoActiveModel => StatusCode::NOT_FOUND,
        ModelError::RegistryCorrupt(_) | ModelError::Persistence { .. } | ModelError::DatasetUnavailable(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, detail) = match self {
            ApiError::Model(e) => (status_for(&e), e.kind(), e.to_string()),
            ApiError::Worker(e) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string()),
        };
        if status.is_server_error() {
            warn!(error = %detail, kind, "request failed");
        }
        (status, Json(json!({ "error": kind, "detail": detail }))).into_response()
    }
}

/// Registry and artifact access is blocking file I/O; keep it off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> iris_model::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub version: Option<String>,
    pub active_artifact: Option<String>,
    pub model_kind: Option<String>,
    pub accuracy: Option<f64>,
    pub artifact_sha256: Option<String>,
    pub updated_at: Option<String>,
    pub available_versions: Vec<String>,
    pub models: Vec<VersionSummary>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchQuery {
    pub target_version: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/model-info", get(model_info))
        .route("/predict", get(predict_active))
        .route("/predict/:version", get(predict_version))
        .route("/switch-model", post(switch_model))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "iris inference gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/model-info", "/predict", "/predict/{version}", "/switch-model", "/metrics"],
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let service = state.service.clone();
    let active = blocking(move || service.describe_active()).await.ok().map(|r| r.active_version);
    Json(json!({ "status": "healthy", "ready": is_ready(), "active_version": active }))
}

#[instrument(skip(state))]
async fn model_info(State(state): State<AppState>) -> ApiResult<ModelInfo> {
    let service = state.service.clone();
    let (active, available, models) = blocking(move || {
        let registry = service.registry();
        Ok((registry.read()?, registry.store().available()?, service.describe_all_available()?))
    })
    .await?;
    Ok(Json(ModelInfo {
        version: active.as_ref().map(|r| r.active_version.clone()),
        active_artifact: active.as_ref().map(|r| r.active_artifact_ref.clone()),
        model_kind: active.as_ref().map(|r| r.model_kind.clone()),
        accuracy: active.as_ref().map(|r| r.accuracy),
        artifact_sha256: active.as_ref().and_then(|r| r.artifact_sha256.clone()),
        updated_at: active.as_ref().map(|r| r.updated_at.to_rfc3339()),
        available_versions: available.into_iter().collect(),
        models,
    }))
}

#[instrument(skip(state))]
async fn predict_active(State(state): State<AppState>, Query(raw): Query<RawFeatures>) -> ApiResult<PredictionResult> {
    let service = state.service.clone();
    Ok(Json(blocking(move || service.predict_raw(&raw, None)).await?))
}

#[instrument(skip(state))]
async fn predict_version(
    State(state): State<AppState>,
    Path(version): Path<String>,
    Query(raw): Query<RawFeatures>,
) -> ApiResult<PredictionResult> {
    let service = state.service.clone();
    Ok(Json(blocking(move || service.predict_raw(&raw, Some(&version))).await?))
}

#[instrument(skip(state))]
async fn switch_model(State(state): State<AppState>, Query(q): Query<SwitchQuery>) -> ApiResult<RegistryRecord> {
    let target = q.target_version.filter(|t| !t.trim().is_empty()).ok_or(ModelError::InvalidInput {
        field: "target_version",
        reason: "missing required value".into(),
    })?;
    let service = state.service.clone();
    let record = blocking(move || service.switch_active(&target)).await?;
    info!(version = %record.active_version, "switched via api");
    Ok(Json(record))
}

pub fn app_from_config(cfg: &ServiceConfig) -> Router {
    let service = Arc::new(PredictionService::new(registry_from_config(cfg)));
    match service.describe_active() {
        Ok(r) => info!(version = %r.active_version, accuracy = r.accuracy, "active model on startup"),
        Err(e) => warn!(error = %e, "starting without a usable active model"),
    }
    router(AppState { service })
}

pub async fn serve(cfg: ServiceConfig) -> anyhow::Result<()> {
    let app = app_from_config(&cfg);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    info!(service = %cfg.service_name, addr = %listener.local_addr()?, "inference gateway listening");
    mark_ready();
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown_signal_received");
        })
        .await?;
    clear_ready();
    Ok(())
}
