use crate::errors::Error;
use crate::model::{CommandHistoryEntry, CommandRequest, Device, HistoryResponse};
use crate::service::DeviceService;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

const DEFAULT_HISTORY_LIMIT: usize = 100;
const MAX_HISTORY_LIMIT: usize = 1000;

#[derive(Clone)]
struct AppState {
    service: DeviceService,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub application_status: String,
    pub store_status: String,
    pub timestamp: DateTime<Utc>,
}

pub fn create_router(service: DeviceService) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/api/v1/devices", get(list_devices))
        .route("/api/v1/devices/:device_id", get(get_device))
        .route("/api/v1/devices/:device_id/commands", post(send_command))
        .route("/api/v1/devices/:device_id/history", get(get_history))
        .route("/health", get(health))
        .with_state(state)
}

async fn list_devices(State(state): State<AppState>) -> Result<Json<Vec<Device>>, AppError> {
    Ok(Json(state.service.list_devices().await?))
}

async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Device>, AppError> {
    Ok(Json(state.service.get_device(&device_id).await?))
}

/// Rejected commands are a normal result and still answer 200.
async fn send_command(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandHistoryEntry>, AppError> {
    Ok(Json(state.service.send_command(&device_id, request).await?))
}

async fn get_history(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let (data, total) = state.service.history_page(&device_id, limit, offset).await?;

    Ok(Json(HistoryResponse {
        data,
        total,
        limit,
        offset,
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_status = match state.service.devices().ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            warn!("Health check: store ping failed: {}", e);
            "unhealthy"
        }
    };

    Json(HealthResponse {
        application_status: "healthy".to_string(),
        store_status: store_status.to_string(),
        timestamp: Utc::now(),
    })
}

pub struct AppError(Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict { .. } | Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("API error: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}
