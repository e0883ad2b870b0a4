use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::history::HistoryItem;
use crate::pipeline::{self, PipelineError, QueryRequest, QueryResponse};
use crate::web::state::AppState;

/// Error surface of the HTTP contract: a status plus `{"detail": "..."}`.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn internal(detail: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            detail: err.detail().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    info!(
        "Query request via {} backend: {}",
        state.config.llm.backend, payload.question
    );

    let response = pipeline::run_query(&state.llm, &state.history, &payload)
        .await
        .map_err(|e| {
            error!("Pipeline failed: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    100
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryItem>>, ApiError> {
    let items = state.history.list(params.limit).await.map_err(|e| {
        error!("History read failed: {}", e);
        ApiError::internal(format!("Error fetching history: {}", e))
    })?;

    Ok(Json(items))
}
