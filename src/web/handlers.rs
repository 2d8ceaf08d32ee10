//! Thin HTTP handlers for the scheduler API (§4.3's surface plus the
//! teacher's health-check quartet). Handlers validate request shape, call
//! straight into [`crate::scheduler::Scheduler`], and let `AppError`'s
//! `IntoResponse` impl translate failures to status codes.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::warn;

use crate::errors::{AppError, SchedulerError};
use crate::models::{PacketKey, PlayItem, QueueEntry};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub user: String,
    pub song_id: Option<i64>,
    pub video_url: Option<String>,
}

pub async fn vote(
    State(state): State<AppState>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<Vec<QueueEntry>>, AppError> {
    let queue = state
        .scheduler
        .vote(&req.user, req.song_id, req.video_url)
        .await?;
    Ok(Json(queue))
}

#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    pub song_id: Option<i64>,
    pub video_url: Option<String>,
    #[serde(default)]
    pub skip: bool,
}

pub async fn remove(
    State(state): State<AppState>,
    Json(req): Json<RemoveRequest>,
) -> Result<Json<Vec<QueueEntry>>, AppError> {
    let key = match (req.song_id, req.video_url) {
        (Some(song_id), None) => PacketKey::Local(song_id),
        (None, Some(video_url)) => PacketKey::Remote(video_url),
        _ => return Err(SchedulerError::InvalidArgument.into()),
    };
    let queue = state.scheduler.remove(key, req.skip).await?;
    Ok(Json(queue))
}

pub async fn clear(State(state): State<AppState>) -> Result<Json<Vec<QueueEntry>>, AppError> {
    let queue = state.scheduler.clear().await?;
    Ok(Json(queue))
}

#[derive(Debug, Deserialize)]
pub struct QueueParams {
    pub viewer: Option<String>,
}

pub async fn queue(
    State(state): State<AppState>,
    Query(params): Query<QueueParams>,
) -> Result<Json<Vec<QueueEntry>>, AppError> {
    let queue = state.scheduler.queue(params.viewer.as_deref()).await?;
    Ok(Json(queue))
}

pub async fn queue_count(State(state): State<AppState>) -> Result<Json<u64>, AppError> {
    let count = state.scheduler.num_queued().await?;
    Ok(Json(count))
}

#[derive(Debug, Deserialize, Default)]
pub struct AdvanceRequest {
    #[serde(default)]
    pub skip: bool,
}

pub async fn advance(
    State(state): State<AppState>,
    body: Option<Json<AdvanceRequest>>,
) -> Result<Json<Option<PlayItem>>, AppError> {
    let skip = body.map(|Json(req)| req.skip).unwrap_or(false);
    let played = state.scheduler.advance(skip).await?;
    Ok(Json(played))
}

pub async fn now_playing(State(state): State<AppState>) -> Json<Option<PlayItem>> {
    Json(state.scheduler.now_playing().await)
}

pub mod health {
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::Json;
    use serde_json::json;

    use super::super::AppState;

    pub async fn health_check() -> impl axum::response::IntoResponse {
        Json(json!({ "status": "ok" }))
    }

    pub async fn detailed_health_check(
        State(state): State<AppState>,
    ) -> impl axum::response::IntoResponse {
        let queue_depth = state.scheduler.num_queued().await.unwrap_or(0);
        let idle = state.scheduler.empty().await;
        Json(json!({
            "status": "ok",
            "queue_depth": queue_depth,
            "idle": idle,
        }))
    }

    pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
        match state.scheduler.num_queued().await {
            Ok(_) => StatusCode::OK,
            Err(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub async fn liveness_check() -> StatusCode {
        StatusCode::OK
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::Scheduler(SchedulerError::InvalidArgument) => StatusCode::BAD_REQUEST,
            AppError::Scheduler(SchedulerError::UnsupportedSource { .. }) => StatusCode::BAD_REQUEST,
            AppError::Scheduler(SchedulerError::LookupFailed { .. }) => StatusCode::BAD_GATEWAY,
            AppError::Scheduler(SchedulerError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Scheduler(SchedulerError::AlreadyVoted { .. }) => StatusCode::CONFLICT,
            AppError::Scheduler(SchedulerError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Web(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!("request failed: {}", self);
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
