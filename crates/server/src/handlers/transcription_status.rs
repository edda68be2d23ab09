//! Transcription job-status notification feeding the callback resumer.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;

use outdial_agent::resumer::CompletionEvent;

use crate::handlers::{ApiError, AppState, CompletionResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusNotification {
    pub job_name: String,
    pub status: String,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

pub async fn handle(
    State(state): State<AppState>,
    Json(notification): Json<JobStatusNotification>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let outcome = state
        .resumer
        .handle_completion(CompletionEvent::JobStatus {
            job_name: notification.job_name,
            status: notification.status,
            failure_reason: notification.failure_reason,
        })
        .await?;
    Ok(Json(outcome.into()))
}
