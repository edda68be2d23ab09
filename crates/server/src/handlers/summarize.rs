//! Direct summarization step: fetch a known transcript location and
//! return the summary synchronously, with no stored state and no signals.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;

use outdial_agent::resumer::CompletionEvent;

use crate::handlers::{ApiError, AppState, CompletionResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub bucket: String,
    pub key: String,
    pub lead_id: String,
}

pub async fn handle(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let outcome = state
        .resumer
        .handle_completion(CompletionEvent::Direct {
            bucket: request.bucket,
            key: request.key,
            lead_id: request.lead_id,
        })
        .await?;
    Ok(Json(outcome.into()))
}
