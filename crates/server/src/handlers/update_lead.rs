//! Update-lead workflow step: write the call summary to the CRM lead.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::handlers::{ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    pub lead_id: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadResponse {
    pub lead_id: String,
    pub updated: bool,
}

pub async fn handle(
    State(state): State<AppState>,
    Json(request): Json<UpdateLeadRequest>,
) -> Result<Json<UpdateLeadResponse>, ApiError> {
    if request.lead_id.trim().is_empty() {
        return Err(ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "leadId is required"));
    }
    state.crm.update_lead(&request.lead_id, &request.summary).await?;
    info!(
        event_name = "step.update_lead.written",
        lead_id = request.lead_id.as_str(),
        "call summary written to lead"
    );
    Ok(Json(UpdateLeadResponse { lead_id: request.lead_id, updated: true }))
}
