//! Create-lead workflow step: find-or-create the CRM lead and open the
//! durable interaction record for the run.

use axum::extract::State;
use axum::response::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use outdial_core::domain::interaction::{InteractionKey, InteractionRecord};
use outdial_core::domain::workflow::DemoRequest;
use outdial_core::errors::{ApplicationError, DomainError};
use outdial_core::phone::NormalizedPhone;

use crate::handlers::{ApiError, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadResponse {
    pub lead_id: String,
    pub partition_key: String,
    pub sort_key: String,
}

pub async fn handle(
    State(state): State<AppState>,
    Json(request): Json<DemoRequest>,
) -> Result<Json<CreateLeadResponse>, ApiError> {
    let phone = NormalizedPhone::parse_valid(&request.phone)
        .map_err(DomainError::from)
        .map_err(ApplicationError::from)?;

    let lead_id = match state.crm.find_lead_by_phone(&phone).await? {
        Some(existing) => {
            info!(event_name = "step.create_lead.reused", lead_id = existing.as_str(), "lead exists");
            existing
        }
        None => {
            let created = state
                .crm
                .create_lead(&request.first_name, &request.last_name, &phone)
                .await?;
            info!(event_name = "step.create_lead.created", lead_id = created.as_str(), "lead created");
            created
        }
    };

    let now = Utc::now();
    let key = InteractionKey::for_lead(phone.as_e164(), now);
    let mut record = InteractionRecord::new(key.clone(), &lead_id, now);
    if !request.chat_transcript.is_empty() {
        record.initial_transcript = Some(request.chat_transcript.clone());
    }
    state.interactions.save(record).await?;

    Ok(Json(CreateLeadResponse {
        lead_id,
        partition_key: key.partition_key,
        sort_key: key.sort_key,
    }))
}
