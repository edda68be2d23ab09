//! Invoke-call workflow step: persist the scenario and continuation token,
//! then place the outbound call.
//!
//! Once the token is known, any failure signals task-failure before the
//! error propagates, so the paused workflow never waits on a call that
//! was never placed. A failing failure-signal is logged and the original
//! error still propagates.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::response::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use outdial_core::domain::interaction::{InteractionKey, InteractionRecord};
use outdial_core::domain::workflow::CallStepEnvelope;

use crate::handlers::{ApiError, AppState};

const FAILURE_CAUSE_MAX_CHARS: usize = 256;
const FAILURE_ERROR_CODE: &str = "CallInvocationFailed";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeCallResponse {
    pub contact_id: String,
}

pub async fn handle(
    State(state): State<AppState>,
    Json(envelope): Json<CallStepEnvelope>,
) -> Result<Json<InvokeCallResponse>, ApiError> {
    let envelope = envelope.validate().map_err(ApiError::from)?;
    let task_token = envelope.task_token.clone();

    match place_call(&state, envelope).await {
        Ok(response) => Ok(Json(response)),
        Err(api_error) => {
            let cause: String = api_error.message().chars().take(FAILURE_CAUSE_MAX_CHARS).collect();
            if let Err(signal_error) = state
                .workflow
                .send_task_failure(&task_token, FAILURE_ERROR_CODE, &cause)
                .await
            {
                error!(
                    event_name = "step.invoke_call.failure_signal_failed",
                    error = %signal_error,
                    "could not signal task failure"
                );
            }
            Err(api_error)
        }
    }
}

async fn place_call(
    state: &AppState,
    envelope: CallStepEnvelope,
) -> Result<InvokeCallResponse, ApiError> {
    let input = &envelope.input;
    let key = InteractionKey {
        partition_key: input.partition_key.clone(),
        sort_key: input.sort_key.clone(),
    };

    let now = Utc::now();
    let mut record = match state.interactions.find_by_key(&key).await? {
        Some(existing) => existing,
        None => InteractionRecord::new(key.clone(), &input.lead_id, now),
    };
    record.scenario = Some(input.scenario.clone());
    record.updated_at = now;
    state.interactions.save(record).await?;
    state.interactions.attach_continuation(&key, &envelope.task_token, now).await?;

    let mut attributes = BTreeMap::new();
    attributes.insert("interactionKey".to_owned(), key.composite());
    attributes.insert("leadId".to_owned(), input.lead_id.clone());

    let contact_id = state
        .dialer
        .start_call(&input.phone, &state.config.telephony.source_phone_number, &attributes)
        .await?;
    state.interactions.attach_contact(&key, &contact_id, Utc::now()).await?;

    info!(
        event_name = "step.invoke_call.placed",
        contact_id = contact_id.as_str(),
        lead_id = input.lead_id.as_str(),
        "outbound call placed and continuation stored"
    );
    Ok(InvokeCallResponse { contact_id })
}
