//! Generate-scenario workflow step.
//!
//! Generation failure never fails the step; the call proceeds with the
//! static greeting template.

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use outdial_agent::llm::GenerationRequest;
use outdial_agent::prompts;
use outdial_core::domain::workflow::WORKFLOW_PAYLOAD_VERSION;

use crate::handlers::AppState;

const SCENARIO_MAX_TOKENS: u32 = 300;
const SCENARIO_TEMPERATURE: f32 = 0.7;

fn default_version() -> u32 {
    WORKFLOW_PAYLOAD_VERSION
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRequest {
    #[serde(default = "default_version")]
    pub version: u32,
    pub first_name: String,
    #[serde(default)]
    pub chat_transcript: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResponse {
    pub scenario: String,
}

pub async fn handle(
    State(state): State<AppState>,
    Json(request): Json<ScenarioRequest>,
) -> Json<ScenarioResponse> {
    info!(
        event_name = "step.generate_scenario.requested",
        payload_version = request.version,
        "generating call scenario"
    );
    let prompt = prompts::scenario_prompt(&request.first_name, &request.chat_transcript);
    let scenario = match state
        .generator
        .generate(GenerationRequest {
            system: prompts::PHONE_TURN_SYSTEM.to_owned(),
            user: prompt,
            max_tokens: SCENARIO_MAX_TOKENS,
            temperature: SCENARIO_TEMPERATURE,
        })
        .await
    {
        Ok(text) => text,
        Err(error) => {
            warn!(
                event_name = "step.generate_scenario.fallback",
                error = %error,
                "generation failed, using static greeting"
            );
            prompts::static_scenario(&request.first_name)
        }
    };
    Json(ScenarioResponse { scenario })
}
