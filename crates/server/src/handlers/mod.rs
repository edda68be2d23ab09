//! Inbound event and workflow-step endpoints.
//!
//! Every handler consumes a typed payload validated at the boundary and
//! shares one [`AppState`]. Failures map to a JSON error body; business
//! non-outcomes (no lead, already consumed) are 200 responses with a
//! descriptive outcome field.

pub mod create_lead;
pub mod fulfillment;
pub mod invoke_call;
pub mod recording;
pub mod scenario;
pub mod summarize;
pub mod transcription_status;
pub mod update_lead;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::error;

use outdial_agent::capabilities::{
    CapabilityError, CrmClient, OutboundDialer, TranscriptionService, WorkflowClient,
};
use outdial_agent::llm::TextGenerator;
use outdial_agent::resumer::{CallbackResumer, CompletionOutcome};
use outdial_agent::turn::TurnEngine;
use outdial_core::config::AppConfig;
use outdial_core::errors::ApplicationError;
use outdial_db::repositories::{InteractionRepository, RepositoryError};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub turn_engine: Arc<TurnEngine>,
    pub resumer: Arc<CallbackResumer>,
    pub interactions: Arc<dyn InteractionRepository>,
    pub generator: Arc<dyn TextGenerator>,
    pub crm: Arc<dyn CrmClient>,
    pub dialer: Arc<dyn OutboundDialer>,
    pub transcription: Arc<dyn TranscriptionService>,
    pub workflow: Arc<dyn WorkflowClient>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(event_name = "handler.error", error = self.message.as_str(), "request failed");
        }
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let status = match &error {
            ApplicationError::Domain(_) => StatusCode::BAD_REQUEST,
            ApplicationError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApplicationError::Persistence(_) | ApplicationError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApplicationError::Integration(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, error.to_string())
    }
}

impl From<CapabilityError> for ApiError {
    fn from(error: CapabilityError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, error.to_string())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

/// Wire form of a resumer outcome, shared by the transcription-status and
/// summarize endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl From<CompletionOutcome> for CompletionResponse {
    fn from(outcome: CompletionOutcome) -> Self {
        match outcome {
            CompletionOutcome::Resumed { contact_id, lead_id } => Self {
                outcome: "resumed",
                contact_id: Some(contact_id),
                lead_id: Some(lead_id),
                reason: None,
                summary: None,
            },
            CompletionOutcome::FailureSignaled { contact_id } => Self {
                outcome: "failure_signaled",
                contact_id: Some(contact_id),
                lead_id: None,
                reason: None,
                summary: None,
            },
            CompletionOutcome::Skipped { reason } => Self {
                outcome: "skipped",
                contact_id: None,
                lead_id: None,
                reason: Some(reason),
                summary: None,
            },
            CompletionOutcome::Summary { summary, lead_id } => Self {
                outcome: "summary",
                contact_id: None,
                lead_id: Some(lead_id),
                reason: None,
                summary: Some(summary),
            },
        }
    }
}
