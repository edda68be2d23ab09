//! Typed payloads exchanged with the workflow orchestrator.
//!
//! Every step payload is versioned and validated once at the boundary,
//! instead of defensively probing untyped JSON at each access.

use serde::{Deserialize, Serialize};

use crate::errors::ApplicationError;

pub const WORKFLOW_PAYLOAD_VERSION: u32 = 1;

/// Longest scenario text accepted by the call-invocation step; longer
/// generations are cut before storage.
pub const MAX_SCENARIO_CHARS: usize = 30_000;

fn default_version() -> u32 {
    WORKFLOW_PAYLOAD_VERSION
}

/// Input that starts a demo workflow execution, built by the turn engine
/// at the conversion point.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DemoRequest {
    #[serde(default = "default_version")]
    pub version: u32,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default)]
    pub chat_transcript: String,
}

/// Payload of the call-invocation step, delivered alongside a continuation
/// token while the workflow pauses.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStepEnvelope {
    pub task_token: String,
    pub input: CallStepInput,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStepInput {
    #[serde(default = "default_version")]
    pub version: u32,
    pub phone: String,
    pub scenario: String,
    pub lead_id: String,
    pub partition_key: String,
    pub sort_key: String,
}

impl CallStepEnvelope {
    /// Boundary validation: required fields present, scenario bounded.
    pub fn validate(mut self) -> Result<Self, ApplicationError> {
        if self.task_token.trim().is_empty() {
            return Err(ApplicationError::Validation("taskToken is required".to_owned()));
        }
        let input = &mut self.input;
        for (field, value) in [
            ("phone", &input.phone),
            ("leadId", &input.lead_id),
            ("partitionKey", &input.partition_key),
            ("sortKey", &input.sort_key),
        ] {
            if value.trim().is_empty() {
                return Err(ApplicationError::Validation(format!("{field} is required")));
            }
        }
        if input.scenario.chars().count() > MAX_SCENARIO_CHARS {
            input.scenario = input.scenario.chars().take(MAX_SCENARIO_CHARS).collect();
        }
        Ok(self)
    }
}

/// Success output handed back to the paused workflow after summarization.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOutput {
    pub summary: String,
    pub lead_id: String,
    pub transcript_bucket: String,
    pub transcript_key: String,
}

#[cfg(test)]
mod tests {
    use super::{CallStepEnvelope, CallStepInput, DemoRequest, MAX_SCENARIO_CHARS};

    fn envelope(token: &str, scenario: String) -> CallStepEnvelope {
        CallStepEnvelope {
            task_token: token.to_owned(),
            input: CallStepInput {
                version: 1,
                phone: "+15551234567".to_owned(),
                scenario,
                lead_id: "sf-1".to_owned(),
                partition_key: "LEAD#+15551234567".to_owned(),
                sort_key: "INTERACTION#t1".to_owned(),
            },
        }
    }

    #[test]
    fn demo_request_defaults_its_version_on_decode() {
        let request: DemoRequest = serde_json::from_value(serde_json::json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "phone": "+15551234567"
        }))
        .expect("should decode");
        assert_eq!(request.version, 1);
        assert_eq!(request.chat_transcript, "");
    }

    #[test]
    fn envelope_validation_rejects_missing_token() {
        let result = envelope("  ", "hello".to_owned()).validate();
        assert!(result.is_err());
    }

    #[test]
    fn envelope_validation_bounds_the_scenario() {
        let oversized = "x".repeat(MAX_SCENARIO_CHARS + 50);
        let validated = envelope("tok", oversized).validate().expect("should validate");
        assert_eq!(validated.input.scenario.chars().count(), MAX_SCENARIO_CHARS);
    }

    #[test]
    fn envelope_validation_requires_correlation_keys() {
        let mut bad = envelope("tok", "s".to_owned());
        bad.input.sort_key = String::new();
        assert!(bad.validate().is_err());
    }
}
