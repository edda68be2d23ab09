pub mod config;
pub mod doctor;
pub mod migrate;

use serde::Serialize;
use serde_json::Value;

/// Outcome of one subcommand: a process exit code plus a single JSON line
/// on stdout, so wrapper scripts can branch on `status` and `error_class`.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: &'static str,
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &'static str, message: impl Into<String>) -> Self {
        Self::emit(
            0,
            CommandOutcome {
                command,
                status: "ok",
                message: message.into(),
                error_class: None,
                details: None,
            },
        )
    }

    pub fn success_with_details(
        command: &'static str,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self::emit(
            0,
            CommandOutcome {
                command,
                status: "ok",
                message: message.into(),
                error_class: None,
                details: Some(details),
            },
        )
    }

    pub fn failure(
        command: &'static str,
        error_class: &'static str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::emit(
            exit_code,
            CommandOutcome {
                command,
                status: "error",
                message: message.into(),
                error_class: Some(error_class),
                details: None,
            },
        )
    }

    fn emit(exit_code: u8, payload: CommandOutcome) -> Self {
        let output = serde_json::to_string(&payload).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"{}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                payload.command,
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
        Self { exit_code, output }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::CommandResult;

    #[test]
    fn success_payload_carries_details_when_present() {
        let result = CommandResult::success_with_details(
            "migrate",
            "interactions schema is current",
            json!({ "applied": ["0001 interactions"] }),
        );
        let payload: Value = serde_json::from_str(&result.output).expect("json output");

        assert_eq!(result.exit_code, 0);
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["details"]["applied"][0], "0001 interactions");
        assert!(payload.get("error_class").is_none());
    }

    #[test]
    fn failure_payload_names_the_error_class() {
        let result = CommandResult::failure("migrate", "db_connectivity", "no such file", 4);
        let payload: Value = serde_json::from_str(&result.output).expect("json output");

        assert_eq!(result.exit_code, 4);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "db_connectivity");
        assert!(payload.get("details").is_none());
    }
}
