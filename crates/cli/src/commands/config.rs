use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use outdial_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "OUTDIAL_DATABASE_URL"),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "OUTDIAL_DATABASE_MAX_CONNECTIONS"),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", "OUTDIAL_DATABASE_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "llm.base_url",
        &config.llm.base_url,
        source("llm.base_url", "OUTDIAL_LLM_BASE_URL"),
    ));
    lines.push(render_line("llm.model", &config.llm.model, source("llm.model", "OUTDIAL_LLM_MODEL")));
    lines.push(render_line(
        "llm.api_key",
        &config.redacted_llm_api_key(),
        source("llm.api_key", "OUTDIAL_LLM_API_KEY"),
    ));

    lines.push(render_line(
        "crm.base_url",
        &config.crm.base_url,
        source("crm.base_url", "OUTDIAL_CRM_BASE_URL"),
    ));
    lines.push(render_line(
        "crm.client_id",
        if config.crm.client_id.is_empty() { "<unset>" } else { config.crm.client_id.as_str() },
        source("crm.client_id", "OUTDIAL_CRM_CLIENT_ID"),
    ));
    lines.push(render_line(
        "crm.client_secret",
        if config.crm.client_secret.is_some() { "<redacted>" } else { "<unset>" },
        source("crm.client_secret", "OUTDIAL_CRM_CLIENT_SECRET"),
    ));

    lines.push(render_line(
        "telephony.base_url",
        &config.telephony.base_url,
        source("telephony.base_url", "OUTDIAL_TELEPHONY_BASE_URL"),
    ));
    lines.push(render_line(
        "telephony.source_phone_number",
        if config.telephony.source_phone_number.is_empty() {
            "<unset>"
        } else {
            config.telephony.source_phone_number.as_str()
        },
        source("telephony.source_phone_number", "OUTDIAL_TELEPHONY_SOURCE_PHONE_NUMBER"),
    ));

    lines.push(render_line(
        "transcription.base_url",
        &config.transcription.base_url,
        source("transcription.base_url", "OUTDIAL_TRANSCRIPTION_BASE_URL"),
    ));
    lines.push(render_line(
        "transcription.language_code",
        &config.transcription.language_code,
        source("transcription.language_code", "OUTDIAL_TRANSCRIPTION_LANGUAGE_CODE"),
    ));
    lines.push(render_line(
        "transcription.storage_url_prefix",
        &config.transcription.storage_url_prefix,
        source("transcription.storage_url_prefix", "OUTDIAL_TRANSCRIPTION_STORAGE_URL_PREFIX"),
    ));

    lines.push(render_line(
        "workflow.base_url",
        &config.workflow.base_url,
        source("workflow.base_url", "OUTDIAL_WORKFLOW_BASE_URL"),
    ));
    lines.push(render_line(
        "workflow.workflow_id",
        &config.workflow.workflow_id,
        source("workflow.workflow_id", "OUTDIAL_WORKFLOW_ID"),
    ));
    lines.push(render_line(
        "storage.base_url",
        &config.storage.base_url,
        source("storage.base_url", "OUTDIAL_STORAGE_BASE_URL"),
    ));

    lines.push(render_line(
        "conversation.max_turns",
        &config.conversation.max_turns.to_string(),
        source("conversation.max_turns", "OUTDIAL_CONVERSATION_MAX_TURNS"),
    ));
    lines.push(render_line(
        "conversation.min_transcript_chars",
        &config.conversation.min_transcript_chars.to_string(),
        source("conversation.min_transcript_chars", "OUTDIAL_CONVERSATION_MIN_TRANSCRIPT_CHARS"),
    ));
    lines.push(render_line(
        "conversation.max_summary_input_chars",
        &config.conversation.max_summary_input_chars.to_string(),
        source(
            "conversation.max_summary_input_chars",
            "OUTDIAL_CONVERSATION_MAX_SUMMARY_INPUT_CHARS",
        ),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "OUTDIAL_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "OUTDIAL_SERVER_PORT"),
    ));
    lines.push(render_line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        source("server.graceful_shutdown_secs", "OUTDIAL_SERVER_GRACEFUL_SHUTDOWN_SECS"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "OUTDIAL_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "OUTDIAL_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("outdial.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/outdial.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
