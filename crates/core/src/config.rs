use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub crm: CrmConfig,
    pub telephony: TelephonyConfig,
    pub transcription: TranscriptionConfig,
    pub workflow: WorkflowConfig,
    pub storage: StorageConfig,
    pub conversation: ConversationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Option<SecretString>,
    pub token_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelephonyConfig {
    pub base_url: String,
    pub instance_id: String,
    pub contact_flow_id: String,
    pub source_phone_number: String,
}

#[derive(Clone, Debug)]
pub struct TranscriptionConfig {
    pub base_url: String,
    pub language_code: String,
    /// Transcript locations must start with this prefix to be trusted.
    pub storage_url_prefix: String,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub base_url: String,
    pub workflow_id: String,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    /// History retention window; the transcript keeps `max_turns * 2` lines.
    pub max_turns: usize,
    /// Transcripts shorter than this are treated as "no speech detected".
    pub min_transcript_chars: usize,
    /// Transcript text is cut to this length before summarization.
    pub max_summary_input_chars: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub crm_base_url: Option<String>,
    pub workflow_base_url: Option<String>,
    pub storage_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://outdial.db".to_owned(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                base_url: "http://localhost:11434".to_owned(),
                api_key: None,
                model: "outdial-conversational".to_owned(),
                timeout_secs: 30,
            },
            crm: CrmConfig {
                base_url: "http://localhost:8090".to_owned(),
                client_id: String::new(),
                client_secret: None,
                token_ttl_secs: 1800,
            },
            telephony: TelephonyConfig {
                base_url: "http://localhost:8091".to_owned(),
                instance_id: String::new(),
                contact_flow_id: String::new(),
                source_phone_number: String::new(),
            },
            transcription: TranscriptionConfig {
                base_url: "http://localhost:8092".to_owned(),
                language_code: "en-US".to_owned(),
                storage_url_prefix: "https://storage.".to_owned(),
            },
            workflow: WorkflowConfig {
                base_url: "http://localhost:8093".to_owned(),
                workflow_id: "outdial-demo".to_owned(),
            },
            storage: StorageConfig { base_url: "http://localhost:8094".to_owned() },
            conversation: ConversationConfig {
                max_turns: 10,
                min_transcript_chars: 10,
                max_summary_input_chars: 5000,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_owned(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("outdial.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            apply(&mut self.database.url, database.url);
            apply(&mut self.database.max_connections, database.max_connections);
            apply(&mut self.database.timeout_secs, database.timeout_secs);
        }
        if let Some(llm) = patch.llm {
            apply(&mut self.llm.base_url, llm.base_url);
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            apply(&mut self.llm.model, llm.model);
            apply(&mut self.llm.timeout_secs, llm.timeout_secs);
        }
        if let Some(crm) = patch.crm {
            apply(&mut self.crm.base_url, crm.base_url);
            apply(&mut self.crm.client_id, crm.client_id);
            if let Some(client_secret) = crm.client_secret {
                self.crm.client_secret = Some(secret_value(client_secret));
            }
            apply(&mut self.crm.token_ttl_secs, crm.token_ttl_secs);
        }
        if let Some(telephony) = patch.telephony {
            apply(&mut self.telephony.base_url, telephony.base_url);
            apply(&mut self.telephony.instance_id, telephony.instance_id);
            apply(&mut self.telephony.contact_flow_id, telephony.contact_flow_id);
            apply(&mut self.telephony.source_phone_number, telephony.source_phone_number);
        }
        if let Some(transcription) = patch.transcription {
            apply(&mut self.transcription.base_url, transcription.base_url);
            apply(&mut self.transcription.language_code, transcription.language_code);
            apply(&mut self.transcription.storage_url_prefix, transcription.storage_url_prefix);
        }
        if let Some(workflow) = patch.workflow {
            apply(&mut self.workflow.base_url, workflow.base_url);
            apply(&mut self.workflow.workflow_id, workflow.workflow_id);
        }
        if let Some(storage) = patch.storage {
            apply(&mut self.storage.base_url, storage.base_url);
        }
        if let Some(conversation) = patch.conversation {
            apply(&mut self.conversation.max_turns, conversation.max_turns);
            apply(&mut self.conversation.min_transcript_chars, conversation.min_transcript_chars);
            apply(
                &mut self.conversation.max_summary_input_chars,
                conversation.max_summary_input_chars,
            );
        }
        if let Some(server) = patch.server {
            apply(&mut self.server.bind_address, server.bind_address);
            apply(&mut self.server.port, server.port);
            apply(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        }
        if let Some(logging) = patch.logging {
            apply(&mut self.logging.level, logging.level);
            apply(&mut self.logging.format, logging.format);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("OUTDIAL_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("OUTDIAL_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("OUTDIAL_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("OUTDIAL_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("OUTDIAL_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("OUTDIAL_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("OUTDIAL_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("OUTDIAL_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("OUTDIAL_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("OUTDIAL_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("OUTDIAL_CRM_BASE_URL") {
            self.crm.base_url = value;
        }
        if let Some(value) = read_env("OUTDIAL_CRM_CLIENT_ID") {
            self.crm.client_id = value;
        }
        if let Some(value) = read_env("OUTDIAL_CRM_CLIENT_SECRET") {
            self.crm.client_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("OUTDIAL_CRM_TOKEN_TTL_SECS") {
            self.crm.token_ttl_secs = parse_u64("OUTDIAL_CRM_TOKEN_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("OUTDIAL_TELEPHONY_BASE_URL") {
            self.telephony.base_url = value;
        }
        if let Some(value) = read_env("OUTDIAL_TELEPHONY_INSTANCE_ID") {
            self.telephony.instance_id = value;
        }
        if let Some(value) = read_env("OUTDIAL_TELEPHONY_CONTACT_FLOW_ID") {
            self.telephony.contact_flow_id = value;
        }
        if let Some(value) = read_env("OUTDIAL_TELEPHONY_SOURCE_PHONE_NUMBER") {
            self.telephony.source_phone_number = value;
        }

        if let Some(value) = read_env("OUTDIAL_TRANSCRIPTION_BASE_URL") {
            self.transcription.base_url = value;
        }
        if let Some(value) = read_env("OUTDIAL_TRANSCRIPTION_LANGUAGE_CODE") {
            self.transcription.language_code = value;
        }
        if let Some(value) = read_env("OUTDIAL_TRANSCRIPTION_STORAGE_URL_PREFIX") {
            self.transcription.storage_url_prefix = value;
        }

        if let Some(value) = read_env("OUTDIAL_WORKFLOW_BASE_URL") {
            self.workflow.base_url = value;
        }
        if let Some(value) = read_env("OUTDIAL_WORKFLOW_ID") {
            self.workflow.workflow_id = value;
        }
        if let Some(value) = read_env("OUTDIAL_STORAGE_BASE_URL") {
            self.storage.base_url = value;
        }

        if let Some(value) = read_env("OUTDIAL_CONVERSATION_MAX_TURNS") {
            self.conversation.max_turns =
                parse_usize("OUTDIAL_CONVERSATION_MAX_TURNS", &value)?;
        }
        if let Some(value) = read_env("OUTDIAL_CONVERSATION_MIN_TRANSCRIPT_CHARS") {
            self.conversation.min_transcript_chars =
                parse_usize("OUTDIAL_CONVERSATION_MIN_TRANSCRIPT_CHARS", &value)?;
        }
        if let Some(value) = read_env("OUTDIAL_CONVERSATION_MAX_SUMMARY_INPUT_CHARS") {
            self.conversation.max_summary_input_chars =
                parse_usize("OUTDIAL_CONVERSATION_MAX_SUMMARY_INPUT_CHARS", &value)?;
        }

        if let Some(value) = read_env("OUTDIAL_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("OUTDIAL_SERVER_PORT") {
            self.server.port = parse_u16("OUTDIAL_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("OUTDIAL_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("OUTDIAL_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("OUTDIAL_LOGGING_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("OUTDIAL_LOGGING_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        apply(&mut self.database.url, overrides.database_url);
        apply(&mut self.logging.level, overrides.log_level);
        apply(&mut self.llm.base_url, overrides.llm_base_url);
        apply(&mut self.llm.model, overrides.llm_model);
        apply(&mut self.crm.base_url, overrides.crm_base_url);
        apply(&mut self.workflow.base_url, overrides.workflow_base_url);
        apply(&mut self.storage.base_url, overrides.storage_base_url);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_base_url("llm.base_url", &self.llm.base_url)?;
        validate_base_url("crm.base_url", &self.crm.base_url)?;
        validate_base_url("telephony.base_url", &self.telephony.base_url)?;
        validate_base_url("transcription.base_url", &self.transcription.base_url)?;
        validate_base_url("workflow.base_url", &self.workflow.base_url)?;
        validate_base_url("storage.base_url", &self.storage.base_url)?;
        validate_conversation(&self.conversation)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;

        if self.transcription.storage_url_prefix.trim().is_empty() {
            return Err(ConfigError::Validation(
                "transcription.storage_url_prefix must not be empty".to_owned(),
            ));
        }
        if self.crm.token_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "crm.token_ttl_secs must be greater than zero".to_owned(),
            ));
        }

        Ok(())
    }

    /// Redacted secret view for operator-facing config inspection.
    pub fn redacted_llm_api_key(&self) -> String {
        match &self.llm.api_key {
            Some(secret) => redact(secret.expose_secret()),
            None => "<unset>".to_owned(),
        }
    }
}

fn apply<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn redact(value: &str) -> String {
    if value.len() <= 4 {
        "****".to_owned()
    } else {
        format!("{}****", &value[..4])
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("outdial.toml"), PathBuf::from("config/outdial.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_owned(),
        ));
    }
    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_owned(),
        ));
    }
    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_owned(),
        ));
    }
    Ok(())
}

fn validate_base_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{field} must start with http:// or https://")))
    }
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if conversation.max_turns == 0 {
        return Err(ConfigError::Validation(
            "conversation.max_turns must be greater than zero".to_owned(),
        ));
    }
    if conversation.max_summary_input_chars < conversation.min_transcript_chars {
        return Err(ConfigError::Validation(
            "conversation.max_summary_input_chars must not be below min_transcript_chars"
                .to_owned(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_owned()));
    }
    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_owned(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_owned(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    crm: Option<CrmPatch>,
    telephony: Option<TelephonyPatch>,
    transcription: Option<TranscriptionPatch>,
    workflow: Option<WorkflowPatch>,
    storage: Option<StoragePatch>,
    conversation: Option<ConversationPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    base_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    token_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelephonyPatch {
    base_url: Option<String>,
    instance_id: Option<String>,
    contact_flow_id: Option<String>,
    source_phone_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptionPatch {
    base_url: Option<String>,
    language_code: Option<String>,
    storage_url_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    base_url: Option<String>,
    workflow_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    max_turns: Option<usize>,
    min_transcript_chars: Option<usize>,
    max_summary_input_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
