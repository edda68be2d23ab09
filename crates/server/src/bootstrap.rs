use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::info;

use outdial_agent::resumer::{CallbackResumer, ResumerSettings};
use outdial_agent::turn::TurnEngine;
use outdial_core::config::{AppConfig, ConfigError, LoadOptions};
use outdial_db::repositories::SqlInteractionRepository;
use outdial_db::{connect_with_settings, migrations, DbPool};

use crate::adapters::{
    HttpCrmClient, HttpObjectStore, HttpOutboundDialer, HttpTextGenerator,
    HttpTranscriptionService, HttpWorkflowClient,
};
use crate::handlers::AppState;

pub struct Application {
    pub config: Arc<AppConfig>,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let config = Arc::new(config);
    let state = build_state(config.clone(), db_pool.clone())?;
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        "capability adapters initialized"
    );

    Ok(Application { config, db_pool, state })
}

fn build_state(config: Arc<AppConfig>, db_pool: DbPool) -> Result<AppState, BootstrapError> {
    let llm_client = Client::builder()
        .timeout(Duration::from_secs(config.llm.timeout_secs))
        .build()
        .map_err(BootstrapError::HttpClient)?;
    let service_client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let interactions = Arc::new(SqlInteractionRepository::new(db_pool));
    let generator = Arc::new(HttpTextGenerator::new(llm_client, &config.llm));
    let crm = Arc::new(HttpCrmClient::new(service_client.clone(), &config.crm));
    let dialer = Arc::new(HttpOutboundDialer::new(service_client.clone(), &config.telephony));
    let transcription =
        Arc::new(HttpTranscriptionService::new(service_client.clone(), &config.transcription));
    let store = Arc::new(HttpObjectStore::new(service_client.clone(), &config.storage));
    let workflow = Arc::new(HttpWorkflowClient::new(service_client, &config.workflow));

    let turn_engine = Arc::new(TurnEngine::new(
        generator.clone(),
        crm.clone(),
        workflow.clone(),
        interactions.clone(),
        config.conversation.max_turns,
    ));
    let resumer = Arc::new(CallbackResumer::new(
        generator.clone(),
        transcription.clone(),
        store.clone(),
        workflow.clone(),
        interactions.clone(),
        ResumerSettings {
            storage_url_prefix: config.transcription.storage_url_prefix.clone(),
            min_transcript_chars: config.conversation.min_transcript_chars,
            max_summary_input_chars: config.conversation.max_summary_input_chars,
        },
    ));

    Ok(AppState {
        config,
        turn_engine,
        resumer,
        interactions,
        generator,
        crm,
        dialer,
        transcription,
        workflow,
    })
}

#[cfg(test)]
mod tests {
    use outdial_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_builds_the_state() {
        let app = bootstrap(options("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name = 'interactions'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query should succeed");
        assert_eq!(table_count, 1, "bootstrap should expose the interactions table");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_an_unusable_database_url() {
        let result = bootstrap(options("sqlite:///nonexistent-dir/outdial.db")).await;
        assert!(result.is_err());
    }
}
