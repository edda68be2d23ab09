use serde_json::json;

use crate::commands::CommandResult;
use outdial_core::config::{AppConfig, LoadOptions};
use outdial_db::{connect_with_settings, migrations};

#[derive(Debug)]
struct MigrateFailure {
    class: &'static str,
    exit_code: u8,
    message: String,
}

impl MigrateFailure {
    fn new(class: &'static str, exit_code: u8, message: impl Into<String>) -> Self {
        Self { class, exit_code, message: message.into() }
    }
}

/// Apply pending migrations and return the `version description` labels of
/// the ones this run applied. An empty list means the schema was already
/// current.
async fn apply_pending(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<Vec<String>, MigrateFailure> {
    let pool = connect_with_settings(database_url, max_connections, timeout_secs)
        .await
        .map_err(|error| MigrateFailure::new("db_connectivity", 4, error.to_string()))?;

    let already_applied = migrations::applied_versions(&pool)
        .await
        .map_err(|error| MigrateFailure::new("db_connectivity", 4, error.to_string()))?;

    migrations::run_pending(&pool)
        .await
        .map_err(|error| MigrateFailure::new("migration", 5, error.to_string()))?;

    let newly_applied = migrations::catalog()
        .into_iter()
        .filter(|(version, _)| !already_applied.contains(version))
        .map(|(version, description)| format!("{version:04} {description}"))
        .collect();

    pool.close().await;
    Ok(newly_applied)
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let applied = runtime.block_on(apply_pending(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    ));

    match applied {
        Ok(applied) if applied.is_empty() => {
            CommandResult::success("migrate", "interactions schema is already current")
        }
        Ok(applied) => CommandResult::success_with_details(
            "migrate",
            format!("applied {} migration(s) to the interactions schema", applied.len()),
            json!({ "applied": applied }),
        ),
        Err(failure) => {
            CommandResult::failure("migrate", failure.class, failure.message, failure.exit_code)
        }
    }
}
