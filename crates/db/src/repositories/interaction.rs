use sqlx::{sqlite::SqliteRow, Row};

use outdial_core::chrono::{DateTime, Utc};
use outdial_core::domain::interaction::{InteractionKey, InteractionRecord};

use super::{InteractionRepository, RepositoryError};
use crate::DbPool;

pub struct SqlInteractionRepository {
    pool: DbPool,
}

impl SqlInteractionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const RECORD_COLUMNS: &str = "partition_key,
                sort_key,
                lead_id,
                interaction_type,
                scenario,
                contact_id,
                task_token,
                call_summary,
                full_transcript,
                initial_transcript,
                created_at,
                updated_at";

#[async_trait::async_trait]
impl InteractionRepository for SqlInteractionRepository {
    async fn find_by_key(
        &self,
        key: &InteractionKey,
    ) -> Result<Option<InteractionRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS}
             FROM interactions
             WHERE partition_key = ? AND sort_key = ?",
        ))
        .bind(&key.partition_key)
        .bind(&key.sort_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn find_by_contact_id(
        &self,
        contact_id: &str,
    ) -> Result<Option<InteractionRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS}
             FROM interactions
             WHERE contact_id = ?
             ORDER BY updated_at DESC
             LIMIT 1",
        ))
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn save(&self, record: InteractionRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO interactions (
                partition_key,
                sort_key,
                lead_id,
                interaction_type,
                scenario,
                contact_id,
                task_token,
                call_summary,
                full_transcript,
                initial_transcript,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(partition_key, sort_key) DO UPDATE SET
                lead_id = excluded.lead_id,
                interaction_type = excluded.interaction_type,
                scenario = excluded.scenario,
                contact_id = excluded.contact_id,
                task_token = excluded.task_token,
                call_summary = excluded.call_summary,
                full_transcript = excluded.full_transcript,
                initial_transcript = excluded.initial_transcript,
                updated_at = excluded.updated_at",
        )
        .bind(&record.partition_key)
        .bind(&record.sort_key)
        .bind(&record.lead_id)
        .bind(&record.interaction_type)
        .bind(record.scenario.as_deref())
        .bind(record.contact_id.as_deref())
        .bind(record.task_token.as_deref())
        .bind(record.call_summary.as_deref())
        .bind(record.full_transcript.as_deref())
        .bind(record.initial_transcript.as_deref())
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn attach_contact(
        &self,
        key: &InteractionKey,
        contact_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE interactions
             SET contact_id = ?, updated_at = ?
             WHERE partition_key = ? AND sort_key = ?",
        )
        .bind(contact_id)
        .bind(now.to_rfc3339())
        .bind(&key.partition_key)
        .bind(&key.sort_key)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn attach_continuation(
        &self,
        key: &InteractionKey,
        task_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE interactions
             SET task_token = ?, updated_at = ?
             WHERE partition_key = ? AND sort_key = ?",
        )
        .bind(task_token)
        .bind(now.to_rfc3339())
        .bind(&key.partition_key)
        .bind(&key.sort_key)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn consume_continuation(
        &self,
        key: &InteractionKey,
        call_summary: Option<&str>,
        full_transcript: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        // The token guard makes the consume conditional: a second caller
        // racing on the same record affects zero rows.
        let result = sqlx::query(
            "UPDATE interactions
             SET task_token = NULL,
                 call_summary = COALESCE(?, call_summary),
                 full_transcript = COALESCE(?, full_transcript),
                 updated_at = ?
             WHERE partition_key = ? AND sort_key = ? AND task_token IS NOT NULL",
        )
        .bind(call_summary)
        .bind(full_transcript)
        .bind(now.to_rfc3339())
        .bind(&key.partition_key)
        .bind(&key.sort_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn record_from_row(row: SqliteRow) -> Result<InteractionRecord, RepositoryError> {
    Ok(InteractionRecord {
        partition_key: row.try_get("partition_key")?,
        sort_key: row.try_get("sort_key")?,
        lead_id: row.try_get("lead_id")?,
        interaction_type: row.try_get("interaction_type")?,
        scenario: row.try_get("scenario")?,
        contact_id: row.try_get("contact_id")?,
        task_token: row.try_get("task_token")?,
        call_summary: row.try_get("call_summary")?,
        full_transcript: row.try_get("full_transcript")?,
        initial_transcript: row.try_get("initial_transcript")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
