use async_trait::async_trait;
use thiserror::Error;

use outdial_core::chrono::{DateTime, Utc};
use outdial_core::domain::interaction::{InteractionKey, InteractionRecord};

pub mod interaction;
pub mod memory;

pub use interaction::SqlInteractionRepository;
pub use memory::InMemoryInteractionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait InteractionRepository: Send + Sync {
    async fn find_by_key(
        &self,
        key: &InteractionKey,
    ) -> Result<Option<InteractionRecord>, RepositoryError>;

    /// Secondary lookup by the telephony contact id attached to the record.
    async fn find_by_contact_id(
        &self,
        contact_id: &str,
    ) -> Result<Option<InteractionRecord>, RepositoryError>;

    async fn save(&self, record: InteractionRecord) -> Result<(), RepositoryError>;

    async fn attach_contact(
        &self,
        key: &InteractionKey,
        contact_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn attach_continuation(
        &self,
        key: &InteractionKey,
        task_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Clear the continuation token, optionally storing the call outcome in
    /// the same write. The update only applies while a token is still
    /// attached; `false` means another caller consumed it first.
    async fn consume_continuation(
        &self,
        key: &InteractionKey,
        call_summary: Option<&str>,
        full_transcript: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
}
