use std::collections::BTreeMap;

use tokio::sync::RwLock;

use outdial_core::chrono::{DateTime, Utc};
use outdial_core::domain::interaction::{InteractionKey, InteractionRecord};

use super::{InteractionRepository, RepositoryError};

/// Map-backed repository for tests and local runs without a database file.
#[derive(Default)]
pub struct InMemoryInteractionRepository {
    records: RwLock<BTreeMap<(String, String), InteractionRecord>>,
}

impl InMemoryInteractionRepository {
    fn map_key(key: &InteractionKey) -> (String, String) {
        (key.partition_key.clone(), key.sort_key.clone())
    }
}

#[async_trait::async_trait]
impl InteractionRepository for InMemoryInteractionRepository {
    async fn find_by_key(
        &self,
        key: &InteractionKey,
    ) -> Result<Option<InteractionRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&Self::map_key(key)).cloned())
    }

    async fn find_by_contact_id(
        &self,
        contact_id: &str,
    ) -> Result<Option<InteractionRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| record.contact_id.as_deref() == Some(contact_id))
            .max_by_key(|record| record.updated_at)
            .cloned())
    }

    async fn save(&self, record: InteractionRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.insert(Self::map_key(&record.key()), record);
        Ok(())
    }

    async fn attach_contact(
        &self,
        key: &InteractionKey,
        contact_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&Self::map_key(key)) {
            record.contact_id = Some(contact_id.to_owned());
            record.updated_at = now;
        }
        Ok(())
    }

    async fn attach_continuation(
        &self,
        key: &InteractionKey,
        task_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&Self::map_key(key)) {
            record.task_token = Some(task_token.to_owned());
            record.updated_at = now;
        }
        Ok(())
    }

    async fn consume_continuation(
        &self,
        key: &InteractionKey,
        call_summary: Option<&str>,
        full_transcript: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&Self::map_key(key)) else {
            return Ok(false);
        };
        if record.task_token.is_none() {
            return Ok(false);
        }

        record.task_token = None;
        if let Some(summary) = call_summary {
            record.call_summary = Some(summary.to_owned());
        }
        if let Some(transcript) = full_transcript {
            record.full_transcript = Some(transcript.to_owned());
        }
        record.updated_at = now;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use outdial_core::chrono::Utc;
    use outdial_core::domain::interaction::{InteractionKey, InteractionRecord};

    use super::InMemoryInteractionRepository;
    use crate::repositories::InteractionRepository;

    #[tokio::test]
    async fn round_trip_and_contact_lookup() {
        let repo = InMemoryInteractionRepository::default();
        let now = Utc::now();
        let mut record =
            InteractionRecord::new(InteractionKey::for_lead("+15551234567", now), "sf-1", now);
        record.contact_id = Some("contact-1".to_owned());
        repo.save(record.clone()).await.expect("save");

        let by_key = repo.find_by_key(&record.key()).await.expect("find").expect("present");
        assert_eq!(by_key, record);

        let by_contact =
            repo.find_by_contact_id("contact-1").await.expect("find").expect("present");
        assert_eq!(by_contact.key(), record.key());
    }

    #[tokio::test]
    async fn consume_is_conditional_on_the_token() {
        let repo = InMemoryInteractionRepository::default();
        let now = Utc::now();
        let key = InteractionKey::for_lead("555", now);
        let mut record = InteractionRecord::new(key.clone(), "sf-1", now);
        record.task_token = Some("tok".to_owned());
        repo.save(record).await.expect("save");

        assert!(repo
            .consume_continuation(&key, Some("summary"), None, now)
            .await
            .expect("first consume"));
        assert!(!repo
            .consume_continuation(&key, Some("late"), None, now)
            .await
            .expect("second consume"));

        let stored = repo.find_by_key(&key).await.expect("find").expect("present");
        assert_eq!(stored.call_summary.as_deref(), Some("summary"));
    }

    #[tokio::test]
    async fn consume_on_a_missing_record_reports_false() {
        let repo = InMemoryInteractionRepository::default();
        let key = InteractionKey::for_lead("absent", Utc::now());
        assert!(!repo
            .consume_continuation(&key, None, None, Utc::now())
            .await
            .expect("consume"));
    }
}
