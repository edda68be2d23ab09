//! Durable interaction records and their composite keys.
//!
//! One record tracks one end-to-end outbound interaction: scenario, call
//! contact id, pending continuation token, and finally transcript and
//! summary. The token field doubles as the pending-continuation marker;
//! clearing it consumes the continuation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const LEAD_KEY_PREFIX: &str = "LEAD";
pub const INTERACTION_KEY_PREFIX: &str = "INTERACTION";
pub const INTERACTION_TYPE_CHAT_AND_CALL: &str = "CHAT_AND_CALL";

/// Composite record key, canonically
/// `LEAD#<id>#INTERACTION#<rfc3339 timestamp>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionKey {
    pub partition_key: String,
    pub sort_key: String,
}

impl InteractionKey {
    pub fn for_lead(lead_identifier: &str, at: DateTime<Utc>) -> Self {
        Self {
            partition_key: format!("{LEAD_KEY_PREFIX}#{lead_identifier}"),
            sort_key: format!("{INTERACTION_KEY_PREFIX}#{}", at.to_rfc3339()),
        }
    }

    /// Split a composite key string into partition and sort keys.
    ///
    /// Canonical four-segment keys split after the second segment. Legacy
    /// keys with two or three segments split at the first `#`. Anything
    /// with fewer than two segments is malformed.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let segments: Vec<&str> = raw.split('#').collect();
        if segments.len() >= 4 {
            return Ok(Self {
                partition_key: format!("{}#{}", segments[0], segments[1]),
                sort_key: segments[2..].join("#"),
            });
        }
        match raw.split_once('#') {
            Some((partition_key, sort_key)) if !sort_key.is_empty() => Ok(Self {
                partition_key: partition_key.to_owned(),
                sort_key: sort_key.to_owned(),
            }),
            _ => Err(DomainError::MalformedInteractionKey(raw.to_owned())),
        }
    }

    /// The lead identifier embedded in the partition key
    /// (`LEAD#555` -> `555`).
    pub fn lead_identifier(&self) -> Option<&str> {
        self.partition_key.split_once('#').map(|(_, identifier)| identifier)
    }

    pub fn composite(&self) -> String {
        format!("{}#{}", self.partition_key, self.sort_key)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub partition_key: String,
    pub sort_key: String,
    pub lead_id: String,
    pub interaction_type: String,
    pub scenario: Option<String>,
    pub contact_id: Option<String>,
    pub task_token: Option<String>,
    pub call_summary: Option<String>,
    pub full_transcript: Option<String>,
    pub initial_transcript: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InteractionRecord {
    pub fn new(key: InteractionKey, lead_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            partition_key: key.partition_key,
            sort_key: key.sort_key,
            lead_id: lead_id.into(),
            interaction_type: INTERACTION_TYPE_CHAT_AND_CALL.to_owned(),
            scenario: None,
            contact_id: None,
            task_token: None,
            call_summary: None,
            full_transcript: None,
            initial_transcript: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> InteractionKey {
        InteractionKey {
            partition_key: self.partition_key.clone(),
            sort_key: self.sort_key.clone(),
        }
    }

    /// View of the record as a pending continuation, if one is attached.
    pub fn pending_continuation(&self) -> Option<PendingContinuation> {
        let task_token = self.task_token.clone()?;
        Some(PendingContinuation {
            task_token,
            key: self.key(),
            lead_identifier: self
                .key()
                .lead_identifier()
                .unwrap_or(self.lead_id.as_str())
                .to_owned(),
        })
    }
}

/// A continuation waiting to be resolved: the opaque workflow token plus
/// the business keys correlated with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingContinuation {
    pub task_token: String,
    pub key: InteractionKey,
    pub lead_identifier: String,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{InteractionKey, InteractionRecord};
    use crate::errors::DomainError;

    #[test]
    fn canonical_key_splits_after_second_segment() {
        let key = InteractionKey::parse("LEAD#+15551234567#INTERACTION#2026-01-05T06:07:12+00:00")
            .expect("should parse");
        assert_eq!(key.partition_key, "LEAD#+15551234567");
        assert_eq!(key.sort_key, "INTERACTION#2026-01-05T06:07:12+00:00");
        assert_eq!(key.lead_identifier(), Some("+15551234567"));
    }

    #[test]
    fn legacy_two_segment_key_splits_at_first_delimiter() {
        let key = InteractionKey::parse("LEAD#abc").expect("should parse");
        assert_eq!(key.partition_key, "LEAD");
        assert_eq!(key.sort_key, "abc");
    }

    #[test]
    fn keys_without_a_delimiter_are_malformed() {
        assert!(matches!(
            InteractionKey::parse("not-a-key"),
            Err(DomainError::MalformedInteractionKey(_))
        ));
        assert!(matches!(
            InteractionKey::parse("dangling#"),
            Err(DomainError::MalformedInteractionKey(_))
        ));
    }

    #[test]
    fn composite_round_trips_through_parse() {
        let now = Utc::now();
        let key = InteractionKey::for_lead("+15551234567", now);
        let reparsed = InteractionKey::parse(&key.composite()).expect("should parse");
        assert_eq!(key, reparsed);
    }

    #[test]
    fn pending_continuation_requires_a_token() {
        let now = Utc::now();
        let mut record =
            InteractionRecord::new(InteractionKey::for_lead("555", now), "sf-lead-1", now);
        assert!(record.pending_continuation().is_none());

        record.task_token = Some("tok-1".to_owned());
        let pending = record.pending_continuation().expect("token attached");
        assert_eq!(pending.task_token, "tok-1");
        assert_eq!(pending.lead_identifier, "555");
    }
}
