//! Workflow Callback Resumer.
//!
//! Joins asynchronous transcription completion events back to the paused
//! workflow through the durable interaction record. Each pending
//! continuation resolves at most once: the token is cleared by a
//! conditional update, and the losing side of a race lands in the neutral
//! `Skipped` outcome.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info, warn};

use outdial_core::domain::interaction::PendingContinuation;
use outdial_core::domain::workflow::SummaryOutput;
use outdial_core::errors::ApplicationError;
use outdial_db::repositories::InteractionRepository;

use crate::capabilities::{ObjectStore, TranscriptionService, WorkflowClient};
use crate::llm::{GenerationRequest, TextGenerator};
use crate::prompts;

pub const NO_SPEECH_PLACEHOLDER: &str = "[No speech detected during call]";
pub const TRUNCATION_MARKER: &str = "... [truncated]";

const SUMMARY_MAX_TOKENS: u32 = 2000;
const SUMMARY_TEMPERATURE: f32 = 0.1;
const FAILURE_CAUSE_MAX_CHARS: usize = 256;

#[derive(Clone, Debug)]
pub enum CompletionEvent {
    /// Transcription job-status notification delivered out of band.
    JobStatus { job_name: String, status: String, failure_reason: Option<String> },
    /// Direct synchronous invocation with an already-resolved transcript
    /// location; touches no stored state and sends no signals.
    Direct { bucket: String, key: String, lead_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Continuation consumed and the workflow signaled success.
    Resumed { contact_id: String, lead_id: String },
    /// Continuation consumed and the workflow signaled failure.
    FailureSignaled { contact_id: String },
    /// No pending continuation matched; safe under at-least-once delivery.
    Skipped { reason: String },
    /// Direct-mode summary, returned synchronously.
    Summary { summary: String, lead_id: String },
}

#[derive(Clone, Debug)]
pub struct ResumerSettings {
    /// Transcript URIs must start with this prefix to be trusted.
    pub storage_url_prefix: String,
    pub min_transcript_chars: usize,
    pub max_summary_input_chars: usize,
}

pub struct CallbackResumer {
    generator: Arc<dyn TextGenerator>,
    transcription: Arc<dyn TranscriptionService>,
    store: Arc<dyn ObjectStore>,
    workflow: Arc<dyn WorkflowClient>,
    interactions: Arc<dyn InteractionRepository>,
    settings: ResumerSettings,
}

impl CallbackResumer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        transcription: Arc<dyn TranscriptionService>,
        store: Arc<dyn ObjectStore>,
        workflow: Arc<dyn WorkflowClient>,
        interactions: Arc<dyn InteractionRepository>,
        settings: ResumerSettings,
    ) -> Self {
        Self { generator, transcription, store, workflow, interactions, settings }
    }

    pub async fn handle_completion(
        &self,
        event: CompletionEvent,
    ) -> Result<CompletionOutcome, ApplicationError> {
        match event {
            CompletionEvent::JobStatus { job_name, status, failure_reason } => {
                if job_name.trim().is_empty() {
                    return Err(ApplicationError::Validation("job name is required".to_owned()));
                }
                match status.as_str() {
                    "FAILED" => self.resolve_failed_job(&job_name, failure_reason).await,
                    "COMPLETED" => self.resolve_completed_job(&job_name).await,
                    other => Err(ApplicationError::Validation(format!(
                        "unrecognized job status `{other}`"
                    ))),
                }
            }
            CompletionEvent::Direct { bucket, key, lead_id } => {
                let transcript = self.fetch_transcript(&bucket, &key).await?;
                let summary = self.summarize(&transcript).await?;
                info!(event_name = "resumer.direct_summary", lead_id = lead_id.as_str(), "summary generated");
                Ok(CompletionOutcome::Summary { summary, lead_id })
            }
        }
    }

    /// FAILED jobs forward the upstream reason to the workflow without any
    /// transcript retrieval. The conditional consume keeps the failure
    /// signal at-most-once.
    async fn resolve_failed_job(
        &self,
        contact_id: &str,
        failure_reason: Option<String>,
    ) -> Result<CompletionOutcome, ApplicationError> {
        let Some(pending) = self.find_pending(contact_id).await? else {
            return Ok(skipped(contact_id));
        };

        let now = outdial_core::chrono::Utc::now();
        let consumed = self
            .interactions
            .consume_continuation(&pending.key, None, None, now)
            .await
            .map_err(persistence)?;
        if !consumed {
            return Ok(skipped(contact_id));
        }

        let cause = failure_reason.unwrap_or_else(|| "Unknown".to_owned());
        self.signal_failure(&pending.task_token, "TranscriptionFailed", &cause).await;
        error!(
            event_name = "resumer.failure_signaled",
            contact_id,
            cause = cause.as_str(),
            "transcription failed; workflow signaled"
        );
        Ok(CompletionOutcome::FailureSignaled { contact_id: contact_id.to_owned() })
    }

    async fn resolve_completed_job(
        &self,
        contact_id: &str,
    ) -> Result<CompletionOutcome, ApplicationError> {
        let (bucket, key) = self.resolve_transcript_location(contact_id).await?;

        let Some(pending) = self.find_pending(contact_id).await? else {
            return Ok(skipped(contact_id));
        };

        // From here a token is known: any fatal error must attempt a
        // failure signal before propagating so the workflow is not left
        // paused indefinitely.
        match self.summarize_and_consume(contact_id, &pending, &bucket, &key).await {
            Ok(outcome) => Ok(outcome),
            Err(fatal) => {
                self.signal_failure(&pending.task_token, "SummarizationFailed", &fatal.to_string())
                    .await;
                Err(fatal)
            }
        }
    }

    async fn summarize_and_consume(
        &self,
        contact_id: &str,
        pending: &PendingContinuation,
        bucket: &str,
        key: &str,
    ) -> Result<CompletionOutcome, ApplicationError> {
        let transcript = self.fetch_transcript(bucket, key).await?;
        let summary = self.summarize(&transcript).await?;

        let now = outdial_core::chrono::Utc::now();
        let consumed = self
            .interactions
            .consume_continuation(&pending.key, Some(&summary), Some(&transcript), now)
            .await
            .map_err(persistence)?;
        if !consumed {
            return Ok(skipped(contact_id));
        }

        let output = SummaryOutput {
            summary,
            lead_id: pending.lead_identifier.clone(),
            transcript_bucket: bucket.to_owned(),
            transcript_key: key.to_owned(),
        };
        self.workflow
            .send_task_success(&pending.task_token, &output)
            .await
            .map_err(|error| ApplicationError::Integration(error.to_string()))?;

        info!(
            event_name = "resumer.resumed",
            contact_id,
            lead_id = output.lead_id.as_str(),
            "workflow resumed with summary"
        );
        Ok(CompletionOutcome::Resumed {
            contact_id: contact_id.to_owned(),
            lead_id: output.lead_id,
        })
    }

    /// Resolve the transcript output location from the transcription
    /// service and split it into bucket and key. Untrusted URIs fail
    /// validation.
    async fn resolve_transcript_location(
        &self,
        contact_id: &str,
    ) -> Result<(String, String), ApplicationError> {
        let job = self
            .transcription
            .get_job(contact_id)
            .await
            .map_err(|error| ApplicationError::Integration(error.to_string()))?;
        let uri = job.transcript_uri.ok_or_else(|| {
            ApplicationError::Validation(format!("job `{contact_id}` has no transcript location"))
        })?;
        parse_transcript_uri(&uri, &self.settings.storage_url_prefix)
    }

    async fn find_pending(
        &self,
        contact_id: &str,
    ) -> Result<Option<PendingContinuation>, ApplicationError> {
        let record = self
            .interactions
            .find_by_contact_id(contact_id)
            .await
            .map_err(persistence)?;
        Ok(record.and_then(|record| record.pending_continuation()))
    }

    /// Fetch the transcript document and extract its text. A short or
    /// empty transcript is a valid business outcome and becomes the fixed
    /// placeholder; oversized text is cut with a marker.
    async fn fetch_transcript(&self, bucket: &str, key: &str) -> Result<String, ApplicationError> {
        let bytes = self
            .store
            .get_object(bucket, key)
            .await
            .map_err(|error| ApplicationError::Integration(error.to_string()))?;
        let document: TranscriptDocument = serde_json::from_slice(&bytes).map_err(|error| {
            ApplicationError::Validation(format!("malformed transcript document: {error}"))
        })?;

        let raw = document
            .results
            .transcripts
            .first()
            .map(|alternative| alternative.transcript.trim().to_owned())
            .unwrap_or_default();

        let mut transcript = if raw.chars().count() < self.settings.min_transcript_chars {
            warn!(
                event_name = "resumer.short_transcript",
                length = raw.chars().count(),
                "substituting no-speech placeholder"
            );
            NO_SPEECH_PLACEHOLDER.to_owned()
        } else {
            raw
        };

        if transcript.chars().count() > self.settings.max_summary_input_chars {
            transcript = transcript
                .chars()
                .take(self.settings.max_summary_input_chars)
                .collect::<String>()
                + TRUNCATION_MARKER;
            warn!(event_name = "resumer.transcript_truncated", "transcript cut before summarization");
        }

        Ok(transcript)
    }

    /// Summarize into the three labeled sections. Unlike the turn engine
    /// there is no fallback: the resumed workflow needs a real summary, so
    /// empty generator output is fatal.
    async fn summarize(&self, transcript: &str) -> Result<String, ApplicationError> {
        let request = GenerationRequest {
            system: String::new(),
            user: prompts::summary_prompt(transcript),
            max_tokens: SUMMARY_MAX_TOKENS,
            temperature: SUMMARY_TEMPERATURE,
        };
        let summary = self
            .generator
            .generate(request)
            .await
            .map_err(|error| ApplicationError::Integration(error.to_string()))?;
        let summary = summary.trim().to_owned();
        if summary.is_empty() {
            return Err(ApplicationError::Integration("empty summary generated".to_owned()));
        }
        Ok(summary)
    }

    /// Best-effort failure signal: a failing signal is logged and the
    /// original error still propagates.
    async fn signal_failure(&self, task_token: &str, error_code: &str, cause: &str) {
        let cause: String = cause.chars().take(FAILURE_CAUSE_MAX_CHARS).collect();
        if let Err(signal_error) =
            self.workflow.send_task_failure(task_token, error_code, &cause).await
        {
            error!(
                event_name = "resumer.failure_signal_failed",
                error = %signal_error,
                "could not deliver failure signal"
            );
        }
    }
}

fn skipped(contact_id: &str) -> CompletionOutcome {
    info!(
        event_name = "resumer.skipped",
        contact_id,
        "no pending continuation; event treated as already handled"
    );
    CompletionOutcome::Skipped {
        reason: format!("no pending continuation for contact `{contact_id}`"),
    }
}

fn persistence(error: outdial_db::repositories::RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

/// Split `https://<storage host>/<bucket>/<key...>` into bucket and key
/// after checking the configured trust prefix.
fn parse_transcript_uri(uri: &str, expected_prefix: &str) -> Result<(String, String), ApplicationError> {
    if !uri.starts_with(expected_prefix) {
        return Err(ApplicationError::Validation(format!(
            "transcript location `{uri}` does not match the expected storage prefix"
        )));
    }
    let path = uri
        .split_once("://")
        .and_then(|(_, rest)| rest.split_once('/'))
        .map(|(_, path)| path)
        .ok_or_else(|| {
            ApplicationError::Validation(format!("transcript location `{uri}` has no path"))
        })?;
    match path.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
            Ok((bucket.to_owned(), key.to_owned()))
        }
        _ => Err(ApplicationError::Validation(format!(
            "could not split bucket and key from `{uri}`"
        ))),
    }
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptDocument {
    #[serde(default)]
    results: TranscriptResults,
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptResults {
    #[serde(default)]
    transcripts: Vec<TranscriptAlternative>,
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptAlternative {
    #[serde(default)]
    transcript: String,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use outdial_core::chrono::Utc;
    use outdial_core::domain::interaction::{InteractionKey, InteractionRecord};
    use outdial_db::repositories::{InMemoryInteractionRepository, InteractionRepository};

    use super::{
        parse_transcript_uri, CallbackResumer, CompletionEvent, CompletionOutcome,
        ResumerSettings, NO_SPEECH_PLACEHOLDER, TRUNCATION_MARKER,
    };
    use crate::capabilities::{TranscriptionJob, TranscriptionJobStatus};
    use crate::fakes::{
        FakeObjectStore, FakeTextGenerator, FakeTranscriptionService, FakeWorkflowClient,
    };

    struct Harness {
        generator: Arc<FakeTextGenerator>,
        transcription: Arc<FakeTranscriptionService>,
        store: Arc<FakeObjectStore>,
        workflow: Arc<FakeWorkflowClient>,
        interactions: Arc<InMemoryInteractionRepository>,
        resumer: CallbackResumer,
    }

    fn harness() -> Harness {
        let generator = Arc::new(FakeTextGenerator::default());
        let transcription = Arc::new(FakeTranscriptionService::default());
        let store = Arc::new(FakeObjectStore::default());
        let workflow = Arc::new(FakeWorkflowClient::default());
        let interactions = Arc::new(InMemoryInteractionRepository::default());
        let resumer = CallbackResumer::new(
            generator.clone(),
            transcription.clone(),
            store.clone(),
            workflow.clone(),
            interactions.clone(),
            ResumerSettings {
                storage_url_prefix: "https://storage.".to_owned(),
                min_transcript_chars: 10,
                max_summary_input_chars: 5000,
            },
        );
        Harness { generator, transcription, store, workflow, interactions, resumer }
    }

    fn completed(job_name: &str) -> CompletionEvent {
        CompletionEvent::JobStatus {
            job_name: job_name.to_owned(),
            status: "COMPLETED".to_owned(),
            failure_reason: None,
        }
    }

    async fn seed_record(harness: &Harness, contact_id: &str, token: Option<&str>) {
        let now = Utc::now();
        let mut record = InteractionRecord::new(
            InteractionKey { partition_key: "LEAD#555".to_owned(), sort_key: "INTERACTION#t1".to_owned() },
            "sf-lead-1",
            now,
        );
        record.contact_id = Some(contact_id.to_owned());
        record.task_token = token.map(str::to_owned);
        harness.interactions.save(record).await.expect("seed record");
    }

    fn seed_transcript(harness: &Harness, contact_id: &str, text: &str) {
        harness.transcription.seed_job(
            contact_id,
            TranscriptionJob {
                status: TranscriptionJobStatus::Completed,
                transcript_uri: Some(format!(
                    "https://storage.example.com/recordings/{contact_id}.json"
                )),
            },
        );
        harness.store.seed_object(
            "recordings",
            &format!("{contact_id}.json"),
            serde_json::json!({"results": {"transcripts": [{"transcript": text}]}})
                .to_string()
                .into_bytes(),
        );
    }

    #[tokio::test]
    async fn completed_job_resumes_the_workflow_end_to_end() {
        let harness = harness();
        seed_record(&harness, "abc-123", Some("tok-1")).await;
        seed_transcript(&harness, "abc-123", "hello is anyone there");
        harness.generator.push_response("\u{2022} topics\n\u{2022} decisions\n\u{2022} next steps");

        let outcome =
            harness.resumer.handle_completion(completed("abc-123")).await.expect("completion");

        assert_eq!(
            outcome,
            CompletionOutcome::Resumed {
                contact_id: "abc-123".to_owned(),
                lead_id: "555".to_owned()
            }
        );

        let successes = harness.workflow.successes();
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].0, "tok-1");
        assert_eq!(successes[0].1.lead_id, "555");
        assert_eq!(successes[0].1.transcript_bucket, "recordings");

        let record = harness
            .interactions
            .find_by_contact_id("abc-123")
            .await
            .expect("lookup")
            .expect("record present");
        assert_eq!(record.task_token, None);
        assert!(record.call_summary.is_some());
        assert_eq!(record.full_transcript.as_deref(), Some("hello is anyone there"));
    }

    #[tokio::test]
    async fn missing_record_or_consumed_token_is_skipped_without_signals() {
        let harness = harness();
        seed_transcript(&harness, "abc-123", "hello is anyone there");

        let outcome =
            harness.resumer.handle_completion(completed("abc-123")).await.expect("completion");
        assert!(matches!(outcome, CompletionOutcome::Skipped { .. }));

        seed_record(&harness, "abc-123", None).await;
        let outcome =
            harness.resumer.handle_completion(completed("abc-123")).await.expect("completion");
        assert!(matches!(outcome, CompletionOutcome::Skipped { .. }));

        assert!(harness.workflow.successes().is_empty());
        assert!(harness.workflow.failures().is_empty());
    }

    #[tokio::test]
    async fn failed_job_sends_exactly_one_failure_signal_and_fetches_nothing() {
        let harness = harness();
        seed_record(&harness, "abc-123", Some("tok-1")).await;

        let event = CompletionEvent::JobStatus {
            job_name: "abc-123".to_owned(),
            status: "FAILED".to_owned(),
            failure_reason: Some("media unreadable".to_owned()),
        };
        let outcome = harness.resumer.handle_completion(event.clone()).await.expect("completion");
        assert_eq!(outcome, CompletionOutcome::FailureSignaled { contact_id: "abc-123".to_owned() });

        let failures = harness.workflow.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "tok-1");
        assert_eq!(failures[0].2, "media unreadable");
        assert_eq!(harness.store.fetch_count(), 0);

        // Redelivery of the same event is skipped, not signaled again.
        let outcome = harness.resumer.handle_completion(event).await.expect("completion");
        assert!(matches!(outcome, CompletionOutcome::Skipped { .. }));
        assert_eq!(harness.workflow.failures().len(), 1);
    }

    #[tokio::test]
    async fn short_transcript_summarizes_the_placeholder_instead_of_failing() {
        let harness = harness();
        seed_record(&harness, "abc-123", Some("tok-1")).await;
        seed_transcript(&harness, "abc-123", "uh");
        harness.generator.push_response("\u{2022} no content");

        let outcome =
            harness.resumer.handle_completion(completed("abc-123")).await.expect("completion");
        assert!(matches!(outcome, CompletionOutcome::Resumed { .. }));

        let prompt = harness.generator.last_prompt().expect("generator called");
        assert!(prompt.contains(NO_SPEECH_PLACEHOLDER));
    }

    #[tokio::test]
    async fn long_transcript_is_truncated_with_a_marker() {
        let harness = harness();
        seed_record(&harness, "abc-123", Some("tok-1")).await;
        seed_transcript(&harness, "abc-123", &"word ".repeat(2000));
        harness.generator.push_response("\u{2022} long call");

        harness.resumer.handle_completion(completed("abc-123")).await.expect("completion");

        let record = harness
            .interactions
            .find_by_contact_id("abc-123")
            .await
            .expect("lookup")
            .expect("record present");
        let transcript = record.full_transcript.expect("stored transcript");
        assert!(transcript.ends_with(TRUNCATION_MARKER));
        assert_eq!(transcript.chars().count(), 5000 + TRUNCATION_MARKER.chars().count());
    }

    #[tokio::test]
    async fn empty_summary_is_fatal_and_signals_failure_first() {
        let harness = harness();
        seed_record(&harness, "abc-123", Some("tok-1")).await;
        seed_transcript(&harness, "abc-123", "hello is anyone there");
        harness.generator.push_response("   ");

        let result = harness.resumer.handle_completion(completed("abc-123")).await;
        assert!(result.is_err());

        let failures = harness.workflow.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].1, "SummarizationFailed");
    }

    #[tokio::test]
    async fn unrecognized_status_is_a_validation_error() {
        let harness = harness();
        let event = CompletionEvent::JobStatus {
            job_name: "abc-123".to_owned(),
            status: "QUEUED".to_owned(),
            failure_reason: None,
        };
        assert!(harness.resumer.handle_completion(event).await.is_err());
    }

    #[tokio::test]
    async fn untrusted_transcript_uri_fails_validation() {
        let harness = harness();
        seed_record(&harness, "abc-123", Some("tok-1")).await;
        harness.transcription.seed_job(
            "abc-123",
            TranscriptionJob {
                status: TranscriptionJobStatus::Completed,
                transcript_uri: Some("https://elsewhere.example.com/b/k".to_owned()),
            },
        );

        assert!(harness.resumer.handle_completion(completed("abc-123")).await.is_err());
    }

    #[tokio::test]
    async fn direct_mode_summarizes_without_store_or_signals() {
        let harness = harness();
        harness.store.seed_object(
            "recordings",
            "t.json",
            serde_json::json!({"results": {"transcripts": [{"transcript": "a full conversation"}]}})
                .to_string()
                .into_bytes(),
        );
        harness.generator.push_response("\u{2022} direct summary");

        let outcome = harness
            .resumer
            .handle_completion(CompletionEvent::Direct {
                bucket: "recordings".to_owned(),
                key: "t.json".to_owned(),
                lead_id: "sf-lead-1".to_owned(),
            })
            .await
            .expect("completion");

        assert_eq!(
            outcome,
            CompletionOutcome::Summary {
                summary: "\u{2022} direct summary".to_owned(),
                lead_id: "sf-lead-1".to_owned()
            }
        );
        assert!(harness.workflow.successes().is_empty());
        assert!(harness.workflow.failures().is_empty());
    }

    #[test]
    fn transcript_uri_splits_into_bucket_and_key() {
        let (bucket, key) = parse_transcript_uri(
            "https://storage.example.com/my-bucket/path/to/transcript.json",
            "https://storage.",
        )
        .expect("should parse");
        assert_eq!(bucket, "my-bucket");
        assert_eq!(key, "path/to/transcript.json");

        assert!(parse_transcript_uri("https://storage.example.com/only-bucket", "https://storage.")
            .is_err());
    }
}
