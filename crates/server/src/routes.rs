//! HTTP surface: one route per managed event or workflow step, plus the
//! health probe.

use axum::routing::post;
use axum::Router;

use outdial_db::DbPool;

use crate::handlers::{
    self, create_lead, fulfillment, invoke_call, recording, scenario, summarize,
    transcription_status, update_lead,
};

pub fn router(state: handlers::AppState, db_pool: DbPool) -> Router {
    Router::new()
        .route("/v1/turns", post(fulfillment::handle))
        .route("/v1/steps/create-lead", post(create_lead::handle))
        .route("/v1/steps/generate-scenario", post(scenario::handle))
        .route("/v1/steps/invoke-call", post(invoke_call::handle))
        .route("/v1/steps/summarize", post(summarize::handle))
        .route("/v1/steps/update-lead", post(update_lead::handle))
        .route("/v1/events/recording-uploaded", post(recording::handle))
        .route("/v1/events/transcription-status", post(transcription_status::handle))
        .with_state(state)
        .merge(crate::health::router(db_pool))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use outdial_agent::capabilities::{TranscriptionJob, TranscriptionJobStatus};
    use outdial_agent::fakes::{
        FakeCrmClient, FakeObjectStore, FakeOutboundDialer, FakeTextGenerator,
        FakeTranscriptionService, FakeWorkflowClient,
    };
    use outdial_agent::resumer::{CallbackResumer, ResumerSettings};
    use outdial_agent::turn::TurnEngine;
    use outdial_core::config::AppConfig;
    use outdial_core::domain::interaction::{InteractionKey, InteractionRecord};
    use outdial_db::repositories::{InMemoryInteractionRepository, InteractionRepository};
    use outdial_db::connect_with_settings;

    use crate::handlers::AppState;
    use crate::routes::router;

    struct Fixture {
        state: AppState,
        generator: Arc<FakeTextGenerator>,
        crm: Arc<FakeCrmClient>,
        interactions: Arc<InMemoryInteractionRepository>,
        transcription: Arc<FakeTranscriptionService>,
        store: Arc<FakeObjectStore>,
        workflow: Arc<FakeWorkflowClient>,
    }

    fn fixture() -> Fixture {
        let config = Arc::new(AppConfig::default());
        let generator = Arc::new(FakeTextGenerator::default());
        let crm = Arc::new(FakeCrmClient::default());
        let dialer = Arc::new(FakeOutboundDialer::default());
        let transcription = Arc::new(FakeTranscriptionService::default());
        let store = Arc::new(FakeObjectStore::default());
        let workflow = Arc::new(FakeWorkflowClient::default());
        let interactions = Arc::new(InMemoryInteractionRepository::default());

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

        let state = AppState {
            config,
            turn_engine,
            resumer,
            interactions: interactions.clone(),
            generator: generator.clone(),
            crm: crm.clone(),
            dialer,
            transcription: transcription.clone(),
            workflow: workflow.clone(),
        };
        Fixture { state, generator, crm, interactions, transcription, store, workflow }
    }

    async fn post_json(app: axum::Router, path: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post(path)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request should build"),
            )
            .await
            .expect("router should respond");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be json")
        };
        (status, value)
    }

    async fn test_pool() -> outdial_db::DbPool {
        connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect")
    }

    #[tokio::test]
    async fn completed_job_status_resumes_the_paused_workflow_once() {
        let fixture = fixture();
        let key = InteractionKey {
            partition_key: "LEAD#555".to_owned(),
            sort_key: "INTERACTION#t1".to_owned(),
        };
        let now = Utc::now();
        let mut record = InteractionRecord::new(key.clone(), "555", now);
        record.task_token = Some("tok-1".to_owned());
        record.contact_id = Some("abc-123".to_owned());
        fixture.interactions.save(record).await.expect("seed should save");

        fixture.transcription.seed_job(
            "abc-123",
            TranscriptionJob {
                status: TranscriptionJobStatus::Completed,
                transcript_uri: Some(
                    "https://storage.example.com/recordings/abc-123.json".to_owned(),
                ),
            },
        );
        fixture.store.seed_object(
            "recordings",
            "abc-123.json",
            json!({"results": {"transcripts": [{"transcript": "hello is anyone there"}]}})
                .to_string()
                .into_bytes(),
        );
        fixture.generator.push_response("\u{2022} greeting, no response");

        let app = router(fixture.state.clone(), test_pool().await);
        let (status, body) = post_json(
            app,
            "/v1/events/transcription-status",
            json!({"jobName": "abc-123", "status": "COMPLETED"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "resumed");
        assert_eq!(body["leadId"], "555");

        let successes = fixture.workflow.successes();
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].0, "tok-1");
        assert_eq!(successes[0].1.lead_id, "555");

        let stored = fixture
            .interactions
            .find_by_key(&key)
            .await
            .expect("lookup should succeed")
            .expect("record should remain");
        assert!(stored.task_token.is_none(), "continuation should be consumed");
    }

    #[tokio::test]
    async fn redelivered_job_status_is_skipped_without_signals() {
        let fixture = fixture();
        let app = router(fixture.state.clone(), test_pool().await);
        let (status, body) = post_json(
            app,
            "/v1/events/transcription-status",
            json!({"jobName": "unseen-job", "status": "FAILED", "failureReason": "codec"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "skipped");
        assert!(fixture.workflow.failures().is_empty());
        assert!(fixture.workflow.successes().is_empty());
    }

    #[tokio::test]
    async fn create_lead_reuses_an_existing_crm_lead() {
        let fixture = fixture();
        fixture.crm.seed_lead("lead-77", "+15551234567", "Lovelace");

        let app = router(fixture.state.clone(), test_pool().await);
        let (status, body) = post_json(
            app,
            "/v1/steps/create-lead",
            json!({
                "firstName": "Ada",
                "lastName": "Lovelace",
                "phone": "555-123-4567",
                "chatTranscript": "User: hi\nBot: hello"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["leadId"], "lead-77");
        assert_eq!(body["partitionKey"], "LEAD#+15551234567");

        let key = InteractionKey {
            partition_key: body["partitionKey"].as_str().expect("string").to_owned(),
            sort_key: body["sortKey"].as_str().expect("string").to_owned(),
        };
        let stored = fixture
            .interactions
            .find_by_key(&key)
            .await
            .expect("lookup should succeed")
            .expect("record should exist");
        assert_eq!(stored.lead_id, "lead-77");
        assert_eq!(stored.initial_transcript.as_deref(), Some("User: hi\nBot: hello"));
    }

    #[tokio::test]
    async fn create_lead_rejects_an_invalid_phone() {
        let fixture = fixture();
        let app = router(fixture.state.clone(), test_pool().await);
        let (status, _) = post_json(
            app,
            "/v1/steps/create-lead",
            json!({"firstName": "Ada", "lastName": "Lovelace", "phone": "123"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generate_scenario_degrades_to_the_static_greeting() {
        let fixture = fixture();
        fixture.generator.fail_next();

        let app = router(fixture.state.clone(), test_pool().await);
        let (status, body) = post_json(
            app,
            "/v1/steps/generate-scenario",
            json!({"firstName": "Ada", "chatTranscript": "User: hi"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let scenario = body["scenario"].as_str().expect("scenario should be a string");
        assert!(scenario.contains("Ada"));
    }

    #[tokio::test]
    async fn fulfillment_turn_returns_a_well_formed_response() {
        let fixture = fixture();
        let app = router(fixture.state.clone(), test_pool().await);
        let (status, body) = post_json(
            app,
            "/v1/turns",
            json!({
                "inputTranscript": "bye",
                "sessionState": {"intent": {"name": "CloseIntent"}, "sessionAttributes": {}}
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionState"]["dialogAction"]["type"], "Close");
        assert_eq!(body["sessionState"]["intent"]["state"], "Fulfilled");
        assert_eq!(body["messages"][0]["contentType"], "PlainText");
    }

    #[tokio::test]
    async fn recording_notification_starts_jobs_for_wav_objects_only() {
        let fixture = fixture();
        let app = router(fixture.state.clone(), test_pool().await);
        let (status, body) = post_json(
            app,
            "/v1/events/recording-uploaded",
            json!({"records": [
                {"bucket": "recordings", "key": "calls/0f8b9c3e-1d2a-4b5c-8e7f-6a5b4c3d2e1f_0607.wav"},
                {"bucket": "recordings", "key": "reports/summary.csv"}
            ]}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["started"][0], "0f8b9c3e-1d2a-4b5c-8e7f-6a5b4c3d2e1f");
        assert_eq!(body["skipped"], 1);

        let started = fixture.transcription.started_jobs();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].media_format, "wav");
        assert_eq!(started[0].language_code, "en-US");
    }

    #[tokio::test]
    async fn invoke_call_rejects_the_envelope_before_trusting_the_token() {
        let fixture = fixture();
        let app = router(fixture.state.clone(), test_pool().await);
        let (status, _) = post_json(
            app,
            "/v1/steps/invoke-call",
            json!({
                "taskToken": "tok-9",
                "input": {
                    "phone": "",
                    "scenario": "hello",
                    "leadId": "lead-1",
                    "partitionKey": "LEAD#x",
                    "sortKey": "INTERACTION#y"
                }
            }),
        )
        .await;

        // Boundary validation rejects the envelope before the token is
        // trusted, so no failure signal is sent.
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(fixture.workflow.failures().is_empty());
    }

    #[tokio::test]
    async fn invoke_call_stores_the_continuation_and_places_the_call() {
        let fixture = fixture();
        let app = router(fixture.state.clone(), test_pool().await);
        let (status, body) = post_json(
            app,
            "/v1/steps/invoke-call",
            json!({
                "taskToken": "tok-5",
                "input": {
                    "phone": "+15551234567",
                    "scenario": "Hello Ada",
                    "leadId": "lead-5",
                    "partitionKey": "LEAD#+15551234567",
                    "sortKey": "INTERACTION#t5"
                }
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let contact_id = body["contactId"].as_str().expect("contact id").to_owned();

        let key = InteractionKey {
            partition_key: "LEAD#+15551234567".to_owned(),
            sort_key: "INTERACTION#t5".to_owned(),
        };
        let stored = fixture
            .interactions
            .find_by_key(&key)
            .await
            .expect("lookup should succeed")
            .expect("record should exist");
        assert_eq!(stored.task_token.as_deref(), Some("tok-5"));
        assert_eq!(stored.scenario.as_deref(), Some("Hello Ada"));
        assert_eq!(stored.contact_id.as_deref(), Some(contact_id.as_str()));
    }
}
