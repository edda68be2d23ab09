//! Transcription job control.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use outdial_agent::capabilities::{
    CapabilityError, TranscriptionJob, TranscriptionJobStatus, TranscriptionService,
};
use outdial_core::config::TranscriptionConfig;

const SERVICE: &str = "transcription";

pub struct HttpTranscriptionService {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartJobRequest<'a> {
    transcription_job_name: &'a str,
    media_file_uri: &'a str,
    media_format: &'a str,
    language_code: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusResponse {
    status: String,
    #[serde(default)]
    transcript_uri: Option<String>,
}

impl HttpTranscriptionService {
    pub fn new(client: Client, config: &TranscriptionConfig) -> Self {
        Self { client, base_url: config.base_url.trim_end_matches('/').to_owned() }
    }
}

#[async_trait]
impl TranscriptionService for HttpTranscriptionService {
    async fn start_job(
        &self,
        job_name: &str,
        media_uri: &str,
        media_format: &str,
        language_code: &str,
    ) -> Result<(), CapabilityError> {
        let body = StartJobRequest {
            transcription_job_name: job_name,
            media_file_uri: media_uri,
            media_format,
            language_code,
        };
        let response = self
            .client
            .post(format!("{}/jobs", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|error| CapabilityError::request(SERVICE, error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::request(
                SERVICE,
                format!("job start returned {status}"),
            ));
        }
        Ok(())
    }

    async fn get_job(&self, job_name: &str) -> Result<TranscriptionJob, CapabilityError> {
        let response = self
            .client
            .get(format!("{}/jobs/{job_name}", self.base_url))
            .send()
            .await
            .map_err(|error| CapabilityError::request(SERVICE, error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::request(
                SERVICE,
                format!("job lookup returned {status}"),
            ));
        }
        let payload: JobStatusResponse = response
            .json()
            .await
            .map_err(|error| CapabilityError::unexpected(SERVICE, error.to_string()))?;
        let status = match payload.status.as_str() {
            "QUEUED" | "IN_PROGRESS" => TranscriptionJobStatus::InProgress,
            "COMPLETED" => TranscriptionJobStatus::Completed,
            "FAILED" => TranscriptionJobStatus::Failed,
            other => {
                return Err(CapabilityError::unexpected(
                    SERVICE,
                    format!("unknown job status `{other}`"),
                ));
            }
        };
        Ok(TranscriptionJob { status, transcript_uri: payload.transcript_uri })
    }
}
