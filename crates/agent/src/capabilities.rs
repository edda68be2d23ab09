//! External capability seams consumed by the turn engine, the resumer, and
//! the workflow step handlers. Each trait has a reqwest-backed adapter in
//! the server crate and an in-memory fake in [`crate::fakes`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use outdial_core::domain::workflow::{DemoRequest, SummaryOutput};
use outdial_core::phone::NormalizedPhone;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{service} request failed: {message}")]
    Request { service: &'static str, message: String },
    #[error("{service} returned an unexpected response: {message}")]
    UnexpectedResponse { service: &'static str, message: String },
}

impl CapabilityError {
    pub fn request(service: &'static str, message: impl Into<String>) -> Self {
        Self::Request { service, message: message.into() }
    }

    pub fn unexpected(service: &'static str, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse { service, message: message.into() }
    }
}

/// CRM operations. Lookups key on the canonical E.164 phone; identifying
/// values are escaped by the adapter before embedding in query filters.
#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn find_lead_by_phone(
        &self,
        phone: &NormalizedPhone,
    ) -> Result<Option<String>, CapabilityError>;

    async fn create_lead(
        &self,
        first_name: &str,
        last_name: &str,
        phone: &NormalizedPhone,
    ) -> Result<String, CapabilityError>;

    async fn update_lead(&self, lead_id: &str, description: &str)
        -> Result<(), CapabilityError>;

    /// Delete only when both identifiers match; `false` means no record
    /// matched, which is a business non-outcome rather than an error.
    async fn find_and_delete_lead(
        &self,
        phone: &NormalizedPhone,
        last_name: &str,
    ) -> Result<bool, CapabilityError>;

    async fn create_case(
        &self,
        subject: &str,
        description: &str,
    ) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait OutboundDialer: Send + Sync {
    /// Start an outbound call and return the call's contact id.
    async fn start_call(
        &self,
        destination: &str,
        source: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<String, CapabilityError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranscriptionJobStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Clone, Debug)]
pub struct TranscriptionJob {
    pub status: TranscriptionJobStatus,
    pub transcript_uri: Option<String>,
}

#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn start_job(
        &self,
        job_name: &str,
        media_uri: &str,
        media_format: &str,
        language_code: &str,
    ) -> Result<(), CapabilityError>;

    async fn get_job(&self, job_name: &str) -> Result<TranscriptionJob, CapabilityError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, CapabilityError>;
}

/// Workflow orchestrator boundary: execution start at the conversion
/// point, task signals when a paused step resolves.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    async fn start_execution(&self, input: &DemoRequest) -> Result<(), CapabilityError>;

    async fn send_task_success(
        &self,
        task_token: &str,
        output: &SummaryOutput,
    ) -> Result<(), CapabilityError>;

    async fn send_task_failure(
        &self,
        task_token: &str,
        error: &str,
        cause: &str,
    ) -> Result<(), CapabilityError>;
}
