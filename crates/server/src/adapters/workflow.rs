//! Workflow orchestrator client: execution start and task signals.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use outdial_agent::capabilities::{CapabilityError, WorkflowClient};
use outdial_core::config::WorkflowConfig;
use outdial_core::domain::workflow::{DemoRequest, SummaryOutput};

const SERVICE: &str = "workflow";

pub struct HttpWorkflowClient {
    client: Client,
    base_url: String,
    workflow_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionRequest<'a> {
    workflow_id: &'a str,
    input: &'a DemoRequest,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskSuccessRequest<'a> {
    task_token: &'a str,
    output: &'a SummaryOutput,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskFailureRequest<'a> {
    task_token: &'a str,
    error: &'a str,
    cause: &'a str,
}

impl HttpWorkflowClient {
    pub fn new(client: Client, config: &WorkflowConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            workflow_id: config.workflow_id.clone(),
        }
    }

    async fn post_json<T: Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), CapabilityError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|error| CapabilityError::request(SERVICE, error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::request(
                SERVICE,
                format!("{path} returned {status}"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowClient for HttpWorkflowClient {
    async fn start_execution(&self, input: &DemoRequest) -> Result<(), CapabilityError> {
        self.post_json(
            "executions",
            &StartExecutionRequest { workflow_id: &self.workflow_id, input },
        )
        .await?;
        info!(event_name = "workflow.execution.started", "demo workflow execution started");
        Ok(())
    }

    async fn send_task_success(
        &self,
        task_token: &str,
        output: &SummaryOutput,
    ) -> Result<(), CapabilityError> {
        self.post_json("task-success", &TaskSuccessRequest { task_token, output }).await
    }

    async fn send_task_failure(
        &self,
        task_token: &str,
        error: &str,
        cause: &str,
    ) -> Result<(), CapabilityError> {
        self.post_json("task-failure", &TaskFailureRequest { task_token, error, cause }).await
    }
}
