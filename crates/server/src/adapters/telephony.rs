//! Outbound dialing against the telephony platform's contact API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use outdial_agent::capabilities::{CapabilityError, OutboundDialer};
use outdial_core::config::TelephonyConfig;

const SERVICE: &str = "telephony";

pub struct HttpOutboundDialer {
    client: Client,
    base_url: String,
    instance_id: String,
    contact_flow_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartCallRequest<'a> {
    destination_phone_number: &'a str,
    source_phone_number: &'a str,
    instance_id: &'a str,
    contact_flow_id: &'a str,
    attributes: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartCallResponse {
    contact_id: String,
}

impl HttpOutboundDialer {
    pub fn new(client: Client, config: &TelephonyConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            instance_id: config.instance_id.clone(),
            contact_flow_id: config.contact_flow_id.clone(),
        }
    }
}

#[async_trait]
impl OutboundDialer for HttpOutboundDialer {
    async fn start_call(
        &self,
        destination: &str,
        source: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<String, CapabilityError> {
        let body = StartCallRequest {
            destination_phone_number: destination,
            source_phone_number: source,
            instance_id: &self.instance_id,
            contact_flow_id: &self.contact_flow_id,
            attributes,
        };
        let response = self
            .client
            .post(format!("{}/contact/outbound-voice", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|error| CapabilityError::request(SERVICE, error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::request(
                SERVICE,
                format!("outbound-voice returned {status}"),
            ));
        }
        let payload: StartCallResponse = response
            .json()
            .await
            .map_err(|error| CapabilityError::unexpected(SERVICE, error.to_string()))?;
        if payload.contact_id.is_empty() {
            return Err(CapabilityError::unexpected(SERVICE, "empty contact id"));
        }
        info!(
            event_name = "telephony.call.started",
            contact_id = payload.contact_id.as_str(),
            "outbound call placed"
        );
        Ok(payload.contact_id)
    }
}
