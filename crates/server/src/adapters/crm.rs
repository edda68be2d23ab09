//! CRM adapter: client-credentials OAuth plus lead and case operations.
//!
//! The access token lives in an explicit per-client cache guarded by a
//! mutex; a request either reuses a token that is still inside its
//! lifetime or refreshes it in place. Identifying values are escaped
//! before they are embedded in query filters.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::info;

use async_trait::async_trait;
use outdial_agent::capabilities::{CapabilityError, CrmClient};
use outdial_core::config::CrmConfig;
use outdial_core::phone::NormalizedPhone;

const SERVICE: &str = "crm";
const DATA_API_PATH: &str = "services/data/v61.0";
const TOKEN_REFRESH_MARGIN_SECS: i64 = 30;

#[derive(Clone, Debug)]
struct TokenCache {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct HttpCrmClient {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: Option<SecretString>,
    token_ttl_secs: u64,
    cache: Mutex<Option<TokenCache>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct QueryResponse {
    records: Vec<RecordId>,
}

#[derive(Deserialize)]
struct RecordId {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Deserialize)]
struct CreateResponse {
    id: String,
}

/// Double single quotes so a value can never terminate the quoted
/// literal it is embedded in.
fn escape_filter_value(value: &str) -> String {
    value.replace('\'', "''")
}

impl HttpCrmClient {
    pub fn new(client: Client, config: &CrmConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_ttl_secs: config.token_ttl_secs,
            cache: Mutex::new(None),
        }
    }

    /// Get-or-refresh accessor for the cached access token.
    async fn access_token(&self) -> Result<String, CapabilityError> {
        let mut cache = self.cache.lock().await;
        let refresh_floor = Utc::now() + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > refresh_floor {
                return Ok(cached.value.clone());
            }
        }

        let secret = self
            .client_secret
            .as_ref()
            .ok_or_else(|| CapabilityError::request(SERVICE, "client secret is not configured"))?;
        let response = self
            .client
            .post(format!("{}/services/oauth2/token", self.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", secret.expose_secret()),
            ])
            .send()
            .await
            .map_err(|error| CapabilityError::request(SERVICE, error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::request(
                SERVICE,
                format!("token endpoint returned {status}"),
            ));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|error| CapabilityError::unexpected(SERVICE, error.to_string()))?;
        if token.access_token.is_empty() {
            return Err(CapabilityError::unexpected(SERVICE, "empty access token"));
        }

        let lifetime_secs = token
            .expires_in
            .filter(|&secs| secs > 0)
            .map(|secs| (secs as u64).min(self.token_ttl_secs))
            .unwrap_or(self.token_ttl_secs);
        let cached = TokenCache {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime_secs as i64),
        };
        let value = cached.value.clone();
        *cache = Some(cached);
        info!(event_name = "crm.token.refreshed", lifetime_secs, "access token refreshed");
        Ok(value)
    }

    async fn query_lead_ids(&self, filter: &str) -> Result<Vec<String>, CapabilityError> {
        let token = self.access_token().await?;
        let soql = format!("SELECT Id FROM Lead WHERE {filter} LIMIT 1");
        let url = format!(
            "{}/{DATA_API_PATH}/query?q={}",
            self.base_url,
            urlencoding::encode(&soql)
        );
        let response = self
            .client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|error| CapabilityError::request(SERVICE, error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::request(SERVICE, format!("query returned {status}")));
        }
        let payload: QueryResponse = response
            .json()
            .await
            .map_err(|error| CapabilityError::unexpected(SERVICE, error.to_string()))?;
        Ok(payload.records.into_iter().map(|record| record.id).collect())
    }

    async fn create_record(
        &self,
        object: &str,
        body: serde_json::Value,
    ) -> Result<String, CapabilityError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!("{}/{DATA_API_PATH}/sobjects/{object}", self.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|error| CapabilityError::request(SERVICE, error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::request(
                SERVICE,
                format!("{object} create returned {status}"),
            ));
        }
        let created: CreateResponse = response
            .json()
            .await
            .map_err(|error| CapabilityError::unexpected(SERVICE, error.to_string()))?;
        Ok(created.id)
    }
}

#[async_trait]
impl CrmClient for HttpCrmClient {
    async fn find_lead_by_phone(
        &self,
        phone: &NormalizedPhone,
    ) -> Result<Option<String>, CapabilityError> {
        let filter = format!("Phone = '{}'", escape_filter_value(phone.as_e164()));
        Ok(self.query_lead_ids(&filter).await?.into_iter().next())
    }

    async fn create_lead(
        &self,
        first_name: &str,
        last_name: &str,
        phone: &NormalizedPhone,
    ) -> Result<String, CapabilityError> {
        self.create_record(
            "Lead",
            json!({
                "FirstName": first_name,
                "LastName": last_name,
                "Phone": phone.as_e164(),
                "Company": "Unknown",
                "LeadSource": "Outbound Demo",
            }),
        )
        .await
    }

    async fn update_lead(&self, lead_id: &str, description: &str) -> Result<(), CapabilityError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .patch(format!("{}/{DATA_API_PATH}/sobjects/Lead/{lead_id}", self.base_url))
            .bearer_auth(&token)
            .json(&json!({ "Description": description }))
            .send()
            .await
            .map_err(|error| CapabilityError::request(SERVICE, error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::request(
                SERVICE,
                format!("lead update returned {status}"),
            ));
        }
        Ok(())
    }

    async fn find_and_delete_lead(
        &self,
        phone: &NormalizedPhone,
        last_name: &str,
    ) -> Result<bool, CapabilityError> {
        let filter = format!(
            "Phone = '{}' AND LastName = '{}'",
            escape_filter_value(phone.as_e164()),
            escape_filter_value(last_name)
        );
        let Some(lead_id) = self.query_lead_ids(&filter).await?.into_iter().next() else {
            return Ok(false);
        };

        let token = self.access_token().await?;
        let response = self
            .client
            .delete(format!("{}/{DATA_API_PATH}/sobjects/Lead/{lead_id}", self.base_url))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|error| CapabilityError::request(SERVICE, error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::request(
                SERVICE,
                format!("lead delete returned {status}"),
            ));
        }
        info!(event_name = "crm.lead.deleted", lead_id = lead_id.as_str(), "lead removed");
        Ok(true)
    }

    async fn create_case(
        &self,
        subject: &str,
        description: &str,
    ) -> Result<String, CapabilityError> {
        self.create_record(
            "Case",
            json!({
                "Subject": subject,
                "Description": description,
                "Priority": "High",
                "Origin": "Phone",
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::escape_filter_value;

    #[test]
    fn quotes_in_filter_values_are_doubled() {
        assert_eq!(escape_filter_value("O'Brien"), "O''Brien");
        assert_eq!(escape_filter_value("a''b"), "a''''b");
        assert_eq!(escape_filter_value("plain"), "plain");
    }

    #[test]
    fn escaped_value_cannot_terminate_a_quoted_literal() {
        let hostile = "x' OR Phone != '";
        let filter = format!("LastName = '{}'", escape_filter_value(hostile));
        assert_eq!(filter, "LastName = 'x'' OR Phone != '''");
    }
}
