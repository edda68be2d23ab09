//! Object retrieval from the recording/transcript store.

use async_trait::async_trait;
use reqwest::Client;

use outdial_agent::capabilities::{CapabilityError, ObjectStore};
use outdial_core::config::StorageConfig;

const SERVICE: &str = "storage";

pub struct HttpObjectStore {
    client: Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(client: Client, config: &StorageConfig) -> Self {
        Self { client, base_url: config.base_url.trim_end_matches('/').to_owned() }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, CapabilityError> {
        let response = self
            .client
            .get(format!("{}/{bucket}/{key}", self.base_url))
            .send()
            .await
            .map_err(|error| CapabilityError::request(SERVICE, error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::request(
                SERVICE,
                format!("object fetch returned {status} for {bucket}/{key}"),
            ));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|error| CapabilityError::request(SERVICE, error.to_string()))?;
        Ok(bytes.to_vec())
    }
}
