//! Text generation over the messages-style completion API.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use outdial_agent::llm::{GenerationError, GenerationRequest, TextGenerator};
use outdial_core::config::LlmConfig;

pub struct HttpTextGenerator {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [MessageBody<'a>; 1],
}

#[derive(Serialize)]
struct MessageBody<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl HttpTextGenerator {
    pub fn new(client: Client, config: &LlmConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: [MessageBody { role: "user", content: &request.user }],
        };

        let mut builder = self.client.post(format!("{}/v1/messages", self.base_url)).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("x-api-key", api_key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|error| GenerationError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Transport(format!(
                "generation endpoint returned {status}"
            )));
        }

        let payload: MessagesResponse = response
            .json()
            .await
            .map_err(|error| GenerationError::Malformed(error.to_string()))?;
        let text = payload
            .content
            .first()
            .map(|block| block.text.trim().to_owned())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(GenerationError::Malformed("empty completion".to_owned()));
        }
        Ok(text)
    }
}
