//! Language model access over HTTP: OpenAI-compatible chat completions or a
//! local Ollama server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use shopmate_agent::llm::{LlmClient, LlmError};
use shopmate_core::config::{LlmConfig, LlmProvider};
use tracing::warn;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const USER_AGENT: &str = concat!("shopmate/", env!("CARGO_PKG_VERSION"));
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

pub struct HttpLlmClient {
    client: Client,
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    max_retries: u32,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OllamaGeneration {
    #[serde(default)]
    response: Option<String>,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(config.timeout_secs.clamp(1, 10)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|error| LlmError::Unavailable(error.to_string()))?;

        let base_url = config.base_url.clone().unwrap_or_else(|| {
            match config.provider {
                LlmProvider::OpenAi => OPENAI_BASE_URL,
                LlmProvider::Ollama => OLLAMA_BASE_URL,
            }
            .to_string()
        });

        Ok(Self::with_client(client, config.provider, &base_url, &config.model, config.api_key.clone())
            .with_max_retries(config.max_retries))
    }

    pub fn with_client(
        client: Client,
        provider: LlmProvider,
        base_url: &str,
        model: &str,
        api_key: Option<SecretString>,
    ) -> Self {
        Self {
            client,
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            max_retries: 0,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn attempt(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let request = match self.provider {
            LlmProvider::OpenAi => {
                let request = self.client.post(format!("{}/chat/completions", self.base_url)).json(
                    &json!({
                        "model": self.model,
                        "messages": [{"role": "user", "content": prompt}],
                        "max_tokens": max_tokens,
                    }),
                );
                match &self.api_key {
                    Some(key) => request.bearer_auth(key.expose_secret()),
                    None => request,
                }
            }
            LlmProvider::Ollama => self.client.post(format!("{}/api/generate", self.base_url)).json(
                &json!({
                    "model": self.model,
                    "prompt": prompt,
                    "stream": false,
                    "options": {"num_predict": max_tokens},
                }),
            ),
        };

        let response =
            request.send().await.map_err(|error| LlmError::Unavailable(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let body: Value =
            response.json().await.map_err(|error| LlmError::Unavailable(error.to_string()))?;
        let text = match self.provider {
            LlmProvider::OpenAi => serde_json::from_value::<ChatCompletion>(body)
                .ok()
                .and_then(|completion| completion.choices.into_iter().next())
                .and_then(|choice| choice.message.content),
            LlmProvider::Ollama => serde_json::from_value::<OllamaGeneration>(body)
                .ok()
                .and_then(|generation| generation.response),
        };

        text.filter(|text| !text.trim().is_empty()).ok_or(LlmError::Empty)
    }
}

fn is_retryable(error: &LlmError) -> bool {
    match error {
        LlmError::Unavailable(_) => true,
        LlmError::Status { status, .. } => *status == 429 || *status >= 500,
        LlmError::Empty => false,
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate_text(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.attempt(prompt, max_tokens).await {
                Ok(text) => return Ok(text),
                Err(error) if attempt < self.max_retries && is_retryable(&error) => {
                    attempt += 1;
                    warn!(
                        event_name = "llm.http.retry",
                        attempt,
                        error = %error,
                        "language model call failed; retrying"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
