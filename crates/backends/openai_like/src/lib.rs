//! Generation backend speaking the OpenAI Responses API.

use std::time::Duration;

use async_trait::async_trait;
use daily_prompt_common::{BackendError, GenerationPrompt, TextGenerator};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SERVICE: &str = "openai";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-5.2";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl OpenAiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesBody {
    /// `output_text` when the server provides it, otherwise the concatenated
    /// `output_text` parts of every output item.
    fn into_text(self) -> Option<String> {
        if let Some(text) = self.output_text.filter(|t| !t.trim().is_empty()) {
            return Some(text);
        }
        let joined = self
            .output
            .into_iter()
            .flat_map(|item| item.content)
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("\n");
        (!joined.trim().is_empty()).then_some(joined)
    }
}

pub struct OpenAiGenerator {
    client: Client,
    settings: OpenAiSettings,
}

impl OpenAiGenerator {
    pub fn new(settings: OpenAiSettings) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("daily-prompt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::transport(SERVICE, e))?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String, BackendError> {
        let body = ResponsesRequest {
            model: &self.settings.model,
            instructions: &prompt.instructions,
            input: &prompt.input,
        };

        debug!(
            model = %self.settings.model,
            input_len = prompt.input.len(),
            "requesting generation"
        );
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::transport(SERVICE, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::transport(SERVICE, e))?;
        if !status.is_success() {
            return Err(BackendError::status(SERVICE, status.as_u16(), &text));
        }

        let parsed: ResponsesBody =
            serde_json::from_str(&text).map_err(|e| BackendError::decode(SERVICE, e))?;
        parsed
            .into_text()
            .ok_or(BackendError::EmptyOutput { service: SERVICE })
    }
}
