//! Minimal client for OpenAI-compatible chat APIs.
//!
//! Chat completions and schema-typed structured output, nothing
//! domain-specific. Works against any endpoint speaking the OpenAI chat
//! wire format (OpenAI itself, Azure, local proxies).
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_client::{ChatMessage, ChatRequest, LlmClient};
//!
//! let client = LlmClient::from_env()?;
//! let response = client
//!     .chat_completion(
//!         ChatRequest::new("gpt-4o-mini").message(ChatMessage::user("Hello!")),
//!     )
//!     .await?;
//! ```
//!
//! # Type-safe structured output
//!
//! ```rust,ignore
//! #[derive(serde::Deserialize, schemars::JsonSchema)]
//! struct Transcript { turns: Vec<String> }
//!
//! let transcript: Transcript = client
//!     .extract::<Transcript>("gpt-4o-mini", system_prompt, page_text)
//!     .await?;
//! ```

pub mod error;
pub mod schema;
pub mod types;

pub use error::{LlmError, Result};
pub use schema::StructuredOutput;
pub use types::{
    strip_code_blocks, truncate_to_char_boundary, ChatMessage, ChatRequest, ChatResponse,
    StructuredRequest, Usage,
};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

/// Client for an OpenAI-compatible chat API.
#[derive(Clone)]
pub struct LlmClient {
    http_client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

impl LlmClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the environment: `LLM_API_KEY` or `OPENAI_API_KEY`
    /// for the key, optional `LLM_BASE_URL` for the endpoint.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| LlmError::Config("LLM_API_KEY / OPENAI_API_KEY not set".into()))?;

        let mut client = Self::new(api_key);
        if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
            client = client.with_base_url(base_url);
        }
        Ok(client)
    }

    /// Point at a different endpoint (Azure, proxy, local server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat completion.
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "chat request failed");
                LlmError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "chat API error");
            return Err(LlmError::Api(error_text));
        }

        let raw: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Api("empty choices in response".into()))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "chat completion"
        );

        Ok(ChatResponse {
            content,
            usage: raw.usage,
        })
    }

    /// Structured output with an explicit JSON schema. Returns the raw
    /// JSON string from the model.
    pub async fn structured_output(&self, request: StructuredRequest) -> Result<String> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(error_text));
        }

        let raw: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        raw.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Api("empty choices in response".into()))
    }

    /// Type-safe structured extraction: generate the schema from `T`,
    /// request strict JSON, deserialize the reply.
    pub async fn extract<T: StructuredOutput>(
        &self,
        model: &str,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<T> {
        let schema = T::strict_schema();
        debug!(type_name = %T::type_name(), "requesting structured output");

        let request = StructuredRequest::new(model, system_prompt, user_prompt, schema);
        let json_str = self.structured_output(request).await?;

        serde_json::from_str(strip_code_blocks(&json_str))
            .map_err(|e| LlmError::Parse(format!("failed to deserialize response: {e}")))
    }
}
