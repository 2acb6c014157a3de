//! Typed errors for the LLM client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing or invalid configuration (API key, base URL)
    #[error("config error: {0}")]
    Config(String),

    /// Request never reached the API
    #[error("network error: {0}")]
    Network(String),

    /// The API answered with an error
    #[error("API error: {0}")]
    Api(String),

    /// The response body did not parse in the expected shape
    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
