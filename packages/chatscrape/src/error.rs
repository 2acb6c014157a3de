//! Typed errors for the extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. The split mirrors the
//! control flow: `DetectError` ends a request before any strategy runs,
//! `StrategyError` is recovered internally by the orchestrator, and
//! `ExtractError` is what callers actually see.

use thiserror::Error;

use crate::platform::Platform;
use crate::strategies::StrategyKind;

/// Errors from platform detection. Always terminal for the request.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Input does not parse as an absolute URL
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Only HTTPS share links are accepted
    #[error("insecure scheme for {url}: only https share links are supported")]
    InsecureScheme { url: String },

    /// URL is well-formed but matches no known platform pattern
    #[error("unsupported platform: {url} (supported: {supported})")]
    UnsupportedPlatform { url: String, supported: String },
}

impl DetectError {
    /// Build an `UnsupportedPlatform` error carrying the supported
    /// platform names as a remediation hint.
    pub fn unsupported(url: impl Into<String>) -> Self {
        let supported = Platform::ALL
            .iter()
            .map(|p| p.display_name())
            .collect::<Vec<_>>()
            .join(", ");
        Self::UnsupportedPlatform {
            url: url.into(),
            supported,
        }
    }
}

/// A single strategy's internal failure.
///
/// Never surfaced directly to callers; the orchestrator records it and
/// advances to the next strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// HTTP request failed or returned a non-success status
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A suspension point exceeded its budget
    #[error("strategy timed out")]
    Timeout,

    /// No selector rule matched the page structure
    #[error("no selector rule matched the page structure")]
    NoMatch,

    /// A rule carried selectors that do not parse
    #[error("rule {id} has unparsable selectors")]
    InvalidRule { id: String },

    /// Selectors matched but every candidate message was filtered out
    #[error("no parsable messages found in page")]
    NoMessages,

    /// No rules are registered for the platform
    #[error("no parsing rules registered for {platform}")]
    NoRules { platform: Platform },

    /// The platform has no known structured-data endpoints
    #[error("no structured endpoints known for {platform}")]
    NoEndpoints { platform: Platform },

    /// Headless rendering session failed
    #[error("rendering failed: {0}")]
    Render(String),

    /// Semantic extraction service failed
    #[error("semantic service error: {0}")]
    Semantic(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Response body was not parsable in the expected shape
    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    /// A candidate conversation failed validation
    #[error("invalid result: {0}")]
    Invalid(#[from] ValidationFailure),
}

impl StrategyError {
    /// Coarse classification for outcome records and diagnostics.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Timeout => "timeout",
            Self::NoMatch => "no_match",
            Self::InvalidRule { .. } => "invalid_rule",
            Self::NoMessages => "no_messages",
            Self::NoRules { .. } => "no_rules",
            Self::NoEndpoints { .. } => "no_endpoints",
            Self::Render(_) => "render",
            Self::Semantic(_) => "semantic",
            Self::Parse(_) => "parse",
            Self::Invalid(_) => "invalid_result",
        }
    }
}

/// Why a candidate `Conversation` failed validation.
#[derive(Debug, Error)]
pub enum ValidationFailure {
    #[error("conversation has no messages")]
    EmptyMessages,

    #[error("conversation has no title")]
    EmptyTitle,

    #[error("message {index} has no text")]
    BlankMessage { index: usize },
}

/// One failed attempt, kept for terminal diagnostics.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub strategy: StrategyKind,
    pub reason: String,
}

/// Errors surfaced to the caller of an extraction request.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// URL rejected before any strategy ran
    #[error(transparent)]
    Detect(#[from] DetectError),

    /// Every strategy was attempted and none produced a validated result
    #[error(
        "could not extract conversation; the page may be private or its structure has changed"
    )]
    AllStrategiesFailed { attempts: Vec<AttemptFailure> },

    /// The caller abandoned the request
    #[error("extraction cancelled")]
    Cancelled,
}

impl ExtractError {
    /// Per-strategy failure reasons, in attempt order. Empty unless the
    /// request exhausted its strategies.
    pub fn attempts(&self) -> &[AttemptFailure] {
        match self {
            Self::AllStrategiesFailed { attempts } => attempts,
            _ => &[],
        }
    }
}

/// Result type alias for extraction requests.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Result type alias for single-strategy attempts.
pub type StrategyResult<T> = std::result::Result<T, StrategyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_error_lists_platforms() {
        let err = DetectError::unsupported("https://example.com/chat/123");
        let msg = err.to_string();
        assert!(msg.contains("ChatGPT"));
        assert!(msg.contains("Claude"));
        assert!(msg.contains("Gemini"));
        assert!(msg.contains("Perplexity"));
    }

    #[test]
    fn strategy_error_classes_are_stable() {
        assert_eq!(StrategyError::Timeout.class(), "timeout");
        assert_eq!(StrategyError::NoMatch.class(), "no_match");
        assert_eq!(
            StrategyError::Invalid(ValidationFailure::EmptyMessages).class(),
            "invalid_result"
        );
    }

    #[test]
    fn user_facing_message_is_actionable() {
        let err = ExtractError::AllStrategiesFailed {
            attempts: vec![AttemptFailure {
                strategy: StrategyKind::StaticMarkup,
                reason: "no_match".into(),
            }],
        };
        let msg = err.to_string();
        assert!(msg.contains("could not extract conversation"));
        assert!(!msg.contains("no_match"), "diagnostics stay out of the user message");
        assert_eq!(err.attempts().len(), 1);
    }
}
