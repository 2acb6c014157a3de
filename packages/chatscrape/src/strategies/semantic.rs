//! Semantic-fallback strategy: last resort, text understanding.
//!
//! When every structural strategy has failed, hand a bounded Markdown
//! excerpt of the page to a text-understanding service and ask for the
//! conversation back in a canonical shape. The reply still runs through
//! the same empty-message filtering and artifact thresholds as every
//! other strategy; the model gets no special trust.

use async_trait::async_trait;
use schemars::JsonSchema;
use scraper::Html;
use serde::Deserialize;
use tracing::debug;

use llm_client::{truncate_to_char_boundary, LlmClient};

use crate::error::{StrategyError, StrategyResult};
use crate::heuristics;
use crate::platform::Platform;
use crate::strategies::{ExtractionContext, Strategy, StrategyKind};
use crate::types::{Artifact, Conversation, Formatting, Message, MessageRole};

/// Upper bound on the excerpt handed to the service, in bytes.
const MAX_EXCERPT_BYTES: usize = 20_000;

/// The canonical shape the service is instructed to return.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SemanticConversation {
    pub title: Option<String>,
    pub messages: Vec<SemanticMessage>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SemanticMessage {
    /// "user", "assistant", or "system"
    pub role: String,
    pub text: String,
    pub code_blocks: Vec<SemanticCodeBlock>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SemanticCodeBlock {
    pub language: Option<String>,
    pub code: String,
}

/// The text-understanding seam. Production uses [`LlmSemanticExtractor`];
/// tests script the reply.
#[async_trait]
pub trait SemanticExtractor: Send + Sync {
    async fn extract_conversation(
        &self,
        excerpt: &str,
        platform: Platform,
    ) -> StrategyResult<SemanticConversation>;
}

const SYSTEM_PROMPT: &str = "\
You reconstruct chat transcripts from web page text. The input is a \
Markdown rendering of a shared AI-chatbot conversation page. Return the \
conversation: its title and every message in order, with each message's \
role (user, assistant, or system), its plain text, and any code blocks \
it contains. Ignore navigation, footers, cookie banners, and other page \
furniture. Do not invent content that is not present.";

/// LLM-backed implementation of [`SemanticExtractor`].
pub struct LlmSemanticExtractor {
    client: LlmClient,
    model: String,
}

impl LlmSemanticExtractor {
    pub fn new(client: LlmClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SemanticExtractor for LlmSemanticExtractor {
    async fn extract_conversation(
        &self,
        excerpt: &str,
        platform: Platform,
    ) -> StrategyResult<SemanticConversation> {
        let prompt = format!(
            "Platform: {}\n\nPage content:\n\n{}",
            platform.display_name(),
            excerpt
        );
        self.client
            .extract::<SemanticConversation>(&self.model, SYSTEM_PROMPT, prompt)
            .await
            .map_err(|e| StrategyError::Semantic(Box::new(e)))
    }
}

pub struct SemanticFallbackStrategy {
    extractor: Box<dyn SemanticExtractor>,
}

impl SemanticFallbackStrategy {
    pub fn new(extractor: Box<dyn SemanticExtractor>) -> Self {
        Self { extractor }
    }

    /// Turn the page body into a bounded Markdown excerpt.
    fn excerpt(html: &str) -> String {
        let markdown = htmd::convert(html).unwrap_or_else(|_| {
            // Fallback: strip tags and keep the raw text.
            let document = Html::parse_document(html);
            document.root_element().text().collect::<String>()
        });
        truncate_to_char_boundary(&markdown, MAX_EXCERPT_BYTES).to_string()
    }
}

#[async_trait]
impl Strategy for SemanticFallbackStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SemanticFallback
    }

    async fn attempt(&self, ctx: &mut ExtractionContext) -> StrategyResult<Conversation> {
        let platform = ctx.matched.platform;
        let url = ctx.url.clone();

        let excerpt = {
            let html = ctx.html().await?;
            Self::excerpt(html)
        };
        debug!(excerpt_len = excerpt.len(), "sending excerpt to semantic service");

        let reply = self.extractor.extract_conversation(&excerpt, platform).await?;
        map_semantic(reply, platform, &url)
    }
}

/// Map the service reply onto the data model, applying the same
/// filtering invariants as the structural strategies.
fn map_semantic(
    reply: SemanticConversation,
    platform: Platform,
    url: &str,
) -> StrategyResult<Conversation> {
    let mut messages = Vec::new();

    for turn in reply.messages {
        let text = heuristics::clean_text(&turn.text);
        if text.is_empty() {
            continue;
        }

        let mut artifacts: Vec<Artifact> = Vec::new();
        for block in turn.code_blocks {
            let language = block
                .language
                .filter(|l| !l.trim().is_empty())
                .or_else(|| heuristics::infer_language(&block.code).map(str::to_string));
            if let Some(artifact) = Artifact::code(block.code, language) {
                artifacts.push(artifact);
            }
        }

        let explicit = MessageRole::from_marker(&turn.role);
        let role = heuristics::infer_role(&text, !artifacts.is_empty(), explicit);

        messages.push(
            Message::new(role, text)
                .with_formatting(Formatting {
                    is_markdown: heuristics::looks_like_markdown(&turn.text),
                    ..Formatting::default()
                })
                .with_artifacts(artifacts),
        );
    }

    if messages.is_empty() {
        return Err(StrategyError::NoMessages);
    }

    let title = reply
        .title
        .map(|t| heuristics::clean_text(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| platform.default_title());

    Ok(Conversation::new(platform, title, messages, url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::PageFetcher;
    use crate::platform::PlatformMatch;
    use crate::testing::ScriptedSemanticExtractor;
    use std::sync::Arc;

    fn reply() -> SemanticConversation {
        SemanticConversation {
            title: Some("Hooks explained".into()),
            messages: vec![
                SemanticMessage {
                    role: "user".into(),
                    text: "How do hooks work?".into(),
                    code_blocks: vec![],
                },
                SemanticMessage {
                    role: "assistant".into(),
                    text: "Like this.".into(),
                    code_blocks: vec![SemanticCodeBlock {
                        language: None,
                        code: "import { useState } from 'react';".into(),
                    }],
                },
                SemanticMessage {
                    role: "assistant".into(),
                    text: "   ".into(),
                    code_blocks: vec![],
                },
            ],
        }
    }

    fn context() -> ExtractionContext {
        ExtractionContext::with_html(
            "https://chatgpt.com/share/abcdef123456",
            PlatformMatch {
                platform: Platform::ChatGpt,
                share_id: "abcdef123456".into(),
            },
            Arc::new(PageFetcher::new().unwrap()),
            "<html><body><main><p>Some conversation text</p></main></body></html>",
        )
    }

    #[tokio::test]
    async fn maps_the_service_reply_and_filters_blanks() {
        let strategy =
            SemanticFallbackStrategy::new(Box::new(ScriptedSemanticExtractor::replying(reply())));
        let conv = strategy.attempt(&mut context()).await.unwrap();

        assert_eq!(conv.title, "Hooks explained");
        assert_eq!(conv.messages.len(), 2, "blank message must be filtered");
        assert_eq!(conv.messages[0].role, MessageRole::User);
        assert_eq!(
            conv.messages[1].content.artifacts[0].language.as_deref(),
            Some("javascript"),
            "language inferred when the service omits it"
        );
    }

    #[tokio::test]
    async fn all_blank_reply_is_no_messages() {
        let empty = SemanticConversation {
            title: None,
            messages: vec![SemanticMessage {
                role: "user".into(),
                text: " ".into(),
                code_blocks: vec![],
            }],
        };
        let strategy =
            SemanticFallbackStrategy::new(Box::new(ScriptedSemanticExtractor::replying(empty)));
        let err = strategy.attempt(&mut context()).await.unwrap_err();
        assert!(matches!(err, StrategyError::NoMessages));
    }

    #[tokio::test]
    async fn service_errors_propagate_as_semantic_failures() {
        let strategy =
            SemanticFallbackStrategy::new(Box::new(ScriptedSemanticExtractor::failing()));
        let err = strategy.attempt(&mut context()).await.unwrap_err();
        assert!(matches!(err, StrategyError::Semantic(_)));
    }

    #[test]
    fn excerpt_is_bounded() {
        let html = format!(
            "<html><body><p>{}</p></body></html>",
            "long text ".repeat(10_000)
        );
        let excerpt = SemanticFallbackStrategy::excerpt(&html);
        assert!(excerpt.len() <= MAX_EXCERPT_BYTES);
    }

    #[test]
    fn missing_title_falls_back_to_platform_default() {
        let mut r = reply();
        r.title = None;
        let conv = map_semantic(r, Platform::Gemini, "https://gemini.google.com/share/abc123")
            .unwrap();
        assert_eq!(conv.title, "Gemini Conversation");
    }
}
