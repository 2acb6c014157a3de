//! Extraction strategies.
//!
//! Each strategy is one self-contained method of turning source content
//! into the canonical conversation model. Strategies are stateless with
//! respect to each other; ordering, timeouts, and validation belong to
//! the orchestrator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::StrategyResult;
use crate::fetch::PageFetcher;
use crate::platform::PlatformMatch;
use crate::types::Conversation;

pub mod community;
pub mod endpoint;
pub mod markup;
pub mod rendered_dom;
pub mod semantic;
pub mod static_markup;

pub use community::CommunityRuleStrategy;
pub use endpoint::StructuredEndpointStrategy;
pub use rendered_dom::RenderedDomStrategy;
pub use semantic::{LlmSemanticExtractor, SemanticExtractor, SemanticFallbackStrategy};
pub use static_markup::StaticMarkupStrategy;

/// The closed set of strategies, in no particular order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    StaticMarkup,
    StructuredEndpoint,
    RenderedDom,
    CommunityRules,
    SemanticFallback,
}

impl StrategyKind {
    /// Fixed default priority: cheapest and most deterministic first.
    pub const DEFAULT_PRIORITY: [StrategyKind; 5] = [
        StrategyKind::StaticMarkup,
        StrategyKind::StructuredEndpoint,
        StrategyKind::RenderedDom,
        StrategyKind::CommunityRules,
        StrategyKind::SemanticFallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaticMarkup => "static_markup",
            Self::StructuredEndpoint => "structured_endpoint",
            Self::RenderedDom => "rendered_dom",
            Self::CommunityRules => "community_rules",
            Self::SemanticFallback => "semantic_fallback",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request context handed to each strategy in turn.
///
/// Carries the source URL, the detection result, and a lazily fetched
/// page body: the first strategy that needs the static HTML fetches it
/// once, later strategies reuse it. Strategies that produce their own
/// content (rendered DOM, structured endpoints) ignore the cache.
pub struct ExtractionContext {
    pub url: String,
    pub matched: PlatformMatch,
    pub cancel: CancellationToken,
    fetcher: Arc<PageFetcher>,
    html: Option<String>,
}

impl ExtractionContext {
    pub fn new(
        url: impl Into<String>,
        matched: PlatformMatch,
        fetcher: Arc<PageFetcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            url: url.into(),
            matched,
            cancel,
            fetcher,
            html: None,
        }
    }

    /// Context with a pre-supplied page body (tests, re-parses).
    pub fn with_html(
        url: impl Into<String>,
        matched: PlatformMatch,
        fetcher: Arc<PageFetcher>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            matched,
            cancel: CancellationToken::new(),
            fetcher,
            html: Some(html.into()),
        }
    }

    /// The static page body, fetched on first use.
    pub async fn html(&mut self) -> StrategyResult<&str> {
        if self.html.is_none() {
            let body = self.fetcher.fetch_text(&self.url).await?;
            self.html = Some(body);
        }
        Ok(self.html.as_deref().expect("just populated"))
    }

    /// Access to the shared fetcher for endpoint probes.
    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }
}

/// One self-contained extraction method.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Attempt to produce a conversation from the request's source.
    /// Any unrecoverable condition is a `StrategyError`; the orchestrator
    /// decides what happens next.
    async fn attempt(&self, ctx: &mut ExtractionContext) -> StrategyResult<Conversation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_priority_covers_every_kind_once() {
        let priority = StrategyKind::DEFAULT_PRIORITY;
        assert_eq!(priority.len(), 5);
        let unique: std::collections::HashSet<_> = priority.iter().collect();
        assert_eq!(unique.len(), 5);
        assert_eq!(priority[0], StrategyKind::StaticMarkup);
        assert_eq!(priority[4], StrategyKind::SemanticFallback);
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(StrategyKind::StaticMarkup.as_str(), "static_markup");
        assert_eq!(StrategyKind::SemanticFallback.as_str(), "semantic_fallback");
    }
}
