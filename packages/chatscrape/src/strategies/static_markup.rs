//! Static-markup strategy: parse the page body as delivered.
//!
//! The cheapest and most deterministic strategy. Fetches the page without
//! script execution and applies the platform's best registry rule.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StrategyError, StrategyResult};
use crate::registry::RuleRegistry;
use crate::strategies::{markup, ExtractionContext, Strategy, StrategyKind};
use crate::types::Conversation;

pub struct StaticMarkupStrategy {
    registry: Arc<RuleRegistry>,
}

impl StaticMarkupStrategy {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Strategy for StaticMarkupStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StaticMarkup
    }

    async fn attempt(&self, ctx: &mut ExtractionContext) -> StrategyResult<Conversation> {
        let platform = ctx.matched.platform;
        let rule = self
            .registry
            .best_rule(platform)
            .ok_or(StrategyError::NoRules { platform })?;
        debug!(platform = %platform, rule_id = %rule.id, "applying best rule to static markup");

        let url = ctx.url.clone();
        let html = ctx.html().await?;
        markup::extract_with_rule(html, &rule, platform, &url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::PageFetcher;
    use crate::platform::{Platform, PlatformMatch};
    use crate::testing::chatgpt_two_turn_fixture;
    use crate::types::MessageRole;

    fn context_with(html: String) -> ExtractionContext {
        ExtractionContext::with_html(
            "https://chatgpt.com/share/abcdef123456",
            PlatformMatch {
                platform: Platform::ChatGpt,
                share_id: "abcdef123456".into(),
            },
            Arc::new(PageFetcher::new().unwrap()),
            html,
        )
    }

    #[tokio::test]
    async fn extracts_from_pre_supplied_markup() {
        let strategy = StaticMarkupStrategy::new(Arc::new(RuleRegistry::with_builtin_rules()));
        let mut ctx = context_with(chatgpt_two_turn_fixture());

        let conv = strategy.attempt(&mut ctx).await.unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].role, MessageRole::User);
        assert_eq!(conv.messages[1].role, MessageRole::Assistant);
        assert_eq!(conv.platform, Platform::ChatGpt);
    }

    #[tokio::test]
    async fn missing_rules_fail_fast() {
        let strategy = StaticMarkupStrategy::new(Arc::new(RuleRegistry::new()));
        let mut ctx = context_with(chatgpt_two_turn_fixture());

        let err = strategy.attempt(&mut ctx).await.unwrap_err();
        assert!(matches!(err, StrategyError::NoRules { .. }));
    }
}
