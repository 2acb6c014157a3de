//! Community-rule strategy: iterate every verified rule.
//!
//! Same mechanics as static markup, but instead of trusting only the
//! best rule it walks the full verified set in confidence order and
//! stops at the first rule that yields a validated conversation. Useful
//! when a platform redesign breaks the top rule but an older or
//! community-contributed rule still matches.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StrategyError, StrategyResult};
use crate::registry::RuleRegistry;
use crate::strategies::{markup, ExtractionContext, Strategy, StrategyKind};
use crate::types::Conversation;

pub struct CommunityRuleStrategy {
    registry: Arc<RuleRegistry>,
}

impl CommunityRuleStrategy {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Strategy for CommunityRuleStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CommunityRules
    }

    async fn attempt(&self, ctx: &mut ExtractionContext) -> StrategyResult<Conversation> {
        let platform = ctx.matched.platform;
        let rules = self.registry.verified_rules(platform);
        if rules.is_empty() {
            return Err(StrategyError::NoRules { platform });
        }

        let url = ctx.url.clone();
        let html = ctx.html().await?.to_string();

        let mut last_error = StrategyError::NoMatch;
        for rule in rules {
            debug!(rule_id = %rule.id, confidence = rule.confidence, "trying community rule");
            match markup::extract_with_rule(&html, &rule, platform, &url) {
                Ok(conversation) => match conversation.validate() {
                    Ok(()) => return Ok(conversation),
                    Err(failure) => {
                        debug!(rule_id = %rule.id, failure = %failure, "rule produced invalid result");
                        last_error = StrategyError::Invalid(failure);
                    }
                },
                Err(e) => {
                    debug!(rule_id = %rule.id, error = %e, "rule did not match");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::PageFetcher;
    use crate::platform::{Platform, PlatformMatch};
    use crate::testing::chatgpt_two_turn_fixture;
    use crate::types::{ParsingRule, SelectorSet};
    use chrono::Utc;

    fn broken_rule(confidence: f32) -> ParsingRule {
        ParsingRule {
            id: format!("broken-{confidence}"),
            platform: Platform::ChatGpt,
            version: 1,
            selectors: SelectorSet {
                messages: ".does-not-exist".into(),
                user_role: ".nope-user".into(),
                assistant_role: ".nope-assistant".into(),
                content: ".nope-content".into(),
                timestamp: None,
                title: "title".into(),
                code_block: "pre code".into(),
            },
            confidence,
            verified: true,
            last_updated: Utc::now(),
        }
    }

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
    async fn falls_through_broken_rules_to_a_working_one() {
        let registry = Arc::new(RuleRegistry::with_builtin_rules());
        // Outranks the builtin rule but matches nothing.
        registry.add_rule(broken_rule(0.99));

        let strategy = CommunityRuleStrategy::new(registry);
        let mut ctx = context_with(chatgpt_two_turn_fixture());

        let conv = strategy.attempt(&mut ctx).await.unwrap();
        assert_eq!(conv.messages.len(), 2);
    }

    #[tokio::test]
    async fn reports_failure_when_every_rule_misses() {
        let registry = Arc::new(RuleRegistry::new());
        registry.add_rule(broken_rule(0.95));
        registry.add_rule(broken_rule(0.9));

        let strategy = CommunityRuleStrategy::new(registry);
        let mut ctx = context_with("<html><body><p>unrelated</p></body></html>".into());

        let err = strategy.attempt(&mut ctx).await.unwrap_err();
        assert!(matches!(err, StrategyError::NoMatch));
    }

    #[tokio::test]
    async fn empty_registry_fails_fast() {
        let strategy = CommunityRuleStrategy::new(Arc::new(RuleRegistry::new()));
        let mut ctx = context_with(chatgpt_two_turn_fixture());
        let err = strategy.attempt(&mut ctx).await.unwrap_err();
        assert!(matches!(err, StrategyError::NoRules { .. }));
    }
}
