//! Selector rule registry.
//!
//! Holds the current best-known selector rules per platform. The registry
//! is the only state shared across concurrent extraction requests: reads
//! take a cheap snapshot (`Arc` clone), writes build a replacement map
//! and swap it in, so a `refresh` never blocks or corrupts a concurrent
//! read.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::platform::Platform;
use crate::types::{ParsingRule, SelectorSet};

type RuleMap = IndexMap<Platform, Vec<ParsingRule>>;

/// Errors from an external rule feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed unreachable: {0}")]
    Network(String),

    #[error("feed payload malformed: {0}")]
    Malformed(String),
}

/// Collaborator interface: an external source of updated rules.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RuleFeed: Send + Sync {
    async fn fetch_rules(&self) -> std::result::Result<Vec<ParsingRule>, FeedError>;
}

/// Process-wide registry of selector rules.
pub struct RuleRegistry {
    rules: RwLock<Arc<RuleMap>>,
}

impl RuleRegistry {
    /// An empty registry. Most callers want [`RuleRegistry::with_builtin_rules`].
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Arc::new(RuleMap::new())),
        }
    }

    /// A registry seeded with the shipped rules for every platform.
    pub fn with_builtin_rules() -> Self {
        let registry = Self::new();
        for rule in builtin_rules() {
            registry.add_rule(rule);
        }
        registry
    }

    /// Best rule for a platform: highest confidence among verified rules,
    /// ties broken by most recent `last_updated`. `None` when the
    /// platform has no accepted rules.
    pub fn best_rule(&self, platform: Platform) -> Option<ParsingRule> {
        self.snapshot()
            .get(&platform)
            .and_then(|rules| rules.first().cloned())
    }

    /// Every accepted rule for a platform, best-confidence-first.
    pub fn verified_rules(&self, platform: Platform) -> Vec<ParsingRule> {
        self.snapshot()
            .get(&platform)
            .cloned()
            .unwrap_or_default()
    }

    /// Add a rule. Only rules passing the acceptance gate
    /// (`confidence > 0.8 && verified`) are stored; everything else is
    /// silently rejected. Returns whether the rule was accepted.
    pub fn add_rule(&self, rule: ParsingRule) -> bool {
        if !rule.is_acceptable() {
            debug!(
                rule_id = %rule.id,
                platform = %rule.platform,
                confidence = rule.confidence,
                verified = rule.verified,
                "rejecting rule below acceptance gate"
            );
            return false;
        }

        let mut guard = self.rules.write().unwrap();
        let mut next: RuleMap = (**guard).clone();
        let platform_rules = next.entry(rule.platform).or_default();
        platform_rules.push(rule);
        sort_rules(platform_rules);
        *guard = Arc::new(next);
        true
    }

    /// Pull a fresh rule set from a collaborator feed and swap it in
    /// atomically. Feed entries run through the same acceptance gate as
    /// `add_rule`. Snapshots taken before the swap keep reading the old
    /// rule set undisturbed.
    pub async fn refresh(&self, feed: &dyn RuleFeed) -> std::result::Result<usize, FeedError> {
        let fetched = feed.fetch_rules().await?;
        let total = fetched.len();

        let mut next = RuleMap::new();
        let mut accepted = 0usize;
        for rule in fetched {
            if !rule.is_acceptable() {
                continue;
            }
            next.entry(rule.platform).or_insert_with(Vec::new).push(rule);
            accepted += 1;
        }
        for rules in next.values_mut() {
            sort_rules(rules);
        }

        *self.rules.write().unwrap() = Arc::new(next);
        info!(accepted, rejected = total - accepted, "rule registry refreshed");
        Ok(accepted)
    }

    /// Current rule map snapshot. Holders keep reading a consistent view
    /// regardless of concurrent writes.
    pub fn snapshot(&self) -> Arc<RuleMap> {
        self.rules.read().unwrap().clone()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_builtin_rules()
    }
}

fn sort_rules(rules: &mut [ParsingRule]) {
    rules.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.last_updated.cmp(&a.last_updated))
    });
}

/// The shipped selector rules: current best-known structure per platform.
pub fn builtin_rules() -> Vec<ParsingRule> {
    let shipped = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    vec![
        ParsingRule {
            id: "chatgpt-data-attrs-v3".into(),
            platform: Platform::ChatGpt,
            version: 3,
            selectors: SelectorSet {
                messages: "[data-message-author-role]".into(),
                user_role: "[data-message-author-role=\"user\"]".into(),
                assistant_role: "[data-message-author-role=\"assistant\"]".into(),
                content: ".markdown, .whitespace-pre-wrap".into(),
                timestamp: None,
                title: "title".into(),
                code_block: "pre code".into(),
            },
            confidence: 0.95,
            verified: true,
            last_updated: shipped,
        },
        ParsingRule {
            id: "claude-testid-v2".into(),
            platform: Platform::Claude,
            version: 2,
            selectors: SelectorSet {
                messages: "[data-testid=\"user-message\"], .font-claude-message".into(),
                user_role: "[data-testid=\"user-message\"]".into(),
                assistant_role: ".font-claude-message".into(),
                content: ".whitespace-pre-wrap, .grid-cols-1".into(),
                timestamp: None,
                title: "title".into(),
                code_block: "pre code".into(),
            },
            confidence: 0.9,
            verified: true,
            last_updated: shipped,
        },
        ParsingRule {
            id: "gemini-custom-elements-v1".into(),
            platform: Platform::Gemini,
            version: 1,
            selectors: SelectorSet {
                messages: "user-query, model-response".into(),
                user_role: "user-query".into(),
                assistant_role: "model-response".into(),
                content: ".query-text, message-content".into(),
                timestamp: None,
                title: "title".into(),
                code_block: "pre code, code-block".into(),
            },
            confidence: 0.88,
            verified: true,
            last_updated: shipped,
        },
        ParsingRule {
            id: "perplexity-prose-v1".into(),
            platform: Platform::Perplexity,
            version: 1,
            selectors: SelectorSet {
                messages: "[class*=\"UserMessage\"], .prose".into(),
                user_role: "[class*=\"UserMessage\"]".into(),
                assistant_role: ".prose".into(),
                content: ".prose, [class*=\"answer\"]".into(),
                timestamp: None,
                title: "title".into(),
                code_block: "pre code".into(),
            },
            confidence: 0.85,
            verified: true,
            last_updated: shipped,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rule(id: &str, platform: Platform, confidence: f32, verified: bool) -> ParsingRule {
        ParsingRule {
            id: id.into(),
            platform,
            version: 1,
            selectors: SelectorSet {
                messages: ".msg".into(),
                user_role: ".user".into(),
                assistant_role: ".assistant".into(),
                content: ".body".into(),
                timestamp: None,
                title: "title".into(),
                code_block: "pre code".into(),
            },
            confidence,
            verified,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn builtin_rules_cover_every_platform() {
        let registry = RuleRegistry::with_builtin_rules();
        for platform in Platform::ALL {
            assert!(
                registry.best_rule(platform).is_some(),
                "missing builtin rule for {platform}"
            );
        }
    }

    #[test]
    fn gate_rejects_unverified_and_low_confidence() {
        let registry = RuleRegistry::new();
        assert!(!registry.add_rule(rule("low", Platform::ChatGpt, 0.5, true)));
        assert!(!registry.add_rule(rule("unverified", Platform::ChatGpt, 0.95, false)));
        assert!(!registry.add_rule(rule("boundary", Platform::ChatGpt, 0.8, true)));
        assert!(registry.best_rule(Platform::ChatGpt).is_none());

        assert!(registry.add_rule(rule("good", Platform::ChatGpt, 0.85, true)));
        assert_eq!(registry.best_rule(Platform::ChatGpt).unwrap().id, "good");
    }

    #[test]
    fn best_rule_prefers_confidence_then_recency() {
        let registry = RuleRegistry::new();
        registry.add_rule(rule("mid", Platform::Claude, 0.85, true));
        registry.add_rule(rule("high", Platform::Claude, 0.95, true));

        let mut old = rule("old-tie", Platform::Claude, 0.95, true);
        old.last_updated = Utc::now() - Duration::days(30);
        registry.add_rule(old);

        assert_eq!(registry.best_rule(Platform::Claude).unwrap().id, "high");

        let ordered = registry.verified_rules(Platform::Claude);
        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered[0].id, "high");
        assert_eq!(ordered[1].id, "old-tie");
        assert_eq!(ordered[2].id, "mid");
    }

    #[tokio::test]
    async fn refresh_swaps_the_snapshot_atomically() {
        let registry = RuleRegistry::new();
        registry.add_rule(rule("original", Platform::ChatGpt, 0.9, true));

        // A reader holding a snapshot keeps its view across the swap.
        let before = registry.snapshot();

        let mut feed = MockRuleFeed::new();
        feed.expect_fetch_rules().returning(|| {
            Ok(vec![
                rule("fresh", Platform::ChatGpt, 0.92, true),
                rule("rejected", Platform::ChatGpt, 0.3, true),
            ])
        });

        let accepted = registry.refresh(&feed).await.unwrap();
        assert_eq!(accepted, 1);
        assert_eq!(registry.best_rule(Platform::ChatGpt).unwrap().id, "fresh");
        assert_eq!(before.get(&Platform::ChatGpt).unwrap()[0].id, "original");
    }

    #[tokio::test]
    async fn refresh_propagates_feed_errors() {
        let registry = RuleRegistry::new();
        let mut feed = MockRuleFeed::new();
        feed.expect_fetch_rules()
            .returning(|| Err(FeedError::Network("connection refused".into())));
        assert!(registry.refresh(&feed).await.is_err());
    }
}
