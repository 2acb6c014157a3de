//! Orchestrator configuration: per-strategy timeout budgets.

use std::time::Duration;

use crate::strategies::StrategyKind;

/// Timeout budgets for each strategy. Every suspension point inside a
/// strategy runs under its budget; exceeding it counts as a strategy
/// failure, not a request failure.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub static_markup_timeout: Duration,
    pub structured_endpoint_timeout: Duration,
    pub rendered_dom_timeout: Duration,
    pub community_rules_timeout: Duration,
    pub semantic_fallback_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            static_markup_timeout: Duration::from_secs(15),
            structured_endpoint_timeout: Duration::from_secs(10),
            rendered_dom_timeout: Duration::from_secs(45),
            community_rules_timeout: Duration::from_secs(20),
            semantic_fallback_timeout: Duration::from_secs(60),
        }
    }
}

impl OrchestratorConfig {
    pub fn timeout_for(&self, kind: StrategyKind) -> Duration {
        match kind {
            StrategyKind::StaticMarkup => self.static_markup_timeout,
            StrategyKind::StructuredEndpoint => self.structured_endpoint_timeout,
            StrategyKind::RenderedDom => self.rendered_dom_timeout,
            StrategyKind::CommunityRules => self.community_rules_timeout,
            StrategyKind::SemanticFallback => self.semantic_fallback_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_and_semantic_get_the_largest_budgets() {
        let config = OrchestratorConfig::default();
        assert!(
            config.timeout_for(StrategyKind::RenderedDom)
                > config.timeout_for(StrategyKind::StaticMarkup)
        );
        assert!(
            config.timeout_for(StrategyKind::SemanticFallback)
                > config.timeout_for(StrategyKind::CommunityRules)
        );
    }
}
