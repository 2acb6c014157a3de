//! Strategy orchestration: the per-request state machine.
//!
//! `Detecting → Trying(strategy) → { Validated | Trying(next) } →
//! Exhausted`. Detection failure is terminal and immediate. Each strategy
//! gets exactly one attempt per request, under its own timeout budget;
//! a timeout or error advances to the next strategy in the ranked order.
//! Only exhaustion of every strategy surfaces as a failure.
//!
//! Collaborators (registry, outcome log, strategies, fetcher) are
//! injected at construction, never reached through globals, so tests can
//! substitute doubles freely.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adaptive::AdaptiveSelector;
use crate::error::{AttemptFailure, ExtractError, Result, StrategyError};
use crate::fetch::PageFetcher;
use crate::outcome::{OutcomeLog, StrategyOutcome};
use crate::platform;
use crate::registry::RuleRegistry;
use crate::strategies::{ExtractionContext, Strategy, StrategyKind};
use crate::types::{Conversation, OrchestratorConfig};

/// Where a request currently stands. Transitions are logged; terminal
/// states map onto the public result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Detecting,
    Trying(StrategyKind),
    Validated,
    Exhausted,
}

pub struct Orchestrator {
    registry: Arc<RuleRegistry>,
    outcomes: Arc<OutcomeLog>,
    selector: AdaptiveSelector,
    strategies: Vec<Box<dyn Strategy>>,
    fetcher: Arc<PageFetcher>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Build an orchestrator over an explicit strategy set. The ranked
    /// order decides which of these run and when; strategies absent from
    /// the set (for example, no rendering service is configured) are
    /// skipped.
    pub fn new(
        registry: Arc<RuleRegistry>,
        outcomes: Arc<OutcomeLog>,
        strategies: Vec<Box<dyn Strategy>>,
        fetcher: Arc<PageFetcher>,
    ) -> Self {
        let selector = AdaptiveSelector::new(outcomes.clone());
        Self {
            registry,
            outcomes,
            selector,
            strategies,
            fetcher,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// The registry this orchestrator reads rules from.
    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Run one extraction request to a terminal state.
    pub async fn extract(&self, url: &str) -> Result<Conversation> {
        self.extract_with_cancel(url, CancellationToken::new()).await
    }

    /// Run one extraction request, tearing down promptly if `cancel`
    /// fires before a terminal state is reached.
    pub async fn extract_with_cancel(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<Conversation> {
        let mut phase = Phase::Detecting;
        debug!(url = %url, ?phase, "extraction request started");

        let matched = platform::detect(url)?;
        let order = self.selector.rank(matched.platform);
        info!(
            url = %url,
            platform = %matched.platform,
            order = ?order.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            "platform detected"
        );

        let mut ctx = ExtractionContext::new(
            url,
            matched.clone(),
            self.fetcher.clone(),
            cancel.clone(),
        );
        let mut failures: Vec<AttemptFailure> = Vec::new();

        for kind in order {
            let Some(strategy) = self.strategies.iter().find(|s| s.kind() == kind) else {
                debug!(strategy = %kind, "strategy not configured; skipping");
                continue;
            };

            if cancel.is_cancelled() {
                return Err(ExtractError::Cancelled);
            }

            phase = Phase::Trying(kind);
            debug!(?phase, "attempting strategy");
            let started = Instant::now();

            let budget = self.config.timeout_for(kind);
            let attempt = tokio::time::timeout(budget, strategy.attempt(&mut ctx));

            let result: std::result::Result<Conversation, StrategyError> = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(strategy = %kind, "request cancelled mid-attempt");
                    return Err(ExtractError::Cancelled);
                }
                outcome = attempt => match outcome {
                    Ok(Ok(conversation)) => conversation
                        .validate()
                        .map(|()| conversation)
                        .map_err(StrategyError::from),
                    Ok(Err(e)) => Err(e),
                    Err(_elapsed) => Err(StrategyError::Timeout),
                },
            };

            let latency = started.elapsed();
            match result {
                Ok(conversation) => {
                    phase = Phase::Validated;
                    self.outcomes.record(StrategyOutcome {
                        platform: matched.platform,
                        strategy: kind,
                        succeeded: true,
                        latency,
                        error_class: None,
                    });
                    info!(
                        ?phase,
                        strategy = %kind,
                        messages = conversation.messages.len(),
                        latency_ms = latency.as_millis() as u64,
                        "extraction validated"
                    );
                    return Ok(conversation);
                }
                Err(e) => {
                    self.outcomes.record(StrategyOutcome {
                        platform: matched.platform,
                        strategy: kind,
                        succeeded: false,
                        latency,
                        error_class: Some(e.class()),
                    });
                    warn!(
                        strategy = %kind,
                        error = %e,
                        latency_ms = latency.as_millis() as u64,
                        "strategy failed; advancing"
                    );
                    failures.push(AttemptFailure {
                        strategy: kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        phase = Phase::Exhausted;
        warn!(?phase, url = %url, attempts = failures.len(), "all strategies exhausted");
        Err(ExtractError::AllStrategiesFailed { attempts: failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationFailure;
    use crate::platform::Platform;
    use crate::testing::{sample_conversation, MockStrategy};

    fn orchestrator_with(
        strategies: Vec<Box<dyn Strategy>>,
        outcomes: Arc<OutcomeLog>,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(RuleRegistry::with_builtin_rules()),
            outcomes,
            strategies,
            Arc::new(PageFetcher::new().unwrap()),
        )
    }

    const URL: &str = "https://chatgpt.com/share/abcdef123456";

    #[tokio::test]
    async fn unsupported_platform_is_terminal_with_no_attempts() {
        let mock = MockStrategy::failing(StrategyKind::StaticMarkup);
        let outcomes = Arc::new(OutcomeLog::new());
        let orch = orchestrator_with(vec![Box::new(mock.clone())], outcomes.clone());

        let err = orch.extract("https://example.com/chat/1234567").await.unwrap_err();
        assert!(matches!(err, ExtractError::Detect(_)));
        assert_eq!(mock.attempts(), 0);
        assert!(outcomes.is_empty(), "no outcomes for an undetected platform");
    }

    #[tokio::test]
    async fn first_success_is_terminal_and_recorded() {
        let winner = MockStrategy::succeeding(
            StrategyKind::StaticMarkup,
            sample_conversation(Platform::ChatGpt),
        );
        let bystander = MockStrategy::failing(StrategyKind::CommunityRules);
        let outcomes = Arc::new(OutcomeLog::new());
        let orch = orchestrator_with(
            vec![Box::new(winner.clone()), Box::new(bystander.clone())],
            outcomes.clone(),
        );

        let conv = orch.extract(URL).await.unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(winner.attempts(), 1);
        assert_eq!(bystander.attempts(), 0, "later strategies never run after success");

        let snap = outcomes.snapshot();
        assert_eq!(snap.len(), 1);
        assert!(snap[0].succeeded);
        assert_eq!(snap[0].strategy, StrategyKind::StaticMarkup);
    }

    #[tokio::test]
    async fn exhaustion_attempts_every_strategy_exactly_once() {
        let mocks: Vec<_> = StrategyKind::DEFAULT_PRIORITY
            .iter()
            .map(|kind| MockStrategy::failing(*kind))
            .collect();
        let outcomes = Arc::new(OutcomeLog::new());
        let strategies: Vec<Box<dyn Strategy>> = mocks
            .iter()
            .map(|m| Box::new(m.clone()) as Box<dyn Strategy>)
            .collect();
        let orch = orchestrator_with(strategies, outcomes.clone());

        let err = orch.extract(URL).await.unwrap_err();
        let ExtractError::AllStrategiesFailed { attempts } = &err else {
            panic!("expected AllStrategiesFailed, got {err:?}");
        };

        // Every strategy attempted once, in ranked (here: default) order,
        // no repeats, no skips.
        assert_eq!(attempts.len(), 5);
        let attempted: Vec<_> = attempts.iter().map(|a| a.strategy).collect();
        assert_eq!(attempted, StrategyKind::DEFAULT_PRIORITY.to_vec());
        for mock in &mocks {
            assert_eq!(mock.attempts(), 1);
        }
        assert_eq!(outcomes.snapshot().len(), 5);
    }

    #[tokio::test]
    async fn invalid_results_advance_like_failures() {
        let invalid = MockStrategy::new(StrategyKind::StaticMarkup);
        invalid.push(Ok(Conversation::new(
            Platform::ChatGpt,
            "Title",
            vec![],
            URL,
        )));
        let invalid = Arc::new(invalid);

        let fallback = MockStrategy::succeeding(
            StrategyKind::StructuredEndpoint,
            sample_conversation(Platform::ChatGpt),
        );

        let outcomes = Arc::new(OutcomeLog::new());
        let orch = orchestrator_with(
            vec![Box::new(invalid.clone()), Box::new(fallback.clone())],
            outcomes.clone(),
        );

        let conv = orch.extract(URL).await.unwrap();
        assert_eq!(conv.metadata.message_count, 2);

        let snap = outcomes.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(!snap[0].succeeded);
        assert_eq!(snap[0].error_class, Some("invalid_result"));
        assert!(snap[1].succeeded);
    }

    #[tokio::test]
    async fn validation_is_all_or_nothing() {
        // A conversation with one blank message is rejected wholesale,
        // never partially returned.
        let mut broken = sample_conversation(Platform::ChatGpt);
        broken.messages[1].content.text = "   ".into();
        assert!(matches!(
            broken.validate(),
            Err(ValidationFailure::BlankMessage { index: 1 })
        ));

        let strategy = MockStrategy::new(StrategyKind::StaticMarkup);
        strategy.push(Ok(broken));
        let strategy = Arc::new(strategy);

        let orch = orchestrator_with(vec![Box::new(strategy)], Arc::new(OutcomeLog::new()));
        let err = orch.extract(URL).await.unwrap_err();
        assert!(matches!(err, ExtractError::AllStrategiesFailed { .. }));
    }

    #[tokio::test]
    async fn timeouts_count_as_strategy_failures() {
        struct SlowStrategy;

        #[async_trait::async_trait]
        impl Strategy for SlowStrategy {
            fn kind(&self) -> StrategyKind {
                StrategyKind::StaticMarkup
            }

            async fn attempt(
                &self,
                _ctx: &mut ExtractionContext,
            ) -> crate::error::StrategyResult<Conversation> {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                unreachable!("the orchestrator must cut this off")
            }
        }

        let outcomes = Arc::new(OutcomeLog::new());
        let orch = orchestrator_with(vec![Box::new(SlowStrategy)], outcomes.clone())
            .with_config(OrchestratorConfig {
                static_markup_timeout: std::time::Duration::from_millis(20),
                ..OrchestratorConfig::default()
            });

        let err = orch.extract(URL).await.unwrap_err();
        let ExtractError::AllStrategiesFailed { attempts } = err else {
            panic!("expected exhaustion");
        };
        assert_eq!(attempts.len(), 1);
        assert_eq!(outcomes.snapshot()[0].error_class, Some("timeout"));
    }

    #[tokio::test]
    async fn cancellation_is_terminal() {
        let strategy = MockStrategy::succeeding(
            StrategyKind::StaticMarkup,
            sample_conversation(Platform::ChatGpt),
        );
        let orch = orchestrator_with(vec![Box::new(strategy.clone())], Arc::new(OutcomeLog::new()));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = orch.extract_with_cancel(URL, cancel).await.unwrap_err();
        assert!(matches!(err, ExtractError::Cancelled));
        assert_eq!(strategy.attempts(), 0);
    }

    #[tokio::test]
    async fn ranking_reorders_future_requests() {
        // Ten recorded successes for community rules promote it to the
        // front on the next request.
        let outcomes = Arc::new(OutcomeLog::new());
        for _ in 0..10 {
            outcomes.record(StrategyOutcome {
                platform: Platform::ChatGpt,
                strategy: StrategyKind::CommunityRules,
                succeeded: true,
                latency: std::time::Duration::from_millis(80),
                error_class: None,
            });
        }

        let community = MockStrategy::succeeding(
            StrategyKind::CommunityRules,
            sample_conversation(Platform::ChatGpt),
        );
        let static_markup = MockStrategy::failing(StrategyKind::StaticMarkup);
        let orch = orchestrator_with(
            vec![Box::new(static_markup.clone()), Box::new(community.clone())],
            outcomes,
        );

        orch.extract(URL).await.unwrap();
        assert_eq!(community.attempts(), 1);
        assert_eq!(
            static_markup.attempts(),
            0,
            "promoted strategy runs before the default first"
        );
    }
}
