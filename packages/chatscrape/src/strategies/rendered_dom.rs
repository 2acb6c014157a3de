//! Rendered-DOM strategy: extract from script-populated pages.
//!
//! Same extraction logic as static markup, but the HTML comes from a
//! headless browser session. The strategy waits for the message-container
//! count to stabilize (no growth across two consecutive polls), activates
//! collapsed/truncated affordances, lets the page settle, and then runs
//! the shared markup engine over the final DOM.
//!
//! Sessions hold a full rendering engine on the service side, so the
//! session is closed on every exit path; abandoned futures are covered by
//! the page's close-on-drop backstop.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::browser::{BrowserPage, HeadlessBrowser, RenderConfig};
use crate::error::{StrategyError, StrategyResult};
use crate::registry::RuleRegistry;
use crate::strategies::{markup, ExtractionContext, Strategy, StrategyKind};
use crate::types::{Conversation, ParsingRule};

pub struct RenderedDomStrategy {
    browser: Arc<dyn HeadlessBrowser>,
    registry: Arc<RuleRegistry>,
    config: RenderConfig,
}

impl RenderedDomStrategy {
    pub fn new(browser: Arc<dyn HeadlessBrowser>, registry: Arc<RuleRegistry>) -> Self {
        Self {
            browser,
            registry,
            config: RenderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    /// Wait for the container count to stop growing, expand collapsed
    /// content, and return the final DOM.
    async fn settled_html(
        &self,
        page: &mut dyn BrowserPage,
        rule: &ParsingRule,
    ) -> StrategyResult<String> {
        let started = Instant::now();
        let mut previous: Option<usize> = None;

        loop {
            let html = page.html().await?;
            let count = markup::count_containers(&html, &rule.selectors.messages);
            debug!(count, elapsed_ms = started.elapsed().as_millis() as u64, "render poll");

            if count > 0 && previous == Some(count) {
                break;
            }
            previous = Some(count);

            if started.elapsed() + self.config.poll_interval > self.config.max_wait {
                // Budget exhausted; extract whatever is there.
                break;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        match page.expand_collapsed().await {
            Ok(0) => {}
            Ok(activated) => {
                debug!(activated, "expanded collapsed content");
                tokio::time::sleep(self.config.settle_delay).await;
            }
            Err(e) => warn!(error = %e, "expand pass failed; continuing with current DOM"),
        }

        page.html().await
    }
}

#[async_trait]
impl Strategy for RenderedDomStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RenderedDom
    }

    async fn attempt(&self, ctx: &mut ExtractionContext) -> StrategyResult<Conversation> {
        let platform = ctx.matched.platform;
        let rule = self
            .registry
            .best_rule(platform)
            .ok_or(StrategyError::NoRules { platform })?;

        let mut page = self.browser.open(&ctx.url).await?;

        // The session must close on success and failure alike.
        let result = self.settled_html(page.as_mut(), &rule).await;
        if let Err(e) = page.close().await {
            warn!(error = %e, "browser session close failed");
        }

        let html = result?;
        markup::extract_with_rule(&html, &rule, platform, &ctx.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::PageFetcher;
    use crate::platform::{Platform, PlatformMatch};
    use crate::testing::{chatgpt_share_page, chatgpt_two_turn_fixture, MockBrowser};
    use std::time::Duration;

    fn fast_config() -> RenderConfig {
        RenderConfig {
            poll_interval: Duration::from_millis(5),
            max_wait: Duration::from_millis(100),
            settle_delay: Duration::from_millis(1),
        }
    }

    fn context() -> ExtractionContext {
        ExtractionContext::new(
            "https://chatgpt.com/share/abcdef123456",
            PlatformMatch {
                platform: Platform::ChatGpt,
                share_id: "abcdef123456".into(),
            },
            Arc::new(PageFetcher::new().unwrap()),
            tokio_util::sync::CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn waits_for_container_count_to_stabilize() {
        // Page grows from one to two containers, then stabilizes.
        let browser = Arc::new(MockBrowser::with_snapshots(vec![
            chatgpt_share_page(&[("user", "Hello! Can you help me?")]),
            chatgpt_two_turn_fixture(),
            chatgpt_two_turn_fixture(),
            chatgpt_two_turn_fixture(),
        ]));

        let strategy = RenderedDomStrategy::new(
            browser.clone(),
            Arc::new(RuleRegistry::with_builtin_rules()),
        )
        .with_config(fast_config());

        let conv = strategy.attempt(&mut context()).await.unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert!(browser.closed(), "session must be closed after success");
        assert!(browser.expand_calls() >= 1);
    }

    #[tokio::test]
    async fn closes_the_session_when_extraction_fails() {
        let browser = Arc::new(MockBrowser::with_snapshots(vec![
            "<html><body><p>no containers ever</p></body></html>".to_string(),
        ]));

        let strategy = RenderedDomStrategy::new(
            browser.clone(),
            Arc::new(RuleRegistry::with_builtin_rules()),
        )
        .with_config(fast_config());

        let err = strategy.attempt(&mut context()).await.unwrap_err();
        assert!(matches!(err, StrategyError::NoMatch));
        assert!(browser.closed(), "session must be closed after failure");
    }

    #[tokio::test]
    async fn gives_up_when_the_wait_budget_elapses() {
        // Count keeps changing: 1, 2, 3, ... never stable. The strategy
        // should stop at the budget and extract what is present.
        let mut snapshots = Vec::new();
        for n in 1..60usize {
            let turns: Vec<(&str, String)> = (0..n)
                .map(|i| ("user", format!("message number {i} with enough text")))
                .collect();
            let turns_ref: Vec<(&str, &str)> =
                turns.iter().map(|(r, t)| (*r, t.as_str())).collect();
            snapshots.push(chatgpt_share_page(&turns_ref));
        }
        let browser = Arc::new(MockBrowser::with_snapshots(snapshots));

        let strategy = RenderedDomStrategy::new(
            browser.clone(),
            Arc::new(RuleRegistry::with_builtin_rules()),
        )
        .with_config(fast_config());

        let conv = strategy.attempt(&mut context()).await.unwrap();
        assert!(!conv.messages.is_empty());
        assert!(browser.closed());
    }
}
