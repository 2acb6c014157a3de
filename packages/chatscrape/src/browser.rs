//! Headless-browser rendering seam.
//!
//! Some platforms only populate message content via client-side script
//! after initial load, so the rendered-DOM strategy needs a real browser
//! environment. Rendering runs out of process: `RemoteBrowser` drives a
//! browserless-style rendering service over HTTP, which keeps the
//! heavyweight engine out of this process and lets deployments scale it
//! separately. Tests substitute [`crate::testing::MockBrowser`].

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{StrategyError, StrategyResult};

/// Wait tuning for the rendered-DOM strategy.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Interval between stability polls
    pub poll_interval: Duration,
    /// Total wait budget for the container count to stabilize
    pub max_wait: Duration,
    /// Pause after activating expand affordances
    pub settle_delay: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_wait: Duration::from_secs(10),
            settle_delay: Duration::from_millis(300),
        }
    }
}

/// A browser capable of opening a page session.
#[async_trait]
pub trait HeadlessBrowser: Send + Sync {
    async fn open(&self, url: &str) -> StrategyResult<Box<dyn BrowserPage>>;
}

/// One live page session. Each session holds a full rendering-engine
/// process on the service side, so it must be closed on every exit path.
#[async_trait]
pub trait BrowserPage: Send {
    /// Current serialized DOM.
    async fn html(&mut self) -> StrategyResult<String>;

    /// Activate collapsed/truncated affordances: buttons in an
    /// `aria-expanded="false"` state and elements whose visible text is
    /// an ellipsis. Returns how many were activated.
    async fn expand_collapsed(&mut self) -> StrategyResult<usize>;

    /// Close the session, releasing the remote rendering engine.
    async fn close(&mut self) -> StrategyResult<()>;
}

/// Client for a remote rendering service.
pub struct RemoteBrowser {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

#[derive(Deserialize)]
struct OpenSessionResponse {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Deserialize)]
struct ContentResponse {
    html: String,
}

#[derive(Deserialize)]
struct ExpandResponse {
    activated: usize,
}

impl RemoteBrowser {
    pub fn new(base_url: impl Into<String>) -> StrategyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StrategyError::Http(Box::new(e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create from `RENDER_SERVICE_URL` (and optional
    /// `RENDER_SERVICE_TOKEN`). `None` when unconfigured.
    pub fn from_env() -> Option<StrategyResult<Self>> {
        let base_url = std::env::var("RENDER_SERVICE_URL").ok()?;
        let browser = Self::new(base_url).map(|b| {
            match std::env::var("RENDER_SERVICE_TOKEN") {
                Ok(token) if !token.is_empty() => b.with_token(token),
                _ => b,
            }
        });
        Some(browser)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }
}

#[async_trait]
impl HeadlessBrowser for RemoteBrowser {
    async fn open(&self, url: &str) -> StrategyResult<Box<dyn BrowserPage>> {
        debug!(url = %url, "opening remote browser session");
        let response = self
            .authorized(self.client.post(format!("{}/sessions", self.base_url)))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| StrategyError::Render(format!("session open failed: {e}")))?;

        if !response.status().is_success() {
            return Err(StrategyError::Render(format!(
                "rendering service returned {}",
                response.status()
            )));
        }

        let opened: OpenSessionResponse = response
            .json()
            .await
            .map_err(|e| StrategyError::Render(format!("bad session response: {e}")))?;

        Ok(Box::new(RemotePage {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            session_id: opened.session_id,
            closed: false,
        }))
    }
}

struct RemotePage {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
    session_id: String,
    closed: bool,
}

impl RemotePage {
    fn session_url(&self, suffix: &str) -> String {
        format!("{}/sessions/{}{}", self.base_url, self.session_id, suffix)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }
}

#[async_trait]
impl BrowserPage for RemotePage {
    async fn html(&mut self) -> StrategyResult<String> {
        let response = self
            .authorized(self.client.get(self.session_url("/content")))
            .send()
            .await
            .map_err(|e| StrategyError::Render(format!("content fetch failed: {e}")))?;
        if !response.status().is_success() {
            return Err(StrategyError::Render(format!(
                "content fetch returned {}",
                response.status()
            )));
        }
        let content: ContentResponse = response
            .json()
            .await
            .map_err(|e| StrategyError::Render(format!("bad content response: {e}")))?;
        Ok(content.html)
    }

    async fn expand_collapsed(&mut self) -> StrategyResult<usize> {
        let body = serde_json::json!({
            "selectors": [
                "button[aria-expanded=\"false\"]",
                "[aria-expanded=\"false\"]",
            ],
            "ellipsisOnly": true,
        });
        let response = self
            .authorized(self.client.post(self.session_url("/expand")))
            .json(&body)
            .send()
            .await
            .map_err(|e| StrategyError::Render(format!("expand failed: {e}")))?;
        if !response.status().is_success() {
            // Expansion is best-effort; an unsupported service verb is
            // not fatal to the render.
            warn!(status = %response.status(), "expand endpoint rejected");
            return Ok(0);
        }
        let expanded: ExpandResponse = response
            .json()
            .await
            .map_err(|e| StrategyError::Render(format!("bad expand response: {e}")))?;
        Ok(expanded.activated)
    }

    async fn close(&mut self) -> StrategyResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.authorized(self.client.delete(self.session_url("")))
            .send()
            .await
            .map_err(|e| StrategyError::Render(format!("session close failed: {e}")))?;
        Ok(())
    }
}

impl Drop for RemotePage {
    fn drop(&mut self) {
        // Backstop for abandoned futures (caller cancellation): the
        // session still has to die on the service side.
        if !self.closed {
            let client = self.client.clone();
            let url = self.session_url("");
            let token = self.token.clone();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let mut request = client.delete(url);
                    if let Some(token) = &token {
                        request = request.bearer_auth(token.expose_secret());
                    }
                    if let Err(e) = request.send().await {
                        warn!(error = %e, "best-effort session close failed");
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let browser = RemoteBrowser::new("http://localhost:9222/").unwrap();
        assert_eq!(browser.base_url, "http://localhost:9222");
    }

    #[test]
    fn render_config_defaults_are_bounded() {
        let config = RenderConfig::default();
        assert!(config.poll_interval < config.max_wait);
        assert!(config.settle_delay < config.poll_interval * 2);
    }
}
