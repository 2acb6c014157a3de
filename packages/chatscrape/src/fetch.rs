//! Shared HTTP fetcher for page bodies and structured endpoints.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{StrategyError, StrategyResult};

/// Fetches page content as delivered, without script execution.
///
/// One fetcher is shared across all requests; reqwest pools connections
/// internally. Browser-like headers avoid the trivial bot blocks that
/// share pages sit behind.
pub struct PageFetcher {
    client: reqwest::Client,
}

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

impl PageFetcher {
    pub fn new() -> StrategyResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8"
                .parse()
                .expect("static header value"),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            "en-US,en;q=0.5".parse().expect("static header value"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| StrategyError::Http(Box::new(e)))?;

        Ok(Self { client })
    }

    /// Fetch a page body as text. Non-2xx statuses are errors.
    pub async fn fetch_text(&self, url: &str) -> StrategyResult<String> {
        debug!(url = %url, "fetching page body");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StrategyError::Http(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "fetch returned non-success status");
            return Err(StrategyError::Http(
                format!("HTTP {} for {}", status, url).into(),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| StrategyError::Http(Box::new(e)))
    }

    /// Probe a URL for structured (non-HTML) data.
    ///
    /// Returns `Ok(None)` when the endpoint answers with HTML or a
    /// non-JSON body; the probe simply did not pan out. Network errors
    /// and non-2xx statuses are also soft (`None`): a guessed endpoint
    /// that 404s is expected, not exceptional.
    pub async fn probe_json(&self, url: &str) -> StrategyResult<Option<serde_json::Value>> {
        debug!(url = %url, "probing structured endpoint");
        let response = match self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!(url = %url, error = %e, "endpoint probe failed");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "endpoint probe rejected");
            return Ok(None);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if content_type.contains("text/html") {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| StrategyError::Http(Box::new(e)))?;

        Ok(serde_json::from_str(&body).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetcher_constructs_with_default_headers() {
        assert!(PageFetcher::new().is_ok());
    }
}
