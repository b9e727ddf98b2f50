//! Headless-browser fetcher for JavaScript-heavy storefront pages.

use crate::error::{FetchError, Result};
use crate::fetcher::{detect_block_markup, Content, FetchTarget, Fetcher};
use crate::fingerprint::{settle_delay, FingerprintConfig};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::stream::StreamExt;
use std::time::Duration;

/// Chromium-backed [`Fetcher`] with fingerprint rotation.
///
/// Each fetch opens a fresh page with a newly randomized fingerprint,
/// navigates, waits a jittered settle delay, and reads the rendered DOM.
/// Pages are closed eagerly so a long job never accumulates tabs.
pub struct BrowserFetcher {
    browser: Browser,
    navigation_timeout: Duration,
}

impl BrowserFetcher {
    /// Launch a Chromium instance per the configured headless mode.
    pub async fn launch(config: &scout_core::config::BrowserConfig) -> Result<Self> {
        let fingerprint = FingerprintConfig::randomized();

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height);
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder
            .build()
            .map_err(|e| FetchError::Transient(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| FetchError::Transient(format!("browser launch: {e}")))?;

        // Drive CDP events for the lifetime of the browser
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
        })
    }

    async fn fetch_page(&self, target: &FetchTarget) -> Result<Content> {
        let domain = target.domain()?;
        let fingerprint = FingerprintConfig::randomized();

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Transient(format!("new page: {e}")))?;

        let result = async {
            page.set_user_agent(fingerprint.user_agent.as_str())
                .await
                .map_err(|e| FetchError::Transient(format!("set user agent: {e}")))?;

            tokio::time::timeout(self.navigation_timeout, page.goto(target.url.as_str()))
                .await
                .map_err(|_| {
                    FetchError::Transient(format!(
                        "navigation timed out after {}s",
                        self.navigation_timeout.as_secs()
                    ))
                })?
                .map_err(|e| FetchError::Transient(format!("navigation: {e}")))?;

            tokio::time::sleep(settle_delay()).await;

            let body = page
                .content()
                .await
                .map_err(|e| FetchError::Transient(format!("read content: {e}")))?;

            if detect_block_markup(&body) {
                return Err(FetchError::Blocked {
                    domain: domain.clone(),
                    retry_after: None,
                });
            }

            Ok(Content {
                url: target.url.clone(),
                body,
            })
        }
        .await;

        // Close regardless of outcome; a failed close is not worth failing
        // an otherwise good fetch over.
        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "page close failed");
        }

        result
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, target: &FetchTarget) -> Result<Content> {
        tracing::debug!(url = %target.url, "browser fetch");
        self.fetch_page(target).await
    }
}
