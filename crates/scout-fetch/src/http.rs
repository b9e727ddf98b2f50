//! Plain HTTP fetcher for JSON APIs.

use crate::error::{FetchError, Result};
use crate::fetcher::{Content, FetchTarget, Fetcher};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed [`Fetcher`] for endpoints that do not need a browser.
///
/// Used for the eBay Browse API and anything else that returns JSON
/// directly. Maps 403/429 to `Blocked` (honouring Retry-After), 404 to
/// `NotFound`, and 5xx plus network errors to `Transient`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Transient(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    /// POST a form body, with the same status mapping as GET fetches.
    ///
    /// Needed for the eBay OAuth token grant, which is not a plain GET.
    pub async fn post_form(
        &self,
        target: &FetchTarget,
        form: &[(&str, &str)],
    ) -> Result<Content> {
        let domain = target.domain()?;
        let mut request = self.client.post(&target.url).form(form);
        for (name, value) in &target.headers {
            request = request.header(name, value);
        }
        let response = request.send().await.map_err(map_request_error)?;
        read_response(response, &target.url, &domain).await
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, target: &FetchTarget) -> Result<Content> {
        tracing::debug!(url = %target.url, "http fetch");
        let domain = target.domain()?;
        let mut request = self.client.get(&target.url);
        for (name, value) in &target.headers {
            request = request.header(name, value);
        }
        let response = request.send().await.map_err(map_request_error)?;
        read_response(response, &target.url, &domain).await
    }
}

fn map_request_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Transient("request timed out".to_string())
    } else {
        FetchError::Transient(format!("request failed: {e}"))
    }
}

async fn read_response(response: reqwest::Response, url: &str, domain: &str) -> Result<Content> {
    let status = response.status();
    match status {
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = parse_retry_after(&response);
            Err(FetchError::Blocked {
                domain: domain.to_string(),
                retry_after,
            })
        }
        StatusCode::NOT_FOUND => Err(FetchError::NotFound),
        s if s.is_server_error() => Err(FetchError::Transient(format!("server error {s}"))),
        s if !s.is_success() => Err(FetchError::Transient(format!("unexpected status {s}"))),
        _ => {
            let body = response
                .text()
                .await
                .map_err(|e| FetchError::Transient(format!("read body: {e}")))?;
            Ok(Content {
                url: url.to_string(),
                body,
            })
        }
    }
}

/// Seconds-form Retry-After only; the HTTP-date form is rare enough on
/// these endpoints that we fall back to our own backoff schedule.
fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
