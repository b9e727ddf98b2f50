use crate::error::{FetchError, Result};
use async_trait::async_trait;

/// One page or API request to perform.
#[derive(Debug, Clone)]
pub struct FetchTarget {
    pub url: String,
    /// Extra request headers (HTTP fetcher only; browser fetches ignore them)
    pub headers: Vec<(String, String)>,
}

impl FetchTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Host portion of the target URL, used as the rate-limiter key.
    pub fn domain(&self) -> Result<String> {
        let url = url::Url::parse(&self.url)
            .map_err(|e| FetchError::ParseMismatch(format!("invalid URL: {e}")))?;
        url.host_str()
            .ok_or_else(|| FetchError::ParseMismatch("no host in URL".to_string()))
            .map(std::string::ToString::to_string)
    }
}

/// Raw content returned by a successful fetch.
#[derive(Debug, Clone)]
pub struct Content {
    /// URL the content was fetched from
    pub url: String,
    /// Response body (HTML or JSON)
    pub body: String,
}

/// Polymorphic page fetcher.
///
/// One implementation per transport: headless browser for JavaScript-heavy
/// retailer/marketplace pages, plain HTTP for JSON APIs. Implementations own
/// their anti-detection posture but must surface `Blocked` rather than
/// silently returning degraded content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, target: &FetchTarget) -> Result<Content>;
}

/// Markers that indicate a CAPTCHA or bot-check interstitial.
///
/// Checked against lowercased page content before any parsing; a hit means
/// the fetch is `Blocked` even though the HTTP layer reported success.
const BLOCK_MARKERS: &[&str] = &[
    "captcha",
    "recaptcha",
    "robot check",
    "verify you are human",
    "security check",
    "access denied",
    "enter the characters",
];

/// Detect CAPTCHA/bot-check interstitials in page content.
pub fn detect_block_markup(html: &str) -> bool {
    let lower = html.to_lowercase();
    BLOCK_MARKERS.iter().any(|marker| lower.contains(marker))
}
