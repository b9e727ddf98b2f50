//! Shared fetch policy: permit, transport, limiter feedback, retry.
//!
//! Every network call in the pipeline goes through [`fetch_guarded`] so the
//! block/retry behavior is identical whether the caller is a retailer
//! scraper or a marketplace checker.

use crate::error::{FetchError, Result};
use crate::fetcher::{Content, FetchTarget, Fetcher};
use crate::rate_limit::RateLimiter;
use rand::Rng;
use std::time::Duration;

const TRANSIENT_RETRY_BASE: Duration = Duration::from_secs(1);
const TRANSIENT_RETRY_MULTIPLIER: u32 = 2;
const TRANSIENT_MAX_ATTEMPTS: u32 = 3;

/// One guarded fetch: acquire a permit, fetch, report back into the limiter.
///
/// A `Blocked` result reports into the limiter (starting the domain
/// cooldown) and is retried exactly once, waiting out the cooldown via
/// `acquire`; a second block surfaces to the caller. Transient errors retry
/// locally with jittered exponential backoff up to three attempts.
pub async fn fetch_guarded(
    fetcher: &dyn Fetcher,
    limiter: &RateLimiter,
    target: &FetchTarget,
) -> Result<Content> {
    let domain = target.domain()?;
    let mut transient_attempts = 0u32;
    let mut block_retried = false;

    loop {
        limiter.acquire(&domain).await;

        match fetcher.fetch(target).await {
            Ok(content) => {
                limiter.report_success(&domain).await;
                return Ok(content);
            }
            Err(FetchError::Blocked {
                domain: d,
                retry_after,
            }) => {
                limiter.report_blocked(&d, retry_after).await;
                if block_retried {
                    return Err(FetchError::Blocked {
                        domain: d,
                        retry_after,
                    });
                }
                block_retried = true;
            }
            Err(e) if e.is_transient() => {
                transient_attempts += 1;
                if transient_attempts >= TRANSIENT_MAX_ATTEMPTS {
                    return Err(e);
                }
                let backoff =
                    TRANSIENT_RETRY_BASE * TRANSIENT_RETRY_MULTIPLIER.pow(transient_attempts - 1);
                tokio::time::sleep(jitter(backoff)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Scale a backoff duration by a random factor in [0.5, 1.5).
fn jitter(base: Duration) -> Duration {
    base.mul_f64(rand::thread_rng().gen_range(0.5..1.5))
}
