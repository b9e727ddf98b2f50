//! Per-domain admission control shared by every network-calling worker.
//!
//! Each domain gets a small token bucket whose refill interval is re-rolled
//! with jitter on every grant, so request spacing never settles into a
//! periodic signature. A reported block puts the domain into a cooldown
//! window that overrides token availability; repeated blocks escalate the
//! cooldown exponentially up to a cap, and the first success after a
//! cooldown resets the escalation.
//!
//! This is the only mutable state shared between concurrent scraper and
//! checker workers. All updates happen under the internal mutex; the mutex
//! is never held across a sleep or a network call.

use rand::Rng;
use scout_core::config::{BackoffConfig, RateLimitConfig};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum wait between availability polls, to avoid a hot loop when the
/// next-token estimate lands slightly early.
const MIN_POLL_WAIT: Duration = Duration::from_millis(10);

/// Proof that a request was admitted for a domain.
///
/// Carries no release obligation: admission is spacing-based, not
/// slot-based.
#[derive(Debug)]
pub struct Permit {
    domain: String,
}

impl Permit {
    /// Domain this permit was issued for.
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

#[derive(Debug)]
struct DomainState {
    tokens: f64,
    capacity: f64,
    /// Current jittered refill interval; re-rolled on each grant
    interval: Duration,
    last_refill: Instant,
    cooldown_until: Option<Instant>,
    /// Cooldown applied on the most recent block, used to escalate the next
    last_cooldown: Option<Duration>,
    consecutive_blocks: u32,
}

impl DomainState {
    fn new(config: &RateLimitConfig, now: Instant) -> Self {
        Self {
            tokens: f64::from(config.burst),
            capacity: f64::from(config.burst.max(1)),
            interval: jittered_interval(config),
            last_refill: now,
            cooldown_until: None,
            last_cooldown: None,
            consecutive_blocks: 0,
        }
    }

    /// Try to take a token. Returns `None` on success, or the suggested wait
    /// before polling again.
    fn poll(&mut self, config: &RateLimitConfig, now: Instant) -> Option<Duration> {
        if let Some(until) = self.cooldown_until {
            if now < until {
                return Some(until - now);
            }
            self.cooldown_until = None;
            // Cooldown expiry does not grant a free token; normal spacing
            // resumes from here.
            self.last_refill = now;
        }

        let elapsed = now.saturating_duration_since(self.last_refill);
        let accrued = elapsed.as_secs_f64() / self.interval.as_secs_f64();
        self.tokens = (self.tokens + accrued).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.interval = jittered_interval(config);
            None
        } else {
            let deficit = 1.0 - self.tokens;
            let wait = self.interval.mul_f64(deficit);
            Some(wait.max(MIN_POLL_WAIT))
        }
    }
}

fn jittered_interval(config: &RateLimitConfig) -> Duration {
    let min = config.min_delay_secs.max(0.0);
    let max = config.max_delay_secs.max(min);
    let secs = if max > min {
        rand::thread_rng().gen_range(min..max)
    } else {
        min
    };
    Duration::from_secs_f64(secs.max(0.001))
}

/// Token-bucket rate limiter with per-domain backoff cooldowns.
#[derive(Debug)]
pub struct RateLimiter {
    rate: RateLimitConfig,
    backoff: BackoffConfig,
    domains: Mutex<HashMap<String, DomainState>>,
}

impl RateLimiter {
    pub fn new(rate: RateLimitConfig, backoff: BackoffConfig) -> Self {
        Self {
            rate,
            backoff,
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a request to `domain` is admissible, then consume a token.
    ///
    /// Blocks through any active cooldown window. Callers must not hold the
    /// returned permit across unrelated domains.
    pub async fn acquire(&self, domain: &str) -> Permit {
        loop {
            let wait = {
                let mut domains = self.domains.lock().await;
                let now = Instant::now();
                let state = domains
                    .entry(domain.to_string())
                    .or_insert_with(|| DomainState::new(&self.rate, now));
                state.poll(&self.rate, now)
            };

            match wait {
                None => {
                    return Permit {
                        domain: domain.to_string(),
                    }
                }
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }

    /// Record a detected block for `domain` and start (or escalate) its
    /// cooldown window.
    ///
    /// The applied cooldown is the larger of the escalated backoff value and
    /// the server's hint, capped at the configured maximum.
    pub async fn report_blocked(&self, domain: &str, hint: Option<Duration>) {
        let mut domains = self.domains.lock().await;
        let now = Instant::now();
        let state = domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainState::new(&self.rate, now));

        state.consecutive_blocks += 1;
        let escalated = match state.last_cooldown {
            None => self.backoff.initial_cooldown(),
            Some(prev) => prev.mul_f64(self.backoff.multiplier),
        };
        let cooldown = escalated
            .max(hint.unwrap_or(Duration::ZERO))
            .min(self.backoff.max_cooldown());

        state.last_cooldown = Some(cooldown);
        state.cooldown_until = Some(now + cooldown);
        state.tokens = 0.0;

        tracing::warn!(
            domain,
            consecutive_blocks = state.consecutive_blocks,
            cooldown_secs = cooldown.as_secs(),
            "domain blocked, entering cooldown"
        );
    }

    /// Record a successful request for `domain`, resetting its backoff
    /// escalation.
    pub async fn report_success(&self, domain: &str) {
        let mut domains = self.domains.lock().await;
        if let Some(state) = domains.get_mut(domain) {
            if state.consecutive_blocks > 0 {
                tracing::debug!(domain, "domain recovered, backoff reset");
            }
            state.consecutive_blocks = 0;
            state.last_cooldown = None;
        }
    }

    /// Remaining cooldown for a domain, if one is active.
    pub async fn cooldown_remaining(&self, domain: &str) -> Option<Duration> {
        let domains = self.domains.lock().await;
        let state = domains.get(domain)?;
        let until = state.cooldown_until?;
        let now = Instant::now();
        (now < until).then(|| until - now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(min: f64, max: f64) -> RateLimiter {
        RateLimiter::new(
            RateLimitConfig {
                min_delay_secs: min,
                max_delay_secs: max,
                burst: 1,
            },
            BackoffConfig {
                initial_cooldown_secs: 30,
                multiplier: 2.0,
                max_cooldown_secs: 900,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_enforced() {
        let limiter = limiter(2.0, 2.0);
        let start = Instant::now();

        limiter.acquire("www.walmart.com").await;
        limiter.acquire("www.walmart.com").await;
        limiter.acquire("www.walmart.com").await;

        // Two refill intervals must have elapsed for the second and third
        // grants (first token is the burst allowance).
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_domains_independent() {
        let limiter = limiter(5.0, 5.0);
        let start = Instant::now();

        limiter.acquire("www.walmart.com").await;
        limiter.acquire("www.homedepot.com").await;

        // Fresh buckets: both first requests admit immediately.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_forces_initial_cooldown() {
        let limiter = limiter(0.1, 0.1);
        limiter.report_blocked("www.walmart.com", None).await;

        let start = Instant::now();
        limiter.acquire("www.walmart.com").await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_blocks_escalate() {
        let limiter = limiter(0.1, 0.1);

        limiter.report_blocked("www.walmart.com", None).await;
        let first = limiter
            .cooldown_remaining("www.walmart.com")
            .await
            .expect("cooldown active");

        limiter.report_blocked("www.walmart.com", None).await;
        let second = limiter
            .cooldown_remaining("www.walmart.com")
            .await
            .expect("cooldown active");

        assert_eq!(first, Duration::from_secs(30));
        assert_eq!(second, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_capped() {
        let limiter = limiter(0.1, 0.1);
        for _ in 0..10 {
            limiter.report_blocked("www.walmart.com", None).await;
        }
        let remaining = limiter
            .cooldown_remaining("www.walmart.com")
            .await
            .expect("cooldown active");
        assert!(remaining <= Duration::from_secs(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_escalation() {
        let limiter = limiter(0.1, 0.1);

        limiter.report_blocked("www.walmart.com", None).await;
        limiter.acquire("www.walmart.com").await;
        limiter.report_success("www.walmart.com").await;

        limiter.report_blocked("www.walmart.com", None).await;
        let remaining = limiter
            .cooldown_remaining("www.walmart.com")
            .await
            .expect("cooldown active");
        assert_eq!(remaining, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hint_extends_cooldown() {
        let limiter = limiter(0.1, 0.1);
        limiter
            .report_blocked("www.walmart.com", Some(Duration::from_secs(120)))
            .await;
        let remaining = limiter
            .cooldown_remaining("www.walmart.com")
            .await
            .expect("cooldown active");
        assert_eq!(remaining, Duration::from_secs(120));
    }
}
