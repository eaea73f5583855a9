//! Retry/backoff policy for the model transport.
//!
//! Applies to request issuance in both streaming and blocking modes:
//! - 429 → sleep for the server's retry hint when one is present, else
//!   exponential backoff with jitter, then retry
//! - 5xx and network-level errors → same backoff schedule
//! - any other HTTP error → fail immediately, no retry
//! - exhausting the attempt budget surfaces the last observed error

use std::time::Duration;

use codemate_config::RetryConfig;
use rand::Rng;
use reqwest::header::HeaderMap;

/// How a response status should be handled by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx — hand the response to the caller
    Ok,
    /// 429 — retry, honoring a server hint if present
    RateLimited,
    /// 5xx — retry on the backoff schedule
    Transient,
    /// 401/403 — fail immediately with an auth error
    Unauthorized,
    /// Everything else — fail immediately
    Fatal,
}

/// Classify an HTTP status code for the retry loop.
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Ok,
        429 => StatusClass::RateLimited,
        500..=599 => StatusClass::Transient,
        401 | 403 => StatusClass::Unauthorized,
        _ => StatusClass::Fatal,
    }
}

/// Parse a rate-limit retry hint from response headers.
///
/// Checks `Retry-After` then `x-ratelimit-reset-after`, parsed as fractional
/// seconds. HTTP-date style values are not parsed; they fall back to the
/// backoff schedule, matching the upstream providers this speaks to.
pub fn retry_hint(headers: &HeaderMap) -> Option<Duration> {
    for name in ["retry-after", "x-ratelimit-reset-after"] {
        if let Some(value) = headers.get(name)
            && let Ok(text) = value.to_str()
            && let Ok(secs) = text.trim().parse::<f64>()
            && secs >= 0.0
        {
            return Some(Duration::from_secs_f64(secs));
        }
    }
    None
}

/// The retry policy: attempt budget plus backoff shaping.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum request attempts before surfacing the last error
    pub max_attempts: u32,

    /// Ceiling on any single computed backoff sleep
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            max_backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_secs(config.max_backoff_secs),
        )
    }

    /// The sleep before retrying `attempt` (0-based).
    ///
    /// A server hint is used as-is; otherwise exponential backoff
    /// `2^attempt + jitter(0..0.5s)`, capped at `max_backoff`.
    pub fn delay(&self, attempt: u32, server_hint: Option<Duration>) -> Duration {
        if let Some(hint) = server_hint {
            return hint;
        }
        let base = 1u64 << attempt.min(16);
        let jitter = rand::rng().random_range(0.0..0.5);
        Duration::from_secs_f64(base as f64 + jitter).min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(200), StatusClass::Ok);
        assert_eq!(classify_status(429), StatusClass::RateLimited);
        assert_eq!(classify_status(500), StatusClass::Transient);
        assert_eq!(classify_status(503), StatusClass::Transient);
        assert_eq!(classify_status(401), StatusClass::Unauthorized);
        assert_eq!(classify_status(404), StatusClass::Fatal);
        assert_eq!(classify_status(400), StatusClass::Fatal);
    }

    #[test]
    fn server_hint_is_honored_verbatim() {
        let policy = RetryPolicy::new(6, Duration::from_secs(30));
        let delay = policy.delay(0, Some(Duration::from_secs(2)));
        assert!(delay >= Duration::from_secs(2));
        assert_eq!(delay, Duration::from_secs(2));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_secs(30));

        let early = policy.delay(0, None);
        assert!(early >= Duration::from_secs(1));
        assert!(early < Duration::from_secs(2));

        // 2^8 = 256s, well past the 30s ceiling
        let late = policy.delay(8, None);
        assert_eq!(late, Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_half_second() {
        let policy = RetryPolicy::new(6, Duration::from_secs(30));
        for _ in 0..50 {
            let delay = policy.delay(2, None);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay < Duration::from_secs_f64(4.5));
        }
    }

    #[test]
    fn retry_hint_parses_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("2"));
        assert_eq!(retry_hint(&headers), Some(Duration::from_secs(2)));

        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-reset-after", HeaderValue::from_static("1.5"));
        assert_eq!(retry_hint(&headers), Some(Duration::from_secs_f64(1.5)));
    }

    #[test]
    fn retry_hint_ignores_unparseable_values() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "retry-after",
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(retry_hint(&headers), None);

        assert_eq!(retry_hint(&HeaderMap::new()), None);
    }

    #[test]
    fn policy_from_config() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 3,
            max_backoff_secs: 10,
        });
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.max_backoff, Duration::from_secs(10));
    }
}
