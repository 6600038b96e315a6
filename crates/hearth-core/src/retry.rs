//! Retry configuration and backoff calculation.
//!
//! Sync-only building blocks for the provider client's retry loop. The
//! async execution lives in `hearth-runtime` (which has tokio); this
//! module owns the portable math.

use serde::{Deserialize, Serialize};

/// Default maximum retries for a model call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 15_000;
/// Default jitter factor (0.0–1.0).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Configuration for the provider retry loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff in ms (default: 500).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay between retries in ms (default: 15000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter factor 0.0–1.0 (default: 0.2).
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

/// Calculate exponential backoff delay with explicit randomness.
///
/// Formula: `min(max_delay, base_delay * 2^attempt) * (1 + (random*2-1) * jitter)`
///
/// `random` should be a value in `[0.0, 1.0)` from a PRNG; it maps to a
/// symmetric ±jitter band around the exponential value.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn calculate_backoff_delay(
    attempt: u32,
    config: &RetryConfig,
    random: f64,
) -> u64 {
    let exponential = config
        .base_delay_ms
        .saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(config.max_delay_ms);

    let jitter = 1.0 + (random * 2.0 - 1.0) * config.jitter_factor;
    let with_jitter = (capped as f64) * jitter;

    #[allow(clippy::cast_sign_loss)]
    {
        with_jitter.round().max(0.0) as u64
    }
}

/// Parse a `Retry-After` HTTP header value.
///
/// Accepts integer seconds (`"120"`) or an HTTP-date. Returns the delay
/// in milliseconds, or `None` if parsing fails.
#[must_use]
pub fn parse_retry_after_header(value: &str) -> Option<u64> {
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds * 1000);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let delay_ms = date
            .signed_duration_since(chrono::Utc::now())
            .num_milliseconds();
        #[allow(clippy::cast_sign_loss)]
        return Some(if delay_ms > 0 { delay_ms as u64 } else { 0 });
    }

    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 15_000);
        assert!((config.jitter_factor - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        };
        assert_eq!(calculate_backoff_delay(0, &config, 0.5), 500);
        assert_eq!(calculate_backoff_delay(1, &config, 0.5), 1000);
        assert_eq!(calculate_backoff_delay(2, &config, 0.5), 2000);
    }

    #[test]
    fn backoff_caps_at_max() {
        let config = RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        };
        assert_eq!(calculate_backoff_delay(10, &config, 0.5), 15_000);
    }

    #[test]
    fn jitter_bounds() {
        let config = RetryConfig::default();
        // random = 0.0 → -20%, random ~1.0 → +20%
        let low = calculate_backoff_delay(0, &config, 0.0);
        let high = calculate_backoff_delay(0, &config, 0.999);
        assert_eq!(low, 400);
        assert!(high >= 595 && high <= 600);
    }

    #[test]
    fn retry_after_seconds() {
        assert_eq!(parse_retry_after_header("120"), Some(120_000));
    }

    #[test]
    fn retry_after_past_date_is_zero() {
        assert_eq!(
            parse_retry_after_header("Thu, 01 Dec 2005 16:00:00 GMT"),
            Some(0)
        );
    }

    #[test]
    fn retry_after_garbage_is_none() {
        assert_eq!(parse_retry_after_header("soon"), None);
    }

    proptest::proptest! {
        #[test]
        fn backoff_never_exceeds_jittered_max(attempt in 0u32..64, random in 0.0f64..1.0) {
            let config = RetryConfig::default();
            let delay = calculate_backoff_delay(attempt, &config, random);
            let ceiling = (config.max_delay_ms as f64 * (1.0 + config.jitter_factor)).round() as u64;
            proptest::prop_assert!(delay <= ceiling);
        }
    }
}
