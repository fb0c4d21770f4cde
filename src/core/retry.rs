//! Exponential backoff for synchronous node retries.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

fn default_max_retry_count() -> u32 { 3 }
fn default_initial_delay_ms() -> u64 { 1000 }
fn default_multiplier() -> f64 { 2.0 }

/// `(maxRetryCount, initialDelayMs, multiplier)`.
///
/// Attempt 1 runs immediately; attempt `n > 1` waits
/// `initial_delay_ms * multiplier^(n-2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,
    #[serde(default = "default_initial_delay_ms", alias = "initialDelay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retry_count: default_max_retry_count(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retry_count: u32, initial_delay_ms: u64, multiplier: f64) -> Self {
        Self {
            max_retry_count,
            initial_delay_ms,
            multiplier,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, 0, 1.0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retry_count.saturating_add(1)
    }

    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let multiplier = if self.multiplier.is_finite() && self.multiplier > 0.0 {
            self.multiplier
        } else {
            1.0
        };
        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let millis = self.initial_delay_ms as f64 * multiplier.powi(exponent);
        if !millis.is_finite() || millis >= u64::MAX as f64 {
            return Duration::from_millis(u64::MAX);
        }
        Duration::from_millis(millis as u64)
    }

    /// Parse a node's retry config blob, falling back when absent or invalid.
    pub fn parse_or(raw: Option<&str>, fallback: &RetryPolicy) -> RetryPolicy {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return *fallback;
        };
        match serde_json::from_str::<RetryPolicy>(raw) {
            Ok(policy) => policy,
            Err(e) => {
                warn!(error = %e, "Invalid retry config, using engine default");
                *fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_before_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_before_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_before_attempt(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_before_attempt(4), Duration::from_millis(4000));
    }

    #[test]
    fn test_parse_accepts_legacy_initial_delay_key() {
        let policy = RetryPolicy::parse_or(
            Some(r#"{"maxRetryCount":2,"initialDelay":50,"multiplier":3.0}"#),
            &RetryPolicy::default(),
        );
        assert_eq!(policy, RetryPolicy::new(2, 50, 3.0));
        assert_eq!(policy.delay_before_attempt(3), Duration::from_millis(150));
    }

    #[test]
    fn test_parse_fills_missing_fields() {
        let policy = RetryPolicy::parse_or(Some(r#"{"maxRetryCount":1}"#), &RetryPolicy::none());
        assert_eq!(policy.max_retry_count, 1);
        assert_eq!(policy.initial_delay_ms, 1000);
    }

    #[test]
    fn test_parse_falls_back_on_garbage() {
        let fallback = RetryPolicy::new(5, 10, 1.5);
        assert_eq!(RetryPolicy::parse_or(Some("{oops"), &fallback), fallback);
        assert_eq!(RetryPolicy::parse_or(None, &fallback), fallback);
        assert_eq!(RetryPolicy::parse_or(Some("  "), &fallback), fallback);
    }

    #[test]
    fn test_non_positive_multiplier_is_flat() {
        let policy = RetryPolicy::new(3, 100, -2.0);
        assert_eq!(policy.delay_before_attempt(4), Duration::from_millis(100));
    }
}
