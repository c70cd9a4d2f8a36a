//! Retry policy and backoff math (spec.md §4.5 "Retry Handler").

use rand::Rng;
use serde::{Deserialize, Serialize};

/// `{max_retries, initial_delay_ms, max_delay_ms, backoff_multiplier,
/// retryable_errors?}` from spec.md §4.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Empty or unset means every error is retryable.
    pub retryable_errors: Vec<String>,
}

impl RetryPolicy {
    /// The three default presets named in spec.md §4.5.
    pub fn preset(preset: RetryPreset) -> Self {
        match preset {
            RetryPreset::None => Self {
                max_retries: 0,
                initial_delay_ms: 0,
                max_delay_ms: 0,
                backoff_multiplier: 1.0,
                retryable_errors: Vec::new(),
            },
            RetryPreset::Message => Self {
                max_retries: 5,
                initial_delay_ms: 200,
                max_delay_ms: 30_000,
                backoff_multiplier: 2.0,
                retryable_errors: Vec::new(),
            },
            RetryPreset::Activity => Self {
                max_retries: 3,
                initial_delay_ms: 500,
                max_delay_ms: 60_000,
                backoff_multiplier: 2.0,
                retryable_errors: Vec::new(),
            },
        }
    }

    /// Overrides `max_retries` from a message's metadata, per spec.md §4.5
    /// "policies are per-invocation, overridable by message metadata's
    /// `max_retries`".
    pub fn with_max_retries_override(mut self, override_value: Option<u32>) -> Self {
        if let Some(max_retries) = override_value {
            self.max_retries = max_retries;
        }
        self
    }

    /// `retryable_errors` empty/unset retries everything; otherwise the
    /// error text must contain (case-insensitively) at least one pattern.
    pub fn is_retryable(&self, error_text: &str) -> bool {
        if self.retryable_errors.is_empty() {
            return true;
        }
        let haystack = error_text.to_lowercase();
        self.retryable_errors
            .iter()
            .any(|pattern| haystack.contains(&pattern.to_lowercase()))
    }

    /// `delay_n = min(initial * multiplier^n, max_delay) + jitter`, where
    /// `jitter ∈ uniform(−25%, +25%) · delay_n` (spec.md §4.5, §8 "Retry
    /// backoff"). `attempt` is 0-indexed.
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        let base =
            (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay_ms as f64);
        let jitter_fraction = rand::thread_rng().gen_range(-0.25..=0.25);
        let jittered = capped + capped * jitter_fraction;
        jittered.max(0.0).round() as u64
    }
}

/// The three named presets from spec.md §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPreset {
    None,
    Message,
    Activity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors_empty_means_all_retryable() {
        let policy = RetryPolicy::preset(RetryPreset::Activity);
        assert!(policy.is_retryable("anything at all"));
    }

    #[test]
    fn retryable_errors_matches_case_insensitively() {
        let policy = RetryPolicy {
            retryable_errors: vec!["timeout".into()],
            ..RetryPolicy::preset(RetryPreset::Activity)
        };
        assert!(policy.is_retryable("Operation TIMEOUT after 5s"));
        assert!(!policy.is_retryable("permission denied"));
    }

    #[test]
    fn backoff_delay_is_within_jitter_bounds() {
        let policy = RetryPolicy {
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            ..RetryPolicy::preset(RetryPreset::Activity)
        };
        for attempt in 0..6 {
            let expected_base = 100f64 * 2f64.powi(attempt as i32);
            let expected_capped = expected_base.min(10_000.0);
            let lower = (expected_capped * 0.75).floor() as u64;
            let upper = (expected_capped * 1.25).ceil() as u64;
            let delay = policy.backoff_delay_ms(attempt);
            assert!(
                delay >= lower && delay <= upper,
                "attempt {attempt}: delay {delay} not in [{lower}, {upper}]"
            );
        }
    }

    #[test]
    fn max_retries_override_from_message_metadata() {
        let policy = RetryPolicy::preset(RetryPreset::Message).with_max_retries_override(Some(1));
        assert_eq!(policy.max_retries, 1);
        let unchanged = RetryPolicy::preset(RetryPreset::Message).with_max_retries_override(None);
        assert_eq!(unchanged.max_retries, 5);
    }

    proptest::proptest! {
        /// `backoff_delay_ms` always lands within ±25% of the capped
        /// exponential base, for any policy shape and attempt count
        /// (spec.md §4.5, §8 "Retry backoff").
        #[test]
        fn backoff_delay_always_within_jitter_bounds(
            initial_delay_ms in 0u64..=5_000,
            max_delay_ms in 0u64..=120_000,
            backoff_multiplier in 1.0f64..=4.0,
            attempt in 0u32..10,
        ) {
            let policy = RetryPolicy {
                initial_delay_ms,
                max_delay_ms,
                backoff_multiplier,
                ..RetryPolicy::preset(RetryPreset::Activity)
            };
            let expected_capped =
                (initial_delay_ms as f64 * backoff_multiplier.powi(attempt as i32)).min(max_delay_ms as f64);
            let lower = (expected_capped * 0.75).floor() as u64;
            let upper = (expected_capped * 1.25).ceil() as u64;
            let delay = policy.backoff_delay_ms(attempt);
            proptest::prop_assert!(
                delay >= lower && delay <= upper,
                "attempt {attempt}: delay {delay} not in [{lower}, {upper}]"
            );
        }
    }
}
