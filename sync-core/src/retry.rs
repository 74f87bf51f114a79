//! Retry decisions for a single remote call.
//!
//! The engine never invents a backoff schedule: it only waits when the
//! server suggested a delay. A retriable error without a positive delay is
//! surfaced straight away.

use std::hash::Hash;
use std::time::Duration;
use zonesync_types::ClassifiedError;

/// Default attempts per batch, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What to do after an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then try again.
    RetryAfter(Duration),
    /// The batch is too large; the caller should shrink and restart.
    Shrink,
    /// Give up and surface the error.
    Surface,
}

/// Bounded retry policy for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed, including the first.
    pub max_attempts: u32,
    /// When false, the first failure is final.
    pub auto_retry: bool,
    /// When true, overflow errors ask for a smaller batch instead of failing.
    pub auto_shrink_on_overflow: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            auto_retry: true,
            auto_shrink_on_overflow: true,
        }
    }
}

impl RetryPolicy {
    /// Decide after `attempt` (1-based) failed with `error`.
    ///
    /// Overflow is handled before anything else: it is never retried at the
    /// same size, even though its code is in the retriable set.
    pub fn decide<K: Eq + Hash>(&self, attempt: u32, error: &ClassifiedError<K>) -> RetryDecision {
        if error.is_overflow() {
            return if self.auto_shrink_on_overflow {
                RetryDecision::Shrink
            } else {
                RetryDecision::Surface
            };
        }

        if !self.auto_retry || attempt >= self.max_attempts {
            return RetryDecision::Surface;
        }

        if error.is_retriable() && !error.retry_after.is_zero() {
            RetryDecision::RetryAfter(error.retry_after)
        } else {
            RetryDecision::Surface
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_types::{ErrorCode, RecordError};

    fn rate_limited(secs: u64) -> RecordError {
        RecordError::new(ErrorCode::RequestRateLimited, "slow down")
            .with_retry_after(Duration::from_secs(secs))
    }

    #[test]
    fn retriable_with_delay_retries_until_last_attempt() {
        let policy = RetryPolicy::default();
        let error = rate_limited(2);

        assert_eq!(
            policy.decide(1, &error),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            policy.decide(2, &error),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(policy.decide(3, &error), RetryDecision::Surface);
    }

    #[test]
    fn retriable_without_delay_surfaces() {
        let policy = RetryPolicy::default();
        let error = RecordError::new(ErrorCode::NetworkFailure, "dropped");
        assert_eq!(policy.decide(1, &error), RetryDecision::Surface);
    }

    #[test]
    fn non_retriable_with_delay_surfaces() {
        let policy = RetryPolicy::default();
        let error = RecordError::new(ErrorCode::ServerRecordChanged, "conflict")
            .with_retry_after(Duration::from_secs(5));
        assert_eq!(policy.decide(1, &error), RetryDecision::Surface);
    }

    #[test]
    fn auto_retry_disabled_surfaces_first_failure() {
        let policy = RetryPolicy {
            auto_retry: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.decide(1, &rate_limited(1)), RetryDecision::Surface);
    }

    #[test]
    fn overflow_shrinks_or_surfaces() {
        let overflow = RecordError::new(ErrorCode::LimitExceeded, "too big")
            .with_retry_after(Duration::from_secs(1));

        assert_eq!(
            RetryPolicy::default().decide(1, &overflow),
            RetryDecision::Shrink
        );

        let no_shrink = RetryPolicy {
            auto_shrink_on_overflow: false,
            ..RetryPolicy::default()
        };
        assert_eq!(no_shrink.decide(1, &overflow), RetryDecision::Surface);
    }

    #[test]
    fn overflow_shrinks_even_without_auto_retry() {
        let policy = RetryPolicy {
            auto_retry: false,
            ..RetryPolicy::default()
        };
        let overflow = RecordError::new(ErrorCode::LimitExceeded, "too big");
        assert_eq!(policy.decide(1, &overflow), RetryDecision::Shrink);
    }
}
