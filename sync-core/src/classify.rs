//! Error classification.
//!
//! Turns whatever a remote store reported ([`RawError`]) into the uniform
//! [`ClassifiedError`] returned by every public operation. Per-item errors
//! are classified recursively and keep their item keys.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use zonesync_types::{ClassifiedError, ErrorCode, RawError, TransportFailure};

/// Classify a raw remote error.
pub fn classify<K: Eq + Hash>(raw: RawError<K>) -> ClassifiedError<K> {
    match raw {
        RawError::Store {
            code,
            message,
            retry_after_secs,
            item_errors,
        } => {
            let batch_errors: HashMap<K, ClassifiedError<K>> = item_errors
                .into_iter()
                .map(|(key, error)| (key, classify(error)))
                .collect();
            ClassifiedError {
                code: ErrorCode::from_code(code),
                description: message,
                retry_after: retry_delay(retry_after_secs),
                batch_errors,
            }
        }
        RawError::Transport {
            failure,
            message,
            retry_after_secs,
        } => ClassifiedError::new(transport_code(failure), message)
            .with_retry_after(retry_delay(retry_after_secs)),
        RawError::Timeout(after) => ClassifiedError::new(
            ErrorCode::NetworkFailure,
            format!("request timed out after {:?}", after),
        ),
    }
}

/// Code a transport-level failure maps onto.
pub fn transport_code(failure: TransportFailure) -> ErrorCode {
    match failure {
        TransportFailure::Unreachable => ErrorCode::NetworkUnavailable,
        TransportFailure::ConnectionLost => ErrorCode::NetworkFailure,
        TransportFailure::ResponseLost => ErrorCode::ServerResponseLost,
        TransportFailure::Unavailable => ErrorCode::ServiceUnavailable,
        TransportFailure::Throttled => ErrorCode::RequestRateLimited,
    }
}

/// Convert a server-suggested delay in seconds. Missing, negative, NaN,
/// infinite and unrepresentably large values all mean "no delay".
pub fn retry_delay(secs: Option<f64>) -> Duration {
    match secs {
        Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO),
        _ => Duration::ZERO,
    }
}
