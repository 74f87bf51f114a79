//! Fault injection for change fetches.
//!
//! Lets an application exercise its failure paths against a healthy store:
//! a policy can delay a fetch, or fail it with a synthesized retriable error
//! without ever contacting the remote store.
//!
//! ```toml
//! [faults.zone_changes]
//! mode = "simulated_fail_with_partial_errors"
//! delay_ms = 250
//! ```

use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::time::Duration;
use zonesync_types::{ClassifiedError, ErrorCode};

/// Behavior applied to one kind of operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Normal operation, optionally delayed.
    Regular {
        /// Artificial delay before the call, in milliseconds.
        delay_ms: Option<u64>,
    },
    /// Fail with a synthesized retriable error.
    SimulatedFail {
        /// Artificial delay before failing, in milliseconds.
        delay_ms: Option<u64>,
    },
    /// Fail with a synthesized partial failure carrying per-item errors.
    SimulatedFailWithPartialErrors {
        /// Artificial delay before failing, in milliseconds.
        delay_ms: Option<u64>,
    },
}

impl Default for FaultPolicy {
    fn default() -> Self {
        FaultPolicy::Regular { delay_ms: None }
    }
}

impl FaultPolicy {
    /// Artificial delay to apply before anything else, if any.
    pub fn delay(&self) -> Option<Duration> {
        let delay_ms = match self {
            FaultPolicy::Regular { delay_ms }
            | FaultPolicy::SimulatedFail { delay_ms }
            | FaultPolicy::SimulatedFailWithPartialErrors { delay_ms } => *delay_ms,
        };
        delay_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    /// Whether the remote store should be bypassed.
    pub fn is_simulated_failure(&self) -> bool {
        !matches!(self, FaultPolicy::Regular { .. })
    }

    /// Error to return instead of calling the store. `keys` are the items
    /// the call was about; they receive sub-errors in partial mode.
    pub fn synthesize<K>(&self, keys: &[K]) -> Option<ClassifiedError<K>>
    where
        K: Eq + Hash + Clone,
    {
        match self {
            FaultPolicy::Regular { .. } => None,
            FaultPolicy::SimulatedFail { .. } => Some(ClassifiedError::new(
                ErrorCode::ServiceUnavailable,
                "simulated failure",
            )),
            FaultPolicy::SimulatedFailWithPartialErrors { .. } => {
                let error = keys.iter().fold(
                    ClassifiedError::new(ErrorCode::PartialFailure, "simulated partial failure"),
                    |error, key| {
                        error.with_batch_error(
                            key.clone(),
                            ClassifiedError::new(ErrorCode::ZoneBusy, "simulated item failure"),
                        )
                    },
                );
                Some(error)
            }
        }
    }
}
