//! Settlement of a change fetch.
//!
//! After the remote store has driven a change fetch to completion, the
//! coordinator holds one terminal outcome per partition, possibly an
//! item-level error, and the call's own outcome. This module decides, without
//! touching any store, which tokens to persist, which token to clear and
//! which error to surface.

use crate::escalate::first_failure;
use std::collections::HashMap;
use zonesync_types::{ChangeToken, PartitionKey, ZoneError};

/// Terminal outcome reported for one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionReport {
    /// The partition.
    pub key: PartitionKey,
    /// New token, or why the partition failed.
    pub outcome: Result<ChangeToken, ZoneError>,
}

/// Everything a completed fetch reported, in observation order.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    /// First item-level failure, already escalated.
    pub item_error: Option<ZoneError>,
    /// Per-partition outcomes.
    pub partitions: Vec<PartitionReport>,
    /// The call's own completion.
    pub top_level: Result<(), ZoneError>,
}

/// What the coordinator must do with the token store.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// Everything succeeded: persist these tokens.
    Commit(HashMap<PartitionKey, ChangeToken>),
    /// Something failed: persist nothing new, clear `clear` if set, surface `error`.
    Fail {
        /// Error to return to the caller.
        error: ZoneError,
        /// Partition whose token expired and must be reset.
        clear: Option<PartitionKey>,
    },
}

/// Settle a fetch report.
///
/// Surfaced error precedence: item error, then partition error (an expired
/// token beats other partition errors), then the top-level error. Only the
/// first expired partition observed is cleared.
pub fn settle(report: FetchReport) -> Settlement {
    let mut tokens = HashMap::with_capacity(report.partitions.len());
    let mut expired: Option<(PartitionKey, ZoneError)> = None;
    let mut partition_error: Option<ZoneError> = None;

    for partition in report.partitions {
        match partition.outcome {
            Ok(token) => {
                tokens.insert(partition.key, token);
            }
            Err(error) if error.is_token_expired() => {
                if expired.is_none() {
                    expired = Some((partition.key, error));
                }
            }
            Err(error) => {
                if partition_error.is_none() {
                    partition_error = Some(error);
                }
            }
        }
    }

    let (clear, expired_error) = match expired {
        Some((key, error)) => (Some(key), Some(error)),
        None => (None, None),
    };

    match first_failure(
        report.item_error,
        expired_error.or(partition_error),
        report.top_level.err(),
    ) {
        Some(error) => Settlement::Fail { error, clear },
        None => Settlement::Commit(tokens),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_types::{ErrorCode, ZoneId};

    fn zone(name: &str) -> PartitionKey {
        PartitionKey::Zone(ZoneId::new(name))
    }

    fn token(n: u8) -> ChangeToken {
        ChangeToken::from_bytes(vec![n])
    }

    fn expired() -> ZoneError {
        ZoneError::new(ErrorCode::ChangeTokenExpired, "token expired")
    }

    #[test]
    fn all_partitions_succeed() {
        let report = FetchReport {
            item_error: None,
            partitions: vec![
                PartitionReport {
                    key: zone("a"),
                    outcome: Ok(token(1)),
                },
                PartitionReport {
                    key: zone("b"),
                    outcome: Ok(token(2)),
                },
            ],
            top_level: Ok(()),
        };

        match settle(report) {
            Settlement::Commit(tokens) => {
                assert_eq!(tokens.len(), 2);
                assert_eq!(tokens[&zone("a")], token(1));
                assert_eq!(tokens[&zone("b")], token(2));
            }
            other => panic!("expected commit, got {:?}", other),
        }
    }

    #[test]
    fn expired_partition_is_cleared_and_surfaced() {
        let report = FetchReport {
            item_error: None,
            partitions: vec![
                PartitionReport {
                    key: zone("a"),
                    outcome: Ok(token(1)),
                },
                PartitionReport {
                    key: zone("b"),
                    outcome: Err(expired()),
                },
            ],
            top_level: Err(ZoneError::new(ErrorCode::PartialFailure, "partial")),
        };

        assert_eq!(
            settle(report),
            Settlement::Fail {
                error: expired(),
                clear: Some(zone("b")),
            }
        );
    }

    #[test]
    fn only_first_expired_partition_is_cleared() {
        let report = FetchReport {
            item_error: None,
            partitions: vec![
                PartitionReport {
                    key: zone("b"),
                    outcome: Err(expired()),
                },
                PartitionReport {
                    key: zone("a"),
                    outcome: Err(expired()),
                },
            ],
            top_level: Ok(()),
        };

        match settle(report) {
            Settlement::Fail { clear, .. } => assert_eq!(clear, Some(zone("b"))),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn expired_token_beats_earlier_partition_error() {
        let report = FetchReport {
            item_error: None,
            partitions: vec![
                PartitionReport {
                    key: zone("a"),
                    outcome: Err(ZoneError::new(ErrorCode::ZoneNotFound, "gone")),
                },
                PartitionReport {
                    key: zone("b"),
                    outcome: Err(expired()),
                },
            ],
            top_level: Ok(()),
        };

        match settle(report) {
            Settlement::Fail { error, clear } => {
                assert!(error.is_token_expired());
                assert_eq!(clear, Some(zone("b")));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn item_error_beats_partition_and_top_level_errors() {
        let item = ZoneError::new(ErrorCode::UnknownItem, "bad record");
        let report = FetchReport {
            item_error: Some(item.clone()),
            partitions: vec![PartitionReport {
                key: zone("a"),
                outcome: Err(expired()),
            }],
            top_level: Err(ZoneError::new(ErrorCode::NetworkFailure, "dropped")),
        };

        assert_eq!(
            settle(report),
            Settlement::Fail {
                error: item,
                clear: Some(zone("a")),
            }
        );
    }

    #[test]
    fn partition_error_beats_top_level_error() {
        let report = FetchReport {
            item_error: None,
            partitions: vec![PartitionReport {
                key: zone("a"),
                outcome: Err(ZoneError::new(ErrorCode::ZoneBusy, "busy")),
            }],
            top_level: Err(ZoneError::new(ErrorCode::PartialFailure, "partial")),
        };

        match settle(report) {
            Settlement::Fail { error, clear } => {
                assert_eq!(error.code, ErrorCode::ZoneBusy);
                assert_eq!(clear, None);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn top_level_error_alone_fails_without_persisting() {
        let report = FetchReport {
            item_error: None,
            partitions: vec![PartitionReport {
                key: zone("a"),
                outcome: Ok(token(4)),
            }],
            top_level: Err(ZoneError::new(ErrorCode::ServiceUnavailable, "down")),
        };

        assert!(matches!(
            settle(report),
            Settlement::Fail { clear: None, .. }
        ));
    }
}
