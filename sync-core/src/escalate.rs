//! Fail-closed escalation of per-item errors.
//!
//! The remote store reports each item separately from the overall
//! completion. A single item failure fails the whole unit (batch, page or
//! partition) even when the completion itself reported success; returning a
//! silently partial result is never an option.

use std::collections::HashMap;
use std::hash::Hash;
use zonesync_types::ClassifiedError;

/// Collapse item outcomes and the overall outcome into one result.
///
/// Precedence: the first failed item (in report order) is surfaced, carrying
/// every failed item in `batch_errors`; otherwise the overall error;
/// otherwise the successful items in report order.
pub fn escalate<K, T>(
    items: Vec<(K, Result<T, ClassifiedError<K>>)>,
    overall: Result<(), ClassifiedError<K>>,
) -> Result<Vec<(K, T)>, ClassifiedError<K>>
where
    K: Eq + Hash + Clone,
{
    let mut succeeded = Vec::with_capacity(items.len());
    let mut first_failure: Option<ClassifiedError<K>> = None;
    let mut failures: HashMap<K, ClassifiedError<K>> = HashMap::new();

    for (key, result) in items {
        match result {
            Ok(value) => succeeded.push((key, value)),
            Err(error) => {
                if first_failure.is_none() {
                    first_failure = Some(error.clone());
                }
                failures.entry(key).or_insert(error);
            }
        }
    }

    if let Some(mut surfaced) = first_failure {
        for (key, error) in failures {
            surfaced.batch_errors.entry(key).or_insert(error);
        }
        return Err(surfaced);
    }

    overall.map(|()| succeeded)
}

/// Pick the highest-precedence failure among item, partition and top-level
/// errors.
pub fn first_failure<E>(item: Option<E>, partition: Option<E>, top_level: Option<E>) -> Option<E> {
    item.or(partition).or(top_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_types::{ErrorCode, RecordError, RecordId, ZoneId};

    fn id(name: &str) -> RecordId {
        RecordId::with_name(name, ZoneId::default_zone())
    }

    #[test]
    fn all_items_succeed() {
        let items = vec![(id("a"), Ok(1)), (id("b"), Ok(2))];
        let result = escalate(items, Ok(())).unwrap();
        assert_eq!(result, vec![(id("a"), 1), (id("b"), 2)]);
    }

    #[test]
    fn item_error_fails_unit_despite_successful_completion() {
        let items = vec![
            (id("a"), Ok(1)),
            (
                id("b"),
                Err(RecordError::new(ErrorCode::ServerRecordChanged, "conflict")),
            ),
            (
                id("c"),
                Err(RecordError::new(ErrorCode::BatchRequestFailed, "collateral")),
            ),
        ];

        let error = escalate(items, Ok(())).unwrap_err();

        assert_eq!(error.code, ErrorCode::ServerRecordChanged);
        assert!(error.has_multiple_errors());
        assert_eq!(error.batch_errors.len(), 2);
        assert_eq!(
            error.sub_error(&id("c")).map(|e| e.code),
            Some(ErrorCode::BatchRequestFailed)
        );
    }

    #[test]
    fn item_error_takes_precedence_over_overall_error() {
        let items: Vec<(RecordId, Result<(), RecordError>)> = vec![(
            id("a"),
            Err(RecordError::new(ErrorCode::UnknownItem, "missing")),
        )];
        let overall = Err(RecordError::new(ErrorCode::PartialFailure, "partial"));

        let error = escalate(items, overall).unwrap_err();
        assert_eq!(error.code, ErrorCode::UnknownItem);
    }

    #[test]
    fn overall_error_surfaces_when_items_are_clean() {
        let items = vec![(id("a"), Ok(()))];
        let overall = Err(RecordError::new(ErrorCode::NetworkFailure, "dropped"));
        let error = escalate(items, overall).unwrap_err();
        assert_eq!(error.code, ErrorCode::NetworkFailure);
    }

    #[test]
    fn first_failure_precedence() {
        assert_eq!(first_failure(Some(1), Some(2), Some(3)), Some(1));
        assert_eq!(first_failure(None, Some(2), Some(3)), Some(2));
        assert_eq!(first_failure(None, None, Some(3)), Some(3));
        assert_eq!(first_failure::<u8>(None, None, None), None);
    }
}
