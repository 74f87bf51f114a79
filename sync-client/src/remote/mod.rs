//! Remote store abstraction.
//!
//! The remote store owns the wire protocol; this module only fixes the
//! shape of what the engine asks and what it gets back. Per-item results
//! are reported as an ordered list of [`ItemEvent`]s next to one terminal
//! outcome, mirroring how a streaming store reports items before the final
//! completion.
//!
//! # Design
//!
//! Every call returns a response value, never a bare error: a failed call is
//! a response whose `outcome` is `Err`. The engine decides what to make of
//! item errors under a successful outcome.
//!
//! # Example
//!
//! ```ignore
//! let store = MockRemoteStore::new();
//! store.queue_mutate(MutateResponse::failed(RawError::store(ErrorCode::LimitExceeded, "too big")));
//! let batcher = MutationBatcher::new(Arc::new(store.clone()), config_rx);
//! ```

mod mock;

pub use mock::MockRemoteStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use zonesync_core::PageStart;
use zonesync_types::{
    ChangeToken, DatabaseScope, DeletedRecord, QueryCursor, RawError, Record, RecordId, ZoneId,
};

/// Result reported for one item of a multi-item call.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemEvent<K: Eq + Hash, T> {
    /// Item identity.
    pub key: K,
    /// What happened to the item.
    pub result: Result<T, RawError<K>>,
}

impl<K: Eq + Hash, T> ItemEvent<K, T> {
    /// An item that succeeded.
    pub fn ok(key: K, value: T) -> Self {
        Self {
            key,
            result: Ok(value),
        }
    }

    /// An item that failed.
    pub fn failed(key: K, error: RawError<K>) -> Self {
        Self {
            key,
            result: Err(error),
        }
    }
}

/// How saved records are merged with the server copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Send only changed fields; overwrite regardless of server version.
    #[default]
    ChangedFieldsOnly,
    /// Send every field; overwrite regardless of server version.
    AllFields,
    /// Fail with a conflict when the server copy changed.
    IfServerUnchanged,
}

/// One batch of saves and deletes.
#[derive(Debug, Clone, PartialEq)]
pub struct MutateRequest {
    /// Records to save.
    pub saves: Vec<Record>,
    /// Records to delete.
    pub deletes: Vec<RecordId>,
    /// All-or-nothing when true.
    pub atomic: bool,
    /// Merge behavior for saves.
    pub overwrite: OverwritePolicy,
}

impl MutateRequest {
    /// An atomic batch with the default overwrite policy.
    pub fn atomic(saves: Vec<Record>, deletes: Vec<RecordId>) -> Self {
        Self {
            saves,
            deletes,
            atomic: true,
            overwrite: OverwritePolicy::default(),
        }
    }

    /// Items in the batch.
    pub fn len(&self) -> usize {
        self.saves.len() + self.deletes.len()
    }

    /// True when the batch carries nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-item results and final outcome of a mutate call.
#[derive(Debug, Clone, PartialEq)]
pub struct MutateResponse {
    /// One event per save, carrying the server copy on success.
    pub saved: Vec<ItemEvent<RecordId, Record>>,
    /// One event per delete.
    pub deleted: Vec<ItemEvent<RecordId, ()>>,
    /// Completion of the whole call.
    pub outcome: Result<(), RawError<RecordId>>,
}

impl MutateResponse {
    /// A call that failed before reporting any item.
    pub fn failed(error: RawError<RecordId>) -> Self {
        Self {
            saved: Vec::new(),
            deleted: Vec::new(),
            outcome: Err(error),
        }
    }
}

/// One page of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPageRequest {
    /// Query or continuation cursor.
    pub start: PageStart,
    /// Zone to search; `None` searches the whole database.
    pub zone: Option<ZoneId>,
    /// Fields to return; `None` returns all fields.
    pub desired_fields: Option<Vec<String>>,
    /// Maximum records in this page; `None` lets the server decide.
    pub limit: Option<usize>,
}

/// Matches and final outcome of one query page.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPageResponse {
    /// One event per matched record, in result order.
    pub matches: Vec<ItemEvent<RecordId, Record>>,
    /// Cursor for the next page, `None` on the last page, or the failure.
    pub outcome: Result<Option<QueryCursor>, RawError<RecordId>>,
}

impl QueryPageResponse {
    /// A final page.
    pub fn last(records: Vec<Record>) -> Self {
        Self::page(records, None)
    }

    /// A page followed by more pages.
    pub fn more(records: Vec<Record>, cursor: QueryCursor) -> Self {
        Self::page(records, Some(cursor))
    }

    fn page(records: Vec<Record>, cursor: Option<QueryCursor>) -> Self {
        Self {
            matches: records
                .into_iter()
                .map(|record| ItemEvent::ok(record.id.clone(), record))
                .collect(),
            outcome: Ok(cursor),
        }
    }

    /// A page that failed.
    pub fn failed(error: RawError<RecordId>) -> Self {
        Self {
            matches: Vec::new(),
            outcome: Err(error),
        }
    }
}

/// Database-level change fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseChangesRequest {
    /// Scope to fetch zone changes for.
    pub scope: DatabaseScope,
    /// Stored token; `None` fetches from the beginning.
    pub previous_token: Option<ChangeToken>,
    /// Keep fetching server-side until no changes are pending.
    pub fetch_all_changes: bool,
}

/// Result of a database-level change fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseChangesResponse {
    /// Zones created or modified.
    pub changed_zones: Vec<ZoneId>,
    /// Zones deleted.
    pub deleted_zones: Vec<ZoneId>,
    /// Zones purged by the user.
    pub purged_zones: Vec<ZoneId>,
    /// New token for the scope, or why it could not be produced.
    pub token_outcome: Result<ChangeToken, RawError<ZoneId>>,
    /// Completion of the whole call.
    pub outcome: Result<(), RawError<ZoneId>>,
}

impl DatabaseChangesResponse {
    /// A fetch that failed before reporting anything.
    pub fn failed(error: RawError<ZoneId>) -> Self {
        Self {
            changed_zones: Vec::new(),
            deleted_zones: Vec::new(),
            purged_zones: Vec::new(),
            token_outcome: Err(error.clone()),
            outcome: Err(error),
        }
    }
}

/// Zone-level change fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneChangesRequest {
    /// Zones to fetch, in caller order.
    pub zones: Vec<ZoneId>,
    /// Stored token per zone; `None` fetches the zone from the beginning.
    pub previous_tokens: HashMap<ZoneId, Option<ChangeToken>>,
    /// Fields to return; `None` returns all, empty returns none.
    pub desired_fields: Option<Vec<String>>,
    /// Keep fetching server-side until no changes are pending.
    pub fetch_all_changes: bool,
}

/// Result of a zone-level change fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneChangesResponse {
    /// Changed records, one event each.
    pub changed: Vec<ItemEvent<RecordId, Record>>,
    /// Deleted record stubs.
    pub deleted: Vec<DeletedRecord>,
    /// Terminal outcome per zone, in the order the store reported them.
    pub zone_outcomes: Vec<(ZoneId, Result<ChangeToken, RawError<ZoneId>>)>,
    /// Completion of the whole call.
    pub outcome: Result<(), RawError<ZoneId>>,
}

impl ZoneChangesResponse {
    /// A fetch that failed before reporting anything.
    pub fn failed(error: RawError<ZoneId>) -> Self {
        Self {
            changed: Vec::new(),
            deleted: Vec::new(),
            zone_outcomes: Vec::new(),
            outcome: Err(error),
        }
    }
}

/// The remote record store.
///
/// Implementations own transport, authentication and the wire format.
/// Change fetches must be driven to completion internally: the response
/// describes a fully caught-up state, never a resumption point.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Save and delete records in one batch.
    async fn mutate(&self, request: MutateRequest) -> MutateResponse;

    /// Fetch one page of a query.
    async fn query(&self, request: QueryPageRequest) -> QueryPageResponse;

    /// Fetch zone-level changes of a database scope.
    async fn fetch_database_changes(
        &self,
        request: DatabaseChangesRequest,
    ) -> DatabaseChangesResponse;

    /// Fetch record-level changes of a set of zones.
    async fn fetch_zone_changes(&self, request: ZoneChangesRequest) -> ZoneChangesResponse;
}

/// Run a remote call under an optional timeout. `Err` carries the limit
/// that was exceeded.
pub(crate) async fn within<F: Future>(
    limit: Option<Duration>,
    call: F,
) -> Result<F::Output, Duration> {
    match limit {
        None => Ok(call.await),
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| limit),
    }
}
