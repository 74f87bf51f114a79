//! Mock remote store for testing.
//!
//! Allows queueing responses per call kind and capturing requests for
//! verification. When a queue is empty the mock answers like a healthy
//! store: saves are echoed back with a fresh change tag, queries return one
//! empty final page, and change fetches return no changes plus a new token.

use super::{
    DatabaseChangesRequest, DatabaseChangesResponse, ItemEvent, MutateRequest, MutateResponse,
    QueryPageRequest, QueryPageResponse, RemoteStore, ZoneChangesRequest, ZoneChangesResponse,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use zonesync_types::ChangeToken;

/// Mock remote store for testing.
///
/// Clones share state, so a test can keep one handle while the engine owns
/// another.
#[derive(Debug, Default)]
pub struct MockRemoteStore {
    inner: Arc<Mutex<MockRemoteStoreInner>>,
}

#[derive(Debug, Default)]
struct MockRemoteStoreInner {
    latency: Option<Duration>,
    next_tag: u64,
    next_token: u64,
    mutate_requests: Vec<MutateRequest>,
    query_requests: Vec<QueryPageRequest>,
    database_requests: Vec<DatabaseChangesRequest>,
    zone_requests: Vec<ZoneChangesRequest>,
    mutate_queue: VecDeque<MutateResponse>,
    query_queue: VecDeque<QueryPageResponse>,
    database_queue: VecDeque<DatabaseChangesResponse>,
    zone_queue: VecDeque<ZoneChangesResponse>,
}

impl MockRemoteStore {
    /// Create a new mock store.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockRemoteStoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Delay every call by this long before answering.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    /// Queue the response for the next `mutate()` call.
    pub fn queue_mutate(&self, response: MutateResponse) {
        self.state().mutate_queue.push_back(response);
    }

    /// Queue the response for the next `query()` call.
    pub fn queue_query(&self, response: QueryPageResponse) {
        self.state().query_queue.push_back(response);
    }

    /// Queue the response for the next `fetch_database_changes()` call.
    pub fn queue_database_changes(&self, response: DatabaseChangesResponse) {
        self.state().database_queue.push_back(response);
    }

    /// Queue the response for the next `fetch_zone_changes()` call.
    pub fn queue_zone_changes(&self, response: ZoneChangesResponse) {
        self.state().zone_queue.push_back(response);
    }

    /// All mutate requests received, in order.
    pub fn mutate_requests(&self) -> Vec<MutateRequest> {
        self.state().mutate_requests.clone()
    }

    /// All query requests received, in order.
    pub fn query_requests(&self) -> Vec<QueryPageRequest> {
        self.state().query_requests.clone()
    }

    /// All database change requests received, in order.
    pub fn database_requests(&self) -> Vec<DatabaseChangesRequest> {
        self.state().database_requests.clone()
    }

    /// All zone change requests received, in order.
    pub fn zone_requests(&self) -> Vec<ZoneChangesRequest> {
        self.state().zone_requests.clone()
    }

    /// Number of remote calls of any kind.
    pub fn total_calls(&self) -> usize {
        let state = self.state();
        state.mutate_requests.len()
            + state.query_requests.len()
            + state.database_requests.len()
            + state.zone_requests.len()
    }

    /// Clear all state (requests, queues, latency).
    pub fn reset(&self) {
        *self.state() = MockRemoteStoreInner::default();
    }

    async fn simulate_latency(&self) {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Clone for MockRemoteStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl MockRemoteStoreInner {
    fn fresh_token(&mut self, prefix: &str) -> ChangeToken {
        self.next_token += 1;
        ChangeToken::from_bytes(format!("{}#{}", prefix, self.next_token).into_bytes())
    }

    fn echo_mutation(&mut self, request: &MutateRequest) -> MutateResponse {
        let mut saved = Vec::with_capacity(request.saves.len());
        for record in &request.saves {
            self.next_tag += 1;
            let mut stored = record.clone();
            stored.change_tag = Some(format!("tag-{}", self.next_tag));
            saved.push(ItemEvent::ok(record.id.clone(), stored));
        }
        let deleted = request
            .deletes
            .iter()
            .map(|id| ItemEvent::ok(id.clone(), ()))
            .collect();
        MutateResponse {
            saved,
            deleted,
            outcome: Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn mutate(&self, request: MutateRequest) -> MutateResponse {
        self.state().mutate_requests.push(request.clone());
        self.simulate_latency().await;

        let mut state = self.state();
        match state.mutate_queue.pop_front() {
            Some(response) => response,
            None => state.echo_mutation(&request),
        }
    }

    async fn query(&self, request: QueryPageRequest) -> QueryPageResponse {
        self.state().query_requests.push(request);
        self.simulate_latency().await;

        self.state()
            .query_queue
            .pop_front()
            .unwrap_or_else(|| QueryPageResponse::last(Vec::new()))
    }

    async fn fetch_database_changes(
        &self,
        request: DatabaseChangesRequest,
    ) -> DatabaseChangesResponse {
        let scope = request.scope;
        self.state().database_requests.push(request);
        self.simulate_latency().await;

        let mut state = self.state();
        match state.database_queue.pop_front() {
            Some(response) => response,
            None => DatabaseChangesResponse {
                changed_zones: Vec::new(),
                deleted_zones: Vec::new(),
                purged_zones: Vec::new(),
                token_outcome: Ok(state.fresh_token(&format!("database:{}", scope))),
                outcome: Ok(()),
            },
        }
    }

    async fn fetch_zone_changes(&self, request: ZoneChangesRequest) -> ZoneChangesResponse {
        let zones = request.zones.clone();
        self.state().zone_requests.push(request);
        self.simulate_latency().await;

        let mut state = self.state();
        match state.zone_queue.pop_front() {
            Some(response) => response,
            None => {
                let zone_outcomes = zones
                    .into_iter()
                    .map(|zone| {
                        let token = state.fresh_token(&format!("zone:{}", zone));
                        (zone, Ok(token))
                    })
                    .collect();
                ZoneChangesResponse {
                    changed: Vec::new(),
                    deleted: Vec::new(),
                    zone_outcomes,
                    outcome: Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_core::PageStart;
    use zonesync_types::{
        DatabaseScope, ErrorCode, Query, RawError, Record, RecordId, ZoneId,
    };

    fn note(name: &str) -> Record {
        Record::new("Note", RecordId::with_name(name, ZoneId::default_zone()))
    }

    // ===========================================
    // Default Behavior Tests
    // ===========================================

    #[tokio::test]
    async fn mutate_echoes_saves_with_change_tags() {
        let store = MockRemoteStore::new();
        let request = MutateRequest::atomic(
            vec![note("a"), note("b")],
            vec![RecordId::with_name("gone", ZoneId::default_zone())],
        );

        let response = store.mutate(request).await;

        assert!(response.outcome.is_ok());
        assert_eq!(response.saved.len(), 2);
        assert_eq!(response.deleted.len(), 1);
        let tags: Vec<_> = response
            .saved
            .iter()
            .map(|e| e.result.as_ref().unwrap().change_tag.clone())
            .collect();
        assert_eq!(tags, vec![Some("tag-1".into()), Some("tag-2".into())]);
    }

    #[tokio::test]
    async fn zone_fetch_issues_distinct_tokens() {
        let store = MockRemoteStore::new();
        let request = ZoneChangesRequest {
            zones: vec![ZoneId::new("a"), ZoneId::new("b")],
            previous_tokens: Default::default(),
            desired_fields: None,
            fetch_all_changes: true,
        };

        let response = store.fetch_zone_changes(request).await;

        assert_eq!(response.zone_outcomes.len(), 2);
        let first = response.zone_outcomes[0].1.clone().unwrap();
        let second = response.zone_outcomes[1].1.clone().unwrap();
        assert_ne!(first, second);
    }

    // ===========================================
    // Queue and Capture Tests
    // ===========================================

    #[tokio::test]
    async fn queued_responses_are_served_in_order() {
        let store = MockRemoteStore::new();
        store.queue_mutate(MutateResponse::failed(RawError::store(
            ErrorCode::ZoneBusy,
            "busy",
        )));

        let first = store.mutate(MutateRequest::atomic(vec![note("a")], vec![])).await;
        let second = store.mutate(MutateRequest::atomic(vec![note("a")], vec![])).await;

        assert!(first.outcome.is_err());
        assert!(second.outcome.is_ok());
        assert_eq!(store.mutate_requests().len(), 2);
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let store = MockRemoteStore::new();
        let other = store.clone();

        other
            .query(QueryPageRequest {
                start: PageStart::Query(Query::all("Note")),
                zone: None,
                desired_fields: None,
                limit: None,
            })
            .await;
        other
            .fetch_database_changes(DatabaseChangesRequest {
                scope: DatabaseScope::Private,
                previous_token: None,
                fetch_all_changes: true,
            })
            .await;

        assert_eq!(store.query_requests().len(), 1);
        assert_eq!(store.database_requests().len(), 1);
        assert_eq!(store.total_calls(), 2);
    }

    #[tokio::test]
    async fn reset_clears_all() {
        let store = MockRemoteStore::new();
        store.queue_query(QueryPageResponse::last(vec![note("x")]));
        store.mutate(MutateRequest::atomic(vec![note("a")], vec![])).await;

        store.reset();

        assert_eq!(store.total_calls(), 0);
        let page = store
            .query(QueryPageRequest {
                start: PageStart::Query(Query::all("Note")),
                zone: None,
                desired_fields: None,
                limit: None,
            })
            .await;
        assert!(page.matches.is_empty());
    }
}
