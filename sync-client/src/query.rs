//! Paged queries.
//!
//! [`QueryPager`] follows continuation cursors until the result is complete
//! and returns every matching record in page order. Any failure, including a
//! single failed match inside an otherwise successful page, aborts the query
//! and discards the pages collected so far.

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use zonesync_core::{classify, escalate, PageAccumulator, PageStart, PageStep};
use zonesync_types::{Query, RawError, Record, RecordError, RecordId, ZoneId};

use crate::config::SyncConfig;
use crate::remote::{within, QueryPageRequest, RemoteStore};

/// A query plus per-call options.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    query: Query,
    zone: Option<ZoneId>,
    desired_fields: Option<Vec<String>>,
    results_limit: Option<usize>,
    cancel: Option<CancellationToken>,
}

impl QueryRequest {
    /// Query the whole database, returning all fields.
    pub fn new(query: Query) -> Self {
        Self {
            query,
            zone: None,
            desired_fields: None,
            results_limit: None,
            cancel: None,
        }
    }

    /// Restrict the query to one zone.
    pub fn in_zone(mut self, zone: ZoneId) -> Self {
        self.zone = Some(zone);
        self
    }

    /// Return only these fields.
    pub fn desired_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.desired_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Ask for at most `limit` records per page and stop after the first page.
    pub fn results_limit(mut self, limit: usize) -> Self {
        self.results_limit = Some(limit);
        self
    }

    /// Stop before following the next cursor once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|token| token.is_cancelled())
    }
}

/// Runs queries to completion against a remote store.
pub struct QueryPager<R> {
    remote: Arc<R>,
    config: watch::Receiver<SyncConfig>,
}

impl<R> Clone for QueryPager<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            config: self.config.clone(),
        }
    }
}

impl<R: RemoteStore> QueryPager<R> {
    /// Create a pager over `remote`.
    pub fn new(remote: Arc<R>, config: watch::Receiver<SyncConfig>) -> Self {
        Self { remote, config }
    }

    /// Fetch every page of `request` and return the records in order.
    pub async fn run(&self, request: QueryRequest) -> Result<Vec<Record>, RecordError> {
        let timeout = self.config.borrow().timeouts.request_timeout();
        let mut pages = PageAccumulator::new(request.results_limit);
        let mut start = PageStart::Query(request.query.clone());

        loop {
            let page = QueryPageRequest {
                start,
                zone: request.zone.clone(),
                desired_fields: request.desired_fields.clone(),
                limit: request.results_limit,
            };
            let response = within(timeout, self.remote.query(page))
                .await
                .map_err(|limit| classify(RawError::<RecordId>::Timeout(limit)))?;

            let (overall, cursor) = match response.outcome {
                Ok(cursor) => (Ok(()), cursor),
                Err(error) => (Err(classify(error)), None),
            };
            let matches = response
                .matches
                .into_iter()
                .map(|event| (event.key, event.result.map_err(classify)))
                .collect();
            let records = escalate(matches, overall)?
                .into_iter()
                .map(|(_, record)| record)
                .collect();

            match pages.on_page(records, cursor) {
                PageStep::Done(records) => {
                    tracing::debug!(pages = pages.pages(), records = records.len(), "query complete");
                    return Ok(records);
                }
                PageStep::Continue(cursor) => {
                    if request.is_cancelled() {
                        tracing::info!(pages = pages.pages(), "query cancelled");
                        return Err(RecordError::cancelled());
                    }
                    tracing::debug!(pages = pages.pages(), "following query cursor");
                    start = PageStart::Cursor(cursor);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{ItemEvent, MockRemoteStore, QueryPageResponse};
    use zonesync_types::{ErrorCode, QueryCursor, RecordId};

    fn page_of(prefix: &str, n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::new(
                    "Note",
                    RecordId::with_name(format!("{}{}", prefix, i), ZoneId::default_zone()),
                )
            })
            .collect()
    }

    fn pager(store: &MockRemoteStore) -> QueryPager<MockRemoteStore> {
        let (_tx, rx) = watch::channel(SyncConfig::default());
        QueryPager::new(Arc::new(store.clone()), rx)
    }

    fn cursor(n: u8) -> QueryCursor {
        QueryCursor::from_bytes(vec![n])
    }

    // ===========================================
    // Paging Tests
    // ===========================================

    #[tokio::test]
    async fn follows_cursors_in_order() {
        let store = MockRemoteStore::new();
        store.queue_query(QueryPageResponse::more(page_of("a", 3), cursor(1)));
        store.queue_query(QueryPageResponse::more(page_of("b", 3), cursor(2)));
        store.queue_query(QueryPageResponse::last(page_of("c", 3)));

        let records = pager(&store)
            .run(QueryRequest::new(Query::all("Note")))
            .await
            .unwrap();

        let names: Vec<_> = records.iter().map(|r| r.id.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["a0", "a1", "a2", "b0", "b1", "b2", "c0", "c1", "c2"]
        );
        let starts: Vec<_> = store.query_requests().into_iter().map(|r| r.start).collect();
        assert_eq!(
            starts,
            vec![
                PageStart::Query(Query::all("Note")),
                PageStart::Cursor(cursor(1)),
                PageStart::Cursor(cursor(2)),
            ]
        );
    }

    #[tokio::test]
    async fn results_limit_stops_after_first_page() {
        let store = MockRemoteStore::new();
        store.queue_query(QueryPageResponse::more(page_of("a", 3), cursor(1)));

        let records = pager(&store)
            .run(QueryRequest::new(Query::all("Note")).results_limit(3))
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(store.query_requests().len(), 1);
        assert_eq!(store.query_requests()[0].limit, Some(3));
    }

    #[tokio::test]
    async fn zone_and_fields_are_forwarded() {
        let store = MockRemoteStore::new();

        pager(&store)
            .run(
                QueryRequest::new(Query::all("Note"))
                    .in_zone(ZoneId::new("work"))
                    .desired_fields(["title"]),
            )
            .await
            .unwrap();

        let sent = &store.query_requests()[0];
        assert_eq!(sent.zone, Some(ZoneId::new("work")));
        assert_eq!(sent.desired_fields, Some(vec!["title".to_string()]));
    }

    // ===========================================
    // Failure Tests
    // ===========================================

    #[tokio::test]
    async fn failed_page_discards_earlier_pages() {
        let store = MockRemoteStore::new();
        store.queue_query(QueryPageResponse::more(page_of("a", 3), cursor(1)));
        store.queue_query(QueryPageResponse::failed(RawError::store(
            ErrorCode::ServiceUnavailable,
            "down",
        )));

        let error = pager(&store)
            .run(QueryRequest::new(Query::all("Note")))
            .await
            .unwrap_err();

        assert_eq!(error.code, ErrorCode::ServiceUnavailable);
        assert_eq!(store.query_requests().len(), 2);
    }

    #[tokio::test]
    async fn failed_match_fails_successful_page() {
        let store = MockRemoteStore::new();
        let bad = RecordId::with_name("bad", ZoneId::default_zone());
        store.queue_query(QueryPageResponse {
            matches: vec![ItemEvent::failed(
                bad.clone(),
                RawError::store(ErrorCode::PermissionFailure, "denied"),
            )],
            outcome: Ok(None),
        });

        let error = pager(&store)
            .run(QueryRequest::new(Query::all("Note")))
            .await
            .unwrap_err();

        assert_eq!(error.code, ErrorCode::PermissionFailure);
        assert!(error.sub_error(&bad).is_some());
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_page() {
        let store = MockRemoteStore::new();
        store.queue_query(QueryPageResponse::more(page_of("a", 3), cursor(1)));
        let token = CancellationToken::new();
        token.cancel();

        let error = pager(&store)
            .run(QueryRequest::new(Query::all("Note")).with_cancellation(token))
            .await
            .unwrap_err();

        assert!(error.is_cancelled());
        assert_eq!(store.query_requests().len(), 1);
    }
}
