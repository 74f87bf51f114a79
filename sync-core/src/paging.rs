//! Query pagination state.
//!
//! A paged query either starts from the query itself or resumes from a
//! cursor handed out by the previous page. The accumulator decides after
//! each page whether to stop or follow the cursor; errors are the caller's
//! concern and simply drop the accumulator, discarding earlier pages.

use zonesync_types::{Query, QueryCursor};

/// Where the next page starts.
#[derive(Debug, Clone, PartialEq)]
pub enum PageStart {
    /// First page of a query.
    Query(Query),
    /// Continuation of a previous page.
    Cursor(QueryCursor),
}

/// What to do after a page completed successfully.
#[derive(Debug, PartialEq)]
pub enum PageStep<R> {
    /// Fetch the next page from this cursor.
    Continue(QueryCursor),
    /// The result is complete (or capped), in page order.
    Done(Vec<R>),
}

/// Accumulates records across pages in order.
#[derive(Debug)]
pub struct PageAccumulator<R> {
    records: Vec<R>,
    results_limit: Option<usize>,
    pages: usize,
}

impl<R> PageAccumulator<R> {
    /// Start accumulating. With a `results_limit` the first page that
    /// offers a cursor ends the query instead of following it.
    pub fn new(results_limit: Option<usize>) -> Self {
        Self {
            records: Vec::new(),
            results_limit,
            pages: 0,
        }
    }

    /// Record a successful page.
    pub fn on_page(&mut self, records: Vec<R>, cursor: Option<QueryCursor>) -> PageStep<R> {
        self.records.extend(records);
        self.pages += 1;

        match cursor {
            Some(cursor) if self.results_limit.is_none() => PageStep::Continue(cursor),
            _ => PageStep::Done(std::mem::take(&mut self.records)),
        }
    }

    /// Pages recorded so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Records accumulated so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
