//! Batched record mutations.
//!
//! [`MutationBatcher`] turns an arbitrarily large set of saves and deletes
//! into a sequence of atomic remote batches. Each batch is retried on its
//! own when the server asks for it; a batch that is too large makes the whole
//! mutation start over at half the size, discarding what was collected so
//! far (the remote side effects of completed batches stay).
//!
//! ```text
//! submit ─► plan(size) ─► batch #0 ─► batch #1 ─► ... ─► Ok(result)
//!              ▲              │ overflow
//!              └── size / 2 ◄─┘
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use zonesync_core::{
    classify, escalate, shrink, Batch, BatchPlan, RetryDecision, RetryPolicy,
};
use zonesync_types::{RawError, Record, RecordError, RecordId};

use crate::config::SyncConfig;
use crate::remote::{within, MutateRequest, MutateResponse, RemoteStore};

/// Per-item progress reported while a mutation runs.
#[derive(Debug, Clone, Copy)]
pub enum ItemProgress<'a> {
    /// The server accepted this record.
    Saved(&'a Record),
    /// The server deleted this record.
    Deleted(&'a RecordId),
    /// The item failed; its batch will fail with it.
    Failed(&'a RecordId, &'a RecordError),
}

/// Progress callback.
pub type ProgressFn = Arc<dyn Fn(ItemProgress<'_>) + Send + Sync>;

/// A set of saves and deletes plus per-call options.
///
/// Options left unset are taken from the configuration when the mutation
/// starts.
#[derive(Clone, Default)]
pub struct MutationRequest {
    saves: Vec<Record>,
    deletes: Vec<RecordId>,
    batch_size: Option<usize>,
    auto_shrink_on_overflow: Option<bool>,
    auto_retry: Option<bool>,
    progress: Option<ProgressFn>,
    cancel: Option<CancellationToken>,
}

impl MutationRequest {
    /// Create an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records to save.
    pub fn save(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.saves.extend(records);
        self
    }

    /// Add records to delete.
    pub fn delete(mut self, ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.deletes.extend(ids);
        self
    }

    /// Items per save chunk and per delete chunk.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Halve and restart on overflow instead of failing.
    pub fn auto_shrink_on_overflow(mut self, enabled: bool) -> Self {
        self.auto_shrink_on_overflow = Some(enabled);
        self
    }

    /// Retry retriable failures that carry a server delay.
    pub fn auto_retry(mut self, enabled: bool) -> Self {
        self.auto_retry = Some(enabled);
        self
    }

    /// Report every item outcome as it arrives.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ItemProgress<'_>) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Stop before the next batch once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Records to save.
    pub fn saves(&self) -> &[Record] {
        &self.saves
    }

    /// Records to delete.
    pub fn deletes(&self) -> &[RecordId] {
        &self.deletes
    }

    /// True when there is nothing to save or delete.
    pub fn is_empty(&self) -> bool {
        self.saves.is_empty() && self.deletes.is_empty()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|token| token.is_cancelled())
    }

    fn report(&self, progress: ItemProgress<'_>) {
        if let Some(callback) = &self.progress {
            callback(progress);
        }
    }
}

impl fmt::Debug for MutationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationRequest")
            .field("saves", &self.saves.len())
            .field("deletes", &self.deletes.len())
            .field("batch_size", &self.batch_size)
            .field("auto_shrink_on_overflow", &self.auto_shrink_on_overflow)
            .field("auto_retry", &self.auto_retry)
            .field("progress", &self.progress.is_some())
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Outcome of a successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    /// Server copies of the saved records, in submission order.
    pub saved: Vec<Record>,
    /// Deleted identifiers, in submission order.
    pub deleted: Vec<RecordId>,
    /// Remote mutate calls made, including retries and discarded attempts.
    pub remote_calls: usize,
    /// Batch size in effect when the mutation finished.
    pub final_batch_size: usize,
}

/// Why a batch did not complete.
enum BatchFailure {
    /// Too large at the current size.
    Overflow(RecordError),
    /// Anything else; ends the mutation.
    Fatal(RecordError),
}

enum Applied {
    Saved(Record),
    Deleted,
}

/// Executes mutations in atomic batches against a remote store.
pub struct MutationBatcher<R> {
    remote: Arc<R>,
    config: watch::Receiver<SyncConfig>,
}

impl<R> Clone for MutationBatcher<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            config: self.config.clone(),
        }
    }
}

impl<R: RemoteStore> MutationBatcher<R> {
    /// Create a batcher over `remote`, reading options from `config`.
    pub fn new(remote: Arc<R>, config: watch::Receiver<SyncConfig>) -> Self {
        Self { remote, config }
    }

    /// Save and delete everything in `request`.
    ///
    /// # Errors
    ///
    /// - internal error when the request is empty
    /// - the cancelled classification once cancellation is observed
    /// - the first failing item's error, with every failing item in
    ///   `batch_errors`, when a batch reports item failures
    /// - the overflow error when shrinking is disabled or the size is 1
    pub async fn submit(&self, request: MutationRequest) -> Result<MutationResult, RecordError> {
        if request.is_empty() {
            return Err(RecordError::internal("mutation has nothing to save or delete"));
        }

        let config = self.config.borrow().clone();
        let policy = RetryPolicy {
            max_attempts: config.batching.max_attempts,
            auto_retry: request.auto_retry.unwrap_or(config.batching.auto_retry),
            auto_shrink_on_overflow: request
                .auto_shrink_on_overflow
                .unwrap_or(config.batching.auto_shrink_on_overflow),
        };
        let timeout = config.timeouts.request_timeout();
        let mut batch_size = request
            .batch_size
            .unwrap_or(config.batching.batch_size)
            .max(1);
        let mut remote_calls = 0;

        'restart: loop {
            let mut saved = Vec::with_capacity(request.saves.len());
            let mut deleted = Vec::with_capacity(request.deletes.len());

            for batch in BatchPlan::new(&request.saves, &request.deletes, batch_size) {
                if request.is_cancelled() {
                    tracing::info!(batch = batch.index, "mutation cancelled");
                    return Err(RecordError::cancelled());
                }

                tracing::debug!(
                    batch = batch.index,
                    saves = batch.saves.len(),
                    deletes = batch.deletes.len(),
                    batch_size,
                    "submitting batch"
                );

                match self
                    .submit_batch(&request, &batch, policy, timeout, &mut remote_calls)
                    .await
                {
                    Ok(applied) => {
                        for (id, outcome) in applied {
                            match outcome {
                                Applied::Saved(record) => saved.push(record),
                                Applied::Deleted => deleted.push(id),
                            }
                        }
                    }
                    Err(BatchFailure::Overflow(error)) => match shrink(batch_size) {
                        Some(smaller) => {
                            tracing::warn!(
                                from = batch_size,
                                to = smaller,
                                "batch too large, restarting mutation"
                            );
                            batch_size = smaller;
                            continue 'restart;
                        }
                        None => return Err(error),
                    },
                    Err(BatchFailure::Fatal(error)) => return Err(error),
                }
            }

            return Ok(MutationResult {
                saved,
                deleted,
                remote_calls,
                final_batch_size: batch_size,
            });
        }
    }

    async fn submit_batch(
        &self,
        request: &MutationRequest,
        batch: &Batch<'_, Record, RecordId>,
        policy: RetryPolicy,
        timeout: Option<Duration>,
        remote_calls: &mut usize,
    ) -> Result<Vec<(RecordId, Applied)>, BatchFailure> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            *remote_calls += 1;

            let call = self.remote.mutate(MutateRequest::atomic(
                batch.saves.to_vec(),
                batch.deletes.to_vec(),
            ));
            let result = match within(timeout, call).await {
                Ok(response) => apply_response(request, response),
                Err(limit) => Err(classify(RawError::Timeout(limit))),
            };

            let error = match result {
                Ok(applied) => return Ok(applied),
                Err(error) => error,
            };

            match policy.decide(attempt, &error) {
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        batch = batch.index,
                        attempt,
                        code = %error.code,
                        ?delay,
                        "batch failed, retrying"
                    );
                    if !pause(delay, request.cancel.as_ref()).await {
                        tracing::info!(batch = batch.index, "mutation cancelled during retry wait");
                        return Err(BatchFailure::Fatal(RecordError::cancelled()));
                    }
                }
                RetryDecision::Shrink => return Err(BatchFailure::Overflow(error)),
                RetryDecision::Surface => return Err(BatchFailure::Fatal(error)),
            }
        }
    }
}

/// Report item progress and escalate item failures to the batch.
fn apply_response(
    request: &MutationRequest,
    response: MutateResponse,
) -> Result<Vec<(RecordId, Applied)>, RecordError> {
    let mut items = Vec::with_capacity(response.saved.len() + response.deleted.len());

    for event in response.saved {
        let result = event.result.map_err(classify);
        match &result {
            Ok(record) => request.report(ItemProgress::Saved(record)),
            Err(error) => request.report(ItemProgress::Failed(&event.key, error)),
        }
        items.push((event.key, result.map(Applied::Saved)));
    }

    for event in response.deleted {
        let result = event.result.map_err(classify);
        match &result {
            Ok(()) => request.report(ItemProgress::Deleted(&event.key)),
            Err(error) => request.report(ItemProgress::Failed(&event.key, error)),
        }
        items.push((event.key, result.map(|()| Applied::Deleted)));
    }

    escalate(items, response.outcome.map_err(classify))
}

/// Sleep for `delay`. Returns false when cancelled first.
async fn pause(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        None => {
            tokio::time::sleep(delay).await;
            true
        }
        Some(token) => {
            tokio::select! {
                _ = tokio::time::sleep(delay) => true,
                _ = token.cancelled() => false,
            }
        }
    }
}
