//! # sync-core
//!
//! Pure logic for zonesync (no I/O, instant tests).
//!
//! This crate holds the decisions the client engine makes, without any
//! network, clock or storage access:
//! - [`classify`] - raw remote errors into [`ClassifiedError`](zonesync_types::ClassifiedError)
//! - [`BatchPlan`] - lockstep save/delete chunking and overflow shrinking
//! - [`RetryPolicy`] - bounded, server-paced retry
//! - [`PageAccumulator`] - cursor-following query aggregation
//! - [`settle`] - token commit / clear / error precedence after a change fetch
//! - [`FaultPolicy`] - injected delays and synthesized failures
//!
//! The I/O is performed by `sync-client`, which executes these decisions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod classify;
pub mod escalate;
pub mod fault;
pub mod paging;
pub mod retry;
pub mod settle;

pub use batch::{batch_count, shrink, Batch, BatchPlan, DEFAULT_BATCH_SIZE};
pub use classify::{classify, retry_delay, transport_code};
pub use escalate::{escalate, first_failure};
pub use fault::FaultPolicy;
pub use paging::{PageAccumulator, PageStart, PageStep};
pub use retry::{RetryDecision, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use settle::{settle, FetchReport, PartitionReport, Settlement};
