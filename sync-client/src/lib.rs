//! # sync-client
//!
//! Async sync engine for record stores organized in zones.
//!
//! This is the library applications use to move records to and from a
//! remote store and to keep up with remote changes.
//!
//! ## Features
//!
//! - **Batched Mutations**: atomic batches with server-paced retry and
//!   overflow shrinking
//! - **Paged Queries**: cursor following with early stop and cancellation
//! - **Change Tracking**: per-partition change tokens, serialized per
//!   partition, fail-closed on any error
//! - **Fault Injection**: configurable delays and synthesized failures
//! - **Live Configuration**: TOML config re-read at the start of every call
//!
//! ## Example
//!
//! ```ignore
//! use zonesync_client::{MemoryTokenStore, SyncClient, SyncConfig};
//!
//! let config = SyncConfig::from_file(Path::new("zonesync.toml"))?;
//! let client = SyncClient::new(my_store, MemoryTokenStore::new(), config)?;
//!
//! let changes = client.fetch_zone_changes(&zones, FetchMethod::AllData).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod changes;
pub mod client;
pub mod config;
pub mod gate;
pub mod mutation;
pub mod query;
pub mod remote;
pub mod tokens;

pub use changes::{DatabaseChangeSync, ZoneChangeSync};
pub use client::SyncClient;
pub use config::{BatchingConfig, ConfigError, FaultConfig, SyncConfig, TimeoutConfig};
pub use gate::{GateGuard, PartitionGate};
pub use mutation::{ItemProgress, MutationBatcher, MutationRequest, MutationResult, ProgressFn};
pub use query::{QueryPager, QueryRequest};
pub use remote::{
    DatabaseChangesRequest, DatabaseChangesResponse, ItemEvent, MockRemoteStore, MutateRequest,
    MutateResponse, OverwritePolicy, QueryPageRequest, QueryPageResponse, RemoteStore,
    ZoneChangesRequest, ZoneChangesResponse,
};
pub use tokens::{MemoryTokenStore, TokenStore};

pub use zonesync_core::FaultPolicy;
pub use zonesync_types::*;
