//! SyncClient - the main interface for zonesync.
//!
//! This module provides [`SyncClient`], which bundles the batcher, the query
//! pager and both change coordinators over one remote store, one token store
//! and one live configuration.
//!
//! # Architecture
//!
//! ```text
//! Application → SyncClient ─┬─ MutationBatcher ──┐
//!                           ├─ QueryPager ───────┼─► RemoteStore
//!                           ├─ DatabaseChangeSync┤
//!                           └─ ZoneChangeSync ───┘
//!                                    ↓
//!                               TokenStore
//! ```
//!
//! Decisions (batching, retry, settlement) come from sync-core; this crate
//! only performs the I/O.
//!
//! # Example
//!
//! ```ignore
//! use zonesync_client::{MemoryTokenStore, MockRemoteStore, MutationRequest, SyncClient, SyncConfig};
//!
//! let client = SyncClient::new(MockRemoteStore::new(), MemoryTokenStore::new(), SyncConfig::default())?;
//! let result = client.submit(MutationRequest::new().save(records)).await?;
//! let changes = client.fetch_zone_changes(&[zone], FetchMethod::AllData).await?;
//! ```

use std::sync::Arc;
use tokio::sync::watch;
use zonesync_types::{
    DatabaseChangeSet, DatabaseScope, FetchMethod, Record, RecordError, ZoneChangeSet, ZoneError,
    ZoneId,
};

use crate::changes::{DatabaseChangeSync, ZoneChangeSync};
use crate::config::{ConfigError, SyncConfig};
use crate::mutation::{MutationBatcher, MutationRequest, MutationResult};
use crate::query::{QueryPager, QueryRequest};
use crate::remote::RemoteStore;
use crate::tokens::TokenStore;

/// Sync engine facade.
pub struct SyncClient<R, T> {
    remote: Arc<R>,
    tokens: Arc<T>,
    config: watch::Sender<SyncConfig>,
    mutations: MutationBatcher<R>,
    queries: QueryPager<R>,
    database: DatabaseChangeSync<R, T>,
    zones: ZoneChangeSync<R, T>,
}

impl<R: RemoteStore, T: TokenStore> SyncClient<R, T> {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(remote: R, tokens: T, config: SyncConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let remote = Arc::new(remote);
        let tokens = Arc::new(tokens);
        let (sender, receiver) = watch::channel(config);

        Ok(Self {
            mutations: MutationBatcher::new(Arc::clone(&remote), receiver.clone()),
            queries: QueryPager::new(Arc::clone(&remote), receiver.clone()),
            database: DatabaseChangeSync::new(
                Arc::clone(&remote),
                Arc::clone(&tokens),
                receiver.clone(),
            ),
            zones: ZoneChangeSync::new(Arc::clone(&remote), Arc::clone(&tokens), receiver),
            remote,
            tokens,
            config: sender,
        })
    }

    /// Save and delete records in atomic batches.
    pub async fn submit(&self, request: MutationRequest) -> Result<MutationResult, RecordError> {
        self.mutations.submit(request).await
    }

    /// Run a query to completion.
    pub async fn query(&self, request: QueryRequest) -> Result<Vec<Record>, RecordError> {
        self.queries.run(request).await
    }

    /// Fetch zone-level changes of a database scope.
    pub async fn fetch_database_changes(
        &self,
        scope: DatabaseScope,
        method: FetchMethod,
    ) -> Result<DatabaseChangeSet, ZoneError> {
        self.database.fetch_changes(scope, method).await
    }

    /// Fetch record-level changes of a set of zones.
    pub async fn fetch_zone_changes(
        &self,
        zones: &[ZoneId],
        method: FetchMethod,
    ) -> Result<ZoneChangeSet, ZoneError> {
        self.zones.fetch_changes(zones, method).await
    }

    /// Replace the configuration. Operations already running keep the
    /// snapshot they started with.
    ///
    /// # Errors
    ///
    /// Returns an error and keeps the current configuration if `config`
    /// does not validate.
    pub fn update_config(&self, config: SyncConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config.send_replace(config);
        tracing::info!("configuration updated");
        Ok(())
    }

    /// Current configuration.
    pub fn config(&self) -> SyncConfig {
        self.config.borrow().clone()
    }

    /// Forget every stored change token. The next fetches start from scratch.
    pub async fn reset_tokens(&self) {
        self.tokens.clear().await;
        tracing::info!("change tokens reset");
    }

    /// The remote store.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// The token store.
    pub fn token_store(&self) -> &T {
        &self.tokens
    }
}
