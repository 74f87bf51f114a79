//! Incremental change fetching.
//!
//! Two coordinators share one algorithm:
//!
//! ```text
//! gate(keys) ─► fault policy ─► read tokens ─► fetch ─► settle ─► write tokens
//! ```
//!
//! [`DatabaseChangeSync`] tracks which zones of a database scope changed;
//! [`ZoneChangeSync`] tracks which records of a set of zones changed. Each
//! owns its own [`PartitionGate`], so the two never block each other, while
//! two calls of the same coordinator on overlapping partitions run one after
//! the other in arrival order. The token store may be shared.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use zonesync_core::{
    classify, escalate, settle, FaultPolicy, FetchReport, PartitionReport, Settlement,
};
use zonesync_types::{
    ChangeSet, ChangeToken, DatabaseChangeSet, DatabaseScope, FetchMethod, PartitionKey, RawError,
    RecordId, ZoneChangeSet, ZoneDeletion, ZoneError, ZoneId,
};

use crate::config::SyncConfig;
use crate::gate::PartitionGate;
use crate::remote::{within, DatabaseChangesRequest, RemoteStore, ZoneChangesRequest};
use crate::tokens::TokenStore;

/// State and steps shared by both coordinators.
struct Coordinator<R, T> {
    remote: Arc<R>,
    tokens: Arc<T>,
    config: watch::Receiver<SyncConfig>,
    gate: PartitionGate,
}

impl<R: RemoteStore, T: TokenStore> Coordinator<R, T> {
    fn new(remote: Arc<R>, tokens: Arc<T>, config: watch::Receiver<SyncConfig>) -> Self {
        Self {
            remote,
            tokens,
            config,
            gate: PartitionGate::new(),
        }
    }

    fn snapshot(&self) -> SyncConfig {
        self.config.borrow().clone()
    }

    /// Apply the configured delay, then fail if the policy says so.
    async fn inject(&self, policy: &FaultPolicy, keys: &[ZoneId]) -> Result<(), ZoneError> {
        if let Some(delay) = policy.delay() {
            tracing::debug!(?delay, "delaying change fetch");
            tokio::time::sleep(delay).await;
        }
        match policy.synthesize(keys) {
            Some(error) => {
                tracing::warn!(code = %error.code, "injected change fetch failure");
                Err(error)
            }
            None => Ok(()),
        }
    }

    /// Persist the outcome of a settled fetch.
    async fn apply(
        &self,
        settlement: Settlement,
    ) -> Result<HashMap<PartitionKey, ChangeToken>, ZoneError> {
        match settlement {
            Settlement::Commit(tokens) => {
                for (key, token) in &tokens {
                    self.tokens.store(Some(token.clone()), key).await;
                    tracing::debug!(partition = %key, %token, "change token persisted");
                }
                Ok(tokens)
            }
            Settlement::Fail { error, clear } => {
                if let Some(key) = clear {
                    tracing::warn!(partition = %key, "change token expired, clearing");
                    self.tokens.store(None, &key).await;
                }
                Err(error)
            }
        }
    }
}

/// Database-level change fetching: zones created, changed or removed.
pub struct DatabaseChangeSync<R, T> {
    core: Coordinator<R, T>,
}

impl<R: RemoteStore, T: TokenStore> DatabaseChangeSync<R, T> {
    /// Create a coordinator with its own gate.
    pub fn new(remote: Arc<R>, tokens: Arc<T>, config: watch::Receiver<SyncConfig>) -> Self {
        Self {
            core: Coordinator::new(remote, tokens, config),
        }
    }

    /// Fetch zone changes of `scope` since its stored token.
    ///
    /// On success the new token is already persisted. With
    /// [`FetchMethod::TokenOnly`] the returned set carries only the token.
    ///
    /// # Errors
    ///
    /// Returns the classified failure; an expired token is cleared first.
    pub async fn fetch_changes(
        &self,
        scope: DatabaseScope,
        method: FetchMethod,
    ) -> Result<DatabaseChangeSet, ZoneError> {
        let key = PartitionKey::Database(scope);
        let _guard = self.core.gate.acquire(std::slice::from_ref(&key)).await;

        let config = self.core.snapshot();
        self.core
            .inject(&config.faults.database_changes, &[ZoneId::default_zone()])
            .await?;

        let previous_token = self.core.tokens.token_for(&key).await;
        tracing::debug!(%scope, has_token = previous_token.is_some(), "fetching database changes");

        let request = DatabaseChangesRequest {
            scope,
            previous_token,
            fetch_all_changes: true,
        };
        let response = within(
            config.timeouts.request_timeout(),
            self.core.remote.fetch_database_changes(request),
        )
        .await
        .map_err(|limit| classify(RawError::<ZoneId>::Timeout(limit)))?;

        let report = FetchReport {
            item_error: None,
            partitions: vec![PartitionReport {
                key,
                outcome: response.token_outcome.map_err(classify),
            }],
            top_level: response.outcome.map_err(classify),
        };
        let tokens = self.core.apply(settle(report)).await?;

        if method.is_token_only() {
            return Ok(ChangeSet::empty(tokens));
        }

        let deleted = response
            .deleted_zones
            .into_iter()
            .map(|zone| ZoneDeletion {
                zone,
                purged: false,
            })
            .chain(
                response
                    .purged_zones
                    .into_iter()
                    .map(|zone| ZoneDeletion { zone, purged: true }),
            )
            .collect();

        Ok(ChangeSet {
            changed: response.changed_zones,
            deleted,
            tokens,
        })
    }
}

/// Zone-level change fetching: records changed or deleted in a set of zones.
pub struct ZoneChangeSync<R, T> {
    core: Coordinator<R, T>,
}

impl<R: RemoteStore, T: TokenStore> ZoneChangeSync<R, T> {
    /// Create a coordinator with its own gate.
    pub fn new(remote: Arc<R>, tokens: Arc<T>, config: watch::Receiver<SyncConfig>) -> Self {
        Self {
            core: Coordinator::new(remote, tokens, config),
        }
    }

    /// Fetch record changes of `zones` since their stored tokens.
    ///
    /// Every zone's new token is persisted only when the whole fetch
    /// succeeded. A failed record inside a zone fails the fetch; its error is
    /// re-keyed by zone.
    ///
    /// # Errors
    ///
    /// Item error first, then a zone error (expired tokens first), then the
    /// call's own error. The first zone reporting an expired token is cleared.
    pub async fn fetch_changes(
        &self,
        zones: &[ZoneId],
        method: FetchMethod,
    ) -> Result<ZoneChangeSet, ZoneError> {
        let mut seen = HashSet::with_capacity(zones.len());
        let zones: Vec<ZoneId> = zones
            .iter()
            .filter(|zone| seen.insert(*zone))
            .cloned()
            .collect();
        if zones.is_empty() {
            return Ok(ChangeSet::empty(HashMap::new()));
        }

        let keys: Vec<PartitionKey> = zones.iter().cloned().map(PartitionKey::Zone).collect();
        let _guard = self.core.gate.acquire(&keys).await;

        let config = self.core.snapshot();
        self.core.inject(&config.faults.zone_changes, &zones).await?;

        let mut previous_tokens = HashMap::with_capacity(zones.len());
        for (zone, key) in zones.iter().zip(&keys) {
            previous_tokens.insert(zone.clone(), self.core.tokens.token_for(key).await);
        }
        tracing::debug!(zones = zones.len(), ?method, "fetching zone changes");

        let request = ZoneChangesRequest {
            zones,
            previous_tokens,
            desired_fields: method.desired_fields(),
            fetch_all_changes: true,
        };
        let response = within(
            config.timeouts.request_timeout(),
            self.core.remote.fetch_zone_changes(request),
        )
        .await
        .map_err(|limit| classify(RawError::<ZoneId>::Timeout(limit)))?;

        let items = response
            .changed
            .into_iter()
            .map(|event| (event.key, event.result.map_err(classify)))
            .collect();
        let (changed, item_error) = match escalate(items, Ok(())) {
            Ok(records) => (records.into_iter().map(|(_, record)| record).collect(), None),
            Err(error) => (
                Vec::new(),
                Some(error.map_keys(|id: RecordId| id.zone().clone())),
            ),
        };

        let report = FetchReport {
            item_error,
            partitions: response
                .zone_outcomes
                .into_iter()
                .map(|(zone, outcome)| PartitionReport {
                    key: PartitionKey::Zone(zone),
                    outcome: outcome.map_err(classify),
                })
                .collect(),
            top_level: response.outcome.map_err(classify),
        };
        let tokens = self.core.apply(settle(report)).await?;

        if method.is_token_only() {
            return Ok(ChangeSet::empty(tokens));
        }

        Ok(ChangeSet {
            changed,
            deleted: response.deleted,
            tokens,
        })
    }
}
