//! Per-partition mutual exclusion for change fetches.
//!
//! Each partition key owns one async mutex. A call that touches several
//! partitions locks them in sorted key order, so two multi-key calls can
//! never wait on each other in a cycle. Tokio's mutex queues waiters in
//! FIFO order, which gives same-key callers first-come first-served access.
//!
//! A partition's entry lives only while some call holds or waits for it, so
//! the table stays bounded by the number of partitions in flight.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use zonesync_types::PartitionKey;

/// Lock table keyed by partition.
#[derive(Debug, Default)]
pub struct PartitionGate {
    locks: DashMap<PartitionKey, Arc<Mutex<()>>>,
}

/// Held locks; dropping it releases every partition.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a PartitionGate,
    keys: Vec<PartitionKey>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.guards.clear();
        for key in &self.keys {
            // The table's own reference is the only one left once nobody
            // holds or waits for the lock. Cloning happens under the same
            // shard lock, so the count cannot rise while this runs.
            self.gate
                .locks
                .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

impl GateGuard<'_> {
    /// Partitions held, in acquisition order.
    pub fn keys(&self) -> &[PartitionKey] {
        &self.keys
    }
}

impl PartitionGate {
    /// Create an empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &PartitionKey) -> Arc<Mutex<()>> {
        // Clone the Arc out so no DashMap shard lock is held across an await.
        Arc::clone(
            self.locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Wait until every key in `keys` is free, then hold them all.
    pub async fn acquire(&self, keys: &[PartitionKey]) -> GateGuard<'_> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            let lock = self.lock_for(key);
            guards.push(lock.lock_owned().await);
        }

        GateGuard {
            gate: self,
            keys,
            guards,
        }
    }

    /// Number of partitions currently held or waited on.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use zonesync_types::ZoneId;

    fn zone(name: &str) -> PartitionKey {
        PartitionKey::Zone(ZoneId::new(name))
    }

    #[tokio::test]
    async fn keys_are_sorted_and_deduplicated() {
        let gate = PartitionGate::new();
        let guard = gate.acquire(&[zone("b"), zone("a"), zone("b")]).await;
        assert_eq!(guard.keys(), &[zone("a"), zone("b")]);
        assert_eq!(gate.tracked(), 2);
    }

    #[tokio::test]
    async fn same_key_waits_for_release() {
        let gate = Arc::new(PartitionGate::new());
        let guard = gate.acquire(&[zone("a")]).await;

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let _guard = gate.acquire(&[zone("a")]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block() {
        let gate = PartitionGate::new();
        let _a = gate.acquire(&[zone("a")]).await;

        let b = tokio::time::timeout(Duration::from_millis(100), gate.acquire(&[zone("b")])).await;

        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_partitions_are_forgotten() {
        let gate = PartitionGate::new();
        for name in ["a", "b", "c"] {
            let _guard = gate.acquire(&[zone(name)]).await;
        }
        assert_eq!(gate.tracked(), 0);
    }

    #[tokio::test]
    async fn entry_survives_while_a_waiter_queues() {
        let gate = Arc::new(PartitionGate::new());
        let guard = gate.acquire(&[zone("a")]).await;

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let _guard = gate.acquire(&[zone("a")]).await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        assert_eq!(gate.tracked(), 1);

        waiter.await.unwrap();
        assert_eq!(gate.tracked(), 0);
    }

    #[tokio::test]
    async fn overlapping_multi_key_calls_complete() {
        let gate = Arc::new(PartitionGate::new());
        let mut handles = Vec::new();
        for keys in [vec![zone("a"), zone("b")], vec![zone("b"), zone("a")]] {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let _guard = gate.acquire(&keys).await;
                    tokio::task::yield_now().await;
                }
            }));
        }

        for handle in handles {
            tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
