//! Change token persistence.
//!
//! The engine reads a partition's token before a change fetch and writes the
//! new one (or an absent token) afterwards. Storage is the application's
//! concern; [`MemoryTokenStore`] is a process-local implementation for tests
//! and short-lived clients.

use async_trait::async_trait;
use dashmap::DashMap;
use zonesync_types::{ChangeToken, PartitionKey};

/// Persistent mapping from partition to its last change token.
///
/// Implementations must be safe for concurrent use across partitions.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store `token` for `key`. `None` removes the stored token.
    async fn store(&self, token: Option<ChangeToken>, key: &PartitionKey);

    /// Token stored for `key`, if any.
    async fn token_for(&self, key: &PartitionKey) -> Option<ChangeToken>;

    /// Remove every stored token.
    async fn clear(&self);
}

/// In-memory token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: DashMap<PartitionKey, ChangeToken>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of partitions with a stored token.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when no token is stored.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn store(&self, token: Option<ChangeToken>, key: &PartitionKey) {
        match token {
            Some(token) => {
                self.tokens.insert(key.clone(), token);
            }
            None => {
                self.tokens.remove(key);
            }
        }
    }

    async fn token_for(&self, key: &PartitionKey) -> Option<ChangeToken> {
        self.tokens.get(key).map(|entry| entry.value().clone())
    }

    async fn clear(&self) {
        self.tokens.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_types::{DatabaseScope, ZoneId};

    #[tokio::test]
    async fn store_and_read_back() {
        let store = MemoryTokenStore::new();
        let key = PartitionKey::Zone(ZoneId::new("notes"));
        let token = ChangeToken::from_bytes(vec![1, 2, 3]);

        store.store(Some(token.clone()), &key).await;

        assert_eq!(store.token_for(&key).await, Some(token));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn storing_absent_removes() {
        let store = MemoryTokenStore::new();
        let key = PartitionKey::Database(DatabaseScope::Private);
        store.store(Some(ChangeToken::from_bytes(vec![9])), &key).await;

        store.store(None, &key).await;

        assert_eq!(store.token_for(&key).await, None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = MemoryTokenStore::new();
        let db = PartitionKey::Database(DatabaseScope::Shared);
        let zone = PartitionKey::Zone(ZoneId::new("a"));
        store.store(Some(ChangeToken::from_bytes(vec![1])), &db).await;

        assert_eq!(store.token_for(&zone).await, None);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let store = MemoryTokenStore::new();
        for name in ["a", "b", "c"] {
            store
                .store(
                    Some(ChangeToken::from_bytes(name.as_bytes().to_vec())),
                    &PartitionKey::Zone(ZoneId::new(name)),
                )
                .await;
        }

        store.clear().await;

        assert!(store.is_empty());
    }
}
