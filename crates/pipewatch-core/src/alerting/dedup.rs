//! "Already notified" store
//!
//! The dispatcher consults this store before sending and records an identity
//! once a send attempt went out. The store's lifetime is the dedup guarantee's
//! lifetime: process memory for one session, Redis across restarts.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;
use crate::models::AlertId;

/// Set of alert identities that already had a notification sent
#[async_trait]
pub trait NotifiedStore: Send + Sync {
    /// Whether a notification was already sent for `id`
    async fn contains(&self, id: &AlertId) -> Result<bool>;

    /// Record that a notification was sent for `id`
    ///
    /// Returns `false` if the identity was already present.
    async fn insert(&self, id: &AlertId) -> Result<bool>;

    /// Number of identities recorded
    async fn len(&self) -> Result<usize>;
}

/// Session-scoped notified set; cleared only by a restart
#[derive(Debug, Default)]
pub struct InMemoryNotifiedStore {
    ids: Mutex<HashSet<AlertId>>,
}

impl InMemoryNotifiedStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotifiedStore for InMemoryNotifiedStore {
    async fn contains(&self, id: &AlertId) -> Result<bool> {
        Ok(self.ids.lock().contains(id))
    }

    async fn insert(&self, id: &AlertId) -> Result<bool> {
        Ok(self.ids.lock().insert(id.clone()))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.ids.lock().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let store = InMemoryNotifiedStore::new();
        let id = AlertId::for_pair("SEG-1", "pressure");

        assert!(!store.contains(&id).await.unwrap());
        assert!(store.insert(&id).await.unwrap());
        assert!(!store.insert(&id).await.unwrap());
        assert!(store.contains(&id).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
