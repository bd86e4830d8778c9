// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Crash Behavior
//
// - All ownership is lost on restart
// - Records created before a restart are never cleaned up afterwards
//
// ## When to Use
//
// - Testing environments
// - Embedding the engine where another component persists ownership

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::traits::state_store::{ManagedRecord, ManagedRecords, StateStore};
use crate::Error;

/// In-memory state store implementation
///
/// # Example
///
/// ```rust,no_run
/// use routedns_core::state::MemoryStateStore;
/// use routedns_core::traits::{ManagedRecord, StateStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///     store.put(&ManagedRecord::new("a.example.com", "10.0.0.2".parse()?, chrono::Utc::now())).await?;
///     assert_eq!(store.len().await, 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<ManagedRecords>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = ManagedRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.hostname.clone(), record))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(records)),
        }
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<ManagedRecords, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn put(&self, record: &ManagedRecord) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(record.hostname.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, hostname: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(hostname);
        Ok(())
    }

    async fn confirm(&self, hostnames: &BTreeSet<String>, at: DateTime<Utc>) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        for hostname in hostnames {
            if let Some(record) = guard.get_mut(hostname) {
                record.last_confirmed_at = at;
            }
        }
        Ok(())
    }
}
