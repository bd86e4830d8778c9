// # State Store Trait
//
// Defines the interface for persistent ownership tracking.
//
// ## Purpose
//
// The state store is the source of truth for "which DNS records did we
// create". It ensures:
// - Ownership safety: only hostnames recorded here are ever deleted
// - Idempotency: hostnames recorded here are never re-created
// - Crash recovery: ownership survives restarts
//
// ## Implementations
//
// - File-based: JSON file with atomic replace
// - In-memory: tests and embedding
//
// ## Usage
//
// ```rust,ignore
// use routedns_core::{ManagedRecord, StateStore};
//
// let store = /* StateStore implementation */;
//
// // Record ownership after a successful DNS add
// store.put(&ManagedRecord::new("app.example.com", ip, now)).await?;
//
// // Forget ownership after a successful DNS delete
// store.delete("app.example.com").await?;
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

/// A DNS address record this system created and is responsible for
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ManagedRecord {
    /// Fully-qualified hostname (normalized)
    pub hostname: String,
    /// Address the record was created with
    pub target_ip: IpAddr,
    /// When the DNS add succeeded
    pub created_at: DateTime<Utc>,
    /// Last pass in which the hostname was still desired
    pub last_confirmed_at: DateTime<Utc>,
}

impl ManagedRecord {
    /// Create a record for a freshly added hostname
    pub fn new(hostname: impl Into<String>, target_ip: IpAddr, now: DateTime<Utc>) -> Self {
        Self {
            hostname: hostname.into(),
            target_ip,
            created_at: now,
            last_confirmed_at: now,
        }
    }
}

/// Managed records keyed by hostname
pub type ManagedRecords = BTreeMap<String, ManagedRecord>;

/// Trait for state store implementations
///
/// # Atomicity
///
/// Every mutating method is atomic per call: after a crash, each hostname's
/// entry is either fully present in its old form or fully present in its new
/// form. Implementations must stay atomic when called from concurrent tasks.
///
/// # Errors
///
/// - `Error::StoreCorrupt`: persisted data exists but cannot be understood
///   (fatal, never retried)
/// - `Error::StoreUnavailable`: transient I/O failure (retried next pass)
///
/// # Trust Level: Trusted (Core Component)
///
/// State stores may perform I/O for persistence. They must not decide what
/// to create or delete (owned by `ReconcileEngine`) and must not talk to DNS
/// (owned by `DnsUpdater`).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load every managed record
    async fn load(&self) -> Result<ManagedRecords, crate::Error>;

    /// Insert or replace the record for `record.hostname`
    async fn put(&self, record: &ManagedRecord) -> Result<(), crate::Error>;

    /// Remove the record for a hostname (no-op if absent)
    async fn delete(&self, hostname: &str) -> Result<(), crate::Error>;

    /// Refresh `last_confirmed_at` for existing hostnames
    ///
    /// Hostnames without an entry are ignored. Implementations should commit
    /// the whole batch in one write.
    async fn confirm(&self, hostnames: &BTreeSet<String>, at: DateTime<Utc>)
    -> Result<(), crate::Error>;

    /// List all managed hostnames
    async fn list(&self) -> Result<BTreeSet<String>, crate::Error> {
        Ok(self.load().await?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_confirmed_at_creation() {
        let now = Utc::now();
        let record = ManagedRecord::new("a.example.com", IpAddr::from([10, 0, 0, 2]), now);

        assert_eq!(record.created_at, now);
        assert_eq!(record.last_confirmed_at, now);
    }
}
