// # File State Store
//
// File-based implementation of StateStore.
//
// ## Purpose
//
// Persists ownership of managed DNS records across daemon restarts and
// crashes.
//
// ## Crash Safety
//
// - Atomic writes: every mutation rewrites the file through write-then-rename
// - Serialized mutations: read-modify-write runs under a mutex, so concurrent
//   callers cannot lose each other's updates
// - Backup: the previous file is kept as `.backup` for manual recovery
// - Corruption: an unparseable file is reported as `StoreCorrupt` and never
//   silently replaced, since losing ownership would orphan DNS records
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "app.example.com": {
//       "hostname": "app.example.com",
//       "target_ip": "10.0.0.2",
//       "created_at": "2025-01-09T12:00:00Z",
//       "last_confirmed_at": "2025-01-09T12:05:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::traits::state_store::{ManagedRecord, ManagedRecords, StateStore};

/// State file format version
/// Used for future migration if format changes
const STATE_FILE_VERSION: &str = "1.0";

/// File-based state store
///
/// Every call reads the file, so the file is always the single source of
/// truth and external repairs are picked up on the next pass.
///
/// # Example
///
/// ```rust,no_run
/// use routedns_core::state::FileStateStore;
/// use routedns_core::traits::{ManagedRecord, StateStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/routedns/dns.json").await?;
///
///     let record = ManagedRecord::new("app.example.com", "10.0.0.2".parse()?, chrono::Utc::now());
///     store.put(&record).await?;
///
///     assert!(store.list().await?.contains("app.example.com"));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

/// Serializable state file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    records: ManagedRecords,
}

impl FileStateStore {
    /// Open a file state store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Load the existing file once to surface corruption at startup
    ///
    /// A missing file is an empty store. Only corruption fails here; a
    /// transient I/O failure is logged and left to the first pass to retry.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent).await {
                    tracing::warn!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    );
                }
            }
        }

        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };

        match store.read_records().await {
            Ok(records) => tracing::info!(
                path = %store.path.display(),
                records = records.len(),
                "Opened state store"
            ),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::warn!(
                path = %store.path.display(),
                error = %e,
                "State store not readable yet, retrying on next pass"
            ),
        }

        Ok(store)
    }

    /// Read and parse the state file
    async fn read_records(&self) -> Result<ManagedRecords, Error> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("State file does not exist: {}", self.path.display());
                return Ok(ManagedRecords::new());
            }
            Err(e) => {
                return Err(Error::store_unavailable(format!(
                    "Failed to read state file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let state_file: StateFileFormat = serde_json::from_str(&content).map_err(|e| {
            Error::store_corrupt(format!(
                "Failed to parse state file {}: {}. \
                The previous version may be available at {}.",
                self.path.display(),
                e,
                Self::backup_path(&self.path).display()
            ))
        })?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        if let Some((key, record)) = state_file
            .records
            .iter()
            .find(|(key, record)| **key != record.hostname)
        {
            return Err(Error::store_corrupt(format!(
                "State file {} has entry '{}' holding record for '{}'",
                self.path.display(),
                key,
                record.hostname
            )));
        }

        Ok(state_file.records)
    }

    /// Write state to file atomically
    async fn write_records(&self, records: &ManagedRecords) -> Result<(), Error> {
        let state_file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            records: records.clone(),
        };

        let json = serde_json::to_string_pretty(&state_file)
            .map_err(|e| Error::store_unavailable(format!("Failed to serialize state: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store_unavailable(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store_unavailable(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::store_unavailable(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store_unavailable(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }

    /// Apply `change` to the current records and persist the result
    ///
    /// `change` returns whether it modified anything; unchanged state is not
    /// rewritten.
    async fn mutate<F>(&self, change: F) -> Result<(), Error>
    where
        F: FnOnce(&mut ManagedRecords) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_records().await?;
        if change(&mut records) {
            self.write_records(&records).await?;
        }
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<ManagedRecords, Error> {
        self.read_records().await
    }

    async fn put(&self, record: &ManagedRecord) -> Result<(), Error> {
        let record = record.clone();
        self.mutate(move |records| {
            records.insert(record.hostname.clone(), record);
            true
        })
        .await
    }

    async fn delete(&self, hostname: &str) -> Result<(), Error> {
        self.mutate(|records| records.remove(hostname).is_some())
            .await
    }

    async fn confirm(&self, hostnames: &BTreeSet<String>, at: DateTime<Utc>) -> Result<(), Error> {
        if hostnames.is_empty() {
            return Ok(());
        }

        self.mutate(|records| {
            let mut changed = false;
            for hostname in hostnames {
                if let Some(record) = records.get_mut(hostname) {
                    record.last_confirmed_at = at;
                    changed = true;
                }
            }
            changed
        })
        .await
    }
}
