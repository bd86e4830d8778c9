// # State Store Implementations
//
// This module provides implementations of the StateStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::traits::StateStore;

/// Create a state store from configuration
pub async fn open(config: &StoreConfig) -> Result<Box<dyn StateStore>> {
    match config {
        StoreConfig::File { path } => Ok(Box::new(FileStateStore::new(path).await?)),
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory state store: managed records are forgotten on restart");
            Ok(Box::new(MemoryStateStore::new()))
        }
    }
}
